//! Error types for reconstruction operations.

/// Result type for reconstruction operations.
pub type Result<T> = std::result::Result<T, ReconError>;

/// Errors that can occur while processing point clouds and meshes.
#[derive(Debug, thiserror::Error)]
pub enum ReconError {
    /// Point cloud is empty.
    #[error("point cloud is empty")]
    EmptyCloud,

    /// Not enough points for the requested operation.
    #[error("insufficient points: need at least {required}, got {actual}")]
    InsufficientPoints { required: usize, actual: usize },

    /// Invalid parameter value.
    #[error("invalid parameter: {reason}")]
    InvalidParameter { reason: String },

    /// I/O error during encoding or decoding.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Unsupported file format.
    #[error("unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// PLY file parsing error.
    #[error("PLY parsing error: {reason}")]
    PlyParse { reason: String },

    /// Surface reconstruction failed.
    #[error("reconstruction failed: {reason}")]
    ReconstructionFailed { reason: String },

    /// Normal estimation failed.
    #[error("normal estimation failed: {reason}")]
    NormalEstimationFailed { reason: String },

    /// Mesh is empty.
    #[error("mesh is empty")]
    EmptyMesh,
}
