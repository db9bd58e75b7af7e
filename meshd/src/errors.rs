//! Error types for the meshd API.
//!
//! Every handler returns [`Result`]; the [`Error`] type maps each failure to
//! an HTTP status code and a JSON body of the form
//! `{"error": "<message>", "type": "<category>"}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use recon::ReconError;
use serde_json::json;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Malformed request body or query parameters.
    #[error("Bad request: {message}")]
    BadRequest { message: String },

    /// The client asked for a format the service cannot produce or parse.
    #[error("Unsupported format: {format}")]
    UnsupportedFormat { format: String },

    /// The uploaded cloud cannot be reconstructed (too few points, all
    /// points collinear, and so on).
    #[error("Invalid point cloud: {message}")]
    InvalidCloud { message: String },

    /// Reconstruction ran but produced no usable mesh.
    #[error("Reconstruction failed: {message}")]
    Reconstruction { message: String },

    /// Filesystem failure while persisting uploads or outputs.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Catch-all for unexpected internal failures.
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl Error {
    /// Map error types to HTTP status codes.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::BadRequest { .. } | Error::UnsupportedFormat { .. } | Error::InvalidCloud { .. } => StatusCode::BAD_REQUEST,
            Error::Reconstruction { .. } | Error::Io(_) | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Category string returned in the JSON body's `type` field.
    pub fn error_type(&self) -> &'static str {
        match self {
            Error::BadRequest { .. } => "bad_request",
            Error::UnsupportedFormat { .. } => "unsupported_format",
            Error::InvalidCloud { .. } => "invalid_point_cloud",
            Error::Reconstruction { .. } => "reconstruction_failed",
            Error::Io(_) | Error::Internal(_) => "internal_error",
        }
    }

    /// Get user-friendly error message (no internal details leaked).
    pub fn user_message(&self) -> String {
        match self {
            Error::BadRequest { message } => message.clone(),
            Error::UnsupportedFormat { format } => format!("Unsupported format: {format}"),
            Error::InvalidCloud { message } => message.clone(),
            Error::Reconstruction { message } => format!("Reconstruction failed: {message}"),
            Error::Io(_) => "An internal storage error occurred".to_string(),
            Error::Internal(_) => "An internal error occurred".to_string(),
        }
    }
}

impl From<ReconError> for Error {
    fn from(err: ReconError) -> Self {
        match err {
            ReconError::EmptyCloud | ReconError::InsufficientPoints { .. } => Error::InvalidCloud {
                message: err.to_string(),
            },
            ReconError::InvalidParameter { reason } => Error::BadRequest { message: reason },
            ReconError::UnsupportedFormat { format } => Error::UnsupportedFormat { format },
            ReconError::PlyParse { reason } => Error::BadRequest {
                message: format!("Failed to parse PLY input: {reason}"),
            },
            ReconError::ReconstructionFailed { reason } => Error::Reconstruction { message: reason },
            ReconError::NormalEstimationFailed { reason } => Error::Reconstruction {
                message: format!("Normal estimation failed: {reason}"),
            },
            ReconError::EmptyMesh => Error::Reconstruction {
                message: "Reconstruction produced an empty mesh".to_string(),
            },
            ReconError::Io(e) => Error::Io(e),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Log with severity matching the failure class: client mistakes are
        // routine, internal failures need operator attention.
        match &self {
            Error::Io(_) | Error::Internal(_) => {
                tracing::error!(error = %self, "Internal error");
            }
            Error::Reconstruction { .. } => {
                tracing::warn!(error = %self, "Reconstruction error");
            }
            _ => {
                tracing::debug!(error = %self, "Client error");
            }
        }

        let body = Json(json!({
            "error": self.user_message(),
            "type": self.error_type(),
        }));

        (status, body).into_response()
    }
}
