//! Request handlers.
//!
//! - [`health`]: liveness and version reporting
//! - [`mesh`]: point cloud upload, reconstruction and cloud statistics

pub mod health;
pub mod mesh;
