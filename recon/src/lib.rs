//! Surface reconstruction from 3-D point clouds.
//!
//! Takes an unorganized point cloud and produces an indexed triangle mesh.
//! Two engines are provided:
//!
//! - [`ball_pivoting`]: rolls a ball of increasing radii over the cloud,
//!   attaching triangles wherever it rests on three points. Works on general
//!   surfaces but requires oriented normals (see [`normals`]).
//! - [`alpha_shape`]: projects the cloud onto its PCA best-fit plane,
//!   triangulates in 2-D, and keeps triangles whose circumradius is within an
//!   alpha threshold. Faster, no normals needed, best for near-planar clouds.
//!
//! Supporting modules cover normal estimation and spacing statistics
//! ([`normals`]), mesh cleanup ([`mesh`]), and PLY/OBJ/STL encoding ([`io`]).
//!
//! ```
//! use nalgebra::Point3;
//! use recon::{BallPivotingParams, PointCloud, ball_pivoting, estimate_radii, normals};
//!
//! let mut cloud = PointCloud::new();
//! for i in 0..10 {
//!     for j in 0..10 {
//!         cloud.add_point(Point3::new(f64::from(i), f64::from(j), 0.0));
//!     }
//! }
//!
//! normals::estimate_normals(&mut cloud, 8).unwrap();
//! normals::orient_consistent(&mut cloud, 8).unwrap();
//!
//! let radii = estimate_radii(&cloud, 8, 1.5, 2).unwrap();
//! let result = ball_pivoting(&cloud, &BallPivotingParams::new(radii)).unwrap();
//!
//! let mut mesh = result.mesh;
//! mesh.cleanup();
//! mesh.compute_vertex_normals();
//! assert!(!mesh.is_empty());
//! ```

pub mod alpha_shape;
pub mod ball_pivoting;
pub mod cloud;
pub mod error;
pub mod io;
pub mod mesh;
pub mod normals;

pub use alpha_shape::{AlphaShapeParams, alpha_shape};
pub use ball_pivoting::{BallPivotingParams, BallPivotingResult, ball_pivoting, estimate_radii};
pub use cloud::{CloudPoint, PointCloud};
pub use error::{ReconError, Result};
pub use io::MeshFormat;
pub use mesh::TriangleMesh;
pub use normals::average_spacing;
