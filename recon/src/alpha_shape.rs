//! Alpha-shape surface reconstruction via planar Delaunay triangulation.
//!
//! The cloud is projected onto its PCA best-fit plane, triangulated in 2-D,
//! and the triangulation is lifted back to the original 3-D vertices. Faces
//! whose 3-D circumradius exceeds `alpha` are discarded, carving the concave
//! outline out of the full Delaunay surface. Suited to mostly planar or
//! gently curved clouds such as single-view scans.

use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};
use spade::{DelaunayTriangulation, HasPosition, Point2, Triangulation};

use crate::cloud::PointCloud;
use crate::error::{ReconError, Result};
use crate::mesh::TriangleMesh;

/// Parameters for alpha-shape reconstruction.
#[derive(Debug, Clone, Copy)]
pub struct AlphaShapeParams {
    /// Circumradius threshold in world units. Triangles with a larger
    /// circumradius are discarded. A good starting point is 1.5 times the
    /// average point spacing.
    pub alpha: f64,
}

impl Default for AlphaShapeParams {
    fn default() -> Self {
        Self { alpha: 0.05 }
    }
}

impl AlphaShapeParams {
    /// Creates parameters with the given alpha.
    #[must_use]
    pub const fn new(alpha: f64) -> Self {
        Self { alpha }
    }
}

/// A projected point remembering which cloud point it came from.
struct ProjectedVertex {
    position: Point2<f64>,
    index: usize,
}

impl HasPosition for ProjectedVertex {
    type Scalar = f64;

    fn position(&self) -> Point2<f64> {
        self.position
    }
}

/// Reconstructs a mesh by projected Delaunay triangulation with circumradius
/// filtering.
///
/// If the alpha filter rejects every triangle, the unfiltered Delaunay surface
/// is returned instead so a too-small alpha degrades rather than fails. The
/// returned mesh keeps all input points as vertices; run
/// [`TriangleMesh::cleanup`] afterwards to drop the unreferenced ones.
///
/// # Errors
///
/// Returns an error if the cloud has fewer than 3 points, `alpha` is not a
/// positive finite number, or the projected points are degenerate.
pub fn alpha_shape(cloud: &PointCloud, params: &AlphaShapeParams) -> Result<TriangleMesh> {
    if cloud.is_empty() {
        return Err(ReconError::EmptyCloud);
    }
    if cloud.len() < 3 {
        return Err(ReconError::InsufficientPoints {
            required: 3,
            actual: cloud.len(),
        });
    }
    if !(params.alpha > 0.0 && params.alpha.is_finite()) {
        return Err(ReconError::InvalidParameter {
            reason: format!("alpha must be positive, got {}", params.alpha),
        });
    }

    let positions: Vec<Point3<f64>> = cloud.points.iter().map(|p| p.position).collect();
    let (u, v, plane_normal) = pca_plane_basis(&positions)?;
    let centroid = cloud.centroid().ok_or(ReconError::EmptyCloud)?;

    let mut triangulation: DelaunayTriangulation<ProjectedVertex> = DelaunayTriangulation::new();
    for (index, position) in positions.iter().enumerate() {
        let d = position - centroid;
        triangulation
            .insert(ProjectedVertex {
                position: Point2::new(d.dot(&u), d.dot(&v)),
                index,
            })
            .map_err(|e| ReconError::ReconstructionFailed {
                reason: format!("Delaunay insertion failed: {e:?}"),
            })?;
    }

    let mut kept: Vec<[usize; 3]> = Vec::new();
    let mut all_valid: Vec<[usize; 3]> = Vec::new();

    for face in triangulation.inner_faces() {
        let [a, b, c] = face.vertices();
        let tri = [a.data().index, b.data().index, c.data().index];
        if tri[0] == tri[1] || tri[1] == tri[2] || tri[0] == tri[2] {
            continue;
        }

        let (p0, p1, p2) = (positions[tri[0]], positions[tri[1]], positions[tri[2]]);
        let Some(circumradius) = circumradius_3d(&p0, &p1, &p2) else {
            continue;
        };

        let oriented = orient_face(tri, &positions, &plane_normal);
        all_valid.push(oriented);
        if circumradius <= params.alpha {
            kept.push(oriented);
        }
    }

    // A too-tight alpha leaves nothing; fall back to the full Delaunay surface.
    let faces = if kept.is_empty() { all_valid } else { kept };
    if faces.is_empty() {
        return Err(ReconError::ReconstructionFailed {
            reason: "triangulation produced no valid triangles".to_string(),
        });
    }

    let colors = cloud
        .has_colors()
        .then(|| cloud.points.iter().filter_map(|p| p.color).collect());

    let mut mesh = TriangleMesh::from_vertices_and_faces(positions, faces);
    mesh.colors = colors;
    Ok(mesh)
}

/// Orthonormal in-plane basis (largest two principal directions) plus the
/// plane normal.
fn pca_plane_basis(
    positions: &[Point3<f64>],
) -> Result<(Vector3<f64>, Vector3<f64>, Vector3<f64>)> {
    let sum: Vector3<f64> = positions.iter().map(|p| p.coords).sum();
    #[allow(clippy::cast_precision_loss)]
    let centroid = sum / positions.len() as f64;

    let mut cov = Matrix3::zeros();
    for p in positions {
        let d = p.coords - centroid;
        cov += d * d.transpose();
    }

    let eigen = SymmetricEigen::new(cov);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| {
        eigen.eigenvalues[b]
            .partial_cmp(&eigen.eigenvalues[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let u = eigen.eigenvectors.column(order[0]).into_owned();
    let v = eigen.eigenvectors.column(order[1]).into_owned();
    let (u_len, v_len) = (u.norm(), v.norm());
    if u_len < 1e-12 || v_len < 1e-12 || eigen.eigenvalues[order[1]].abs() < 1e-18 {
        return Err(ReconError::ReconstructionFailed {
            reason: "points are degenerate, cannot fit a projection plane".to_string(),
        });
    }

    let u = u / u_len;
    let v = v / v_len;
    Ok((u, v, u.cross(&v)))
}

/// Flips the face winding so its normal agrees with the projection plane
/// normal.
fn orient_face(
    tri: [usize; 3],
    positions: &[Point3<f64>],
    plane_normal: &Vector3<f64>,
) -> [usize; 3] {
    let e1 = positions[tri[1]] - positions[tri[0]];
    let e2 = positions[tri[2]] - positions[tri[0]];
    if e1.cross(&e2).dot(plane_normal) < 0.0 {
        [tri[0], tri[2], tri[1]]
    } else {
        tri
    }
}

/// Circumradius of a 3-D triangle, or `None` when degenerate.
fn circumradius_3d(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> Option<f64> {
    let a = (p1 - p2).norm();
    let b = (p0 - p2).norm();
    let c = (p0 - p1).norm();

    let area = 0.5 * (p1 - p0).cross(&(p2 - p0)).norm();
    if area < 1e-12 {
        return None;
    }
    Some((a * b * c) / (4.0 * area))
}
