//! Ball pivoting surface reconstruction.
//!
//! A ball of fixed radius rolls over the point cloud: wherever it rests on
//! three points without containing any other, those points form a triangle.
//! From a seed triangle the ball pivots around each front edge to attach the
//! next vertex, growing the surface outward.
//!
//! Reconstruction runs over a sequence of increasing radii. Edges the ball
//! cannot pivot past at one radius are retried at the next larger one, which
//! closes gaps in unevenly sampled regions without losing detail where the
//! sampling is dense.
//!
//! Requires oriented normals; estimate them first if the input has none.

use std::collections::{HashMap, HashSet, VecDeque};

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Point3, Vector3};

use crate::cloud::PointCloud;
use crate::error::{ReconError, Result};
use crate::mesh::TriangleMesh;
use crate::normals::{average_spacing, build_kdtree};

/// Parameters for ball pivoting reconstruction.
#[derive(Debug, Clone)]
pub struct BallPivotingParams {
    /// Ball radii, tried in ascending order. Each should be at or above the
    /// average point spacing.
    pub radii: Vec<f64>,

    /// Maximum pivot angle in radians. Default: π/2.
    pub max_pivot_angle: f64,
}

impl Default for BallPivotingParams {
    fn default() -> Self {
        Self {
            radii: vec![1.0],
            max_pivot_angle: std::f64::consts::FRAC_PI_2,
        }
    }
}

impl BallPivotingParams {
    /// Creates parameters with the given radii.
    #[must_use]
    pub fn new(radii: Vec<f64>) -> Self {
        Self {
            radii,
            ..Self::default()
        }
    }

    /// Sets the maximum pivot angle.
    #[must_use]
    pub const fn with_max_pivot_angle(mut self, angle: f64) -> Self {
        self.max_pivot_angle = angle;
        self
    }
}

/// Derives a radius sequence from the cloud's point density.
///
/// The base radius is the average spacing over `k` neighbors scaled by
/// `multiplier`; radius `i` is further scaled by `1 + 0.5·i`.
///
/// # Errors
///
/// Returns an error if the cloud is too small or a parameter is out of range.
pub fn estimate_radii(
    cloud: &PointCloud,
    k: usize,
    multiplier: f64,
    num_radii: usize,
) -> Result<Vec<f64>> {
    if !(multiplier > 0.0 && multiplier.is_finite()) {
        return Err(ReconError::InvalidParameter {
            reason: format!("radius multiplier must be positive, got {multiplier}"),
        });
    }
    if num_radii == 0 {
        return Err(ReconError::InvalidParameter {
            reason: "radius count must be at least 1".to_string(),
        });
    }

    let spacing = average_spacing(cloud, k)?;
    let base = spacing * multiplier;
    #[allow(clippy::cast_precision_loss)]
    Ok((0..num_radii).map(|i| base * (1.0 + 0.5 * i as f64)).collect())
}

/// Result of ball pivoting reconstruction.
#[derive(Debug, Clone)]
pub struct BallPivotingResult {
    /// The reconstructed mesh, referencing every input point as a vertex.
    pub mesh: TriangleMesh,

    /// Number of triangles created.
    pub triangle_count: usize,

    /// Fraction of input points incorporated into the surface.
    pub coverage_ratio: f64,

    /// Number of open edges in the final surface.
    pub boundary_edge_count: usize,

    /// The radii the ball actually rolled with.
    pub radii_used: Vec<f64>,
}

impl std::fmt::Display for BallPivotingResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ball pivoting: {} triangles, {:.1}% coverage, {} boundary edges, {} radii",
            self.triangle_count,
            self.coverage_ratio * 100.0,
            self.boundary_edge_count,
            self.radii_used.len()
        )
    }
}

/// An undirected edge of the advancing front.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct Edge {
    v0: usize,
    v1: usize,
}

impl Edge {
    const fn new(a: usize, b: usize) -> Self {
        // Normalized ordering so both windings hash alike.
        if a < b { Self { v0: a, v1: b } } else { Self { v0: b, v1: a } }
    }
}

/// Where the ball rested when the edge joined the front.
#[derive(Debug, Clone, Copy)]
struct BallPosition {
    center: Point3<f64>,
}

/// Reconstructs a mesh from an oriented point cloud by ball pivoting.
///
/// The returned mesh keeps all input points as vertices (carrying their colors
/// when the whole cloud has them); run [`TriangleMesh::cleanup`] afterwards to
/// drop the unreferenced ones.
///
/// # Errors
///
/// Returns an error if the cloud is empty, has no normals, or the radius list
/// is invalid.
pub fn ball_pivoting(cloud: &PointCloud, params: &BallPivotingParams) -> Result<BallPivotingResult> {
    if cloud.is_empty() {
        return Err(ReconError::EmptyCloud);
    }
    if !cloud.has_normals() {
        return Err(ReconError::NormalEstimationFailed {
            reason: "ball pivoting requires oriented normals".to_string(),
        });
    }
    if params.radii.is_empty() {
        return Err(ReconError::InvalidParameter {
            reason: "at least one ball radius is required".to_string(),
        });
    }
    if params.radii.iter().any(|r| !(r.is_finite() && *r > 0.0)) {
        return Err(ReconError::InvalidParameter {
            reason: "ball radii must be positive and finite".to_string(),
        });
    }

    let mut radii = params.radii.clone();
    radii.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let tree = build_kdtree(&cloud.points);

    let mut faces: Vec<[usize; 3]> = Vec::new();
    let mut used: HashSet<usize> = HashSet::new();
    let mut completed: HashSet<Edge> = HashSet::new();
    // Edges the ball could not pivot past at the current radius; retried at
    // the next one.
    let mut stalled: HashMap<Edge, BallPosition> = HashMap::new();

    for &radius in &radii {
        let mut front: VecDeque<(Edge, BallPosition)> = stalled.drain().collect();
        let mut on_front: HashSet<Edge> = front.iter().map(|(e, _)| *e).collect();
        let max_iterations = cloud.len() * 10;
        let mut iterations = 0usize;

        loop {
            // Expand the current front.
            while let Some((edge, ball)) = front.pop_front() {
                on_front.remove(&edge);
                iterations += 1;
                if iterations > max_iterations {
                    break;
                }
                if completed.contains(&edge) {
                    continue;
                }

                match pivot_ball(cloud, &tree, edge, &ball.center, radius, params.max_pivot_angle, &used) {
                    Some((vertex, center)) => {
                        faces.push([edge.v0, vertex, edge.v1]);
                        used.insert(vertex);
                        completed.insert(edge);

                        for new_edge in [Edge::new(edge.v0, vertex), Edge::new(vertex, edge.v1)] {
                            if completed.contains(&new_edge) {
                                continue;
                            }
                            if on_front.contains(&new_edge) || stalled.contains_key(&new_edge) {
                                // Reached from both sides; the edge is interior now.
                                stalled.remove(&new_edge);
                                completed.insert(new_edge);
                            } else {
                                on_front.insert(new_edge);
                                front.push_back((new_edge, BallPosition { center }));
                            }
                        }
                    }
                    None => {
                        stalled.insert(edge, ball);
                    }
                }
            }

            if iterations > max_iterations {
                break;
            }

            // Front exhausted; look for a fresh seed in an untouched region.
            match find_seed_triangle(cloud, &tree, radius, &used) {
                Some((tri, center)) => {
                    faces.push(tri);
                    used.extend(tri);
                    for edge in [
                        Edge::new(tri[0], tri[1]),
                        Edge::new(tri[1], tri[2]),
                        Edge::new(tri[2], tri[0]),
                    ] {
                        on_front.insert(edge);
                        front.push_back((edge, BallPosition { center }));
                    }
                }
                None => break,
            }
        }
    }

    let triangle_count = faces.len();
    #[allow(clippy::cast_precision_loss)]
    let coverage_ratio = used.len() as f64 / cloud.len().max(1) as f64;
    let boundary_edge_count = count_boundary_edges(&faces);

    let vertices: Vec<Point3<f64>> = cloud.points.iter().map(|p| p.position).collect();
    let colors = cloud
        .has_colors()
        .then(|| cloud.points.iter().filter_map(|p| p.color).collect());

    let mut mesh = TriangleMesh::from_vertices_and_faces(vertices, faces);
    mesh.colors = colors;

    Ok(BallPivotingResult {
        mesh,
        triangle_count,
        coverage_ratio,
        boundary_edge_count,
        radii_used: radii,
    })
}

/// Finds a seed triangle among vertices not yet part of the surface.
///
/// Returned with winding agreeing with the seed vertex normal.
fn find_seed_triangle(
    cloud: &PointCloud,
    tree: &KdTree<f64, 3>,
    radius: f64,
    used: &HashSet<usize>,
) -> Option<([usize; 3], Point3<f64>)> {
    let search_radius_sq = (radius * 2.0).powi(2);

    for (i, point) in cloud.points.iter().enumerate() {
        if used.contains(&i) {
            continue;
        }
        let normal = point.normal?;
        let p = point.position;
        let neighbors = tree.within::<SquaredEuclidean>(&[p.x, p.y, p.z], search_radius_sq);

        for j in 0..neighbors.len() {
            let idx_j = neighbors[j].item as usize;
            if idx_j == i {
                continue;
            }
            for k in (j + 1)..neighbors.len() {
                let idx_k = neighbors[k].item as usize;
                if idx_k == i {
                    continue;
                }

                let p1 = cloud.points[idx_j].position;
                let p2 = cloud.points[idx_k].position;
                let Some(center) = compute_ball_center(&p, &p1, &p2, &normal, radius) else {
                    continue;
                };
                if !is_empty_ball(cloud, tree, &center, radius, &[i, idx_j, idx_k]) {
                    continue;
                }

                // Orient the seed so its face normal matches the vertex normal.
                let face_normal = (p1 - p).cross(&(p2 - p));
                let tri = if face_normal.dot(&normal) >= 0.0 {
                    [i, idx_j, idx_k]
                } else {
                    [i, idx_k, idx_j]
                };
                return Some((tri, center));
            }
        }
    }

    None
}

/// Center of a ball of the given radius resting on three points, on the side
/// the normal points toward. `None` if the ball is too small to touch all
/// three.
fn compute_ball_center(
    p0: &Point3<f64>,
    p1: &Point3<f64>,
    p2: &Point3<f64>,
    normal: &Vector3<f64>,
    radius: f64,
) -> Option<Point3<f64>> {
    let e1 = p1 - p0;
    let e2 = p2 - p0;
    let tri_normal = e1.cross(&e2);
    let tri_normal_len = tri_normal.norm();
    if tri_normal_len < 1e-10 {
        return None;
    }
    let tri_normal_unit = tri_normal / tri_normal_len;

    // Heron's formula for the circumradius.
    let a = (p1 - p2).norm();
    let b = (p0 - p2).norm();
    let c = (p0 - p1).norm();
    let s = (a + b + c) / 2.0;
    let area = (s * (s - a) * (s - b) * (s - c)).sqrt();
    if area < 1e-10 {
        return None;
    }

    let circumradius = (a * b * c) / (4.0 * area);
    if circumradius > radius {
        return None;
    }

    let h_sq = radius.mul_add(radius, -(circumradius * circumradius));
    if h_sq < 0.0 {
        return None;
    }
    let h = h_sq.sqrt();

    // Circumcenter in barycentric coordinates.
    let alpha = (p1 - p2).norm_squared() * (p0 - p1).dot(&(p0 - p2));
    let beta = (p0 - p2).norm_squared() * (p1 - p0).dot(&(p1 - p2));
    let gamma = (p0 - p1).norm_squared() * (p2 - p0).dot(&(p2 - p1));
    let denom = alpha + beta + gamma;
    if denom.abs() < 1e-10 {
        return None;
    }
    let circumcenter = (alpha * p0.coords + beta * p1.coords + gamma * p2.coords) / denom;

    let direction = if tri_normal_unit.dot(normal) > 0.0 {
        tri_normal_unit
    } else {
        -tri_normal_unit
    };

    Some(Point3::from(circumcenter + direction * h))
}

/// Checks that no cloud point other than the touching ones lies strictly
/// inside the ball.
fn is_empty_ball(
    cloud: &PointCloud,
    tree: &KdTree<f64, 3>,
    center: &Point3<f64>,
    radius: f64,
    exclude: &[usize],
) -> bool {
    let radius_sq = radius * radius;
    let tolerance = 1e-6;

    let neighbors = tree.within::<SquaredEuclidean>(&[center.x, center.y, center.z], radius_sq * 1.01);
    for neighbor in neighbors {
        let idx = neighbor.item as usize;
        if exclude.contains(&idx) {
            continue;
        }
        if (cloud.points[idx].position - center).norm_squared() < radius_sq - tolerance {
            return false;
        }
    }
    true
}

/// Pivots the ball around an edge; returns the new vertex and ball center.
fn pivot_ball(
    cloud: &PointCloud,
    tree: &KdTree<f64, 3>,
    edge: Edge,
    ball_center: &Point3<f64>,
    radius: f64,
    max_pivot_angle: f64,
    used: &HashSet<usize>,
) -> Option<(usize, Point3<f64>)> {
    let p0 = cloud.points[edge.v0].position;
    let p1 = cloud.points[edge.v1].position;

    let edge_mid = Point3::from((p0.coords + p1.coords) / 2.0);
    if (p1 - p0).norm() < 1e-10 {
        return None;
    }

    let search_radius_sq = (radius * 2.5).powi(2);
    let candidates =
        tree.within::<SquaredEuclidean>(&[edge_mid.x, edge_mid.y, edge_mid.z], search_radius_sq);

    let mut best: Option<(usize, Point3<f64>, f64)> = None;

    for candidate in candidates {
        let idx = candidate.item as usize;
        if idx == edge.v0 || idx == edge.v1 {
            continue;
        }

        let p2 = cloud.points[idx].position;
        let normal = cloud.points[idx].normal.unwrap_or_else(Vector3::z);

        let Some(new_center) = compute_ball_center(&p0, &p1, &p2, &normal, radius) else {
            continue;
        };

        // The ball must roll over the edge to the far side.
        let old_dir = ball_center - edge_mid;
        let new_dir = new_center - edge_mid;
        if old_dir.dot(&new_dir) > 0.0 {
            continue;
        }

        let pivot_angle = old_dir.angle(&(-new_dir));
        if pivot_angle > max_pivot_angle {
            continue;
        }

        if !is_empty_ball(cloud, tree, &new_center, radius, &[edge.v0, edge.v1, idx]) {
            continue;
        }

        // Prefer unused vertices, then the smallest pivot.
        let priority = if used.contains(&idx) { 1.0 } else { 0.0 };
        let score = priority + pivot_angle / std::f64::consts::PI;
        if best.is_none_or(|(_, _, s)| score < s) {
            best = Some((idx, new_center, score));
        }
    }

    best.map(|(idx, center, _)| (idx, center))
}

/// Counts edges adjacent to exactly one face.
fn count_boundary_edges(faces: &[[usize; 3]]) -> usize {
    let mut counts: HashMap<Edge, usize> = HashMap::new();
    for face in faces {
        for edge in [
            Edge::new(face[0], face[1]),
            Edge::new(face[1], face[2]),
            Edge::new(face[2], face[0]),
        ] {
            *counts.entry(edge).or_insert(0) += 1;
        }
    }
    counts.values().filter(|&&c| c == 1).count()
}
