//! Normal estimation and neighborhood statistics for point clouds.
//!
//! Normals are estimated per point by PCA over the k nearest neighbors: the
//! eigenvector of the smallest eigenvalue of the neighborhood covariance is the
//! direction of least variance, i.e. the surface normal. PCA gives no sign, so
//! a separate orientation pass makes the signs consistent.

use std::collections::VecDeque;

use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{Matrix3, Point3, SymmetricEigen, Vector3};

use crate::cloud::{CloudPoint, PointCloud};
use crate::error::{ReconError, Result};

/// Spacing estimation samples at most this many points.
const SPACING_SAMPLE_CAP: usize = 1000;

/// Builds a kd-tree over the cloud, indexing points by position.
pub(crate) fn build_kdtree(points: &[CloudPoint]) -> KdTree<f64, 3> {
    let mut tree: KdTree<f64, 3> = KdTree::new();
    for (i, point) in points.iter().enumerate() {
        let p = point.position;
        tree.add(&[p.x, p.y, p.z], i as u64);
    }
    tree
}

/// Estimates normals for every point using PCA over the `k` nearest neighbors.
///
/// Degenerate neighborhoods (fewer than 3 neighbors, or a covariance with no
/// stable minor axis) fall back to +Z. The resulting normals are unit length
/// but not consistently oriented; follow with [`orient_consistent`] or
/// [`orient_outward`].
///
/// # Errors
///
/// Returns an error if the cloud has fewer than 3 points or `k` is 0.
pub fn estimate_normals(cloud: &mut PointCloud, k: usize) -> Result<()> {
    if cloud.len() < 3 {
        return Err(ReconError::InsufficientPoints {
            required: 3,
            actual: cloud.len(),
        });
    }
    if k == 0 {
        return Err(ReconError::InvalidParameter {
            reason: "neighbor count must be greater than 0".to_string(),
        });
    }

    let tree = build_kdtree(&cloud.points);
    let normals: Vec<Vector3<f64>> = cloud
        .points
        .iter()
        .map(|point| pca_normal(&point.position, &tree, &cloud.points, k))
        .collect();

    for (point, normal) in cloud.points.iter_mut().zip(normals) {
        point.normal = Some(normal);
    }
    Ok(())
}

/// Flips each normal to face away from the cloud centroid.
///
/// Works well for convex or mostly convex clouds; use [`orient_consistent`]
/// for objects with concavities.
///
/// # Errors
///
/// Returns an error if the cloud is empty or carries no normals.
pub fn orient_outward(cloud: &mut PointCloud) -> Result<()> {
    if cloud.is_empty() {
        return Err(ReconError::EmptyCloud);
    }
    if !cloud.has_normals() {
        return Err(ReconError::NormalEstimationFailed {
            reason: "cloud has no normals to orient".to_string(),
        });
    }

    let centroid = cloud.centroid().ok_or(ReconError::EmptyCloud)?;
    for point in &mut cloud.points {
        if let Some(normal) = &mut point.normal {
            let outward = point.position - centroid;
            if normal.dot(&outward) < 0.0 {
                *normal = -*normal;
            }
        }
    }
    Ok(())
}

/// Propagates a consistent normal sign by BFS over the k-NN graph.
///
/// The seed is the highest-z point with its normal forced to face +Z-ward;
/// each visited neighbor is flipped to agree with its predecessor. Points in
/// components not reachable from the seed keep their PCA sign.
///
/// # Errors
///
/// Returns an error if the cloud is empty or carries no normals.
pub fn orient_consistent(cloud: &mut PointCloud, k: usize) -> Result<()> {
    if cloud.is_empty() {
        return Err(ReconError::EmptyCloud);
    }
    if !cloud.has_normals() {
        return Err(ReconError::NormalEstimationFailed {
            reason: "cloud has no normals to orient".to_string(),
        });
    }

    let tree = build_kdtree(&cloud.points);

    let seed_idx = cloud
        .points
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| {
            a.position
                .z
                .partial_cmp(&b.position.z)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(i, _)| i)
        .ok_or(ReconError::EmptyCloud)?;

    if let Some(normal) = &mut cloud.points[seed_idx].normal
        && normal.z < 0.0
    {
        *normal = -*normal;
    }

    let mut visited = vec![false; cloud.len()];
    let mut queue = VecDeque::new();
    visited[seed_idx] = true;
    queue.push_back(seed_idx);

    while let Some(current) = queue.pop_front() {
        let current_normal = cloud.points[current].normal.unwrap_or_else(Vector3::z);
        let p = cloud.points[current].position;
        let neighbors = tree.nearest_n::<SquaredEuclidean>(&[p.x, p.y, p.z], k);

        for neighbor in neighbors {
            let idx = neighbor.item as usize;
            if visited[idx] {
                continue;
            }
            visited[idx] = true;

            if let Some(normal) = &mut cloud.points[idx].normal
                && normal.dot(&current_normal) < 0.0
            {
                *normal = -*normal;
            }
            queue.push_back(idx);
        }
    }

    Ok(())
}

/// Mean nearest-neighbor distance over the cloud, averaged over the `k`
/// nearest neighbors of each sampled point.
///
/// Large clouds are sampled at a fixed stride so the cost stays bounded.
///
/// # Errors
///
/// Returns an error if the cloud has fewer than 2 points or `k` is 0.
pub fn average_spacing(cloud: &PointCloud, k: usize) -> Result<f64> {
    if cloud.len() < 2 {
        return Err(ReconError::InsufficientPoints {
            required: 2,
            actual: cloud.len(),
        });
    }
    if k == 0 {
        return Err(ReconError::InvalidParameter {
            reason: "neighbor count must be greater than 0".to_string(),
        });
    }

    let tree = build_kdtree(&cloud.points);
    let stride = cloud.len().div_ceil(SPACING_SAMPLE_CAP).max(1);
    let k_query = k.min(cloud.len() - 1);

    let mut total = 0.0;
    let mut count = 0usize;
    for point in cloud.points.iter().step_by(stride) {
        let p = point.position;
        let neighbors = tree.nearest_n::<SquaredEuclidean>(&[p.x, p.y, p.z], k_query + 1);
        // First hit is the query point itself.
        for neighbor in neighbors.iter().skip(1) {
            total += neighbor.distance.sqrt();
            count += 1;
        }
    }

    if count == 0 {
        return Err(ReconError::NormalEstimationFailed {
            reason: "no neighbor distances collected".to_string(),
        });
    }

    #[allow(clippy::cast_precision_loss)]
    Ok(total / count as f64)
}

/// PCA normal for a single point.
fn pca_normal(
    point: &Point3<f64>,
    tree: &KdTree<f64, 3>,
    points: &[CloudPoint],
    k: usize,
) -> Vector3<f64> {
    let neighbors = tree.nearest_n::<SquaredEuclidean>(&[point.x, point.y, point.z], k);
    if neighbors.len() < 3 {
        return Vector3::z();
    }

    let positions: Vec<Point3<f64>> = neighbors
        .iter()
        .map(|n| points[n.item as usize].position)
        .collect();

    let centroid: Vector3<f64> = positions.iter().map(|p| p.coords).sum();
    #[allow(clippy::cast_precision_loss)]
    let centroid = centroid / positions.len() as f64;

    let mut cov = Matrix3::zeros();
    for p in &positions {
        let d = p.coords - centroid;
        cov += d * d.transpose();
    }

    let eigen = SymmetricEigen::new(cov);
    let mut min_idx = 0;
    for i in 1..3 {
        if eigen.eigenvalues[i] < eigen.eigenvalues[min_idx] {
            min_idx = i;
        }
    }

    let normal = eigen.eigenvectors.column(min_idx).into_owned();
    let len = normal.norm();
    if len > 1e-10 { normal / len } else { Vector3::z() }
}
