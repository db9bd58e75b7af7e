//! Point cloud container types.

use nalgebra::{Point3, Vector3};

/// A single point with optional per-point attributes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloudPoint {
    /// Position in 3-D space.
    pub position: Point3<f64>,

    /// Unit surface normal, if known.
    pub normal: Option<Vector3<f64>>,

    /// RGB color, if known.
    pub color: Option<[u8; 3]>,
}

impl CloudPoint {
    /// Creates a point with no attributes.
    #[must_use]
    pub const fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            normal: None,
            color: None,
        }
    }

    /// Creates a point from raw coordinates.
    #[must_use]
    pub fn from_coords(x: f64, y: f64, z: f64) -> Self {
        Self::new(Point3::new(x, y, z))
    }

    /// Attaches a normal to the point.
    #[must_use]
    pub const fn with_normal(mut self, normal: Vector3<f64>) -> Self {
        self.normal = Some(normal);
        self
    }

    /// Attaches a color to the point.
    #[must_use]
    pub const fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = Some(color);
        self
    }
}

/// An unordered collection of points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PointCloud {
    /// The points in the cloud.
    pub points: Vec<CloudPoint>,
}

impl PointCloud {
    /// Creates an empty cloud.
    #[must_use]
    pub const fn new() -> Self {
        Self { points: Vec::new() }
    }

    /// Creates a cloud from bare positions.
    #[must_use]
    pub fn from_positions(positions: &[Point3<f64>]) -> Self {
        Self {
            points: positions.iter().map(|p| CloudPoint::new(*p)).collect(),
        }
    }

    /// Number of points in the cloud.
    #[must_use]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true when the cloud has no points.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Appends a bare point.
    pub fn add_point(&mut self, position: Point3<f64>) {
        self.points.push(CloudPoint::new(position));
    }

    /// Appends a point carrying a normal.
    pub fn add_point_with_normal(&mut self, position: Point3<f64>, normal: Vector3<f64>) {
        self.points.push(CloudPoint::new(position).with_normal(normal));
    }

    /// Returns true when every point carries a normal (and the cloud is non-empty).
    #[must_use]
    pub fn has_normals(&self) -> bool {
        !self.points.is_empty() && self.points.iter().all(|p| p.normal.is_some())
    }

    /// Returns true when every point carries a color (and the cloud is non-empty).
    #[must_use]
    pub fn has_colors(&self) -> bool {
        !self.points.is_empty() && self.points.iter().all(|p| p.color.is_some())
    }

    /// Returns true when any point carries a color.
    #[must_use]
    pub fn any_colors(&self) -> bool {
        self.points.iter().any(|p| p.color.is_some())
    }

    /// Centroid of the cloud, or `None` when empty.
    #[must_use]
    pub fn centroid(&self) -> Option<Point3<f64>> {
        if self.points.is_empty() {
            return None;
        }

        let sum: Vector3<f64> = self.points.iter().map(|p| p.position.coords).sum();
        #[allow(clippy::cast_precision_loss)]
        let centroid = sum / self.points.len() as f64;
        Some(Point3::from(centroid))
    }
}

impl FromIterator<CloudPoint> for PointCloud {
    fn from_iter<I: IntoIterator<Item = CloudPoint>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_cloud() {
        let cloud = PointCloud::new();
        assert!(cloud.is_empty());
        assert_eq!(cloud.len(), 0);
        assert!(cloud.centroid().is_none());
        assert!(!cloud.has_normals());
        assert!(!cloud.has_colors());
    }

    #[test]
    fn from_positions_has_no_attributes() {
        let cloud = PointCloud::from_positions(&[
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ]);
        assert_eq!(cloud.len(), 2);
        assert!(!cloud.has_normals());
        assert!(!cloud.has_colors());
    }

    #[test]
    fn centroid_of_unit_square() {
        let cloud = PointCloud::from_positions(&[
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]);
        let c = cloud.centroid().unwrap();
        assert_relative_eq!(c.x, 0.5);
        assert_relative_eq!(c.y, 0.5);
        assert_relative_eq!(c.z, 0.0);
    }

    #[test]
    fn has_normals_requires_all_points() {
        let mut cloud = PointCloud::new();
        cloud.add_point_with_normal(Point3::origin(), Vector3::z());
        assert!(cloud.has_normals());

        cloud.add_point(Point3::new(1.0, 0.0, 0.0));
        assert!(!cloud.has_normals());
    }

    #[test]
    fn any_colors_vs_has_colors() {
        let mut cloud = PointCloud::new();
        cloud.points.push(CloudPoint::from_coords(0.0, 0.0, 0.0).with_color([255, 0, 0]));
        cloud.points.push(CloudPoint::from_coords(1.0, 0.0, 0.0));

        assert!(cloud.any_colors());
        assert!(!cloud.has_colors());
    }

    #[test]
    fn from_iterator() {
        let cloud: PointCloud = (0..5)
            .map(|i| CloudPoint::from_coords(f64::from(i), 0.0, 0.0))
            .collect();
        assert_eq!(cloud.len(), 5);
    }
}
