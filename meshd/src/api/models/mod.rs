//! Request and response types for the API.

use nalgebra::Point3;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use recon::{CloudPoint, PointCloud};

use crate::errors::{Error, Result};

/// A single point in a JSON upload. Colors are optional and may be given
/// either normalized (0.0 to 1.0) or as 8-bit values (0 to 255).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct JsonPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub r: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub g: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b: Option<f64>,
}

/// JSON body accepted by `/mesh` and `/mesh/stats`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PointsPayload {
    pub points: Vec<JsonPoint>,
}

impl PointsPayload {
    /// Convert the JSON points into a point cloud.
    ///
    /// Color components above 1.0 are taken as 8-bit values; components at or
    /// below 1.0 are taken as normalized and scaled to 8 bits. When only some
    /// points carry colors, uncolored points get mid-gray so the cloud stays
    /// uniformly colored.
    pub fn into_cloud(self) -> Result<PointCloud> {
        if self.points.is_empty() {
            return Err(Error::BadRequest {
                message: "points array is empty".to_string(),
            });
        }

        let any_colors = self.points.iter().any(|p| p.r.is_some() || p.g.is_some() || p.b.is_some());

        let mut cloud = PointCloud::new();
        for (i, p) in self.points.iter().enumerate() {
            if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
                return Err(Error::BadRequest {
                    message: format!("point {i} has a non-finite coordinate"),
                });
            }

            let mut point = CloudPoint::new(Point3::new(p.x, p.y, p.z));
            if any_colors {
                point = point.with_color(match (p.r, p.g, p.b) {
                    (Some(r), Some(g), Some(b)) => [color_component(r), color_component(g), color_component(b)],
                    _ => [128, 128, 128],
                });
            }
            cloud.points.push(point);
        }

        Ok(cloud)
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn color_component(value: f64) -> u8 {
    let scaled = if value > 1.0 { value } else { value * 255.0 };
    scaled.clamp(0.0, 255.0).round() as u8
}

/// Query parameters for `POST /mesh`.
#[derive(Debug, Clone, Serialize, Deserialize, IntoParams)]
#[serde(default)]
#[into_params(parameter_in = Query)]
pub struct MeshQuery {
    /// Scales the estimated ball radii (ball pivoting engine). Default 1.5.
    pub radius_multiplier: Option<f64>,
    /// How many increasing radii the ball pivoting engine tries.
    pub num_radii: usize,
    /// Circumradius threshold for the alpha shape engine. Default 0.05.
    pub alpha: Option<f64>,
    /// Output mesh format: `ply`, `obj` or `stl`.
    pub format: String,
    /// Format of a raw (non-JSON) request body. Only `ply` is supported.
    pub input_format: String,
}

impl Default for MeshQuery {
    fn default() -> Self {
        Self {
            radius_multiplier: None,
            num_radii: 2,
            alpha: None,
            format: "ply".to_string(),
            input_format: "ply".to_string(),
        }
    }
}

impl MeshQuery {
    pub fn radius_multiplier(&self) -> f64 {
        self.radius_multiplier.unwrap_or(1.5)
    }

    /// Effective alpha threshold. Clients tuned for the ball pivoting engine
    /// often only pass `radius_multiplier`; when `alpha` is absent it is
    /// derived from that so switching engines keeps their knob meaningful.
    pub fn alpha(&self) -> f64 {
        self.alpha
            .unwrap_or_else(|| self.radius_multiplier.map_or(0.05, |m| m * 0.03))
    }
}

/// Response body for `POST /mesh/stats`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CloudStats {
    /// Number of points in the cloud.
    pub num_points: usize,
    /// Mean distance between a point and its nearest neighbors.
    pub avg_point_distance: f64,
    /// Suggested pivoting ball radius derived from the spacing.
    pub suggested_radius: f64,
    /// Whether every point carries a normal.
    pub has_normals: bool,
    /// Whether every point carries a color.
    pub has_colors: bool,
}

/// Response body for `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plain(x: f64, y: f64, z: f64) -> JsonPoint {
        JsonPoint {
            x,
            y,
            z,
            r: None,
            g: None,
            b: None,
        }
    }

    #[test]
    fn uncolored_payload_yields_uncolored_cloud() {
        let payload = PointsPayload {
            points: vec![plain(0.0, 0.0, 0.0), plain(1.0, 0.0, 0.0)],
        };
        let cloud = payload.into_cloud().unwrap();
        assert_eq!(cloud.len(), 2);
        assert!(!cloud.has_colors());
        assert!(cloud.points.iter().all(|p| p.color.is_none()));
    }

    #[test]
    fn eight_bit_colors_pass_through() {
        let payload = PointsPayload {
            points: vec![JsonPoint {
                x: 0.0,
                y: 0.0,
                z: 0.0,
                r: Some(255.0),
                g: Some(10.0),
                b: Some(0.0),
            }],
        };
        let cloud = payload.into_cloud().unwrap();
        assert_eq!(cloud.points[0].color, Some([255, 10, 0]));
    }

    #[test]
    fn normalized_colors_are_scaled() {
        let payload = PointsPayload {
            points: vec![JsonPoint {
                x: 0.0,
                y: 0.0,
                z: 0.0,
                r: Some(1.0),
                g: Some(0.5),
                b: Some(0.0),
            }],
        };
        let cloud = payload.into_cloud().unwrap();
        assert_eq!(cloud.points[0].color, Some([255, 128, 0]));
    }

    #[test]
    fn partially_colored_cloud_fills_gray() {
        let payload = PointsPayload {
            points: vec![
                JsonPoint {
                    x: 0.0,
                    y: 0.0,
                    z: 0.0,
                    r: Some(200.0),
                    g: Some(200.0),
                    b: Some(200.0),
                },
                plain(1.0, 0.0, 0.0),
            ],
        };
        let cloud = payload.into_cloud().unwrap();
        assert_eq!(cloud.points[0].color, Some([200, 200, 200]));
        assert_eq!(cloud.points[1].color, Some([128, 128, 128]));
        assert!(cloud.has_colors());
    }

    #[test]
    fn empty_points_are_rejected() {
        let payload = PointsPayload { points: vec![] };
        assert!(matches!(payload.into_cloud(), Err(Error::BadRequest { .. })));
    }

    #[test]
    fn non_finite_coordinates_are_rejected() {
        let payload = PointsPayload {
            points: vec![plain(f64::NAN, 0.0, 0.0)],
        };
        assert!(matches!(payload.into_cloud(), Err(Error::BadRequest { .. })));
    }

    #[test]
    fn mesh_query_defaults() {
        let query: MeshQuery = serde_json::from_str("{}").unwrap();
        assert!((query.radius_multiplier() - 1.5).abs() < f64::EPSILON);
        assert_eq!(query.num_radii, 2);
        assert!((query.alpha() - 0.05).abs() < f64::EPSILON);
        assert_eq!(query.format, "ply");
        assert_eq!(query.input_format, "ply");
    }

    #[test]
    fn alpha_derives_from_radius_multiplier_when_absent() {
        let query = MeshQuery {
            radius_multiplier: Some(2.0),
            ..MeshQuery::default()
        };
        assert!((query.alpha() - 0.06).abs() < 1e-12);

        let query = MeshQuery {
            radius_multiplier: Some(2.0),
            alpha: Some(0.1),
            ..MeshQuery::default()
        };
        assert!((query.alpha() - 0.1).abs() < f64::EPSILON);
    }
}
