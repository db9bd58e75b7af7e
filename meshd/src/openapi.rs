//! OpenAPI documentation for the reconstruction API.

use utoipa::OpenApi;

use crate::api::{handlers, models};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "meshd",
        description = "Surface reconstruction service: turns 3-D point clouds into triangle meshes.",
        version = env!("CARGO_PKG_VERSION"),
    ),
    paths(
        handlers::health::health,
        handlers::mesh::create_mesh,
        handlers::mesh::cloud_stats,
    ),
    components(schemas(
        models::HealthResponse,
        models::PointsPayload,
        models::JsonPoint,
        models::CloudStats,
    )),
    tags(
        (name = "health", description = "Service liveness"),
        (name = "mesh", description = "Point cloud reconstruction and statistics"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_covers_all_routes() {
        let spec = ApiDoc::openapi();
        let paths: Vec<&str> = spec.paths.paths.keys().map(String::as_str).collect();
        assert!(paths.contains(&"/health"));
        assert!(paths.contains(&"/mesh"));
        assert!(paths.contains(&"/mesh/stats"));
    }
}
