//! meshd: an HTTP service that reconstructs triangle meshes from 3-D point
//! clouds.
//!
//! Clients POST a point cloud (JSON points or a raw PLY file) to `/mesh` and
//! get back an encoded mesh (PLY, OBJ or STL). Reconstruction runs on the
//! [`recon`] library: ball pivoting by default, alpha shapes as the
//! configurable alternative. `/mesh/stats` reports spacing statistics that
//! help clients pick a pivoting radius.
//!
//! Module layout:
//! - [`api`]: handlers and request/response models
//! - [`config`]: YAML plus environment configuration
//! - [`errors`]: error-to-HTTP mapping
//! - [`openapi`]: OpenAPI document served through a Scalar UI at `/docs`
//! - [`store`]: on-disk upload and output management
//! - [`telemetry`]: tracing setup

pub mod api;
pub mod config;
pub mod errors;
pub mod openapi;
pub mod store;
pub mod telemetry;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, HeaderValue},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use config::Config;
use openapi::ApiDoc;
use store::JobStore;

/// Application state shared across request handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Config,
    pub store: JobStore,
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    // A literal "*" must go through AllowOrigin::any, not the origin list.
    let origin = if config.cors_allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &config.cors_allowed_origins {
            origins.push(origin.parse::<HeaderValue>()?);
        }
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new().allow_origin(origin).expose_headers(vec![
        HeaderName::from_static("x-num-vertices"),
        HeaderName::from_static("x-num-triangles"),
        HeaderName::from_static("x-processing-time"),
    ]))
}

/// Build the application router with all endpoints and middleware.
///
/// # Errors
///
/// Returns an error if a configured CORS origin is not a valid header value.
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let cors_layer = create_cors_layer(&state.config)?;
    let body_limit = state.config.max_body_size_bytes;

    let router = Router::new()
        .route("/health", get(api::handlers::health::health))
        .route("/healthz", get(|| async { "OK" }))
        .route("/mesh", post(api::handlers::mesh::create_mesh))
        .route("/mesh/stats", post(api::handlers::mesh::cloud_stats))
        .with_state(state)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()))
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors_layer)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        );

    Ok(router)
}

/// Main application struct that owns the router and lifecycle.
///
/// [`Application::new`] prepares the storage directories and builds the
/// router; [`Application::serve`] binds the listener and runs until the
/// shutdown future resolves.
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with storage directories prepared.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting meshd with configuration: {:#?}", config);

        let store = JobStore::new(config.uploads_dir.clone(), config.outputs_dir.clone());
        store.ensure_dirs().await?;

        let state = AppState {
            config: config.clone(),
            store,
        };
        let router = build_router(state)?;

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "meshd listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router).with_graceful_shutdown(shutdown).await?;

        info!("Server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    async fn test_app(engine: config::Engine) -> (axum_test::TestServer, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            engine,
            uploads_dir: dir.path().join("uploads"),
            outputs_dir: dir.path().join("outputs"),
            normal_k: 8,
            ..Config::default()
        };
        let server = Application::new(config).await.unwrap().into_test_server();
        (server, dir)
    }

    fn grid_payload(n: i32) -> Value {
        let points: Vec<Value> = (0..n)
            .flat_map(|i| (0..n).map(move |j| json!({"x": f64::from(i), "y": f64::from(j), "z": 0.0})))
            .collect();
        json!({ "points": points })
    }

    #[tokio::test]
    async fn health_reports_version() {
        let (server, _dir) = test_app(config::Engine::BallPivoting).await;

        let response = server.get("/health").await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["service"], "meshd");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn healthz_is_plain_ok() {
        let (server, _dir) = test_app(config::Engine::BallPivoting).await;

        let response = server.get("/healthz").await;
        response.assert_status_ok();
        assert_eq!(response.text(), "OK");
    }

    #[tokio::test]
    async fn mesh_from_json_points_returns_ply_attachment() {
        let (server, dir) = test_app(config::Engine::BallPivoting).await;

        let response = server.post("/mesh").json(&grid_payload(6)).await;
        response.assert_status_ok();

        let headers = response.headers();
        let disposition = headers.get("content-disposition").unwrap().to_str().unwrap();
        assert!(disposition.starts_with("attachment; filename=\"mesh_"));
        assert!(disposition.ends_with(".ply\""));

        let vertices: usize = headers.get("x-num-vertices").unwrap().to_str().unwrap().parse().unwrap();
        let triangles: usize = headers.get("x-num-triangles").unwrap().to_str().unwrap().parse().unwrap();
        assert!(vertices > 0);
        assert!(triangles > 0);

        let seconds: f64 = headers.get("x-processing-time").unwrap().to_str().unwrap().parse().unwrap();
        assert!(seconds >= 0.0);

        let body = response.as_bytes();
        assert!(body.starts_with(b"ply"));

        // The upload is gone, the output mesh is kept.
        let uploads: Vec<_> = std::fs::read_dir(dir.path().join("uploads")).unwrap().collect();
        assert!(uploads.is_empty());
        let outputs: Vec<_> = std::fs::read_dir(dir.path().join("outputs")).unwrap().collect();
        assert_eq!(outputs.len(), 1);
    }

    #[tokio::test]
    async fn mesh_as_stl() {
        let (server, _dir) = test_app(config::Engine::BallPivoting).await;

        let response = server.post("/mesh").add_query_param("format", "stl").json(&grid_payload(6)).await;
        response.assert_status_ok();

        assert_eq!(response.headers().get("content-type").unwrap(), "model/stl");
        // 80-byte header plus 4-byte triangle count at minimum.
        assert!(response.as_bytes().len() > 84);
    }

    #[tokio::test]
    async fn mesh_from_raw_ply_body() {
        let (server, _dir) = test_app(config::Engine::BallPivoting).await;

        let mut cloud = recon::PointCloud::new();
        for i in 0..6 {
            for j in 0..6 {
                cloud.add_point(nalgebra::Point3::new(f64::from(i), f64::from(j), 0.0));
            }
        }
        let mut encoded = Vec::new();
        recon::io::ply::write_cloud(&mut encoded, &cloud).unwrap();

        let response = server
            .post("/mesh")
            .content_type("application/octet-stream")
            .bytes(encoded.into())
            .await;
        response.assert_status_ok();
        assert!(response.as_bytes().starts_with(b"ply"));
    }

    #[tokio::test]
    async fn alpha_shape_engine_also_serves_mesh() {
        let (server, _dir) = test_app(config::Engine::AlphaShape).await;

        let response = server.post("/mesh").add_query_param("alpha", "2.0").json(&grid_payload(5)).await;
        response.assert_status_ok();

        let triangles: usize = response
            .headers()
            .get("x-num-triangles")
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        assert!(triangles > 0);
    }

    #[tokio::test]
    async fn too_few_points_is_a_400() {
        let (server, _dir) = test_app(config::Engine::BallPivoting).await;

        let payload = json!({"points": [
            {"x": 0.0, "y": 0.0, "z": 0.0},
            {"x": 1.0, "y": 0.0, "z": 0.0},
            {"x": 0.0, "y": 1.0, "z": 0.0},
        ]});
        let response = server.post("/mesh").json(&payload).await;
        response.assert_status_bad_request();

        let body: Value = response.json();
        assert_eq!(body["type"], "invalid_point_cloud");
        assert!(body["error"].as_str().unwrap().contains("at least 4"));
    }

    #[tokio::test]
    async fn unknown_output_format_is_a_400() {
        let (server, _dir) = test_app(config::Engine::BallPivoting).await;

        let response = server.post("/mesh").add_query_param("format", "gltf").json(&grid_payload(6)).await;
        response.assert_status_bad_request();

        let body: Value = response.json();
        assert_eq!(body["type"], "unsupported_format");
    }

    #[tokio::test]
    async fn malformed_json_is_a_400() {
        let (server, _dir) = test_app(config::Engine::BallPivoting).await;

        let response = server
            .post("/mesh")
            .bytes("{\"points\": [".into())
            .content_type("application/json")
            .await;
        response.assert_status_bad_request();

        let body: Value = response.json();
        assert_eq!(body["type"], "bad_request");
    }

    #[tokio::test]
    async fn malformed_query_value_is_a_json_400() {
        let (server, _dir) = test_app(config::Engine::BallPivoting).await;

        let response = server
            .post("/mesh")
            .add_query_param("num_radii", "abc")
            .json(&grid_payload(6))
            .await;
        response.assert_status_bad_request();

        let body: Value = response.json();
        assert_eq!(body["type"], "bad_request");
        assert!(body["error"].as_str().unwrap().contains("query"));
    }

    #[tokio::test]
    async fn stats_describe_the_cloud() {
        let (server, _dir) = test_app(config::Engine::BallPivoting).await;

        let response = server.post("/mesh/stats").json(&grid_payload(5)).await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["num_points"], 25);
        assert_eq!(body["has_normals"], false);
        assert_eq!(body["has_colors"], false);

        // Unit grid: nearest neighbors are one unit away.
        let avg = body["avg_point_distance"].as_f64().unwrap();
        assert!(avg > 0.9 && avg < 1.5);
        let suggested = body["suggested_radius"].as_f64().unwrap();
        assert!((suggested - avg * 1.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn docs_ui_is_served() {
        let (server, _dir) = test_app(config::Engine::BallPivoting).await;

        let response = server.get("/docs").await;
        response.assert_status_ok();
    }
}
