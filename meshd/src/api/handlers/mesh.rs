//! Reconstruction endpoints: `/mesh` and `/mesh/stats`.

use std::time::Instant;

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, header},
    response::{IntoResponse, Response},
};
use recon::{AlphaShapeParams, BallPivotingParams, MeshFormat, PointCloud, TriangleMesh};
use uuid::Uuid;

use crate::AppState;
use crate::api::extract::Query;
use crate::api::models::{CloudStats, MeshQuery, PointsPayload};
use crate::config::Engine;
use crate::errors::{Error, Result};

/// Ball pivoting needs a seed triangle plus one pivot target.
const MIN_POINTS: usize = 4;

#[utoipa::path(
    post,
    path = "/mesh",
    tag = "mesh",
    summary = "Reconstruct a mesh",
    description = "Reconstructs a triangle mesh from a point cloud. Send either \
a JSON body with a `points` array or a raw PLY file (any non-JSON content type). \
The encoded mesh is returned as a file attachment.",
    params(MeshQuery),
    request_body(
        content = PointsPayload,
        description = "Point cloud as JSON, or raw PLY bytes with a non-JSON content type"
    ),
    responses(
        (status = 200, description = "Encoded mesh, with X-Num-Vertices, X-Num-Triangles and X-Processing-Time headers"),
        (status = 400, description = "Malformed input, unsupported format, or too few points"),
        (status = 500, description = "Reconstruction or storage failure")
    )
)]
pub async fn create_mesh(
    State(state): State<AppState>,
    Query(query): Query<MeshQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response> {
    let format: MeshFormat = query.format.parse().map_err(Error::from)?;
    let job_id = Uuid::new_v4();

    let (cloud, upload_ext) = parse_cloud(&headers, &query.input_format, &body)?;
    if cloud.len() < MIN_POINTS {
        return Err(Error::InvalidCloud {
            message: format!("need at least {MIN_POINTS} points, got {}", cloud.len()),
        });
    }

    state.store.write_upload(job_id, upload_ext, &body).await?;
    tracing::info!(
        job_id = %job_id,
        num_points = cloud.len(),
        engine = ?state.config.engine,
        output_format = %format,
        "Starting reconstruction"
    );

    let started = Instant::now();
    let engine = state.config.engine;
    let normal_k = state.config.normal_k;
    let query_for_task = query.clone();
    let reconstructed = tokio::task::spawn_blocking(move || reconstruct(cloud, engine, &query_for_task, normal_k)).await;

    // The upload has served its purpose whether or not reconstruction worked.
    state.store.remove_upload(job_id, upload_ext).await;

    let mesh = reconstructed.map_err(|e| Error::Internal(anyhow::anyhow!("reconstruction task panicked: {e}")))??;
    let elapsed = started.elapsed().as_secs_f64();

    let mut encoded = Vec::new();
    recon::io::write_mesh(&mut encoded, &mesh, format)?;
    let output_path = state.store.write_output(job_id, format.extension(), &encoded).await?;
    let body = state.store.read_output(job_id, format.extension()).await?;

    tracing::info!(
        job_id = %job_id,
        num_vertices = mesh.vertex_count(),
        num_triangles = mesh.face_count(),
        elapsed_secs = elapsed,
        output = %output_path.display(),
        "Reconstruction finished"
    );

    let filename = format!("mesh_{job_id}.{}", format.extension());
    let response_headers = [
        (header::CONTENT_TYPE.as_str(), format.content_type().to_string()),
        (header::CONTENT_DISPOSITION.as_str(), format!("attachment; filename=\"{filename}\"")),
        ("x-num-vertices", mesh.vertex_count().to_string()),
        ("x-num-triangles", mesh.face_count().to_string()),
        ("x-processing-time", format!("{elapsed:.3}")),
    ];

    Ok((response_headers, body).into_response())
}

#[utoipa::path(
    post,
    path = "/mesh/stats",
    tag = "mesh",
    summary = "Point cloud statistics",
    description = "Computes spacing statistics for a point cloud without reconstructing it. \
Accepts the same bodies as `/mesh`. The suggested radius is a reasonable starting \
ball radius for the pivoting engine.",
    params(MeshQuery),
    request_body(
        content = PointsPayload,
        description = "Point cloud as JSON, or raw PLY bytes with a non-JSON content type"
    ),
    responses(
        (status = 200, description = "Cloud statistics", body = CloudStats),
        (status = 400, description = "Malformed input or too few points"),
        (status = 500, description = "Internal error")
    )
)]
pub async fn cloud_stats(
    State(state): State<AppState>,
    Query(query): Query<MeshQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CloudStats>> {
    let (cloud, _) = parse_cloud(&headers, &query.input_format, &body)?;

    let normal_k = state.config.normal_k;
    let has_normals = cloud.has_normals();
    let has_colors = cloud.has_colors();
    let num_points = cloud.len();

    let avg_point_distance = tokio::task::spawn_blocking(move || recon::average_spacing(&cloud, normal_k))
        .await
        .map_err(|e| Error::Internal(anyhow::anyhow!("stats task panicked: {e}")))??;

    Ok(Json(CloudStats {
        num_points,
        avg_point_distance,
        suggested_radius: avg_point_distance * 1.5,
        has_normals,
        has_colors,
    }))
}

/// Decode the request body into a point cloud.
///
/// JSON bodies carry a `points` array; any other content type is raw bytes in
/// `input_format`. Returns the cloud together with the extension the upload
/// is persisted under.
fn parse_cloud(headers: &HeaderMap, input_format: &str, body: &Bytes) -> Result<(PointCloud, &'static str)> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.starts_with("application/json") {
        let payload: PointsPayload = serde_json::from_slice(body).map_err(|e| Error::BadRequest {
            message: format!("Invalid JSON body: {e}"),
        })?;
        return Ok((payload.into_cloud()?, "json"));
    }

    match input_format.to_ascii_lowercase().as_str() {
        "ply" => {
            let mut reader = body.as_ref();
            let cloud = recon::io::ply::read_cloud(&mut reader)?;
            if cloud.is_empty() {
                return Err(Error::InvalidCloud {
                    message: "point cloud is empty".to_string(),
                });
            }
            Ok((cloud, "ply"))
        }
        other => Err(Error::UnsupportedFormat {
            format: other.to_string(),
        }),
    }
}

/// Run the full reconstruction pipeline on a blocking thread.
fn reconstruct(mut cloud: PointCloud, engine: Engine, query: &MeshQuery, normal_k: usize) -> Result<TriangleMesh> {
    if !cloud.has_normals() {
        recon::normals::estimate_normals(&mut cloud, normal_k)?;
        recon::normals::orient_consistent(&mut cloud, normal_k)?;
    }

    let mut mesh = match engine {
        Engine::BallPivoting => {
            let radii = recon::estimate_radii(&cloud, normal_k, query.radius_multiplier(), query.num_radii)?;
            let result = recon::ball_pivoting(&cloud, &BallPivotingParams::new(radii))?;
            tracing::debug!(%result, "Ball pivoting completed");
            result.mesh
        }
        Engine::AlphaShape => recon::alpha_shape(&cloud, &AlphaShapeParams::new(query.alpha()))?,
    };

    mesh.cleanup();
    mesh.compute_vertex_normals();

    if mesh.is_empty() {
        return Err(Error::Reconstruction {
            message: "no triangles could be formed from the input cloud".to_string(),
        });
    }
    Ok(mesh)
}
