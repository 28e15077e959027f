use std::sync::Arc;
use std::time::Instant;

use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use base64::Engine as _;
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use glyphcrop_core::{GlyphError, SourceImage};
use glyphcrop_pipeline::report::{BucketSummary, ImageSummary};
use glyphcrop_pipeline::{BatchOutput, Bundle, GlyphPipeline};

/// Upload limit for one request, all images together.
const MAX_UPLOAD_BYTES: usize = 256 * 1024 * 1024;

/// Shared application state.
pub struct AppState {
    /// Held for the whole batch, so batches never overlap.
    pub pipeline: Mutex<GlyphPipeline>,
    pub metrics: PrometheusHandle,
    pub start_time: Instant,
}

/// One image of a JSON upload.
#[derive(Deserialize)]
pub struct JsonImage {
    pub name: String,
    /// Base64-encoded image file.
    pub data: String,
}

/// POST /crops/json request body.
#[derive(Deserialize)]
pub struct CropJsonRequest {
    pub images: Vec<JsonImage>,
}

/// POST /crops/json response.
#[derive(Serialize)]
pub struct CropJsonResponse {
    pub glyphs: usize,
    pub images: Vec<ImageSummary>,
    pub labels: Vec<BucketSummary>,
}

/// GET /health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: f64,
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/crops/by-image", post(crops_by_image))
        .route("/crops/by-label", post(crops_by_label))
        .route("/crops/json", post(crops_json))
        .route("/health", get(health))
        .route("/metrics", get(render_metrics))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}

/// POST /crops/by-image: multipart upload, zip of the by-image bundle.
async fn crops_by_image(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    zip_response(state, multipart, Bundle::ByImage).await
}

/// POST /crops/by-label: multipart upload, zip of the by-label bundle.
async fn crops_by_label(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    zip_response(state, multipart, Bundle::ByLabel).await
}

async fn zip_response(
    state: Arc<AppState>,
    multipart: Multipart,
    bundle: Bundle,
) -> Result<Response, ApiError> {
    let sources = read_uploads(multipart).await?;
    let zipped = run_blocking(state, sources, move |pipeline, output| {
        pipeline.reports().zip_bundle(bundle, output)
    })
    .await?;

    let disposition = format!("attachment; filename=\"{}.zip\"", bundle.name());
    Ok((
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        zipped,
    )
        .into_response())
}

/// POST /crops/json: base64 images in, summaries out.
async fn crops_json(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CropJsonRequest>,
) -> Result<Json<CropJsonResponse>, ApiError> {
    let sources = req
        .images
        .into_iter()
        .map(|img| {
            base64::engine::general_purpose::STANDARD
                .decode(&img.data)
                .map(|data| SourceImage::new(img.name.clone(), data))
                .map_err(|e| bad_request(format!("invalid base64 in '{}': {e}", img.name)))
        })
        .collect::<Result<Vec<_>, _>>()?;
    if sources.is_empty() {
        return Err(bad_request("no images given".into()));
    }

    let response = run_blocking(state, sources, |pipeline, output| {
        let reports = pipeline.reports();
        Ok(CropJsonResponse {
            glyphs: output.glyph_count(),
            images: output.images.iter().map(|g| reports.image_summary(g)).collect(),
            labels: output.buckets.iter().map(|b| reports.label_summary(b)).collect(),
        })
    })
    .await?;
    Ok(Json(response))
}

/// Every file field of the form becomes one source image, in upload order.
async fn read_uploads(mut multipart: Multipart) -> Result<Vec<SourceImage>, ApiError> {
    let mut sources = Vec::new();
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("multipart error: {e}")))?
    {
        let Some(name) = field.file_name().map(str::to_string) else {
            continue;
        };
        let data = field
            .bytes()
            .await
            .map_err(|e| bad_request(format!("file read error: {e}")))?;
        sources.push(SourceImage::new(name, data.to_vec()));
    }
    if sources.is_empty() {
        return Err(bad_request("no image files in upload".into()));
    }
    Ok(sources)
}

/// Run one batch on a blocking thread and render its output there.
async fn run_blocking<T, F>(
    state: Arc<AppState>,
    sources: Vec<SourceImage>,
    render: F,
) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&GlyphPipeline, &BatchOutput) -> glyphcrop_core::Result<T> + Send + 'static,
{
    let images = sources.len();
    let joined = tokio::task::spawn_blocking(move || {
        let pipeline = state.pipeline.lock();
        let start = Instant::now();
        let output = pipeline.run_tesseract(&sources)?;
        metrics::histogram!("glyphcrop_batch_ms").record(start.elapsed().as_secs_f64() * 1000.0);
        metrics::counter!("glyphcrop_glyphs_total").increment(output.glyph_count() as u64);
        render(&pipeline, &output)
    })
    .await
    .map_err(|e| internal_error(format!("batch task failed: {e}")))?;

    metrics::counter!("glyphcrop_batches_total").increment(1);
    metrics::counter!("glyphcrop_images_total").increment(images as u64);
    joined.map_err(pipeline_error)
}

/// GET /health: liveness check.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs_f64(),
    })
}

/// GET /metrics: Prometheus text format.
async fn render_metrics(State(state): State<Arc<AppState>>) -> String {
    state.metrics.render()
}

fn pipeline_error(e: GlyphError) -> ApiError {
    metrics::counter!("glyphcrop_batch_failures_total").increment(1);
    let status = match &e {
        GlyphError::EngineUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        GlyphError::ImageDecode(_) | GlyphError::InvalidInput(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::error!(error = %e, status = status.as_u16(), "batch failed");
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

fn bad_request(msg: String) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse { error: msg }))
}

fn internal_error(msg: String) -> ApiError {
    tracing::error!(error = %msg, "internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse { error: msg }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_errors_map_to_service_unavailable() {
        let (status, _) = pipeline_error(GlyphError::EngineUnavailable("gone".into()));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        let (status, _) = pipeline_error(GlyphError::ImageDecode("bad".into()));
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        let (status, body) = pipeline_error(GlyphError::Recognition {
            source_image: "a.png".into(),
            message: "crash".into(),
        });
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body.0.error.contains("a.png"));
    }

    #[test]
    fn json_request_shape() {
        let req: CropJsonRequest =
            serde_json::from_str(r#"{"images":[{"name":"p.png","data":"aGk="}]}"#).unwrap();
        assert_eq!(req.images.len(), 1);
        assert_eq!(req.images[0].name, "p.png");
    }
}
