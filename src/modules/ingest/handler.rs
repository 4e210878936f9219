use super::dto::{UploadVideoRequest, UploadVideoResponse};
use super::service::IngestService;
use crate::common::response::{ApiError, ApiSuccess, ErrorBody};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::error;

/// Upload an episode video
/// Runs the full transcode pipeline and commits the catalog before replying.
#[utoipa::path(
    post,
    path = "/api/v1/videos/upload",
    request_body = UploadVideoRequest,
    responses(
        (status = 200, description = "Pipeline completed and catalog committed", body = UploadVideoResponse),
        (status = 400, description = "Missing or malformed fields", body = ErrorBody),
        (status = 401, description = "Missing or invalid credential", body = ErrorBody),
        (status = 403, description = "Admin access required", body = ErrorBody),
        (status = 500, description = "Pipeline or commit failure", body = ErrorBody)
    ),
    tag = "Ingest",
    security(("bearer_auth" = []))
)]
pub async fn upload_video(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    match IngestService::upload(state, payload).await {
        Ok(res) => ApiSuccess(res, StatusCode::OK).into_response(),
        Err(e) => {
            // Full cause chain is operator-facing only.
            error!("Video upload failed: {:?}", e);
            ApiError::from(e).into_response()
        }
    }
}
