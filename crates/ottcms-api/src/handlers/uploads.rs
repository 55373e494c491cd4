//! Upload and raw media handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use ottcms_models::{CompletedPart, MediaId, Paginated, RawMedia};

use crate::auth::AdminUser;
use crate::error::ApiResult;
use crate::handlers::{path_id, ListQuery};
use crate::metrics;
use crate::services::upload::{CreateUploadRequest, CreateUploadResponse, ProgressResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRequest {
    pub progress: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    pub parts: Vec<CompletedPart>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailUploadRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// POST /api/uploads/multipart
pub async fn create_upload(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<CreateUploadRequest>,
) -> ApiResult<(StatusCode, Json<CreateUploadResponse>)> {
    let response = state.uploads.create_multipart_upload(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /api/uploads/:media_id/progress
pub async fn record_progress(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(media_id): Path<String>,
    Json(request): Json<ProgressRequest>,
) -> ApiResult<Json<ProgressResponse>> {
    let media_id: MediaId = path_id("media", media_id)?;
    Ok(Json(state.uploads.record_progress(&media_id, request.progress).await?))
}

/// POST /api/uploads/:media_id/complete
pub async fn complete_upload(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(media_id): Path<String>,
    Json(request): Json<CompleteUploadRequest>,
) -> ApiResult<Json<RawMedia>> {
    let media_id: MediaId = path_id("media", media_id)?;
    let result = state.uploads.complete_upload(&media_id, request.parts).await;
    if result.is_ok() {
        metrics::record_upload("completed");
    }
    Ok(Json(result?))
}

/// POST /api/uploads/:media_id/fail
pub async fn fail_upload(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(media_id): Path<String>,
    request: Option<Json<FailUploadRequest>>,
) -> ApiResult<Json<RawMedia>> {
    let media_id: MediaId = path_id("media", media_id)?;
    let reason = request.and_then(|Json(r)| r.reason);
    let media = state.uploads.fail_upload(&media_id, reason).await?;
    metrics::record_upload("failed");
    Ok(Json(media))
}

/// GET /api/media
pub async fn list_media(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Paginated<RawMedia>>> {
    Ok(Json(state.uploads.list_media(query.status(), &query.params()).await?))
}

/// GET /api/media/:media_id
pub async fn get_media(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(media_id): Path<String>,
) -> ApiResult<Json<RawMedia>> {
    let media_id: MediaId = path_id("media", media_id)?;
    Ok(Json(state.uploads.get_media(&media_id).await?))
}
