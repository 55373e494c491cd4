//! Transcoding handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;

use ottcms_models::{DomainError, MediaId};

use crate::auth::AdminUser;
use crate::error::ApiResult;
use crate::handlers::path_id;
use crate::metrics;
use crate::services::transcoding::{BulkDispatchItem, BulkDispatchResult, DispatchRequest, DispatchResponse};
use crate::state::AppState;

pub const MAX_BULK_ITEMS: usize = 100;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkDispatchRequest {
    pub items: Vec<BulkDispatchItem>,
}

/// POST /api/transcoding/:media_id
pub async fn dispatch_transcoding(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(media_id): Path<String>,
    request: Option<Json<DispatchRequest>>,
) -> ApiResult<(StatusCode, Json<DispatchResponse>)> {
    let media_id: MediaId = path_id("media", media_id)?;
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let result = state.transcoding.dispatch(&media_id, request).await;
    metrics::record_transcode_dispatch(result.is_ok());
    Ok((StatusCode::ACCEPTED, Json(result?)))
}

/// GET /api/transcoding/:media_id/status
pub async fn transcoding_status(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(media_id): Path<String>,
) -> ApiResult<Json<DispatchResponse>> {
    let media_id: MediaId = path_id("media", media_id)?;
    Ok(Json(state.transcoding.refresh_status(&media_id).await?))
}

/// POST /api/transcoding/bulk
pub async fn bulk_transcoding(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<BulkDispatchRequest>,
) -> ApiResult<Json<Vec<BulkDispatchResult>>> {
    if request.items.is_empty() || request.items.len() > MAX_BULK_ITEMS {
        return Err(DomainError::invalid_state(format!("bulk requests take 1 to {MAX_BULK_ITEMS} items")).into());
    }
    for item in &request.items {
        crate::security::check_id("media", item.media_id.as_str())?;
    }
    let results = state.transcoding.bulk_dispatch(request.items).await;
    for result in &results {
        metrics::record_transcode_dispatch(result.ok);
    }
    Ok(Json(results))
}
