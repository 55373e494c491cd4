//! Google Drive handlers.

use axum::extract::State;
use axum::Json;

use crate::auth::AdminUser;
use crate::error::ApiResult;
use crate::metrics;
use crate::services::drive::{ImportRequest, ImportResponse, ResolveRequest, ResolveResponse};
use crate::state::AppState;

/// POST /api/drive/resolve
pub async fn resolve_drive_links(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<ResolveRequest>,
) -> ApiResult<Json<ResolveResponse>> {
    let files = state.drive.resolve(&request.links).await?;
    Ok(Json(ResolveResponse { files }))
}

/// POST /api/drive/import
pub async fn import_drive_files(
    State(state): State<AppState>,
    admin: AdminUser,
    Json(request): Json<ImportRequest>,
) -> ApiResult<Json<ImportResponse>> {
    tracing::info!(operator = %admin.subject, links = request.links.len(), "Drive import requested");
    let response = state.drive.bulk_import(request).await?;
    metrics::record_drive_imports(response.completed, response.failed);
    Ok(Json(response))
}
