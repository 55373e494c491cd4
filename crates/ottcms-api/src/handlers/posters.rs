//! Poster project handlers, including the frame-extraction callback.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use ottcms_models::{FramesCallback, Paginated, PosterProject, PosterProjectId, Prompt};

use crate::auth::{AdminUser, WebhookCaller};
use crate::error::ApiResult;
use crate::handlers::{path_id, ListQuery};
use crate::services::poster::{
    CreateProjectRequest, CreatePromptRequest, ExtractFramesRequest, GeneratePosterRequest, JobAccepted,
    UpdateProjectRequest,
};
use crate::state::AppState;

fn project_id(raw: String) -> ApiResult<PosterProjectId> {
    path_id("poster project", raw)
}

pub async fn create_project(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<CreateProjectRequest>,
) -> ApiResult<(StatusCode, Json<PosterProject>)> {
    Ok((StatusCode::CREATED, Json(state.posters.create_project(request).await?)))
}

pub async fn list_projects(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Paginated<PosterProject>>> {
    Ok(Json(state.posters.list_projects(&query.params()).await?))
}

pub async fn get_project(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<PosterProject>> {
    Ok(Json(state.posters.get_project(&project_id(id)?).await?))
}

pub async fn update_project(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(request): Json<UpdateProjectRequest>,
) -> ApiResult<Json<PosterProject>> {
    Ok(Json(state.posters.update_project(&project_id(id)?, request).await?))
}

pub async fn delete_project(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.posters.delete_project(&project_id(id)?).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/poster-projects/:project_id/frames/extract
pub async fn extract_frames(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    request: Option<Json<ExtractFramesRequest>>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let accepted = state.posters.extract_frames(&project_id(id)?, request).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

/// POST /hooks/poster-projects/:project_id/frames
pub async fn frames_callback(
    State(state): State<AppState>,
    _caller: WebhookCaller,
    Path(id): Path<String>,
    Json(callback): Json<FramesCallback>,
) -> ApiResult<Json<PosterProject>> {
    Ok(Json(state.posters.frames_callback(&project_id(id)?, callback).await?))
}

pub async fn create_prompt(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(request): Json<CreatePromptRequest>,
) -> ApiResult<(StatusCode, Json<Prompt>)> {
    let prompt = state.posters.create_prompt(&project_id(id)?, request).await?;
    Ok((StatusCode::CREATED, Json(prompt)))
}

pub async fn list_prompts(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Vec<Prompt>>> {
    Ok(Json(state.posters.list_prompts(&project_id(id)?).await?))
}

/// POST /api/poster-projects/:project_id/posters/generate
pub async fn generate_poster(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(request): Json<GeneratePosterRequest>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let accepted = state.posters.generate_poster(&project_id(id)?, request).await?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}
