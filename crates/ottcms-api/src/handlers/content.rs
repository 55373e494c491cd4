//! Show and episode handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use ottcms_models::{Episode, EpisodeId, Paginated, Show, ShowId};

use crate::auth::AdminUser;
use crate::error::ApiResult;
use crate::handlers::{path_id, ListQuery};
use crate::services::content::{CreateEpisodeRequest, CreateShowRequest};
use crate::state::AppState;

pub async fn create_show(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<CreateShowRequest>,
) -> ApiResult<(StatusCode, Json<Show>)> {
    Ok((StatusCode::CREATED, Json(state.content.create_show(request).await?)))
}

pub async fn list_shows(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Paginated<Show>>> {
    Ok(Json(state.content.list_shows(&query.params()).await?))
}

pub async fn get_show(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(show_id): Path<String>,
) -> ApiResult<Json<Show>> {
    let show_id: ShowId = path_id("show", show_id)?;
    Ok(Json(state.content.get_show(&show_id).await?))
}

pub async fn create_episode(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(show_id): Path<String>,
    Json(request): Json<CreateEpisodeRequest>,
) -> ApiResult<(StatusCode, Json<Episode>)> {
    let show_id: ShowId = path_id("show", show_id)?;
    let episode = state.content.create_episode(&show_id, request).await?;
    Ok((StatusCode::CREATED, Json(episode)))
}

pub async fn list_episodes(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(show_id): Path<String>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Paginated<Episode>>> {
    let show_id: ShowId = path_id("show", show_id)?;
    Ok(Json(state.content.list_episodes(&show_id, &query.params()).await?))
}

pub async fn get_episode(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path((show_id, episode_id)): Path<(String, String)>,
) -> ApiResult<Json<Episode>> {
    let show_id: ShowId = path_id("show", show_id)?;
    let episode_id: EpisodeId = path_id("episode", episode_id)?;
    Ok(Json(state.content.get_episode(&show_id, &episode_id).await?))
}
