//! API routes.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, patch, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::content::{create_episode, create_show, get_episode, get_show, list_episodes, list_shows};
use crate::handlers::drive::{import_drive_files, resolve_drive_links};
use crate::handlers::monetization::{
    create_paywall, create_plan, deactivate_paywall, deactivate_plan, get_paywall, get_plan, list_paywalls,
    list_plans, publish_paywall, publish_plan, set_plan_visibility, update_paywall, update_plan,
};
use crate::handlers::posters::{
    create_project, create_prompt, delete_project, extract_frames, frames_callback, generate_poster, get_project,
    list_projects, list_prompts, update_project,
};
use crate::handlers::transcoding::{bulk_transcoding, dispatch_transcoding, transcoding_status};
use crate::handlers::uploads::{complete_upload, create_upload, fail_upload, get_media, list_media, record_progress};
use crate::handlers::{health, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, rate_limit_middleware, request_id, request_logging, security_headers, RateLimiterCache};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let upload_routes = Router::new()
        .route("/uploads/multipart", post(create_upload))
        .route("/uploads/:media_id/progress", post(record_progress))
        .route("/uploads/:media_id/complete", post(complete_upload))
        .route("/uploads/:media_id/fail", post(fail_upload))
        .route("/media", get(list_media))
        .route("/media/:media_id", get(get_media))
        .route("/drive/resolve", post(resolve_drive_links))
        .route("/drive/import", post(import_drive_files));

    let transcoding_routes = Router::new()
        .route("/transcoding/bulk", post(bulk_transcoding))
        .route("/transcoding/:media_id", post(dispatch_transcoding))
        .route("/transcoding/:media_id/status", get(transcoding_status));

    let content_routes = Router::new()
        .route("/shows", get(list_shows).post(create_show))
        .route("/shows/:show_id", get(get_show))
        .route("/shows/:show_id/episodes", get(list_episodes).post(create_episode))
        .route("/shows/:show_id/episodes/:episode_id", get(get_episode));

    let monetization_routes = Router::new()
        .route("/plans", get(list_plans).post(create_plan))
        .route("/plans/:plan_id", get(get_plan).patch(update_plan))
        .route("/plans/:plan_id/visibility", patch(set_plan_visibility))
        .route("/plans/:plan_id/publish", post(publish_plan))
        .route("/plans/:plan_id/deactivate", post(deactivate_plan))
        .route("/paywalls", get(list_paywalls).post(create_paywall))
        .route("/paywalls/:paywall_id", get(get_paywall).patch(update_paywall))
        .route("/paywalls/:paywall_id/publish", post(publish_paywall))
        .route("/paywalls/:paywall_id/deactivate", post(deactivate_paywall));

    let poster_routes = Router::new()
        .route("/poster-projects", get(list_projects).post(create_project))
        .route(
            "/poster-projects/:project_id",
            get(get_project).patch(update_project).delete(delete_project),
        )
        .route("/poster-projects/:project_id/frames/extract", post(extract_frames))
        .route("/poster-projects/:project_id/prompts", get(list_prompts).post(create_prompt))
        .route("/poster-projects/:project_id/posters/generate", post(generate_poster));

    let rate_limiter = Arc::new(RateLimiterCache::new(
        state.config.rate_limit_rps,
        state.config.rate_limit_burst,
    ));

    let api_routes = Router::new()
        .merge(upload_routes)
        .merge(transcoding_routes)
        .merge(content_routes)
        .merge(monetization_routes)
        .merge(poster_routes)
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

    // Authenticated by the shared webhook secret, not an admin token.
    let hook_routes = Router::new().route("/hooks/poster-projects/:project_id/frames", post(frames_callback));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = match metrics_handle {
        Some(handle) => Router::new().route("/metrics", get(move || async move { handle.render() })),
        None => Router::new(),
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(hook_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
