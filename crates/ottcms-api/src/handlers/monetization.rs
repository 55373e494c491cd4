//! Plan and paywall handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use ottcms_models::{Paginated, Paywall, PaywallId, Plan, PlanId, PlanTerms};

use crate::auth::AdminUser;
use crate::error::ApiResult;
use crate::handlers::{path_id, ListQuery};
use crate::services::monetization::{
    CreatePaywallRequest, PublishPaywallResponse, UpdatePaywallRequest, VisibilityRequest, VisibilityResponse,
};
use crate::state::AppState;

pub async fn create_plan(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(terms): Json<PlanTerms>,
) -> ApiResult<(StatusCode, Json<Plan>)> {
    Ok((StatusCode::CREATED, Json(state.monetization.create_plan(terms).await?)))
}

pub async fn list_plans(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Paginated<Plan>>> {
    Ok(Json(state.monetization.list_plans(query.status(), &query.params()).await?))
}

pub async fn get_plan(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(plan_id): Path<String>,
) -> ApiResult<Json<Plan>> {
    let plan_id: PlanId = path_id("plan", plan_id)?;
    Ok(Json(state.monetization.get_plan(&plan_id).await?))
}

pub async fn update_plan(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(plan_id): Path<String>,
    Json(terms): Json<PlanTerms>,
) -> ApiResult<Json<Plan>> {
    let plan_id: PlanId = path_id("plan", plan_id)?;
    Ok(Json(state.monetization.update_plan(&plan_id, terms).await?))
}

pub async fn set_plan_visibility(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(plan_id): Path<String>,
    Json(request): Json<VisibilityRequest>,
) -> ApiResult<Json<VisibilityResponse>> {
    let plan_id: PlanId = path_id("plan", plan_id)?;
    Ok(Json(state.monetization.set_visibility(&plan_id, request.is_visible).await?))
}

pub async fn publish_plan(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(plan_id): Path<String>,
) -> ApiResult<Json<Plan>> {
    let plan_id: PlanId = path_id("plan", plan_id)?;
    Ok(Json(state.monetization.publish_plan(&plan_id).await?))
}

pub async fn deactivate_plan(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(plan_id): Path<String>,
) -> ApiResult<Json<Plan>> {
    let plan_id: PlanId = path_id("plan", plan_id)?;
    Ok(Json(state.monetization.deactivate_plan(&plan_id).await?))
}

pub async fn create_paywall(
    State(state): State<AppState>,
    _admin: AdminUser,
    Json(request): Json<CreatePaywallRequest>,
) -> ApiResult<(StatusCode, Json<Paywall>)> {
    Ok((StatusCode::CREATED, Json(state.monetization.create_paywall(request).await?)))
}

pub async fn list_paywalls(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<ListQuery>,
) -> ApiResult<Json<Paginated<Paywall>>> {
    Ok(Json(state.monetization.list_paywalls(query.status(), &query.params()).await?))
}

pub async fn get_paywall(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(paywall_id): Path<String>,
) -> ApiResult<Json<Paywall>> {
    let paywall_id: PaywallId = path_id("paywall", paywall_id)?;
    Ok(Json(state.monetization.get_paywall(&paywall_id).await?))
}

pub async fn update_paywall(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(paywall_id): Path<String>,
    Json(request): Json<UpdatePaywallRequest>,
) -> ApiResult<Json<Paywall>> {
    let paywall_id: PaywallId = path_id("paywall", paywall_id)?;
    Ok(Json(state.monetization.update_paywall(&paywall_id, request).await?))
}

pub async fn publish_paywall(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(paywall_id): Path<String>,
) -> ApiResult<Json<PublishPaywallResponse>> {
    let paywall_id: PaywallId = path_id("paywall", paywall_id)?;
    Ok(Json(state.monetization.publish_paywall(&paywall_id).await?))
}

pub async fn deactivate_paywall(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(paywall_id): Path<String>,
) -> ApiResult<Json<Paywall>> {
    let paywall_id: PaywallId = path_id("paywall", paywall_id)?;
    Ok(Json(state.monetization.deactivate_paywall(&paywall_id).await?))
}
