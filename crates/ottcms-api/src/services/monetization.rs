//! Plans and paywalls.

use serde::{Deserialize, Serialize};
use tracing::info;

use ottcms_firestore::{PaywallRepository, PlanRepository};
use ottcms_models::{
    DomainError, PageParams, Paginated, Paywall, PaywallContent, PaywallId, Plan, PlanId, PlanTerms,
    PublishStatus,
};

use crate::error::ApiResult;
use crate::services::found;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityRequest {
    pub is_visible: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibilityResponse {
    pub changed: bool,
    pub plan: Plan,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePaywallRequest {
    pub name: String,
    pub plan_id: PlanId,
    #[serde(default)]
    pub content: PaywallContent,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePaywallRequest {
    pub name: Option<String>,
    pub plan_id: Option<PlanId>,
    pub content: Option<PaywallContent>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishPaywallResponse {
    pub paywall: Paywall,
    pub plan: Plan,
}

fn parse_status(status: Option<&str>) -> ApiResult<Option<PublishStatus>> {
    match status {
        Some(s) => PublishStatus::parse(s)
            .map(Some)
            .ok_or_else(|| DomainError::invalid_state(format!("unknown status {s}")).into()),
        None => Ok(None),
    }
}

#[derive(Clone)]
pub struct MonetizationService {
    plans: PlanRepository,
    paywalls: PaywallRepository,
}

impl MonetizationService {
    pub fn new(plans: PlanRepository, paywalls: PaywallRepository) -> Self {
        Self { plans, paywalls }
    }

    pub async fn create_plan(&self, terms: PlanTerms) -> ApiResult<Plan> {
        let plan = Plan::create(terms)?;
        self.plans.create(&plan).await?;
        info!(plan_id = %plan.id, "Created plan");
        Ok(plan)
    }

    pub async fn get_plan(&self, plan_id: &PlanId) -> ApiResult<Plan> {
        found(self.plans.get(plan_id).await?, "plan", plan_id)
    }

    pub async fn list_plans(&self, status: Option<&str>, params: &PageParams) -> ApiResult<Paginated<Plan>> {
        Ok(self.plans.list(parse_status(status)?, params).await?)
    }

    /// Edit a draft or inactive plan; the result is re-validated.
    pub async fn update_plan(&self, plan_id: &PlanId, terms: PlanTerms) -> ApiResult<Plan> {
        let mut plan = self.get_plan(plan_id).await?;
        plan.apply(terms)?;
        self.plans.save(&plan).await?;
        Ok(plan)
    }

    /// Idempotent: an unchanged value is not written.
    pub async fn set_visibility(&self, plan_id: &PlanId, visible: bool) -> ApiResult<VisibilityResponse> {
        let mut plan = self.get_plan(plan_id).await?;
        let changed = plan.set_visibility(visible);
        if changed {
            self.plans.save(&plan).await?;
        }
        Ok(VisibilityResponse { changed, plan })
    }

    pub async fn publish_plan(&self, plan_id: &PlanId) -> ApiResult<Plan> {
        let mut plan = self.get_plan(plan_id).await?;
        plan.publish()?;
        self.plans.save(&plan).await?;
        info!(plan_id = %plan.id, "Published plan");
        Ok(plan)
    }

    pub async fn deactivate_plan(&self, plan_id: &PlanId) -> ApiResult<Plan> {
        let mut plan = self.get_plan(plan_id).await?;
        plan.deactivate()?;
        self.plans.save(&plan).await?;
        info!(plan_id = %plan.id, "Deactivated plan");
        Ok(plan)
    }

    pub async fn create_paywall(&self, request: CreatePaywallRequest) -> ApiResult<Paywall> {
        self.require_plan(&request.plan_id).await?;
        let paywall = Paywall::new(request.name, request.plan_id, request.content)?;
        self.paywalls.create(&paywall).await?;
        info!(paywall_id = %paywall.id, plan_id = %paywall.plan_id, "Created paywall");
        Ok(paywall)
    }

    pub async fn get_paywall(&self, paywall_id: &PaywallId) -> ApiResult<Paywall> {
        found(self.paywalls.get(paywall_id).await?, "paywall", paywall_id)
    }

    pub async fn list_paywalls(&self, status: Option<&str>, params: &PageParams) -> ApiResult<Paginated<Paywall>> {
        Ok(self.paywalls.list(parse_status(status)?, params).await?)
    }

    pub async fn update_paywall(&self, paywall_id: &PaywallId, request: UpdatePaywallRequest) -> ApiResult<Paywall> {
        let mut paywall = self.get_paywall(paywall_id).await?;
        if let Some(plan_id) = &request.plan_id {
            self.require_plan(plan_id).await?;
        }
        paywall.apply(request.name, request.plan_id, request.content)?;
        self.paywalls.save(&paywall).await?;
        Ok(paywall)
    }

    /// Run the publish gate and activate the paywall together with its plan.
    pub async fn publish_paywall(&self, paywall_id: &PaywallId) -> ApiResult<PublishPaywallResponse> {
        let mut paywall = self.get_paywall(paywall_id).await?;
        let mut plan = self.require_plan(&paywall.plan_id).await?;
        paywall.publish(&mut plan)?;
        self.paywalls.save_published(&paywall, &plan).await?;
        info!(paywall_id = %paywall.id, plan_id = %plan.id, "Published paywall");
        Ok(PublishPaywallResponse { paywall, plan })
    }

    pub async fn deactivate_paywall(&self, paywall_id: &PaywallId) -> ApiResult<Paywall> {
        let mut paywall = self.get_paywall(paywall_id).await?;
        paywall.deactivate()?;
        self.paywalls.save(&paywall).await?;
        info!(paywall_id = %paywall.id, "Deactivated paywall");
        Ok(paywall)
    }

    /// Referenced plans that do not exist are invalid paywall data.
    async fn require_plan(&self, plan_id: &PlanId) -> ApiResult<Plan> {
        self.plans
            .get(plan_id)
            .await?
            .ok_or_else(|| DomainError::invalid_paywall(format!("plan {plan_id} does not exist")).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_filter_parsing() {
        assert_eq!(parse_status(None).unwrap(), None);
        assert_eq!(parse_status(Some("active")).unwrap(), Some(PublishStatus::Active));
        assert!(parse_status(Some("archived")).is_err());
    }

    #[test]
    fn request_bodies_are_camel_case() {
        let terms: PlanTerms = serde_json::from_value(serde_json::json!({
            "name": "Monthly",
            "actualPrice": 29900,
            "payingPrice": 19900,
            "durationDays": 30,
            "isVisible": true
        }))
        .unwrap();
        assert_eq!(terms.paying_price, Some(19900));
        assert_eq!(terms.duration_days, Some(30));
        assert_eq!(terms.is_visible, Some(true));

        let visibility: VisibilityRequest =
            serde_json::from_value(serde_json::json!({ "isVisible": false })).unwrap();
        assert!(!visibility.is_visible);
        assert!(serde_json::from_value::<VisibilityRequest>(serde_json::json!({ "is_visible": true })).is_err());

        let paywall: CreatePaywallRequest =
            serde_json::from_value(serde_json::json!({ "name": "Gate", "planId": "plan-1" })).unwrap();
        assert_eq!(paywall.plan_id.as_str(), "plan-1");
    }
}
