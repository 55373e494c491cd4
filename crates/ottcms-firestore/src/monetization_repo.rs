//! Plans and paywalls.

use tracing::info;

use ottcms_models::{PageParams, Paginated, Paywall, PaywallId, Plan, PlanId, PublishStatus};

use crate::client::FirestoreClient;
use crate::error::FirestoreResult;
use crate::repository::Collection;
use crate::types::Value;

pub const PLANS_COLLECTION: &str = "plans";
pub const PAYWALLS_COLLECTION: &str = "paywalls";

fn status_filter(status: Option<PublishStatus>) -> Vec<(&'static str, Value)> {
    status
        .map(|s| vec![("status", Value::StringValue(s.as_str().to_string()))])
        .unwrap_or_default()
}

#[derive(Clone)]
pub struct PlanRepository {
    plans: Collection<Plan>,
}

impl PlanRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self {
            plans: Collection::new(client, PLANS_COLLECTION),
        }
    }

    pub async fn get(&self, id: &PlanId) -> FirestoreResult<Option<Plan>> {
        self.plans.get(id.as_str()).await
    }

    pub async fn create(&self, plan: &Plan) -> FirestoreResult<()> {
        self.plans.create(plan.id.as_str(), plan).await?;
        info!(plan_id = %plan.id, "Created plan");
        Ok(())
    }

    pub async fn save(&self, plan: &Plan) -> FirestoreResult<()> {
        self.plans.save(plan.id.as_str(), plan).await
    }

    pub async fn list(&self, status: Option<PublishStatus>, params: &PageParams) -> FirestoreResult<Paginated<Plan>> {
        self.plans.page(status_filter(status), params).await
    }
}

#[derive(Clone)]
pub struct PaywallRepository {
    client: FirestoreClient,
    paywalls: Collection<Paywall>,
    plans: Collection<Plan>,
}

impl PaywallRepository {
    pub fn new(client: FirestoreClient) -> Self {
        Self {
            paywalls: Collection::new(client.clone(), PAYWALLS_COLLECTION),
            plans: Collection::new(client.clone(), PLANS_COLLECTION),
            client,
        }
    }

    pub async fn get(&self, id: &PaywallId) -> FirestoreResult<Option<Paywall>> {
        self.paywalls.get(id.as_str()).await
    }

    pub async fn create(&self, paywall: &Paywall) -> FirestoreResult<()> {
        self.paywalls.create(paywall.id.as_str(), paywall).await?;
        info!(paywall_id = %paywall.id, plan_id = %paywall.plan_id, "Created paywall");
        Ok(())
    }

    pub async fn save(&self, paywall: &Paywall) -> FirestoreResult<()> {
        self.paywalls.save(paywall.id.as_str(), paywall).await
    }

    pub async fn list(
        &self,
        status: Option<PublishStatus>,
        params: &PageParams,
    ) -> FirestoreResult<Paginated<Paywall>> {
        self.paywalls.page(status_filter(status), params).await
    }

    /// Store a published paywall and its plan in one atomic commit.
    pub async fn save_published(&self, paywall: &Paywall, plan: &Plan) -> FirestoreResult<()> {
        let writes = vec![
            self.paywalls.upsert_write(paywall.id.as_str(), paywall)?,
            self.plans.upsert_write(plan.id.as_str(), plan)?,
        ];
        self.client.commit(writes).await?;
        info!(paywall_id = %paywall.id, plan_id = %plan.id, "Published paywall");
        Ok(())
    }
}
