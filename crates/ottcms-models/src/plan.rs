//! Subscription plans.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::error_code::{DomainError, DomainResult};
use crate::ids::PlanId;

/// Publication state shared by plans and paywalls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PublishStatus {
    #[default]
    Draft,
    Active,
    Inactive,
}

impl PublishStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PublishStatus::Draft => "draft",
            PublishStatus::Active => "active",
            PublishStatus::Inactive => "inactive",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "draft" => Some(PublishStatus::Draft),
            "active" => Some(PublishStatus::Active),
            "inactive" => Some(PublishStatus::Inactive),
            _ => None,
        }
    }
}

impl std::fmt::Display for PublishStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Subscription plan. Prices are in minor currency units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
#[validate(schema(function = "check_price_order", skip_on_field_errors = false))]
pub struct Plan {
    pub id: PlanId,
    #[validate(custom(function = "not_blank"))]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[validate(custom(function = "currency_code"))]
    pub currency: String,
    #[validate(range(min = 1, message = "actual_price must be greater than zero"))]
    pub actual_price: i64,
    #[validate(range(min = 1, message = "paying_price must be greater than zero"))]
    pub paying_price: i64,
    #[validate(range(min = 1, message = "duration_days must be at least 1"))]
    pub duration_days: i64,
    #[serde(default)]
    pub status: PublishStatus,
    #[serde(default)]
    pub is_visible: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank").with_message("name must not be empty".into()));
    }
    Ok(())
}

fn currency_code(value: &str) -> Result<(), ValidationError> {
    if value.len() == 3 && value.chars().all(|c| c.is_ascii_uppercase()) {
        Ok(())
    } else {
        Err(ValidationError::new("currency")
            .with_message("currency must be a three-letter ISO code".into()))
    }
}

fn check_price_order(plan: &Plan) -> Result<(), ValidationError> {
    if plan.paying_price > plan.actual_price {
        return Err(ValidationError::new("price_order")
            .with_message("paying_price must not exceed actual_price".into()));
    }
    Ok(())
}

/// Editable plan terms, used for both create and update.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanTerms {
    pub name: Option<String>,
    pub description: Option<String>,
    pub currency: Option<String>,
    pub actual_price: Option<i64>,
    pub paying_price: Option<i64>,
    pub duration_days: Option<i64>,
    pub is_visible: Option<bool>,
}

impl Plan {
    /// Create a draft plan from terms. Fails with `INVALID_PLAN_DATA`.
    pub fn create(terms: PlanTerms) -> DomainResult<Self> {
        let now = Utc::now();
        let plan = Self {
            id: PlanId::new(),
            name: terms.name.unwrap_or_default().trim().to_string(),
            description: terms.description.unwrap_or_default(),
            currency: terms.currency.unwrap_or_default().trim().to_uppercase(),
            actual_price: terms.actual_price.unwrap_or(0),
            paying_price: terms.paying_price.unwrap_or(0),
            duration_days: terms.duration_days.unwrap_or(0),
            status: PublishStatus::Draft,
            is_visible: terms.is_visible.unwrap_or(false),
            created_at: now,
            updated_at: now,
            published_at: None,
        };
        plan.check()?;
        Ok(plan)
    }

    /// Run field and cross-field validation.
    pub fn check(&self) -> DomainResult<()> {
        Validate::validate(self).map_err(|e| DomainError::invalid_plan(e.to_string()))
    }

    /// Apply an update. Active plans are immutable until deactivated.
    pub fn apply(&mut self, terms: PlanTerms) -> DomainResult<()> {
        if self.status == PublishStatus::Active {
            return Err(DomainError::invalid_state(format!(
                "plan {} is active; deactivate it before editing",
                self.id
            )));
        }
        let mut next = self.clone();
        if let Some(name) = terms.name {
            next.name = name.trim().to_string();
        }
        if let Some(description) = terms.description {
            next.description = description;
        }
        if let Some(currency) = terms.currency {
            next.currency = currency.trim().to_uppercase();
        }
        if let Some(v) = terms.actual_price {
            next.actual_price = v;
        }
        if let Some(v) = terms.paying_price {
            next.paying_price = v;
        }
        if let Some(v) = terms.duration_days {
            next.duration_days = v;
        }
        if let Some(v) = terms.is_visible {
            next.is_visible = v;
        }
        next.check()?;
        next.updated_at = Utc::now();
        *self = next;
        Ok(())
    }

    /// Set visibility. Returns whether anything changed.
    pub fn set_visibility(&mut self, visible: bool) -> bool {
        if self.is_visible == visible {
            return false;
        }
        self.is_visible = visible;
        self.updated_at = Utc::now();
        true
    }

    pub fn publish(&mut self) -> DomainResult<()> {
        if self.status == PublishStatus::Active {
            return Err(DomainError::new(
                crate::ErrorCode::PlanAlreadyActive,
                format!("plan {} is already active", self.id),
            ));
        }
        self.check()?;
        let now = Utc::now();
        self.status = PublishStatus::Active;
        self.published_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn deactivate(&mut self) -> DomainResult<()> {
        if self.status != PublishStatus::Active {
            return Err(DomainError::invalid_state(format!(
                "plan {} is {}, only active plans can be deactivated",
                self.id, self.status
            )));
        }
        self.status = PublishStatus::Inactive;
        self.updated_at = Utc::now();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorCode;

    fn terms() -> PlanTerms {
        PlanTerms {
            name: Some("Monthly".into()),
            description: Some("All shows".into()),
            currency: Some("inr".into()),
            actual_price: Some(29900),
            paying_price: Some(19900),
            duration_days: Some(30),
            is_visible: None,
        }
    }

    #[test]
    fn creates_valid_draft() {
        let plan = Plan::create(terms()).unwrap();
        assert_eq!(plan.status, PublishStatus::Draft);
        assert_eq!(plan.currency, "INR");
        assert!(!plan.is_visible);
    }

    #[test]
    fn paying_price_above_actual_is_rejected() {
        let err = Plan::create(PlanTerms {
            paying_price: Some(39900),
            ..terms()
        })
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPlanData);
        assert_eq!(err.http_status(), 400);
    }

    #[test]
    fn field_rules() {
        for bad in [
            PlanTerms { name: Some("  ".into()), ..terms() },
            PlanTerms { actual_price: Some(0), ..terms() },
            PlanTerms { duration_days: Some(0), ..terms() },
            PlanTerms { currency: Some("RUPEE".into()), ..terms() },
        ] {
            assert_eq!(Plan::create(bad).unwrap_err().code, ErrorCode::InvalidPlanData);
        }
    }

    #[test]
    fn visibility_is_idempotent() {
        let mut plan = Plan::create(terms()).unwrap();
        assert!(plan.set_visibility(true));
        let snapshot = plan.clone();
        assert!(!plan.set_visibility(true));
        assert_eq!(plan, snapshot);
        assert!(plan.set_visibility(false));
    }

    #[test]
    fn publish_lifecycle() {
        let mut plan = Plan::create(terms()).unwrap();
        plan.publish().unwrap();
        assert_eq!(plan.status, PublishStatus::Active);
        assert!(plan.published_at.is_some());
        assert_eq!(plan.publish().unwrap_err().code, ErrorCode::PlanAlreadyActive);
        assert!(plan.apply(PlanTerms::default()).is_err());
        plan.deactivate().unwrap();
        assert_eq!(plan.deactivate().unwrap_err().code, ErrorCode::InvalidState);
        plan.publish().unwrap();
    }

    #[test]
    fn update_is_revalidated_and_atomic() {
        let mut plan = Plan::create(terms()).unwrap();
        let err = plan
            .apply(PlanTerms {
                paying_price: Some(99_999),
                ..PlanTerms::default()
            })
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPlanData);
        assert_eq!(plan.paying_price, 19900);
        plan.apply(PlanTerms {
            name: Some("Quarterly".into()),
            duration_days: Some(90),
            ..PlanTerms::default()
        })
        .unwrap();
        assert_eq!(plan.duration_days, 90);
    }
}
