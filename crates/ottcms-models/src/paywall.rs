//! Paywall screens bound to a plan.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::error_code::{DomainError, DomainResult, ErrorCode};
use crate::ids::{PaywallId, PlanId};
use crate::plan::{Plan, PublishStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
}

/// One block of a paywall screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Section {
    Button {
        order: u32,
        label: String,
        action: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    Text {
        order: u32,
        body: String,
        #[serde(default)]
        style: String,
    },
    Media {
        order: u32,
        url: String,
        #[serde(alias = "mediaType")]
        media_type: MediaKind,
    },
}

impl Section {
    pub fn order(&self) -> u32 {
        match self {
            Section::Button { order, .. } | Section::Text { order, .. } | Section::Media { order, .. } => *order,
        }
    }
}

/// Localized paywall content.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, JsonSchema)]
pub struct PaywallContent {
    #[serde(default)]
    pub en: Vec<Section>,
    #[serde(default)]
    pub hin: Vec<Section>,
}

impl PaywallContent {
    /// Sort each language bundle by section order.
    pub fn normalize(&mut self) {
        self.en.sort_by_key(Section::order);
        self.hin.sort_by_key(Section::order);
    }

    pub fn check(&self) -> DomainResult<()> {
        check_bundle("en", &self.en)?;
        check_bundle("hin", &self.hin)
    }
}

fn check_bundle(lang: &str, sections: &[Section]) -> DomainResult<()> {
    if sections.is_empty() {
        return Err(DomainError::invalid_paywall(format!("{lang} content is empty")));
    }
    let mut orders = HashSet::new();
    for section in sections {
        if !orders.insert(section.order()) {
            return Err(DomainError::invalid_paywall(format!(
                "{lang} content has duplicate order {}",
                section.order()
            )));
        }
        match section {
            Section::Button { label, action, url, .. } => {
                require(lang, "button label", label)?;
                require(lang, "button action", action)?;
                if let Some(url) = url {
                    require_url(lang, url)?;
                }
            }
            Section::Text { body, .. } => require(lang, "text body", body)?,
            Section::Media { url, .. } => require_url(lang, url)?,
        }
    }
    Ok(())
}

fn require(lang: &str, field: &str, value: &str) -> DomainResult<()> {
    if value.trim().is_empty() {
        return Err(DomainError::invalid_paywall(format!("{lang} {field} must not be empty")));
    }
    Ok(())
}

fn require_url(lang: &str, value: &str) -> DomainResult<()> {
    match url::Url::parse(value) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => Ok(()),
        _ => Err(DomainError::invalid_paywall(format!("{lang} url {value:?} is not an absolute http(s) url"))),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Paywall {
    pub id: PaywallId,
    pub name: String,
    pub plan_id: PlanId,
    #[serde(default)]
    pub status: PublishStatus,
    #[serde(default)]
    pub content: PaywallContent,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

impl Paywall {
    pub fn new(name: impl Into<String>, plan_id: PlanId, mut content: PaywallContent) -> DomainResult<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::invalid_paywall("name must not be empty"));
        }
        content.normalize();
        let now = Utc::now();
        Ok(Self {
            id: PaywallId::new(),
            name,
            plan_id,
            status: PublishStatus::Draft,
            content,
            created_at: now,
            updated_at: now,
            published_at: None,
        })
    }

    /// Edit a draft paywall.
    pub fn apply(&mut self, name: Option<String>, plan_id: Option<PlanId>, content: Option<PaywallContent>) -> DomainResult<()> {
        if self.status != PublishStatus::Draft {
            return Err(DomainError::invalid_state(format!(
                "paywall {} is {}, only drafts can be edited",
                self.id, self.status
            )));
        }
        if let Some(name) = name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(DomainError::invalid_paywall("name must not be empty"));
            }
            self.name = name;
        }
        if let Some(plan_id) = plan_id {
            self.plan_id = plan_id;
        }
        if let Some(mut content) = content {
            content.normalize();
            self.content = content;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Publish gate. Activates both the paywall and its plan on success;
    /// neither is modified on failure.
    pub fn publish(&mut self, plan: &mut Plan) -> DomainResult<()> {
        if self.status != PublishStatus::Draft {
            return Err(DomainError::invalid_state(format!(
                "paywall {} is {}, only drafts can be published",
                self.id, self.status
            )));
        }
        if plan.id != self.plan_id {
            return Err(DomainError::invalid_paywall(format!(
                "paywall {} references plan {}, got {}",
                self.id, self.plan_id, plan.id
            )));
        }
        self.content.check()?;
        if plan.status == PublishStatus::Active {
            return Err(DomainError::new(
                ErrorCode::PlanAlreadyActive,
                format!("plan {} is already active", plan.id),
            ));
        }
        plan.check()?;

        plan.publish()?;
        let now = Utc::now();
        self.status = PublishStatus::Active;
        self.published_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    pub fn deactivate(&mut self) -> DomainResult<()> {
        if self.status != PublishStatus::Active {
            return Err(DomainError::invalid_state(format!(
                "paywall {} is {}, only active paywalls can be deactivated",
                self.id, self.status
            )));
        }
        self.status = PublishStatus::Inactive;
        self.updated_at = Utc::now();
        Ok(())
    }
}
