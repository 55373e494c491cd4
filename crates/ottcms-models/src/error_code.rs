//! Domain error registry.
//!
//! Every business-rule failure carries an [`ErrorCode`] with a stable wire
//! string and an HTTP status. Services return [`DomainError`]; the API layer
//! turns it into a `{ detail, code }` response body.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable machine-readable error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    NotFound,
    AlreadyGenerating,
    InvalidState,
    InvalidPlanData,
    InvalidPaywallData,
    PlanAlreadyActive,
    InvalidUpload,
    FileTooLarge,
    InvalidDriveLink,
    Unauthorized,
    Forbidden,
    RateLimited,
    UpstreamFailure,
    Internal,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::AlreadyGenerating => "ALREADY_GENERATING",
            ErrorCode::InvalidState => "INVALID_STATE",
            ErrorCode::InvalidPlanData => "INVALID_PLAN_DATA",
            ErrorCode::InvalidPaywallData => "INVALID_PAYWALL_DATA",
            ErrorCode::PlanAlreadyActive => "PLAN_ALREADY_ACTIVE",
            ErrorCode::InvalidUpload => "INVALID_UPLOAD",
            ErrorCode::FileTooLarge => "FILE_TOO_LARGE",
            ErrorCode::InvalidDriveLink => "INVALID_DRIVE_LINK",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::UpstreamFailure => "UPSTREAM_FAILURE",
            ErrorCode::Internal => "INTERNAL",
        }
    }

    /// HTTP status code this error maps to.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorCode::NotFound => 404,
            ErrorCode::AlreadyGenerating | ErrorCode::InvalidState => 409,
            ErrorCode::InvalidPlanData
            | ErrorCode::InvalidPaywallData
            | ErrorCode::PlanAlreadyActive
            | ErrorCode::InvalidUpload
            | ErrorCode::FileTooLarge
            | ErrorCode::InvalidDriveLink => 400,
            ErrorCode::Unauthorized => 401,
            ErrorCode::Forbidden => 403,
            ErrorCode::RateLimited => 429,
            ErrorCode::UpstreamFailure => 502,
            ErrorCode::Internal => 500,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A business-rule violation with its registry code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {detail}")]
pub struct DomainError {
    pub code: ErrorCode,
    pub detail: String,
}

impl DomainError {
    pub fn new(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }

    pub fn not_found(what: impl std::fmt::Display, id: impl std::fmt::Display) -> Self {
        Self::new(ErrorCode::NotFound, format!("{what} {id} not found"))
    }

    pub fn invalid_state(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidState, detail)
    }

    pub fn already_generating(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::AlreadyGenerating, detail)
    }

    pub fn invalid_plan(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPlanData, detail)
    }

    pub fn invalid_paywall(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidPaywallData, detail)
    }

    pub fn invalid_upload(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidUpload, detail)
    }

    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_serialize_to_registry_strings() {
        let json = serde_json::to_string(&ErrorCode::PlanAlreadyActive).unwrap();
        assert_eq!(json, "\"PLAN_ALREADY_ACTIVE\"");
        assert_eq!(ErrorCode::PlanAlreadyActive.as_str(), "PLAN_ALREADY_ACTIVE");
    }

    #[test]
    fn http_status_mapping() {
        assert_eq!(ErrorCode::NotFound.http_status(), 404);
        assert_eq!(ErrorCode::AlreadyGenerating.http_status(), 409);
        assert_eq!(ErrorCode::InvalidPlanData.http_status(), 400);
        assert_eq!(ErrorCode::UpstreamFailure.http_status(), 502);
        assert_eq!(ErrorCode::RateLimited.http_status(), 429);
    }

    #[test]
    fn not_found_message() {
        let err = DomainError::not_found("plan", "p1");
        assert_eq!(err.code, ErrorCode::NotFound);
        assert_eq!(err.detail, "plan p1 not found");
    }
}
