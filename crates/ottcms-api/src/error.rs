//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use ottcms_models::{DomainError, ErrorCode};
use ottcms_queue::QueueError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Rate limited")]
    RateLimited,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Storage error: {0}")]
    Storage(#[from] ottcms_storage::StorageError),

    #[error("Firestore error: {0}")]
    Firestore(#[from] ottcms_firestore::FirestoreError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Upstream error: {0}")]
    Provider(#[from] ottcms_providers::ProviderError),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(what: &str, id: impl std::fmt::Display) -> Self {
        Self::Domain(DomainError::not_found(what, id))
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Registry code reported in the response body.
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::Domain(e) => e.code,
            ApiError::Unauthorized(_) => ErrorCode::Unauthorized,
            ApiError::Forbidden(_) => ErrorCode::Forbidden,
            ApiError::RateLimited => ErrorCode::RateLimited,
            ApiError::Internal(_) => ErrorCode::Internal,
            ApiError::Storage(e) if e.is_not_found() => ErrorCode::NotFound,
            ApiError::Storage(_) | ApiError::Provider(_) => ErrorCode::UpstreamFailure,
            ApiError::Firestore(ottcms_firestore::FirestoreError::NotFound(_)) => ErrorCode::NotFound,
            ApiError::Firestore(_) => ErrorCode::Internal,
            ApiError::Queue(QueueError::DuplicateJob(_)) => ErrorCode::AlreadyGenerating,
            ApiError::Queue(_) => ErrorCode::Internal,
        }
    }

    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.code().http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    /// Errors whose message may carry infrastructure details.
    fn is_internal(&self) -> bool {
        matches!(
            self.code(),
            ErrorCode::Internal | ErrorCode::UpstreamFailure
        )
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    code: &'static str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        if self.is_internal() {
            tracing::error!(code = %code, error = %self, "Request failed");
        }

        // Don't expose internal error details in production
        let detail = match &self {
            ApiError::Domain(e) => e.detail.clone(),
            _ if self.is_internal() => {
                if std::env::var("ENVIRONMENT").unwrap_or_default() == "production" {
                    "An internal error occurred".to_string()
                } else {
                    self.to_string()
                }
            }
            _ => self.to_string(),
        };

        let body = ErrorResponse {
            detail,
            code: code.as_str(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_keep_registry_status() {
        let err = ApiError::from(DomainError::invalid_plan("paying_price must not exceed actual_price"));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), ErrorCode::InvalidPlanData);

        let err = ApiError::from(DomainError::already_generating("busy"));
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn infrastructure_errors_map_to_codes() {
        let err = ApiError::from(QueueError::DuplicateJob("poster:p1".into()));
        assert_eq!(err.code(), ErrorCode::AlreadyGenerating);

        let err = ApiError::from(ottcms_storage::StorageError::multipart("complete", "InvalidPart"));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);

        let err = ApiError::from(ottcms_firestore::FirestoreError::NotFound("plans/x".into()));
        assert_eq!(err.code(), ErrorCode::NotFound);

        let err = ApiError::from(ottcms_providers::ProviderError::invalid_response("transcoder", "bad json"));
        assert_eq!(err.code(), ErrorCode::UpstreamFailure);
    }

    #[tokio::test]
    async fn body_carries_detail_and_code() {
        let response = ApiError::not_found("plan", "p1").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "NOT_FOUND");
        assert_eq!(body["detail"], "plan p1 not found");
    }
}
