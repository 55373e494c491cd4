//! Admin bearer-token and webhook-secret authentication.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::security::secrets_match;
use crate::state::AppState;

/// Role claim required on admin tokens.
pub const ADMIN_ROLE: &str = "admin";

/// Header carrying the frame-extraction callback secret.
pub const WEBHOOK_SECRET_HEADER: &str = "X-Webhook-Secret";

/// Decoded admin token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminClaims {
    /// Operator identity
    pub sub: String,
    pub role: String,
    /// Issued at
    pub iat: i64,
    /// Expiration
    pub exp: i64,
}

/// Authenticated operator extracted from the request.
#[derive(Debug, Clone)]
pub struct AdminUser {
    pub subject: String,
}

/// HS256 verifier for admin tokens.
pub struct AdminAuth {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

impl AdminAuth {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Verify a bearer token and require the admin role.
    pub fn verify_token(&self, token: &str) -> Result<AdminClaims, ApiError> {
        let data = decode::<AdminClaims>(token, &self.decoding, &self.validation)
            .map_err(|e| ApiError::unauthorized(format!("Token validation failed: {}", e)))?;

        if data.claims.role != ADMIN_ROLE {
            return Err(ApiError::forbidden("admin role required"));
        }
        Ok(data.claims)
    }

    /// Sign a token for `subject`, valid for `ttl_secs`.
    pub fn issue_token(&self, subject: &str, ttl_secs: i64) -> Result<String, ApiError> {
        let now = Utc::now().timestamp();
        let claims = AdminClaims {
            sub: subject.to_string(),
            role: ADMIN_ROLE.to_string(),
            iat: now,
            exp: now + ttl_secs,
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ApiError::internal(format!("failed to sign token: {}", e)))
    }
}

/// Axum extractor for authenticated operators.
#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))?;

        let claims = state.auth.verify_token(token)?;
        debug!(subject = %claims.sub, "Authenticated admin request");

        Ok(AdminUser { subject: claims.sub })
    }
}

/// Caller that presented the shared webhook secret.
#[derive(Debug, Clone, Copy)]
pub struct WebhookCaller;

#[axum::async_trait]
impl FromRequestParts<AppState> for WebhookCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let presented = parts
            .headers
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing webhook secret"))?;

        if !secrets_match(presented, &state.config.webhook_secret) {
            warn!(path = %parts.uri.path(), "Rejected webhook with wrong secret");
            return Err(ApiError::unauthorized("Invalid webhook secret"));
        }
        Ok(WebhookCaller)
    }
}
