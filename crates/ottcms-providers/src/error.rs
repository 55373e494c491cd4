//! Provider error types.

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The service answered with a non-success status.
    #[error("{service} returned {status}: {body}")]
    Upstream {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("{service} returned an invalid response: {message}")]
    InvalidResponse { service: &'static str, message: String },

    /// A streamed body stopped producing data.
    #[error("{service} stream stalled for {seconds}s")]
    Stalled { service: &'static str, seconds: u64 },

    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("MediaConvert error: {0}")]
    MediaConvert(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn invalid_response(service: &'static str, msg: impl Into<String>) -> Self {
        Self::InvalidResponse {
            service,
            message: msg.into(),
        }
    }

    pub fn media_convert(msg: impl std::fmt::Display) -> Self {
        Self::MediaConvert(msg.to_string())
    }

    /// Read the body of a failed response into an error.
    pub(crate) async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Self::Upstream {
            service,
            status,
            body: body.chars().take(500).collect(),
        }
    }

    /// Upstream status code, if the service answered.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            Self::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Read a required environment variable.
pub(crate) fn required_env(name: &str) -> ProviderResult<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ProviderError::config_error(format!("{} must be set", name)))
}

pub(crate) fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

pub(crate) fn env_secs(name: &str, default: u64) -> std::time::Duration {
    std::time::Duration::from_secs(
        std::env::var(name)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(default),
    )
}
