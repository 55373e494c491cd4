//! API configuration.

use std::time::Duration;

use ottcms_models::PartSizing;

/// API server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// CORS origins
    pub cors_origins: Vec<String>,
    /// Rate limit requests per second
    pub rate_limit_rps: u32,
    /// Rate limit burst
    pub rate_limit_burst: u32,
    /// Request timeout
    pub request_timeout: Duration,
    /// Max request body size
    pub max_body_size: usize,
    /// Environment (development/production)
    pub environment: String,
    /// Externally reachable base URL, used for completion and callback links
    pub public_base_url: String,
    /// HS256 secret for admin bearer tokens
    pub admin_jwt_secret: String,
    /// Shared secret expected on frame-extraction callbacks
    pub webhook_secret: String,
    /// Root URI transcoded renditions are written under, e.g. `s3://ott-output`
    pub output_base: String,
    /// Lifetime of presigned part and source URLs
    pub presign_expiry: Duration,
    pub part_sizing: PartSizing,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            cors_origins: vec!["*".to_string()],
            rate_limit_rps: 10,
            rate_limit_burst: 20,
            request_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024, // 10MB
            environment: "development".to_string(),
            public_base_url: "http://localhost:8000".to_string(),
            admin_jwt_secret: String::new(),
            webhook_secret: String::new(),
            output_base: String::new(),
            presign_expiry: Duration::from_secs(3600),
            part_sizing: PartSizing::default(),
        }
    }
}

impl ApiConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            host: std::env::var("API_HOST").unwrap_or(defaults.host),
            port: std::env::var("API_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.port),
            cors_origins: std::env::var("CORS_ORIGINS")
                .map(|s| s.split(',').map(|s| s.trim().to_string()).collect())
                .unwrap_or(defaults.cors_origins),
            rate_limit_rps: std::env::var("RATE_LIMIT_RPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_rps),
            rate_limit_burst: std::env::var("RATE_LIMIT_BURST")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.rate_limit_burst),
            request_timeout: Duration::from_secs(
                std::env::var("REQUEST_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            max_body_size: std::env::var("MAX_BODY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_body_size),
            environment: std::env::var("ENVIRONMENT").unwrap_or(defaults.environment),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_base_url),
            admin_jwt_secret: std::env::var("ADMIN_JWT_SECRET").unwrap_or_default(),
            webhook_secret: std::env::var("WEBHOOK_SECRET").unwrap_or_default(),
            output_base: std::env::var("OUTPUT_BASE")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            presign_expiry: Duration::from_secs(
                std::env::var("PRESIGN_EXPIRY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            part_sizing: PartSizing::from_env(),
        }
    }

    /// Check if running in production mode.
    pub fn is_production(&self) -> bool {
        self.environment.to_lowercase() == "production"
    }

    /// Settings the server refuses to start without.
    pub fn validate(&self) -> Result<(), String> {
        let mut missing = Vec::new();
        if self.admin_jwt_secret.len() < 32 {
            missing.push("ADMIN_JWT_SECRET (at least 32 bytes)");
        }
        if self.webhook_secret.is_empty() {
            missing.push("WEBHOOK_SECRET");
        }
        if self.output_base.is_empty() {
            missing.push("OUTPUT_BASE");
        }
        if !missing.is_empty() {
            return Err(format!("missing configuration: {}", missing.join(", ")));
        }
        self.part_sizing.validate().map_err(|e| e.detail)
    }

    /// Completion endpoint handed to upload clients.
    pub fn complete_url(&self, media_id: &str) -> String {
        format!("{}/api/uploads/{}/complete", self.public_base_url, media_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn complete_url_uses_public_base() {
        let config = ApiConfig {
            public_base_url: "https://cms.example.com".into(),
            ..Default::default()
        };
        assert_eq!(config.complete_url("m1"), "https://cms.example.com/api/uploads/m1/complete");
    }

    #[test]
    fn validate_reports_missing_secrets() {
        let err = ApiConfig::default().validate().unwrap_err();
        assert!(err.contains("ADMIN_JWT_SECRET"));
        assert!(err.contains("WEBHOOK_SECRET"));

        let config = ApiConfig {
            admin_jwt_secret: "x".repeat(32),
            webhook_secret: "hook".into(),
            output_base: "s3://out".into(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_inverted_part_sizing() {
        let mut config = ApiConfig {
            admin_jwt_secret: "x".repeat(32),
            webhook_secret: "hook".into(),
            output_base: "s3://out".into(),
            ..Default::default()
        };
        config.part_sizing.min_part_size = config.part_sizing.max_part_size + 1;
        let err = config.validate().unwrap_err();
        assert!(err.contains("part sizing"), "{err}");

        config.part_sizing = PartSizing { max_parts: 0, ..PartSizing::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    #[serial]
    fn from_env_trims_trailing_slashes() {
        std::env::set_var("PUBLIC_BASE_URL", "https://cms.example.com/");
        std::env::set_var("OUTPUT_BASE", "s3://ott-output/");
        let config = ApiConfig::from_env();
        assert_eq!(config.public_base_url, "https://cms.example.com");
        assert_eq!(config.output_base, "s3://ott-output");
        std::env::remove_var("PUBLIC_BASE_URL");
        std::env::remove_var("OUTPUT_BASE");
    }
}
