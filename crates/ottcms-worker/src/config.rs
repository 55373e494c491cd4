//! Worker configuration.

use std::time::Duration;

use ottcms_models::PosterProjectId;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// How often the worker should scan for orphaned pending jobs
    pub claim_interval: Duration,
    /// Minimum idle time before a pending job can be claimed (crash recovery)
    pub claim_min_idle: Duration,
    /// Lifetime of the presigned video URL handed to the extraction service
    pub presign_ttl: Duration,
    /// Public base URL of the API, used to build callback URLs
    pub public_base_url: String,
    /// Shared secret the extraction service echoes on callbacks
    pub webhook_secret: String,
    /// Port for the Prometheus exporter; disabled when unset
    pub metrics_port: Option<u16>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            shutdown_timeout: Duration::from_secs(30),
            claim_interval: Duration::from_secs(30),
            claim_min_idle: Duration::from_secs(300),
            presign_ttl: Duration::from_secs(6 * 3600),
            public_base_url: "http://localhost:8000".to_string(),
            webhook_secret: String::new(),
            metrics_port: None,
        }
    }
}

fn env_secs(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            shutdown_timeout: env_secs("WORKER_SHUTDOWN_TIMEOUT", defaults.shutdown_timeout),
            claim_interval: env_secs("WORKER_CLAIM_INTERVAL_SECS", defaults.claim_interval),
            claim_min_idle: env_secs("WORKER_CLAIM_MIN_IDLE_SECS", defaults.claim_min_idle),
            presign_ttl: env_secs("WORKER_PRESIGN_TTL_SECS", defaults.presign_ttl),
            public_base_url: std::env::var("PUBLIC_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.public_base_url),
            webhook_secret: std::env::var("WEBHOOK_SECRET").unwrap_or_default(),
            metrics_port: std::env::var("WORKER_METRICS_PORT").ok().and_then(|s| s.parse().ok()),
        }
    }

    /// Names of required settings that are missing.
    pub fn validate(&self) -> Result<(), String> {
        if self.webhook_secret.is_empty() {
            return Err("WEBHOOK_SECRET".to_string());
        }
        Ok(())
    }

    /// Where the extraction service reports results for a project.
    pub fn frames_callback_url(&self, project_id: &PosterProjectId) -> String {
        format!("{}/hooks/poster-projects/{}/frames", self.public_base_url, project_id)
    }
}
