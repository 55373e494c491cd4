//! Frame-extraction service client.
//!
//! Extraction runs asynchronously on the service; results are delivered to
//! the callback URL passed at submission.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{env_secs, required_env, ProviderError, ProviderResult};

const SERVICE: &str = "frame-extractor";

#[derive(Debug, Clone)]
pub struct FrameExtractorConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

impl FrameExtractorConfig {
    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self {
            base_url: required_env("FRAME_EXTRACTOR_URL")?,
            api_key: required_env("FRAME_EXTRACTOR_API_KEY")?,
            timeout: env_secs("FRAME_EXTRACTOR_TIMEOUT_SECS", 30),
        })
    }
}

/// Work order sent to the extraction service.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionRequest {
    pub project_id: String,
    /// Presigned URL of the source video
    pub video_url: String,
    pub frame_count: u32,
    /// Storage prefix frames are written under
    pub output_prefix: String,
    pub callback_url: String,
    /// Sent back in the `X-Webhook-Secret` header of the callback
    pub callback_secret: String,
}

#[derive(Debug, Deserialize)]
struct ExtractionAccepted {
    task_id: String,
}

#[derive(Clone)]
pub struct FrameExtractorClient {
    http: Client,
    config: FrameExtractorConfig,
}

impl FrameExtractorClient {
    pub fn new(config: FrameExtractorConfig) -> ProviderResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> ProviderResult<Self> {
        Self::new(FrameExtractorConfig::from_env()?)
    }

    /// Submit an extraction. Returns the service task id.
    pub async fn submit(&self, request: &ExtractionRequest) -> ProviderResult<String> {
        let url = format!("{}/extract", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(&url)
            .header("X-Api-Key", &self.config.api_key)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::from_response(SERVICE, response).await);
        }

        let accepted: ExtractionAccepted = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(SERVICE, e.to_string()))?;
        info!(
            project_id = %request.project_id,
            task_id = %accepted.task_id,
            frame_count = request.frame_count,
            "Submitted frame extraction"
        );
        Ok(accepted.task_id)
    }
}
