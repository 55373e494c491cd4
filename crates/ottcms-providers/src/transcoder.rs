//! HLS transcoding provider client.
//!
//! Each rendition (H.264, H.265) is submitted as a separate job against a
//! provider-side template. The provider writes HLS output under the given
//! output path and exposes job state through a status endpoint.

use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ottcms_models::{TaskStatus, TaskType};

use crate::error::{env_or, env_secs, required_env, ProviderError, ProviderResult};

const SERVICE: &str = "transcoder";

#[derive(Debug, Clone)]
pub struct TranscodeConfig {
    /// Provider API root, e.g. `https://api.transcoder.example/v1`
    pub base_url: String,
    pub api_key: String,
    pub h264_template: String,
    pub h265_template: String,
    pub timeout: Duration,
}

impl TranscodeConfig {
    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self {
            base_url: required_env("TRANSCODER_BASE_URL")?,
            api_key: required_env("TRANSCODER_API_KEY")?,
            h264_template: env_or("TRANSCODER_H264_TEMPLATE", "hls-h264"),
            h265_template: env_or("TRANSCODER_H265_TEMPLATE", "hls-h265"),
            timeout: env_secs("TRANSCODER_TIMEOUT_SECS", 30),
        })
    }

    /// Provider template for a rendition. MP4 is not produced here.
    pub fn template_for(&self, task_type: TaskType) -> ProviderResult<&str> {
        match task_type {
            TaskType::H264 => Ok(&self.h264_template),
            TaskType::H265 => Ok(&self.h265_template),
            TaskType::Mp4 => Err(ProviderError::config_error(
                "mp4 renditions are produced by MediaConvert",
            )),
        }
    }
}

#[derive(Debug, Serialize)]
struct CreateJobRequest<'a> {
    template: &'a str,
    input: JobInput<'a>,
    output: JobOutput<'a>,
}

#[derive(Debug, Serialize)]
struct JobInput<'a> {
    url: &'a str,
}

#[derive(Debug, Serialize)]
struct JobOutput<'a> {
    path: &'a str,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    id: String,
    status: String,
    #[serde(default)]
    error: Option<String>,
}

/// State of a provider job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobState {
    pub status: TaskStatus,
    pub error: Option<String>,
}

fn map_status(status: &str) -> TaskStatus {
    match status.to_ascii_lowercase().as_str() {
        "completed" | "complete" | "succeeded" | "finished" => TaskStatus::Completed,
        "failed" | "error" | "canceled" | "cancelled" => TaskStatus::Failed,
        "processing" | "running" | "progressing" | "in_progress" => TaskStatus::Processing,
        _ => TaskStatus::Submitted,
    }
}

#[derive(Clone)]
pub struct HlsTranscoder {
    http: Client,
    config: TranscodeConfig,
}

impl HlsTranscoder {
    pub fn new(config: TranscodeConfig) -> ProviderResult<Self> {
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> ProviderResult<Self> {
        Self::new(TranscodeConfig::from_env()?)
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Submit one rendition. Returns the provider job id.
    pub async fn submit(&self, task_type: TaskType, input_url: &str, output_path: &str) -> ProviderResult<String> {
        let template = self.config.template_for(task_type)?;
        let request = CreateJobRequest {
            template,
            input: JobInput { url: input_url },
            output: JobOutput { path: output_path },
        };

        let response = self
            .http
            .post(self.url("jobs"))
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::from_response(SERVICE, response).await);
        }

        let job: JobResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(SERVICE, e.to_string()))?;
        info!(task_type = %task_type, job_id = %job.id, output_path, "Submitted transcoding job");
        Ok(job.id)
    }

    pub async fn status(&self, job_id: &str) -> ProviderResult<JobState> {
        let response = self
            .http
            .get(self.url(&format!("jobs/{}", urlencoding::encode(job_id))))
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProviderError::from_response(SERVICE, response).await);
        }

        let job: JobResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(SERVICE, e.to_string()))?;
        debug!(job_id = %job.id, status = %job.status, "Fetched transcoding job status");
        Ok(JobState {
            status: map_status(&job.status),
            error: job.error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HlsTranscoder {
        HlsTranscoder::new(TranscodeConfig {
            base_url: format!("{}/v1", server.uri()),
            api_key: "secret".into(),
            h264_template: "tpl-264".into(),
            h265_template: "tpl-265".into(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn submit_uses_rendition_template() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/jobs"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(json!({
                "template": "tpl-265",
                "output": { "path": "s3://out/movies/m1/h265/" }
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": "job-9", "status": "queued" })))
            .expect(1)
            .mount(&server)
            .await;

        let id = client(&server)
            .submit(TaskType::H265, "https://src/video.mp4", "s3://out/movies/m1/h265/")
            .await
            .unwrap();
        assert_eq!(id, "job-9");
    }

    #[tokio::test]
    async fn submit_surfaces_provider_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/jobs"))
            .respond_with(ResponseTemplate::new(422).set_body_string("bad template"))
            .mount(&server)
            .await;

        let err = client(&server)
            .submit(TaskType::H264, "https://src/video.mp4", "s3://out/")
            .await
            .unwrap_err();
        assert_eq!(err.upstream_status(), Some(422));
    }

    #[tokio::test]
    async fn status_maps_provider_states() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/jobs/job-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "id": "job-1", "status": "ERROR", "error": "decode failed" })),
            )
            .mount(&server)
            .await;

        let state = client(&server).status("job-1").await.unwrap();
        assert_eq!(state.status, TaskStatus::Failed);
        assert_eq!(state.error.as_deref(), Some("decode failed"));
    }

    #[test]
    fn mp4_has_no_template() {
        let config = TranscodeConfig {
            base_url: "http://x".into(),
            api_key: "k".into(),
            h264_template: "a".into(),
            h265_template: "b".into(),
            timeout: Duration::from_secs(1),
        };
        assert!(config.template_for(TaskType::Mp4).is_err());
        assert_eq!(map_status("running"), TaskStatus::Processing);
        assert_eq!(map_status("queued"), TaskStatus::Submitted);
    }
}
