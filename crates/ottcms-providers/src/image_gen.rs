//! Gemini image generation client.
//!
//! Sends the rendered poster prompt with reference frames as inline images
//! and collects the images returned in the response.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{env_or, env_secs, required_env, ProviderError, ProviderResult};

const SERVICE: &str = "gemini";

#[derive(Debug, Clone)]
pub struct ImageGenConfig {
    pub api_key: String,
    pub base_url: String,
    /// Models tried in order until one returns images.
    pub models: Vec<String>,
    pub timeout: Duration,
}

impl ImageGenConfig {
    pub fn from_env() -> ProviderResult<Self> {
        let models: Vec<String> = env_or("IMAGE_GEN_MODELS", "gemini-2.5-flash-image")
            .split(',')
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        Ok(Self {
            api_key: required_env("GEMINI_API_KEY")?,
            base_url: env_or("GEMINI_BASE_URL", "https://generativelanguage.googleapis.com"),
            models,
            timeout: env_secs("IMAGE_GEN_TIMEOUT_SECS", 120),
        })
    }
}

/// Image bytes with their MIME type.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Gemini API request.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
}

/// Gemini API response.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    inline_data: Option<InlineData>,
}

#[derive(Clone)]
pub struct ImageGenClient {
    http: Client,
    config: ImageGenConfig,
}

impl ImageGenClient {
    pub fn new(config: ImageGenConfig) -> ProviderResult<Self> {
        if config.models.is_empty() {
            return Err(ProviderError::config_error("at least one image model is required"));
        }
        let http = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> ProviderResult<Self> {
        Self::new(ImageGenConfig::from_env()?)
    }

    /// Generate images for a prompt, falling back through the configured models.
    pub async fn generate(&self, prompt: &str, references: &[ImageData]) -> ProviderResult<Vec<ImageData>> {
        let mut last_error = None;

        for model in &self.config.models {
            info!("Attempting image generation with model: {}", model);
            match self.call_model(model, prompt, references).await {
                Ok(images) => {
                    info!(model = %model, count = images.len(), "Generated poster images");
                    return Ok(images);
                }
                Err(e) => {
                    warn!("Image generation failed with model {}: {}", model, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::invalid_response(SERVICE, "no model produced images")))
    }

    async fn call_model(&self, model: &str, prompt: &str, references: &[ImageData]) -> ProviderResult<Vec<ImageData>> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            model,
            self.config.api_key
        );

        let mut parts = vec![Part {
            text: Some(prompt.to_string()),
            inline_data: None,
        }];
        parts.extend(references.iter().map(|image| Part {
            text: None,
            inline_data: Some(InlineData {
                mime_type: image.mime_type.clone(),
                data: STANDARD.encode(&image.bytes),
            }),
        }));

        let request = GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                response_modalities: vec!["TEXT", "IMAGE"],
            },
        };

        let response = self.http.post(&url).json(&request).send().await?;
        if !response.status().is_success() {
            return Err(ProviderError::from_response(SERVICE, response).await);
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::invalid_response(SERVICE, e.to_string()))?;

        let images = body
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .flat_map(|c| c.parts)
            .filter_map(|p| p.inline_data)
            .map(|data| {
                STANDARD
                    .decode(data.data.as_bytes())
                    .map(|bytes| ImageData {
                        mime_type: data.mime_type,
                        bytes,
                    })
                    .map_err(|e| ProviderError::invalid_response(SERVICE, format!("bad image payload: {}", e)))
            })
            .collect::<ProviderResult<Vec<_>>>()?;

        if images.is_empty() {
            return Err(ProviderError::invalid_response(SERVICE, "response contained no images"));
        }
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, models: &[&str]) -> ImageGenClient {
        ImageGenClient::new(ImageGenConfig {
            api_key: "k".into(),
            base_url: server.uri(),
            models: models.iter().map(|m| m.to_string()).collect(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn image_reply(bytes: &[u8]) -> serde_json::Value {
        json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "Here is your poster" },
                    { "inlineData": { "mimeType": "image/png", "data": STANDARD.encode(bytes) } }
                ]}
            }]
        })
    }

    #[tokio::test]
    async fn generate_decodes_inline_images() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/img-a:generateContent"))
            .and(query_param("key", "k"))
            .and(body_partial_json(json!({ "generationConfig": { "responseModalities": ["TEXT", "IMAGE"] } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(image_reply(b"png-bytes")))
            .mount(&server)
            .await;

        let frames = vec![ImageData {
            mime_type: "image/jpeg".into(),
            bytes: vec![1, 2, 3],
        }];
        let images = client(&server, &["img-a"]).generate("poster", &frames).await.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].bytes, b"png-bytes");
        assert_eq!(images[0].mime_type, "image/png");
    }

    #[tokio::test]
    async fn generate_falls_back_to_next_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/img-a:generateContent"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/img-b:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(image_reply(b"ok")))
            .mount(&server)
            .await;

        let images = client(&server, &["img-a", "img-b"]).generate("poster", &[]).await.unwrap();
        assert_eq!(images[0].bytes, b"ok");
    }

    #[tokio::test]
    async fn text_only_reply_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/img-a:generateContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "candidates": [{ "content": { "parts": [{ "text": "I can't do that" }] } }]
            })))
            .mount(&server)
            .await;

        let err = client(&server, &["img-a"]).generate("poster", &[]).await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse { .. }));
    }
}
