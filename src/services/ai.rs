use crate::config::AiConfig;
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::{Value, json};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("model request failed: {0}")]
    Request(String),
    #[error("model returned {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("model response contained no text")]
    EmptyResponse,
}

/// One unit of model input: plain text, or inline binary with a MIME type.
#[derive(Debug, Clone, PartialEq)]
pub enum ContentPart {
    Text(String),
    InlineData { mime_type: String, data: Vec<u8> },
}

impl ContentPart {
    pub fn text(s: impl Into<String>) -> Self {
        ContentPart::Text(s.into())
    }
}

/// The primary analysis/chat model: ordered content parts in, one full text
/// completion out. No streaming.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    async fn generate(&self, parts: &[ContentPart]) -> Result<String, AiError>;
}

/// The secondary text-only model used for note extraction.
#[async_trait]
pub trait CompletionModel: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AiError>;
}

/// Shared HTTP client for all provider calls. Built once at startup; every
/// request carries the configured hard timeout so a hung provider cannot
/// hold a request open indefinitely.
pub fn build_http_client(timeout_secs: u64) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .expect("failed to build HTTP client")
}

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Client for the Gemini `generateContent` endpoint, which accepts text and
/// `inline_data` (base64 + MIME) parts natively.
pub struct GeminiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(http: reqwest::Client, config: &AiConfig, model: impl Into<String>) -> Self {
        Self {
            http,
            base_url: GEMINI_BASE_URL.to_string(),
            api_key: config.gemini_api_key.clone(),
            model: model.into(),
        }
    }

    fn encode_parts(parts: &[ContentPart]) -> Vec<Value> {
        parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => json!({ "text": text }),
                ContentPart::InlineData { mime_type, data } => json!({
                    "inline_data": {
                        "mime_type": mime_type,
                        "data": BASE64.encode(data),
                    }
                }),
            })
            .collect()
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, parts: &[ContentPart]) -> Result<String, AiError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let body = json!({
            "contents": [{ "parts": Self::encode_parts(parts) }]
        });

        let res = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::Request(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AiError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| AiError::Request(format!("invalid response body: {}", e)))?;

        // Candidates may carry multiple text parts; concatenate them.
        let text = payload["candidates"][0]["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(AiError::EmptyResponse);
        }
        Ok(text)
    }
}

/// Client for an OpenAI-compatible `chat/completions` endpoint.
pub struct OpenAiCompatClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiCompatClient {
    pub fn new(http: reqwest::Client, config: &AiConfig) -> Self {
        Self {
            http,
            base_url: config.extraction_base_url.clone(),
            api_key: config.extraction_api_key.clone(),
            model: config.extraction_model.clone(),
        }
    }
}

#[async_trait]
impl CompletionModel for OpenAiCompatClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AiError> {
        let res = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": self.model,
                "messages": [
                    { "role": "system", "content": system },
                    { "role": "user", "content": user }
                ],
                "temperature": 0.2
            }))
            .send()
            .await
            .map_err(|e| AiError::Request(e.to_string()))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AiError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let payload: Value = res
            .json()
            .await
            .map_err(|e| AiError::Request(format!("invalid response body: {}", e)))?;

        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .filter(|s| !s.trim().is_empty())
            .ok_or(AiError::EmptyResponse)
    }
}
