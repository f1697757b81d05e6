//! Gemini language model client.
//!
//! Tries each configured model in order and returns the first successful
//! completion.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, required_env, send_checked};
use crate::llm::{strip_code_fences, CompletionRequest, LanguageModel, ResponseFormat};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Models tried in order.
pub const DEFAULT_MODELS: &[&str] = &["gemini-2.0-flash-001", "gemini-2.5-flash", "gemini-2.5-pro"];

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub models: Vec<String>,
    pub timeout: Duration,
}

impl GeminiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
            timeout: Duration::from_secs(120),
        }
    }

    /// Read `GEMINI_API_KEY`.
    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self::new(required_env("GEMINI_API_KEY")?))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.models = models.into_iter().map(Into::into).collect();
        self
    }
}

/// Gemini API client.
pub struct GeminiClient {
    config: GeminiConfig,
    client: Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(rename = "systemInstruction", skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
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
struct ResponsePart {
    #[serde(default)]
    text: String,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> ProviderResult<Self> {
        if config.models.is_empty() {
            return Err(ProviderError::config("no Gemini models configured"));
        }
        let client = build_client(config.timeout)?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> ProviderResult<Self> {
        Self::new(GeminiConfig::from_env()?)
    }

    async fn call_model(&self, model: &str, request: &CompletionRequest) -> ProviderResult<String> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.config.base_url.trim_end_matches('/'),
            model,
            self.config.api_key
        );

        let body = GeminiRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: request.prompt.clone(),
                }],
            }],
            system_instruction: request.system.as_ref().map(|s| Content {
                parts: vec![Part { text: s.clone() }],
            }),
            generation_config: GenerationConfig {
                response_mime_type: match request.format {
                    ResponseFormat::Json => "application/json",
                    ResponseFormat::Text => "text/plain",
                },
            },
        };

        let response = send_checked("gemini", "generate_content", self.client.post(&url).json(&body)).await?;
        let parsed: GeminiResponse = response.json().await?;

        let text: String = parsed
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ProviderError::invalid_response("no content in Gemini response"));
        }

        Ok(match request.format {
            ResponseFormat::Json => strip_code_fences(&text).to_string(),
            ResponseFormat::Text => text.trim().to_string(),
        })
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<String> {
        let mut last_error = None;

        for model in &self.config.models {
            info!(model = %model, "Calling Gemini");
            match self.call_model(model, request).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(model = %model, "Gemini model failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::request_failed("all Gemini models failed")))
    }
}
