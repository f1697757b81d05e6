//! Luma Dream Machine client (ray-2, direct API).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use scast_models::VideoBackend;

use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, required_env, send_checked};
use crate::services::{GeneratedVideo, SegmentRequest, VideoEngine};

pub const DEFAULT_BASE_URL: &str = "https://api.lumalabs.ai/dream-machine/v1";
pub const DEFAULT_MODEL: &str = "ray-2";

#[derive(Debug, Clone)]
pub struct LumaConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub poll_interval: Duration,
    pub max_wait: Duration,
    pub timeout: Duration,
}

impl LumaConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            poll_interval: Duration::from_secs(3),
            max_wait: Duration::from_secs(300),
            timeout: Duration::from_secs(60),
        }
    }

    /// Read `LUMAAI_API_KEY`.
    pub fn from_env() -> ProviderResult<Self> {
        Ok(Self::new(required_env("LUMAAI_API_KEY")?))
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_polling(mut self, interval: Duration, max_wait: Duration) -> Self {
        self.poll_interval = interval;
        self.max_wait = max_wait;
        self
    }
}

#[derive(Debug, Serialize)]
struct GenerationRequest<'a> {
    prompt: &'a str,
    model: &'a str,
    resolution: &'a str,
    duration: String,
    keyframes: Keyframes<'a>,
}

#[derive(Debug, Serialize)]
struct Keyframes<'a> {
    frame0: Keyframe<'a>,
}

#[derive(Debug, Serialize)]
struct Keyframe<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    url: &'a str,
}

#[derive(Debug, Deserialize)]
struct Generation {
    id: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    failure_reason: Option<String>,
    #[serde(default)]
    assets: Option<Assets>,
}

#[derive(Debug, Deserialize)]
struct Assets {
    video: Option<String>,
}

/// Luma ray-2 image-to-video engine.
pub struct LumaClient {
    config: LumaConfig,
    client: Client,
}

impl LumaClient {
    pub fn new(config: LumaConfig) -> ProviderResult<Self> {
        let client = build_client(config.timeout)?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> ProviderResult<Self> {
        Self::new(LumaConfig::from_env()?)
    }

    fn url(&self, suffix: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), suffix)
    }

    async fn poll(&self, id: &str) -> ProviderResult<String> {
        let started = Instant::now();

        loop {
            let generation: Generation = send_checked(
                "luma",
                "get_generation",
                self.client
                    .get(self.url(&format!("/generations/{}", id)))
                    .bearer_auth(&self.config.api_key),
            )
            .await?
            .json()
            .await?;

            match generation.state.as_str() {
                "completed" => {
                    return generation
                        .assets
                        .and_then(|a| a.video)
                        .ok_or_else(|| ProviderError::invalid_response("completed generation has no video"));
                }
                "failed" => {
                    return Err(ProviderError::generation_failed(
                        generation
                            .failure_reason
                            .unwrap_or_else(|| "unknown reason".to_string()),
                    ));
                }
                state => debug!(generation_id = %id, state = %state, "Luma generation pending"),
            }

            if started.elapsed() >= self.config.max_wait {
                return Err(ProviderError::Timeout(started.elapsed()));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

#[async_trait]
impl VideoEngine for LumaClient {
    fn backend(&self) -> VideoBackend {
        VideoBackend::EngineA
    }

    async fn generate_segment(&self, request: &SegmentRequest) -> ProviderResult<GeneratedVideo> {
        let body = GenerationRequest {
            prompt: &request.prompt,
            model: &self.config.model,
            resolution: request.resolution.as_str(),
            duration: format!("{}s", request.duration_seconds),
            keyframes: Keyframes {
                frame0: Keyframe {
                    kind: "image",
                    url: &request.image_url,
                },
            },
        };

        let created: Generation = send_checked(
            "luma",
            "create_generation",
            self.client
                .post(self.url("/generations"))
                .bearer_auth(&self.config.api_key)
                .json(&body),
        )
        .await?
        .json()
        .await?;

        info!(generation_id = %created.id, duration = request.duration_seconds, "Luma generation created");

        let url = self.poll(&created.id).await?;
        Ok(GeneratedVideo {
            url,
            duration_seconds: request.duration_seconds,
        })
    }
}
