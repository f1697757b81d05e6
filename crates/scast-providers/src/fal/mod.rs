//! fal.ai queue and storage client.
//!
//! Every fal model is invoked through the same queue protocol: submit the
//! arguments, poll the status URL until the request completes, then fetch
//! the result. Model-specific argument and result shapes live in the
//! submodules.

mod frames;
mod storage;
mod training;
mod video;

pub use frames::{FLUX_LORA_MODEL, DEFAULT_IMAGE_SIZE};
pub use training::TRAINING_MODEL;
pub use video::{FalVideoEngine, LTX_IMAGE_TO_VIDEO_MODEL, LUMA_IMAGE_TO_VIDEO_MODEL};

use std::time::{Duration, Instant};

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{ProviderError, ProviderResult};
use crate::http::{build_client, send_checked};

pub const DEFAULT_QUEUE_URL: &str = "https://queue.fal.run";
pub const DEFAULT_STORAGE_URL: &str = "https://rest.alpha.fal.ai";

#[derive(Debug, Clone)]
pub struct FalConfig {
    pub api_key: String,
    pub queue_url: String,
    pub storage_url: String,
    pub poll_interval: Duration,
    /// Longest wait for an inference request
    pub max_wait: Duration,
    /// Longest wait for a training request
    pub training_max_wait: Duration,
    pub timeout: Duration,
}

impl FalConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            queue_url: DEFAULT_QUEUE_URL.to_string(),
            storage_url: DEFAULT_STORAGE_URL.to_string(),
            poll_interval: Duration::from_secs(2),
            max_wait: Duration::from_secs(600),
            training_max_wait: Duration::from_secs(3600),
            timeout: Duration::from_secs(120),
        }
    }

    /// Read `FAL_KEY`, falling back to `FAL_API_KEY`.
    pub fn from_env() -> ProviderResult<Self> {
        ["FAL_KEY", "FAL_API_KEY"]
            .iter()
            .find_map(|name| std::env::var(name).ok().filter(|v| !v.trim().is_empty()))
            .map(Self::new)
            .ok_or_else(|| ProviderError::config("FAL_KEY not set"))
    }

    /// Point queue and storage at one base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        self.queue_url = base_url.clone();
        self.storage_url = base_url;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }
}

/// fal.ai API client.
#[derive(Clone)]
pub struct FalClient {
    config: FalConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct QueueSubmission {
    request_id: String,
    status_url: Option<String>,
    response_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueueStatus {
    status: String,
    #[serde(default)]
    error: Option<String>,
}

/// Remote file reference in fal results.
#[derive(Debug, Deserialize)]
pub(crate) struct FalFile {
    pub url: String,
}

impl FalClient {
    pub fn new(config: FalConfig) -> ProviderResult<Self> {
        let client = build_client(config.timeout)?;
        Ok(Self { config, client })
    }

    pub fn from_env() -> ProviderResult<Self> {
        Self::new(FalConfig::from_env()?)
    }

    pub fn config(&self) -> &FalConfig {
        &self.config
    }

    pub(crate) fn http(&self) -> &Client {
        &self.client
    }

    pub(crate) fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request.header("Authorization", format!("Key {}", self.config.api_key))
    }

    /// Run a model through the queue and decode its result.
    pub async fn run<T: DeserializeOwned>(
        &self,
        model: &str,
        arguments: &Value,
        max_wait: Duration,
    ) -> ProviderResult<T> {
        let queue_url = self.config.queue_url.trim_end_matches('/');

        let submission: QueueSubmission = send_checked(
            "fal",
            "submit",
            self.authorized(self.client.post(format!("{}/{}", queue_url, model)))
                .json(arguments),
        )
        .await?
        .json()
        .await?;

        info!(model = %model, request_id = %submission.request_id, "fal request queued");

        let request_base = format!("{}/{}/requests/{}", queue_url, model, submission.request_id);
        let status_url = submission
            .status_url
            .unwrap_or_else(|| format!("{}/status", request_base));
        let response_url = submission.response_url.unwrap_or(request_base);

        self.wait_for_completion(&status_url, max_wait).await?;

        let result = send_checked(
            "fal",
            "result",
            self.authorized(self.client.get(&response_url)),
        )
        .await?
        .json::<Value>()
        .await?;

        serde_json::from_value(result.clone()).map_err(|e| {
            ProviderError::invalid_response(format!("unexpected {} result ({}): {}", model, e, result))
        })
    }

    async fn wait_for_completion(&self, status_url: &str, max_wait: Duration) -> ProviderResult<()> {
        let started = Instant::now();

        loop {
            let status: QueueStatus = send_checked(
                "fal",
                "status",
                self.authorized(self.client.get(status_url)),
            )
            .await?
            .json()
            .await?;

            match status.status.as_str() {
                "COMPLETED" => {
                    return match status.error {
                        Some(error) => Err(ProviderError::generation_failed(error)),
                        None => Ok(()),
                    };
                }
                "IN_QUEUE" | "IN_PROGRESS" => {
                    debug!(status = %status.status, "fal request pending");
                }
                other => {
                    return Err(ProviderError::invalid_response(format!(
                        "unknown fal queue status: {}",
                        other
                    )));
                }
            }

            if started.elapsed() >= max_wait {
                return Err(ProviderError::Timeout(started.elapsed()));
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}
