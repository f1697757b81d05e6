//! Scene planner.
//!
//! Turns a script into an ordered list of [`SceneDescriptor`]s by asking a
//! language model, in two calls:
//! 1. an optional environment palette (degrades to none on any failure)
//! 2. the scene plan itself, validated against the preset bound
//!
//! A malformed plan is retried once with a stricter prompt. A second
//! malformed plan fails the run; partial plans are never returned.

mod parse;
mod policy;
pub(crate) mod prompts;

pub use parse::{parse_environments, parse_scene_plan, PlanDefect};
pub use policy::SceneCountPolicy;

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use scast_models::{QualityPreset, SceneDescriptor, VideoBackend};
use scast_providers::{with_retry, CompletionRequest, LanguageModel, ProviderResult, RetryConfig};

use crate::calls::bounded;
use crate::error::{PipelineError, PipelineResult};

/// Longest script accepted for planning, in characters.
pub const MAX_SCRIPT_CHARS: usize = 10_000;

/// Where the environment palette comes from.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum EnvironmentSource {
    /// Ask the model with the built-in prompt
    #[default]
    Generate,
    /// Ask the model with a caller-supplied prompt
    CustomPrompt(String),
    /// Use these environments as-is
    Fixed(Vec<String>),
    /// Plan scenes without a palette
    Disabled,
}

/// Plans scenes with a language model.
pub struct ScenePlanner {
    llm: Arc<dyn LanguageModel>,
    policy: SceneCountPolicy,
    retry: RetryConfig,
    call_timeout: Duration,
    max_environments: u32,
}

impl ScenePlanner {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self {
            llm,
            policy: SceneCountPolicy::default(),
            retry: RetryConfig::default(),
            call_timeout: Duration::from_secs(600),
            max_environments: 3,
        }
    }

    pub fn with_policy(mut self, policy: SceneCountPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_max_environments(mut self, max: u32) -> Self {
        self.max_environments = max;
        self
    }

    pub fn model_name(&self) -> &str {
        self.llm.name()
    }

    async fn complete(&self, operation: &str, request: CompletionRequest) -> ProviderResult<String> {
        let llm = self.llm.as_ref();
        let request = &request;
        let limit = self.call_timeout;
        with_retry(&self.retry, operation, move |_| bounded(limit, llm.complete(request))).await
    }

    /// Build the environment palette. Never fails; problems yield an empty palette.
    pub async fn plan_environments(&self, script: &str, source: &EnvironmentSource) -> Vec<String> {
        let limit = self.max_environments as usize;
        let custom = match source {
            EnvironmentSource::Disabled => return Vec::new(),
            EnvironmentSource::Fixed(environments) => {
                return environments.iter().take(limit.max(1)).cloned().collect();
            }
            EnvironmentSource::CustomPrompt(prompt) => Some(prompt.as_str()),
            EnvironmentSource::Generate => None,
        };

        if limit == 0 {
            return Vec::new();
        }

        let request = CompletionRequest::json(prompts::environment_prompt(
            script,
            self.max_environments,
            custom,
        ))
        .with_system(prompts::ENVIRONMENT_SYSTEM);

        match self.complete("plan_environments", request).await {
            Ok(text) => match parse_environments(&text, limit) {
                Some(environments) => {
                    info!(count = environments.len(), "Planned environment palette");
                    environments
                }
                None => {
                    warn!("Environment palette response was malformed, continuing without one");
                    Vec::new()
                }
            },
            Err(e) => {
                warn!("Environment palette request failed, continuing without one: {}", e);
                Vec::new()
            }
        }
    }

    /// Plan the scenes for `script`.
    ///
    /// Returned descriptors have indices `0..N-1` and a count accepted by
    /// `preset`.
    pub async fn plan_scenes(
        &self,
        script: &str,
        preset: &QualityPreset,
        backend: VideoBackend,
        environments: &[String],
    ) -> PipelineResult<Vec<SceneDescriptor>> {
        validate_script(script)?;

        let bound = preset.scene_count;
        if bound.max() == 0 {
            return Err(PipelineError::invalid_request("preset allows zero scenes"));
        }

        let suggested = self.policy.suggest(script, bound);
        let prompt = prompts::scene_prompt(script, bound, suggested, backend, environments);

        let first = self.request_plan(&prompt).await?;
        let defect = match parse_scene_plan(&first, bound) {
            Ok(scenes) => {
                info!(scenes = scenes.len(), model = self.llm.name(), "Planned scenes");
                return Ok(scenes);
            }
            Err(defect) => defect,
        };

        warn!("Scene plan was malformed, retrying with a stricter prompt: {}", defect);

        let strict = prompts::strict_scene_prompt(&prompt, &defect, bound);
        let second = self.request_plan(&strict).await?;
        match parse_scene_plan(&second, bound) {
            Ok(scenes) => {
                info!(scenes = scenes.len(), model = self.llm.name(), "Planned scenes on retry");
                Ok(scenes)
            }
            Err(defect) => Err(PipelineError::planning_failed(format!(
                "scene plan still malformed after retry: {}",
                defect
            ))),
        }
    }

    async fn request_plan(&self, prompt: &str) -> PipelineResult<String> {
        let request = CompletionRequest::json(prompt).with_system(prompts::SCENE_SYSTEM);
        self.complete("plan_scenes", request)
            .await
            .map_err(|e| PipelineError::planning_failed(format!("language model request failed: {}", e)))
    }

    /// Write a voice-over text for the given scenes.
    pub async fn write_narration(
        &self,
        scenes: &[&SceneDescriptor],
        total_seconds: f64,
    ) -> ProviderResult<String> {
        let request = CompletionRequest::text(prompts::narration_prompt(scenes, total_seconds))
            .with_system(prompts::NARRATION_SYSTEM);
        let text = self.complete("write_narration", request).await?;
        Ok(text.trim().to_string())
    }
}

fn validate_script(script: &str) -> PipelineResult<()> {
    let chars = script.trim().chars().count();
    if chars == 0 {
        return Err(PipelineError::invalid_request("script is empty"));
    }
    if chars > MAX_SCRIPT_CHARS {
        return Err(PipelineError::invalid_request(format!(
            "script is {} characters, limit is {}",
            chars, MAX_SCRIPT_CHARS
        )));
    }
    Ok(())
}
