//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root directory for run outputs
    pub output_dir: PathBuf,
    /// Directory holding identity model records
    pub registry_dir: PathBuf,
    /// Maximum scenes processed concurrently within a run
    pub max_scene_parallel: usize,
    /// Timeout applied to every remote call
    pub call_timeout: Duration,
    /// Retries after the first video generation attempt
    pub video_max_retries: u32,
    /// Base delay for retry backoff
    pub retry_base_delay: Duration,
    /// Upper bound for automatically chosen scene counts
    pub max_scenes: u32,
    /// Size of the environment palette
    pub max_environments: u32,
    /// Timeout for each FFmpeg invocation
    pub ffmpeg_timeout_secs: u64,
    /// LoRA scale applied to every identity model in a frame
    pub lora_scale: f64,
    /// Training steps for new identity models
    pub training_steps: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("generated_videos"),
            registry_dir: PathBuf::from("trained_identities"),
            max_scene_parallel: 4,
            call_timeout: Duration::from_secs(600),
            video_max_retries: 2,
            retry_base_delay: Duration::from_millis(2000),
            max_scenes: 5,
            max_environments: 3,
            ffmpeg_timeout_secs: 600,
            lora_scale: 1.0,
            training_steps: 1000,
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            output_dir: std::env::var("SCAST_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            registry_dir: std::env::var("SCAST_REGISTRY_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.registry_dir),
            max_scene_parallel: env_or("SCAST_MAX_SCENE_PARALLEL", defaults.max_scene_parallel).max(1),
            call_timeout: Duration::from_secs(env_or(
                "SCAST_CALL_TIMEOUT_SECS",
                defaults.call_timeout.as_secs(),
            )),
            video_max_retries: env_or("SCAST_VIDEO_MAX_RETRIES", defaults.video_max_retries),
            retry_base_delay: Duration::from_millis(env_or(
                "SCAST_RETRY_BASE_MS",
                defaults.retry_base_delay.as_millis() as u64,
            )),
            max_scenes: env_or("SCAST_MAX_SCENES", defaults.max_scenes).max(1),
            max_environments: env_or("SCAST_MAX_ENVIRONMENTS", defaults.max_environments),
            ffmpeg_timeout_secs: env_or("SCAST_FFMPEG_TIMEOUT_SECS", defaults.ffmpeg_timeout_secs),
            lora_scale: env_or("SCAST_LORA_SCALE", defaults.lora_scale),
            training_steps: env_or("SCAST_TRAINING_STEPS", defaults.training_steps),
        }
    }
}
