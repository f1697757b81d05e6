//! Per-capability service traits.
//!
//! Every remote collaborator sits behind one of these traits so the pipeline
//! never depends on a specific vendor and tests can substitute fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

use scast_models::{IdentityRole, Resolution, VideoBackend};

use crate::error::ProviderResult;

/// LoRA weights applied to an image generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoraWeight {
    pub path: String,
    pub scale: f64,
}

/// Request for one identity-conditioned image.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameRequest {
    pub prompt: String,
    pub loras: Vec<LoraWeight>,
    /// Named size preset understood by the image service
    pub image_size: String,
}

/// A generated image hosted remotely.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub url: String,
}

#[async_trait]
pub trait FrameGenerator: Send + Sync {
    async fn generate_frame(&self, request: &FrameRequest) -> ProviderResult<GeneratedImage>;
}

/// Request for one native-length video segment.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentRequest {
    /// Starting image
    pub image_url: String,
    pub prompt: String,
    /// One of the backend's native segment lengths
    pub duration_seconds: u32,
    pub resolution: Resolution,
}

/// A generated video hosted remotely.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedVideo {
    pub url: String,
    pub duration_seconds: u32,
}

/// One video generation backend.
#[async_trait]
pub trait VideoEngine: Send + Sync {
    fn backend(&self) -> VideoBackend;

    async fn generate_segment(&self, request: &SegmentRequest) -> ProviderResult<GeneratedVideo>;
}

/// Sound effect generation. Returns encoded audio (mp3).
#[async_trait]
pub trait SoundEffects: Send + Sync {
    async fn generate_sound(&self, prompt: &str, duration_seconds: f64) -> ProviderResult<Vec<u8>>;
}

/// Text-to-speech. Returns encoded audio (mp3).
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> ProviderResult<Vec<u8>>;
}

/// Identity training request: an uploaded image archive and its trigger word.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRequest {
    pub images_archive_url: String,
    pub trigger_word: String,
    pub role: IdentityRole,
    pub steps: u32,
    pub create_masks: bool,
}

/// Weights produced by a finished training job.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainedWeights {
    /// LoRA weights URL, used as the identity model's remote handle
    pub lora_url: String,
    pub config_url: Option<String>,
}

#[async_trait]
pub trait IdentityTrainer: Send + Sync {
    async fn train(&self, request: &TrainingRequest) -> ProviderResult<TrainedWeights>;
}

/// Moves files between local disk and remote storage.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Upload a local file and return a URL remote services can read.
    async fn upload(&self, path: &Path, content_type: &str) -> ProviderResult<String>;

    /// Download a remote file into `path`.
    async fn download(&self, url: &str, path: &Path) -> ProviderResult<()>;
}
