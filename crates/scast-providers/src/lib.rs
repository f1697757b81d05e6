//! Clients for the remote services behind the SceneCast pipeline.
//!
//! Each capability is a trait in [`services`] or [`llm`]; vendor clients
//! implement them:
//! - Gemini and Claude for scene planning and narration text
//! - fal for identity frames, identity training, fal-hosted video backends
//!   and file hosting
//! - Luma Dream Machine for the direct ray-2 backend
//! - ElevenLabs for sound effects and speech

pub mod anthropic;
pub mod elevenlabs;
pub mod error;
pub mod fal;
pub mod gemini;
pub mod http;
pub mod llm;
pub mod luma;
pub mod metrics;
pub mod retry;
pub mod services;

pub use anthropic::{AnthropicClient, AnthropicConfig};
pub use elevenlabs::{ElevenLabsClient, ElevenLabsConfig};
pub use error::{ProviderError, ProviderResult};
pub use fal::{FalClient, FalConfig, FalVideoEngine};
pub use gemini::{GeminiClient, GeminiConfig};
pub use llm::{strip_code_fences, CompletionRequest, LanguageModel, LanguageModelKind, ResponseFormat};
pub use luma::{LumaClient, LumaConfig};
pub use retry::{with_retry, RetryConfig};
pub use services::{
    FrameGenerator, FrameRequest, GeneratedImage, GeneratedVideo, IdentityTrainer, LoraWeight,
    MediaStore, SegmentRequest, SoundEffects, SpeechSynthesizer, TrainedWeights, TrainingRequest,
    VideoEngine,
};
