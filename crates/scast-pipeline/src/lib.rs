//! SceneCast pipeline.
//!
//! This crate provides:
//! - The identity registry and training flow
//! - The scene planner (environment palette, scene plan, narration text)
//! - Per-scene stages: first frame, video clip, sound effect
//! - Assembly of surviving clips and the run manifest
//! - The run orchestrator with bounded concurrency and cancellation

pub mod assembler;
pub mod audio;
mod calls;
pub mod clips;
pub mod config;
pub mod error;
pub mod frames;
pub mod logging;
pub mod media;
pub mod metrics;
pub mod narration;
pub mod pipeline;
pub mod planner;
pub mod registry;
pub mod training;

pub use assembler::{plan_assembly, Assembler, AssemblyPlan, PreparedClips};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use logging::RunLogger;
pub use media::{FfmpegEditor, MediaEditor};
pub use pipeline::{GenerationRequest, Pipeline, RunOutput, Services};
pub use planner::{EnvironmentSource, SceneCountPolicy, ScenePlanner};
pub use registry::IdentityRegistry;
pub use training::TrainingFlow;
