//! Shared data models for the SceneCast pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Identity models and the roles they play in a prompt
//! - Scene descriptors produced by the planner
//! - Per-scene artifacts (first frames, video clips, audio clips)
//! - Video backends and their capability tables
//! - Quality presets and encoding configuration
//! - The run manifest returned to callers

pub mod artifact;
pub mod backend;
pub mod encoding;
pub mod identity;
pub mod manifest;
pub mod preset;
pub mod run;
pub mod scene;

// Re-export common types
pub use artifact::{AssembledVideo, AudioClip, FirstFrame, OrderedClip, VideoClip};
pub use backend::{CapabilityTable, DurationChoice, Resolution, VideoBackend};
pub use encoding::EncodingConfig;
pub use identity::{IdentityModel, IdentityRole, IdentitySelection};
pub use manifest::{
    Advisory, ExclusionReason, ManifestEntry, RunManifest, SceneFailure, SceneOutcome, SceneStatus,
};
pub use preset::{QualityPreset, SceneCount};
pub use run::RunId;
pub use scene::SceneDescriptor;

use thiserror::Error;

/// Errors raised while parsing model values from user input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Unknown video backend: {0}")]
    UnknownBackend(String),

    #[error("Unknown identity role: {0}")]
    UnknownRole(String),

    #[error("Invalid quality preset: {0}")]
    InvalidPreset(String),
}

pub type ModelResult<T> = Result<T, ModelError>;
