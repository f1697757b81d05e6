//! Pipeline error types.

use thiserror::Error;

use scast_media::MediaError;
use scast_models::{IdentityRole, ModelError, RunManifest};
use scast_providers::ProviderError;

pub type PipelineResult<T> = Result<T, PipelineError>;

/// Run-level failures.
///
/// Per-scene failures are never errors; they are recorded as scene
/// outcomes in the manifest.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Planning failed: {0}")]
    PlanningFailed(String),

    #[error("Assembly empty: every scene failed")]
    AssemblyEmpty { manifest: Box<RunManifest> },

    #[error("Scene set is incomplete: {0}")]
    IncompleteSceneSet(String),

    #[error("Training failed: {0}")]
    TrainingFailed(String),

    #[error("Run cancelled")]
    Cancelled { manifest: Box<RunManifest> },

    #[error("Identity model already exists: {role} {trigger_word}")]
    DuplicateIdentity {
        role: IdentityRole,
        trigger_word: String,
    },

    #[error("Unknown identity model: {role} {trigger_word}")]
    UnknownIdentity {
        role: IdentityRole,
        trigger_word: String,
    },

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn planning_failed(msg: impl Into<String>) -> Self {
        Self::PlanningFailed(msg.into())
    }

    pub fn training_failed(msg: impl Into<String>) -> Self {
        Self::TrainingFailed(msg.into())
    }

    pub fn registry(msg: impl Into<String>) -> Self {
        Self::Registry(msg.into())
    }

    /// Short machine-readable kind, used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidRequest(_) => "InvalidRequest",
            PipelineError::PlanningFailed(_) => "PlanningFailed",
            PipelineError::AssemblyEmpty { .. } => "AssemblyEmpty",
            PipelineError::IncompleteSceneSet(_) => "IncompleteSceneSet",
            PipelineError::TrainingFailed(_) => "TrainingFailed",
            PipelineError::Cancelled { .. } => "Cancelled",
            PipelineError::DuplicateIdentity { .. } => "DuplicateIdentity",
            PipelineError::UnknownIdentity { .. } => "UnknownIdentity",
            PipelineError::Registry(_) => "Registry",
            PipelineError::Model(_) => "Model",
            PipelineError::Provider(_) => "Provider",
            PipelineError::Media(_) => "Media",
            PipelineError::Io(_) => "Io",
            PipelineError::Json(_) => "Json",
        }
    }

    /// Partial manifest carried by run-level failures that happen after planning.
    pub fn manifest(&self) -> Option<&RunManifest> {
        match self {
            PipelineError::AssemblyEmpty { manifest } | PipelineError::Cancelled { manifest } => {
                Some(manifest)
            }
            _ => None,
        }
    }
}
