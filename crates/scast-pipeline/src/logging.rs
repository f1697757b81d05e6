//! Structured run logging.
//!
//! Every event carries `run_id` and `backend`; scene events add
//! `scene_index` and the `stage` that failed.

use std::fmt::Display;
use std::path::Path;

use tracing::{error, info, warn, Span};

use scast_models::{QualityPreset, RunId, RunManifest, VideoBackend};

use crate::error::PipelineError;

/// Logger for one generation run.
#[derive(Debug, Clone)]
pub struct RunLogger {
    run_id: String,
    backend: VideoBackend,
}

impl RunLogger {
    pub fn new(run_id: &RunId, backend: VideoBackend) -> Self {
        Self {
            run_id: run_id.to_string(),
            backend,
        }
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn backend(&self) -> VideoBackend {
        self.backend
    }

    pub fn span(&self) -> Span {
        tracing::info_span!("run", run_id = %self.run_id, backend = %self.backend)
    }

    pub fn scene_span(&self, scene_index: u32) -> Span {
        tracing::info_span!("scene", run_id = %self.run_id, scene_index)
    }

    pub fn started(&self, preset: &QualityPreset, audio: bool, narration: bool) {
        info!(
            run_id = %self.run_id,
            backend = %self.backend,
            preset = %preset,
            audio,
            narration,
            "Run started"
        );
    }

    pub fn planned(&self, scenes: usize, environments: usize) {
        info!(run_id = %self.run_id, scenes, environments, "Scene plan ready");
    }

    /// Metadata-only runs end once the plan is on disk.
    pub fn plan_only(&self, run_dir: &Path) {
        info!(run_id = %self.run_id, run_dir = %run_dir.display(), "Run stopped after planning");
    }

    /// A stage failure that excludes the scene.
    pub fn scene_failed(&self, scene_index: u32, stage: &str, error: impl Display) {
        warn!(
            run_id = %self.run_id,
            backend = %self.backend,
            scene_index,
            stage,
            "Scene excluded: {}", error
        );
    }

    /// A failure the scene survives without, e.g. a missing sound effect.
    pub fn scene_degraded(&self, scene_index: u32, stage: &str, error: impl Display) {
        warn!(
            run_id = %self.run_id,
            scene_index,
            stage,
            "Scene degraded: {}", error
        );
    }

    pub fn narration_failed(&self, error: impl Display) {
        warn!(run_id = %self.run_id, "Narration skipped: {}", error);
    }

    pub fn cancelled(&self, manifest: &RunManifest) {
        warn!(
            run_id = %self.run_id,
            completed = ?manifest.included(),
            "Run cancelled before assembly"
        );
    }

    pub fn finished(&self, manifest: &RunManifest, output: &Path) {
        info!(
            run_id = %self.run_id,
            backend = %self.backend,
            included = ?manifest.included(),
            excluded = ?manifest.excluded(),
            output = %output.display(),
            "Run completed"
        );
    }

    pub fn failed(&self, err: &PipelineError) {
        error!(run_id = %self.run_id, kind = err.kind(), "Run failed: {}", err);
    }
}
