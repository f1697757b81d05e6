//! Per-scene outcomes and the run manifest.
//!
//! The manifest enumerates every planned scene index with its outcome, so a
//! partially successful run is always distinguishable from a full success.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::artifact::{AudioClip, FirstFrame, VideoClip};
use crate::backend::VideoBackend;
use crate::run::RunId;

/// Why a scene was left out of the assembled video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ExclusionReason {
    FrameFailed,
    VideoFailed,
    /// The run was cancelled before the scene started
    Cancelled,
    /// The clip could not be prepared for concatenation
    AssemblyFailed,
}

impl ExclusionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExclusionReason::FrameFailed => "FrameFailed",
            ExclusionReason::VideoFailed => "VideoFailed",
            ExclusionReason::Cancelled => "Cancelled",
            ExclusionReason::AssemblyFailed => "AssemblyFailed",
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Non-fatal conditions recorded alongside an outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind")]
pub enum Advisory {
    /// Requested duration exceeded the backend maximum
    DurationClamped { requested: f64, actual: f64 },
    /// Sound effect generation failed; the scene stays silent
    AudioFailed { message: String },
    /// Narration could not be produced; the video has no voice-over
    NarrationFailed { message: String },
}

/// A failure that excluded a scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SceneFailure {
    pub reason: ExclusionReason,
    pub message: String,
}

/// Terminal state of one scene after every stage has run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SceneOutcome {
    pub scene_index: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame: Option<FirstFrame>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoClip>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioClip>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<SceneFailure>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advisories: Vec<Advisory>,
}

impl SceneOutcome {
    pub fn new(scene_index: u32) -> Self {
        Self {
            scene_index,
            frame: None,
            video: None,
            audio: None,
            failure: None,
            advisories: Vec::new(),
        }
    }

    /// Outcome for a scene that never reached a video clip.
    pub fn failed(scene_index: u32, reason: ExclusionReason, message: impl Into<String>) -> Self {
        let mut outcome = Self::new(scene_index);
        outcome.fail(reason, message);
        outcome
    }

    pub fn fail(&mut self, reason: ExclusionReason, message: impl Into<String>) {
        self.video = None;
        self.audio = None;
        self.failure = Some(SceneFailure {
            reason,
            message: message.into(),
        });
    }

    pub fn advise(&mut self, advisory: Advisory) {
        self.advisories.push(advisory);
    }

    /// A scene survives when it has a clip and no recorded failure.
    pub fn survived(&self) -> bool {
        self.failure.is_none() && self.video.is_some()
    }

    pub fn status(&self) -> SceneStatus {
        match (&self.failure, &self.video) {
            (None, Some(_)) => SceneStatus::Included,
            (Some(failure), _) => SceneStatus::Excluded {
                reason: failure.reason,
            },
            // No clip and no failure means the video stage never reported
            (None, None) => SceneStatus::Excluded {
                reason: ExclusionReason::VideoFailed,
            },
        }
    }
}

/// Manifest status of a scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SceneStatus {
    Included,
    Excluded { reason: ExclusionReason },
}

/// One manifest line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ManifestEntry {
    pub scene_index: u32,
    #[serde(flatten)]
    pub status: SceneStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_duration_seconds: Option<f64>,
    #[serde(default)]
    pub has_audio: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advisories: Vec<Advisory>,
}

impl From<&SceneOutcome> for ManifestEntry {
    fn from(outcome: &SceneOutcome) -> Self {
        let status = outcome.status();
        Self {
            scene_index: outcome.scene_index,
            status,
            detail: outcome.failure.as_ref().map(|f| f.message.clone()),
            actual_duration_seconds: match status {
                SceneStatus::Included => {
                    outcome.video.as_ref().map(|v| v.actual_duration_seconds)
                }
                SceneStatus::Excluded { .. } => None,
            },
            has_audio: matches!(status, SceneStatus::Included) && outcome.audio.is_some(),
            advisories: outcome.advisories.clone(),
        }
    }
}

/// Report returned with every run, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunManifest {
    pub run_id: RunId,
    pub backend: VideoBackend,
    pub source_script_hash: String,
    pub audio_enabled: bool,

    /// Every planned scene in ascending index order
    pub scenes: Vec<ManifestEntry>,

    /// Run-level advisories (narration)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub advisories: Vec<Advisory>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_reference: Option<PathBuf>,

    pub created_at: DateTime<Utc>,
}

impl RunManifest {
    pub fn new(
        run_id: RunId,
        backend: VideoBackend,
        source_script_hash: impl Into<String>,
        audio_enabled: bool,
        outcomes: &[SceneOutcome],
    ) -> Self {
        let mut scenes: Vec<ManifestEntry> = outcomes.iter().map(ManifestEntry::from).collect();
        scenes.sort_by_key(|e| e.scene_index);

        Self {
            run_id,
            backend,
            source_script_hash: source_script_hash.into(),
            audio_enabled,
            scenes,
            advisories: Vec::new(),
            output_reference: None,
            created_at: Utc::now(),
        }
    }

    pub fn included(&self) -> Vec<u32> {
        self.scenes
            .iter()
            .filter(|e| e.status == SceneStatus::Included)
            .map(|e| e.scene_index)
            .collect()
    }

    pub fn excluded(&self) -> Vec<(u32, ExclusionReason)> {
        self.scenes
            .iter()
            .filter_map(|e| match e.status {
                SceneStatus::Excluded { reason } => Some((e.scene_index, reason)),
                SceneStatus::Included => None,
            })
            .collect()
    }

    pub fn is_full_success(&self) -> bool {
        self.excluded().is_empty()
    }
}
