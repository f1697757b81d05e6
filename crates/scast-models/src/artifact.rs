//! Per-scene artifacts and the assembled output.
//!
//! Every artifact carries the index of the scene it belongs to. Artifacts are
//! written once into a per-index slot and never shared between scenes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::backend::VideoBackend;
use crate::identity::IdentityModel;

/// Representative image generated for one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FirstFrame {
    pub scene_index: u32,

    /// Remote image URL handed to the video backend
    pub image_reference: String,

    /// Identity models applied, in role order (character, environment, object)
    pub identity_models_used: Vec<IdentityModel>,

    /// Prompt the frame was generated from
    pub prompt: String,

    /// Local copy, when downloaded into the run directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
}

/// Video clip generated for one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoClip {
    pub scene_index: u32,
    pub backend: VideoBackend,

    /// Duration requested by the scene plan
    pub requested_duration_seconds: f64,

    /// Duration actually generated (a member of the backend's allowed set)
    pub actual_duration_seconds: f64,

    /// The request exceeded the backend maximum and was clamped
    #[serde(default)]
    pub duration_clamped: bool,

    /// Local file the clip was written to
    pub file_reference: PathBuf,
}

/// Sound effect generated for one scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AudioClip {
    pub scene_index: u32,
    pub file_reference: PathBuf,

    /// Duration the clip was matched to (the video clip's actual duration)
    pub duration_seconds: f64,
}

/// One entry of the assembly timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OrderedClip {
    pub video: VideoClip,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioClip>,
}

impl OrderedClip {
    pub fn scene_index(&self) -> u32 {
        self.video.scene_index
    }
}

/// Final output of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssembledVideo {
    /// SHA-256 of the source script (hex)
    pub source_script_hash: String,

    /// Clips in ascending scene index order
    pub ordered_clips: Vec<OrderedClip>,

    pub output_reference: PathBuf,
}

impl AssembledVideo {
    /// Total duration of the included clips.
    pub fn total_duration_seconds(&self) -> f64 {
        self.ordered_clips
            .iter()
            .map(|c| c.video.actual_duration_seconds)
            .sum()
    }

    pub fn included_indices(&self) -> Vec<u32> {
        self.ordered_clips.iter().map(OrderedClip::scene_index).collect()
    }
}
