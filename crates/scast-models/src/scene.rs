//! Scene descriptor models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// The structured plan for one segment of the output video.
///
/// Produced once by the planner. `index` is 0-based and is the only
/// ordering the rest of the pipeline relies on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SceneDescriptor {
    /// Position in the final video (0-based, contiguous)
    pub index: u32,

    /// Short name capturing the moment
    #[serde(default)]
    pub scene_name: String,

    /// Physical setting, lighting, weather, time of day
    pub environment_description: String,

    /// Character movement and object interactions
    pub movement_description: String,

    /// Mood and emotional cues
    #[serde(default)]
    pub emotions: String,

    /// Shot type, angle and camera movement ("static" when none)
    pub camera_instruction: String,

    /// Requested duration before backend quantization
    pub duration_seconds: f64,

    /// Sound effect prompt; absent when the scene should stay silent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sound_effect_prompt: Option<String>,
}

impl SceneDescriptor {
    /// Prompt text sent to the video backend.
    pub fn video_prompt(&self) -> String {
        let mut sections = vec![self.environment_description.trim().to_string()];
        sections.push(format!(
            "Movement and Action:\n{}",
            self.movement_description.trim()
        ));
        if !self.emotions.trim().is_empty() {
            sections.push(format!("Emotional Atmosphere:\n{}", self.emotions.trim()));
        }
        sections.push(format!(
            "Camera Instructions:\n{}",
            self.camera_instruction.trim()
        ));
        sections.join("\n\n")
    }

    /// Hint describing where this scene leaves off, for the scene after it.
    pub fn continuity_hint(&self) -> String {
        format!(
            "Continues from the previous scene: {}",
            self.movement_description.trim()
        )
    }

    /// Whether a sound effect should be requested for this scene.
    pub fn wants_sound(&self) -> bool {
        self.sound_effect_prompt
            .as_deref()
            .map(|p| !p.trim().is_empty())
            .unwrap_or(false)
    }
}
