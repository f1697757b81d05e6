//! Sound effect stage.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use scast_models::{AudioClip, SceneDescriptor, VideoClip};
use scast_providers::elevenlabs::{MAX_SOUND_SECONDS, MIN_SOUND_SECONDS};
use scast_providers::{ProviderError, SoundEffects};

use crate::calls::bounded;
use crate::error::PipelineResult;

/// Generates one sound effect clip per scene.
pub struct AudioStage {
    sound: Arc<dyn SoundEffects>,
    call_timeout: Duration,
}

/// Duration to request for a clip of `clip_seconds`.
///
/// Never longer than the clip; the service limits bound it further.
pub fn sound_duration(clip_seconds: f64) -> f64 {
    clip_seconds.clamp(MIN_SOUND_SECONDS, MAX_SOUND_SECONDS)
}

impl AudioStage {
    pub fn new(sound: Arc<dyn SoundEffects>) -> Self {
        Self {
            sound,
            call_timeout: Duration::from_secs(600),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Generate the scene's sound effect into `scene_dir`.
    ///
    /// The caller only invokes this for scenes with a sound prompt. Audio
    /// longer than the clip is trimmed when muxed; shorter audio is padded
    /// with silence, never looped.
    pub async fn generate(
        &self,
        scene: &SceneDescriptor,
        clip: &VideoClip,
        scene_dir: &Path,
    ) -> PipelineResult<AudioClip> {
        let prompt = scene
            .sound_effect_prompt
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| ProviderError::request_failed("scene has no sound effect prompt"))?;

        let seconds = sound_duration(clip.actual_duration_seconds);
        let bytes = bounded(self.call_timeout, self.sound.generate_sound(prompt, seconds)).await?;
        if bytes.is_empty() {
            return Err(ProviderError::invalid_response("sound effect service returned no audio").into());
        }

        let path = scene_dir.join("sound_effect.mp3");
        tokio::fs::write(&path, &bytes).await?;

        info!(scene_index = scene.index, seconds, bytes = bytes.len(), "Generated sound effect");

        Ok(AudioClip {
            scene_index: scene.index,
            file_reference: path,
            duration_seconds: seconds,
        })
    }
}
