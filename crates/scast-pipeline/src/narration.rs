//! Optional voice-over narration.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use scast_models::SceneDescriptor;
use scast_providers::{ProviderError, SpeechSynthesizer};

use crate::calls::bounded;
use crate::error::PipelineResult;
use crate::media::MediaEditor;
use crate::planner::ScenePlanner;

/// Writes, voices and mixes a narration over an assembled video.
pub struct Narrator {
    speech: Arc<dyn SpeechSynthesizer>,
    editor: Arc<dyn MediaEditor>,
    call_timeout: Duration,
}

impl Narrator {
    pub fn new(speech: Arc<dyn SpeechSynthesizer>, editor: Arc<dyn MediaEditor>) -> Self {
        Self {
            speech,
            editor,
            call_timeout: Duration::from_secs(600),
        }
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Narrate `video` and return the narrated file.
    ///
    /// `scenes` are the scenes that made it into the video, in order.
    pub async fn narrate(
        &self,
        planner: &ScenePlanner,
        scenes: &[&SceneDescriptor],
        video: &Path,
        total_seconds: f64,
        run_dir: &Path,
    ) -> PipelineResult<PathBuf> {
        let text = planner.write_narration(scenes, total_seconds).await?;
        if text.is_empty() {
            return Err(ProviderError::invalid_response("narration text is empty").into());
        }
        tokio::fs::write(run_dir.join("narration.txt"), &text).await?;

        let speech = bounded(self.call_timeout, self.speech.synthesize(&text)).await?;
        let raw = run_dir.join("narration.mp3");
        tokio::fs::write(&raw, &speech).await?;

        let fitted = run_dir.join("narration_fitted.mp3");
        self.editor.fit_tempo(&raw, &fitted, total_seconds).await?;

        let output = run_dir.join("final_video_narrated.mp4");
        self.editor.mix_narration(video, &fitted, &output).await?;

        info!(words = text.split_whitespace().count(), "Mixed narration");
        Ok(output)
    }
}
