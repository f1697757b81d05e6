//! Local media operations used by the pipeline.
//!
//! [`MediaEditor`] is the seam between orchestration and FFmpeg, so the
//! orchestrator can be driven without FFmpeg installed.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::watch;

use scast_media::{FfmpegRunner, MediaResult};
use scast_models::EncodingConfig;

/// File-level video and audio operations.
#[async_trait]
pub trait MediaEditor: Send + Sync {
    /// Duration of a media file in seconds.
    async fn duration(&self, path: &Path) -> MediaResult<f64>;

    /// Whether the file carries an audio stream.
    async fn has_audio(&self, path: &Path) -> MediaResult<bool>;

    /// Join segments of one clip without re-encoding.
    async fn concat_segments(&self, inputs: &[PathBuf], output: &Path) -> MediaResult<()>;

    /// Write the final frame of a video as an image.
    async fn extract_last_frame(&self, video: &Path, output: &Path) -> MediaResult<()>;

    /// Put `audio` under `video`, trimmed or padded with silence to `duration`.
    async fn mux_audio(&self, video: &Path, audio: &Path, output: &Path, duration: f64) -> MediaResult<()>;

    /// Give a video a silent audio track of `duration`.
    async fn add_silent_track(&self, video: &Path, output: &Path, duration: f64) -> MediaResult<()>;

    /// Concatenate scene clips, in the given order, into the final video.
    async fn concat_scenes(&self, inputs: &[PathBuf], output: &Path, expected_seconds: f64) -> MediaResult<()>;

    /// Stretch or compress speech to `target_seconds`.
    async fn fit_tempo(&self, audio: &Path, output: &Path, target_seconds: f64) -> MediaResult<()>;

    /// Mix narration over the video's existing audio.
    async fn mix_narration(&self, video: &Path, narration: &Path, output: &Path) -> MediaResult<()>;
}

/// [`MediaEditor`] backed by the FFmpeg CLI.
#[derive(Debug, Clone)]
pub struct FfmpegEditor {
    runner: FfmpegRunner,
    encoding: EncodingConfig,
}

impl FfmpegEditor {
    pub fn new(encoding: EncodingConfig) -> Self {
        Self {
            runner: FfmpegRunner::new(),
            encoding,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.runner = self.runner.with_timeout(secs);
        self
    }

    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.runner = self.runner.with_cancel(cancel_rx);
        self
    }

    pub fn encoding(&self) -> &EncodingConfig {
        &self.encoding
    }
}

#[async_trait]
impl MediaEditor for FfmpegEditor {
    async fn duration(&self, path: &Path) -> MediaResult<f64> {
        scast_media::probe_duration(path).await
    }

    async fn has_audio(&self, path: &Path) -> MediaResult<bool> {
        Ok(scast_media::probe_media(path).await?.has_audio)
    }

    async fn concat_segments(&self, inputs: &[PathBuf], output: &Path) -> MediaResult<()> {
        scast_media::concat_segments(&self.runner, inputs, output).await
    }

    async fn extract_last_frame(&self, video: &Path, output: &Path) -> MediaResult<()> {
        scast_media::extract_last_frame(&self.runner, video, output).await
    }

    async fn mux_audio(&self, video: &Path, audio: &Path, output: &Path, duration: f64) -> MediaResult<()> {
        scast_media::mux_audio(&self.runner, video, audio, output, duration, &self.encoding).await
    }

    async fn add_silent_track(&self, video: &Path, output: &Path, duration: f64) -> MediaResult<()> {
        scast_media::add_silent_track(&self.runner, video, output, duration, &self.encoding).await
    }

    async fn concat_scenes(&self, inputs: &[PathBuf], output: &Path, expected_seconds: f64) -> MediaResult<()> {
        scast_media::concat_scenes(&self.runner, inputs, output, &self.encoding, expected_seconds).await
    }

    async fn fit_tempo(&self, audio: &Path, output: &Path, target_seconds: f64) -> MediaResult<()> {
        let current = scast_media::probe_duration(audio).await?;
        scast_media::fit_tempo(&self.runner, audio, output, current, target_seconds).await
    }

    async fn mix_narration(&self, video: &Path, narration: &Path, output: &Path) -> MediaResult<()> {
        scast_media::mix_narration(&self.runner, video, narration, output, &self.encoding).await
    }
}
