//! Video clip stage.
//!
//! Requests a clip of the quantized duration from the run's backend. Clips
//! longer than one native call are generated as segments: the first starts
//! from the scene's first frame, every later one from the last frame of the
//! segment before it. Segments are then joined into the scene clip.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use scast_models::{FirstFrame, SceneDescriptor, VideoBackend, VideoClip};
use scast_providers::{with_retry, MediaStore, RetryConfig, SegmentRequest, VideoEngine};

use crate::calls::bounded;
use crate::error::PipelineResult;
use crate::media::MediaEditor;

/// Generates one clip per scene on a single backend.
pub struct ClipStage {
    engine: Arc<dyn VideoEngine>,
    store: Arc<dyn MediaStore>,
    editor: Arc<dyn MediaEditor>,
    retry: RetryConfig,
    call_timeout: Duration,
}

/// Prompt sent to the backend, with the previous scene's hint when the
/// backend supports continuity.
pub fn clip_prompt(
    backend: VideoBackend,
    scene: &SceneDescriptor,
    previous: Option<&SceneDescriptor>,
) -> String {
    match previous {
        Some(previous) if backend.capabilities().continuity_hints => {
            format!("{}\n\n{}", previous.continuity_hint(), scene.video_prompt())
        }
        _ => scene.video_prompt(),
    }
}

impl ClipStage {
    pub fn new(
        engine: Arc<dyn VideoEngine>,
        store: Arc<dyn MediaStore>,
        editor: Arc<dyn MediaEditor>,
    ) -> Self {
        Self {
            engine,
            store,
            editor,
            retry: RetryConfig::default(),
            call_timeout: Duration::from_secs(600),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn backend(&self) -> VideoBackend {
        self.engine.backend()
    }

    /// Generate the clip for `scene` into `scene_dir`.
    ///
    /// Transient backend errors are retried; the returned error means the
    /// scene has no clip.
    pub async fn generate_clip(
        &self,
        frame: &FirstFrame,
        scene: &SceneDescriptor,
        previous: Option<&SceneDescriptor>,
        scene_dir: &Path,
    ) -> PipelineResult<VideoClip> {
        let backend = self.backend();
        let caps = backend.capabilities();
        let choice = caps.choose_duration(scene.duration_seconds);
        let prompt = clip_prompt(backend, scene, previous);

        info!(
            scene_index = scene.index,
            backend = %backend,
            requested = scene.duration_seconds,
            duration = choice.duration_seconds,
            segments = choice.segments.len(),
            "Generating clip"
        );

        let mut image_url = frame.image_reference.clone();
        let mut segment_paths: Vec<PathBuf> = Vec::with_capacity(choice.segments.len());

        for (k, seconds) in choice.segments.iter().copied().enumerate() {
            if let Some(previous_segment) = segment_paths.last() {
                image_url = self.chain_frame(previous_segment, scene_dir, k).await?;
            }

            let request = SegmentRequest {
                image_url: image_url.clone(),
                prompt: prompt.clone(),
                duration_seconds: seconds,
                resolution: caps.max_resolution,
            };

            let path = scene_dir.join(format!("segment_{}.mp4", k));
            self.generate_segment(&request, &path).await?;
            debug!(scene_index = scene.index, segment = k, seconds, "Segment ready");
            segment_paths.push(path);
        }

        let clip_path = scene_dir.join("clip.mp4");
        match segment_paths.as_slice() {
            [single] => tokio::fs::rename(single, &clip_path).await?,
            many => self.editor.concat_segments(many, &clip_path).await?,
        }

        Ok(VideoClip {
            scene_index: scene.index,
            backend,
            requested_duration_seconds: scene.duration_seconds,
            actual_duration_seconds: f64::from(choice.duration_seconds),
            duration_clamped: choice.clamped,
            file_reference: clip_path,
        })
    }

    /// One native call plus its download, retried as a unit.
    async fn generate_segment(&self, request: &SegmentRequest, path: &Path) -> PipelineResult<()> {
        let engine = self.engine.as_ref();
        let store = self.store.as_ref();
        let limit = self.call_timeout;

        with_retry(&self.retry, "generate_segment", move |attempt| async move {
            debug!(attempt = attempt + 1, "Requesting segment");
            let video = bounded(limit, engine.generate_segment(request)).await?;
            bounded(limit, store.download(&video.url, path)).await
        })
        .await?;
        Ok(())
    }

    /// Extract and host the last frame of a finished segment.
    async fn chain_frame(&self, segment: &Path, scene_dir: &Path, next: usize) -> PipelineResult<String> {
        let still = scene_dir.join(format!("segment_{}_start.jpg", next));
        self.editor.extract_last_frame(segment, &still).await?;

        let store = self.store.as_ref();
        let limit = self.call_timeout;
        let still = still.as_path();
        let url = with_retry(&self.retry, "upload_frame", move |_| {
            bounded(limit, store.upload(still, "image/jpeg"))
        })
        .await?;
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scene(index: u32, movement: &str) -> SceneDescriptor {
        SceneDescriptor {
            index,
            scene_name: String::new(),
            environment_description: "A pier".to_string(),
            movement_description: movement.to_string(),
            emotions: String::new(),
            camera_instruction: "static".to_string(),
            duration_seconds: 5.0,
            sound_effect_prompt: None,
        }
    }

    #[test]
    fn test_continuity_hint_only_where_supported() {
        let first = scene(0, "She runs to the end of the pier");
        let second = scene(1, "She looks at the sea");

        let with_hint = clip_prompt(VideoBackend::EngineA, &second, Some(&first));
        assert!(with_hint.starts_with("Continues from the previous scene: She runs"));

        let without = clip_prompt(VideoBackend::EngineB, &second, Some(&first));
        assert_eq!(without, second.video_prompt());

        let opening = clip_prompt(VideoBackend::EngineA, &first, None);
        assert_eq!(opening, first.video_prompt());
    }
}
