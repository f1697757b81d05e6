//! Assembly of surviving scene clips into the final video.
//!
//! Planning is pure: the same outcomes always give the same included and
//! excluded sets. Rendering goes through [`MediaEditor`].

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{info, warn};

use scast_models::{Advisory, AssembledVideo, ExclusionReason, OrderedClip, SceneOutcome};

use crate::error::{PipelineError, PipelineResult};
use crate::media::MediaEditor;

/// File name of the assembled video inside a run directory.
pub const FINAL_VIDEO: &str = "final_video.mp4";

/// Which clips go into the final video, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyPlan {
    /// Surviving clips in ascending scene index
    pub included: Vec<OrderedClip>,
    /// Dropped scenes in ascending scene index
    pub excluded: Vec<(u32, ExclusionReason)>,
}

impl AssemblyPlan {
    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }

    pub fn included_indices(&self) -> Vec<u32> {
        self.included.iter().map(OrderedClip::scene_index).collect()
    }

    pub fn total_duration_seconds(&self) -> f64 {
        self.included
            .iter()
            .map(|c| c.video.actual_duration_seconds)
            .sum()
    }
}

/// Decide the assembly order for a run of `scene_count` scenes.
///
/// Refuses to plan unless every index in `0..scene_count` has exactly one
/// recorded outcome.
pub fn plan_assembly(outcomes: &[SceneOutcome], scene_count: usize) -> PipelineResult<AssemblyPlan> {
    let mut seen = BTreeSet::new();
    for outcome in outcomes {
        if !seen.insert(outcome.scene_index) {
            return Err(PipelineError::IncompleteSceneSet(format!(
                "scene {} has more than one outcome",
                outcome.scene_index
            )));
        }
    }

    if let Some(missing) = (0..scene_count as u32).find(|i| !seen.contains(i)) {
        return Err(PipelineError::IncompleteSceneSet(format!(
            "scene {} has no outcome",
            missing
        )));
    }
    if let Some(extra) = seen.iter().find(|i| **i as usize >= scene_count) {
        return Err(PipelineError::IncompleteSceneSet(format!(
            "scene {} is outside the plan of {} scenes",
            extra, scene_count
        )));
    }

    let mut ordered: Vec<&SceneOutcome> = outcomes.iter().collect();
    ordered.sort_by_key(|o| o.scene_index);

    let mut included = Vec::new();
    let mut excluded = Vec::new();
    for outcome in ordered {
        match (&outcome.failure, &outcome.video) {
            (None, Some(video)) => included.push(OrderedClip {
                video: video.clone(),
                audio: outcome.audio.clone(),
            }),
            (Some(failure), _) => excluded.push((outcome.scene_index, failure.reason)),
            (None, None) => excluded.push((outcome.scene_index, ExclusionReason::VideoFailed)),
        }
    }

    Ok(AssemblyPlan { included, excluded })
}

/// Included clips made ready for concatenation.
///
/// Every prepared clip carries an audio track. Clips that could not be
/// prepared are listed in `dropped` and are left out of the render.
#[derive(Debug, Clone, Default)]
pub struct PreparedClips {
    inputs: Vec<PathBuf>,
    clips: Vec<OrderedClip>,
    /// Per-scene advisories raised while preparing
    pub advisories: Vec<(u32, Advisory)>,
    /// Scenes whose clip could not be prepared, with the media error
    pub dropped: Vec<(u32, String)>,
}

impl PreparedClips {
    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }

    pub fn indices(&self) -> Vec<u32> {
        self.clips.iter().map(OrderedClip::scene_index).collect()
    }

    fn total_duration_seconds(&self) -> f64 {
        self.clips.iter().map(|c| c.video.actual_duration_seconds).sum()
    }
}

/// Renders assembly plans.
pub struct Assembler {
    editor: Arc<dyn MediaEditor>,
}

impl Assembler {
    pub fn new(editor: Arc<dyn MediaEditor>) -> Self {
        Self { editor }
    }

    /// Give every included clip an audio track: its sound effect, or silence.
    ///
    /// A sound effect that cannot be muxed degrades that scene to silence.
    /// A clip that cannot carry silence either is dropped; siblings are
    /// unaffected.
    pub async fn prepare(&self, plan: &AssemblyPlan) -> PreparedClips {
        let mut prepared = PreparedClips::default();

        for clip in &plan.included {
            let index = clip.scene_index();
            let mut audio = clip.audio.clone();
            let sound = audio.as_ref().map(|a| a.file_reference.clone());

            let result = match sound {
                Some(sound) => match self.with_sound(clip, &sound).await {
                    Ok(path) => Ok(path),
                    Err(e) => {
                        warn!(scene_index = index, "Muxing sound effect failed, using silence: {}", e);
                        prepared.advisories.push((
                            index,
                            Advisory::AudioFailed {
                                message: format!("mux failed: {}", e),
                            },
                        ));
                        audio = None;
                        self.with_silence(clip).await
                    }
                },
                None => self.with_silence(clip).await,
            };

            match result {
                Ok(path) => {
                    prepared.inputs.push(path);
                    prepared.clips.push(OrderedClip {
                        video: clip.video.clone(),
                        audio,
                    });
                }
                Err(e) => {
                    warn!(scene_index = index, "Clip unusable for assembly, dropping it: {}", e);
                    prepared.dropped.push((index, e.to_string()));
                }
            }
        }

        prepared
    }

    /// Concatenate prepared clips into `<run_dir>/final_video.mp4`.
    pub async fn render(
        &self,
        prepared: PreparedClips,
        source_script_hash: &str,
        run_dir: &Path,
    ) -> PipelineResult<AssembledVideo> {
        if prepared.is_empty() {
            return Err(PipelineError::IncompleteSceneSet(
                "nothing to assemble".to_string(),
            ));
        }

        let output = run_dir.join(FINAL_VIDEO);
        self.editor
            .concat_scenes(&prepared.inputs, &output, prepared.total_duration_seconds())
            .await?;

        info!(
            clips = prepared.clips.len(),
            dropped = prepared.dropped.len(),
            output = %output.display(),
            "Assembled final video"
        );

        Ok(AssembledVideo {
            source_script_hash: source_script_hash.to_string(),
            ordered_clips: prepared.clips,
            output_reference: output,
        })
    }

    async fn with_sound(&self, clip: &OrderedClip, audio: &Path) -> PipelineResult<PathBuf> {
        let output = sibling(&clip.video.file_reference, "clip_with_sound.mp4");
        self.editor
            .mux_audio(
                &clip.video.file_reference,
                audio,
                &output,
                clip.video.actual_duration_seconds,
            )
            .await?;
        Ok(output)
    }

    async fn with_silence(&self, clip: &OrderedClip) -> PipelineResult<PathBuf> {
        let video = &clip.video.file_reference;
        if self.editor.has_audio(video).await? {
            return Ok(video.clone());
        }
        let output = sibling(video, "clip_with_silence.mp4");
        self.editor
            .add_silent_track(video, &output, clip.video.actual_duration_seconds)
            .await?;
        Ok(output)
    }
}

fn sibling(path: &Path, name: &str) -> PathBuf {
    path.parent()
        .map(|dir| dir.join(name))
        .unwrap_or_else(|| PathBuf::from(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use scast_media::{MediaError, MediaResult};
    use scast_models::{AudioClip, VideoBackend, VideoClip};
    use std::sync::Mutex;

    /// Editor whose probe rejects clips of one scene folder.
    struct UnreadableScene {
        folder: &'static str,
        concatenated: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl MediaEditor for UnreadableScene {
        async fn duration(&self, _path: &Path) -> MediaResult<f64> {
            Ok(5.0)
        }

        async fn has_audio(&self, path: &Path) -> MediaResult<bool> {
            if path.to_string_lossy().contains(self.folder) {
                return Err(MediaError::invalid_media("moov atom not found"));
            }
            Ok(false)
        }

        async fn concat_segments(&self, _inputs: &[PathBuf], _output: &Path) -> MediaResult<()> {
            Ok(())
        }

        async fn extract_last_frame(&self, _video: &Path, _output: &Path) -> MediaResult<()> {
            Ok(())
        }

        async fn mux_audio(&self, _video: &Path, _audio: &Path, _output: &Path, _duration: f64) -> MediaResult<()> {
            Ok(())
        }

        async fn add_silent_track(&self, _video: &Path, _output: &Path, _duration: f64) -> MediaResult<()> {
            Ok(())
        }

        async fn concat_scenes(&self, inputs: &[PathBuf], _output: &Path, _expected: f64) -> MediaResult<()> {
            *self.concatenated.lock().unwrap() = inputs.to_vec();
            Ok(())
        }

        async fn fit_tempo(&self, _audio: &Path, _output: &Path, _target: f64) -> MediaResult<()> {
            Ok(())
        }

        async fn mix_narration(&self, _video: &Path, _narration: &Path, _output: &Path) -> MediaResult<()> {
            Ok(())
        }
    }

    fn survived(index: u32, with_audio: bool) -> SceneOutcome {
        let mut outcome = SceneOutcome::new(index);
        outcome.video = Some(VideoClip {
            scene_index: index,
            backend: VideoBackend::EngineA,
            requested_duration_seconds: 5.0,
            actual_duration_seconds: 5.0,
            duration_clamped: false,
            file_reference: PathBuf::from(format!("run/scene_{}/clip.mp4", index)),
        });
        if with_audio {
            outcome.audio = Some(AudioClip {
                scene_index: index,
                file_reference: PathBuf::from(format!("run/scene_{}/sound_effect.mp3", index)),
                duration_seconds: 5.0,
            });
        }
        outcome
    }

    #[test]
    fn test_plan_orders_by_index() {
        let outcomes = vec![
            survived(2, false),
            SceneOutcome::failed(1, ExclusionReason::VideoFailed, "retries exhausted"),
            survived(0, true),
        ];
        let plan = plan_assembly(&outcomes, 3).unwrap();
        assert_eq!(plan.included_indices(), vec![0, 2]);
        assert_eq!(plan.excluded, vec![(1, ExclusionReason::VideoFailed)]);
        assert!(plan.included[0].audio.is_some());
        assert_eq!(plan.total_duration_seconds(), 10.0);
    }

    #[test]
    fn test_plan_is_repeatable() {
        let outcomes = vec![
            survived(0, false),
            SceneOutcome::failed(1, ExclusionReason::FrameFailed, "boom"),
            survived(2, true),
        ];
        let first = plan_assembly(&outcomes, 3).unwrap();
        let second = plan_assembly(&outcomes, 3).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_outcome_refuses() {
        let outcomes = vec![survived(0, false), survived(2, false)];
        let err = plan_assembly(&outcomes, 3).unwrap_err();
        assert!(matches!(err, PipelineError::IncompleteSceneSet(_)));
    }

    #[test]
    fn test_duplicate_or_extra_outcome_refuses() {
        assert!(plan_assembly(&[survived(0, false), survived(0, false)], 1).is_err());
        assert!(plan_assembly(&[survived(0, false), survived(1, false)], 1).is_err());
    }

    #[test]
    fn test_all_failed_is_empty() {
        let outcomes = vec![
            SceneOutcome::failed(0, ExclusionReason::VideoFailed, "x"),
            SceneOutcome::failed(1, ExclusionReason::VideoFailed, "y"),
        ];
        let plan = plan_assembly(&outcomes, 2).unwrap();
        assert!(plan.is_empty());
        assert_eq!(plan.excluded.len(), 2);
    }

    #[tokio::test]
    async fn test_unreadable_clip_is_dropped_not_fatal() {
        let editor = Arc::new(UnreadableScene {
            folder: "scene_1",
            concatenated: Mutex::new(Vec::new()),
        });
        let assembler = Assembler::new(editor.clone());
        let plan = plan_assembly(&[survived(0, false), survived(1, false), survived(2, false)], 3).unwrap();

        let prepared = assembler.prepare(&plan).await;
        assert_eq!(prepared.indices(), vec![0, 2]);
        assert_eq!(prepared.dropped.len(), 1);
        assert_eq!(prepared.dropped[0].0, 1);
        assert!(prepared.dropped[0].1.contains("moov atom not found"));

        let video = assembler.render(prepared, "hash", Path::new("run")).await.unwrap();
        assert_eq!(video.included_indices(), vec![0, 2]);
        assert_eq!(
            *editor.concatenated.lock().unwrap(),
            vec![
                PathBuf::from("run/scene_0/clip_with_silence.mp4"),
                PathBuf::from("run/scene_2/clip_with_silence.mp4"),
            ]
        );
    }

    #[tokio::test]
    async fn test_nothing_prepared_refuses_to_render() {
        let editor = Arc::new(UnreadableScene {
            folder: "scene_0",
            concatenated: Mutex::new(Vec::new()),
        });
        let assembler = Assembler::new(editor);
        let plan = plan_assembly(&[survived(0, false)], 1).unwrap();

        let prepared = assembler.prepare(&plan).await;
        assert!(prepared.is_empty());
        assert!(assembler.render(prepared, "hash", Path::new("run")).await.is_err());
    }
}
