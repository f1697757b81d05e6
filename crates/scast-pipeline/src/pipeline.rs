//! Run orchestration.
//!
//! One run: plan environments and scenes, then per scene run
//! frame → video → audio, then assemble the survivors and write the
//! manifest. Scenes run concurrently up to `max_scene_parallel`; each scene
//! writes only its own outcome slot.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use sha2::{Digest, Sha256};
use tokio::sync::{watch, Semaphore};
use tracing::{info, Instrument};

use scast_models::{
    Advisory, AssembledVideo, ExclusionReason, IdentitySelection, QualityPreset, RunId,
    RunManifest, SceneDescriptor, SceneOutcome, VideoBackend,
};
use scast_providers::{
    FrameGenerator, LanguageModel, MediaStore, RetryConfig, SoundEffects, SpeechSynthesizer,
    VideoEngine,
};

use crate::assembler::{plan_assembly, Assembler};
use crate::audio::AudioStage;
use crate::clips::ClipStage;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::frames::FrameStage;
use crate::logging::RunLogger;
use crate::media::MediaEditor;
use crate::metrics::{record_run, record_scene_stage};
use crate::narration::Narrator;
use crate::planner::{EnvironmentSource, ScenePlanner};

pub const SCENE_PLAN_FILE: &str = "scene_plan.json";
pub const ENVIRONMENTS_FILE: &str = "environments.json";
pub const MANIFEST_FILE: &str = "manifest.json";

/// Remote and local collaborators for a pipeline.
#[derive(Clone)]
pub struct Services {
    pub llm: Arc<dyn LanguageModel>,
    pub frames: Arc<dyn FrameGenerator>,
    pub video: Arc<dyn VideoEngine>,
    pub store: Arc<dyn MediaStore>,
    pub sound: Option<Arc<dyn SoundEffects>>,
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
    pub editor: Arc<dyn MediaEditor>,
}

/// One generation request.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub script: String,
    pub selection: IdentitySelection,
    pub preset: QualityPreset,
    pub environments: EnvironmentSource,
    pub audio_enabled: bool,
    pub narration_enabled: bool,
    /// Stop after the plan is written
    pub metadata_only: bool,
}

impl GenerationRequest {
    pub fn new(script: impl Into<String>, selection: IdentitySelection) -> Self {
        Self {
            script: script.into(),
            selection,
            preset: QualityPreset::default(),
            environments: EnvironmentSource::default(),
            audio_enabled: false,
            narration_enabled: false,
            metadata_only: false,
        }
    }

    pub fn with_preset(mut self, preset: QualityPreset) -> Self {
        self.preset = preset;
        self
    }

    pub fn with_environments(mut self, environments: EnvironmentSource) -> Self {
        self.environments = environments;
        self
    }

    pub fn with_audio(mut self, enabled: bool) -> Self {
        self.audio_enabled = enabled;
        self
    }

    pub fn with_narration(mut self, enabled: bool) -> Self {
        self.narration_enabled = enabled;
        self
    }

    pub fn metadata_only(mut self) -> Self {
        self.metadata_only = true;
        self
    }
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub run_id: RunId,
    pub run_dir: PathBuf,
    pub environments: Vec<String>,
    pub scenes: Vec<SceneDescriptor>,
    /// Absent for metadata-only runs
    pub manifest: Option<RunManifest>,
    /// Absent for metadata-only runs
    pub video: Option<AssembledVideo>,
}

/// The video generation pipeline, bound to one backend.
pub struct Pipeline {
    config: PipelineConfig,
    planner: ScenePlanner,
    frames: FrameStage,
    clips: ClipStage,
    audio: Option<AudioStage>,
    narrator: Option<Narrator>,
    assembler: Assembler,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, services: Services) -> Self {
        let timeout = config.call_timeout;
        let retry = RetryConfig::new(
            config.video_max_retries,
            config.retry_base_delay.as_millis() as u64,
        );

        let planner = ScenePlanner::new(services.llm)
            .with_retry(RetryConfig::new(1, retry.base_delay_ms))
            .with_call_timeout(timeout)
            .with_max_environments(config.max_environments);
        let frames = FrameStage::new(services.frames, services.store.clone())
            .with_lora_scale(config.lora_scale)
            .with_call_timeout(timeout);
        let clips = ClipStage::new(services.video, services.store, services.editor.clone())
            .with_retry(retry)
            .with_call_timeout(timeout);
        let audio = services
            .sound
            .map(|sound| AudioStage::new(sound).with_call_timeout(timeout));
        let narrator = services
            .speech
            .map(|speech| Narrator::new(speech, services.editor.clone()).with_call_timeout(timeout));

        Self {
            config,
            planner,
            frames,
            clips,
            audio,
            narrator,
            assembler: Assembler::new(services.editor),
        }
    }

    pub fn backend(&self) -> VideoBackend {
        self.clips.backend()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Execute one run.
    ///
    /// Per-scene failures are recorded in the manifest and never fail the
    /// run. The run fails when planning fails, when no scene survives, or
    /// when `cancel` turns true before assembly.
    pub async fn run(
        &self,
        request: &GenerationRequest,
        cancel: watch::Receiver<bool>,
    ) -> PipelineResult<RunOutput> {
        let run_id = RunId::new();
        let logger = RunLogger::new(&run_id, self.backend());
        let span = logger.span();

        let result = self
            .execute(&run_id, &logger, request, cancel)
            .instrument(span)
            .await;

        match &result {
            Ok(output) if output.manifest.is_none() => record_run("planned"),
            Ok(_) => record_run("success"),
            Err(e) => {
                logger.failed(e);
                record_run(e.kind());
            }
        }
        result
    }

    async fn execute(
        &self,
        run_id: &RunId,
        logger: &RunLogger,
        request: &GenerationRequest,
        cancel: watch::Receiver<bool>,
    ) -> PipelineResult<RunOutput> {
        let backend = self.backend();
        let source_hash = script_hash(&request.script);
        let preset = QualityPreset {
            scene_count: request.preset.scene_count.capped(self.config.max_scenes),
        };

        logger.started(&preset, request.audio_enabled, request.narration_enabled);

        let run_dir = self.config.output_dir.join(run_dir_name(run_id));
        tokio::fs::create_dir_all(&run_dir).await?;

        let environments = self
            .planner
            .plan_environments(&request.script, &request.environments)
            .await;
        write_json(&run_dir.join(ENVIRONMENTS_FILE), &environments).await?;

        let scenes = self
            .planner
            .plan_scenes(&request.script, &preset, backend, &environments)
            .await?;
        write_json(&run_dir.join(SCENE_PLAN_FILE), &scenes).await?;
        logger.planned(scenes.len(), environments.len());

        if request.metadata_only {
            logger.plan_only(&run_dir);
            return Ok(RunOutput {
                run_id: run_id.clone(),
                run_dir,
                environments,
                scenes,
                manifest: None,
                video: None,
            });
        }

        let mut outcomes = self
            .generate_scenes(&scenes, request, &run_dir, &cancel, logger)
            .await;

        let manifest_for = |outcomes: &[SceneOutcome]| {
            RunManifest::new(
                run_id.clone(),
                backend,
                source_hash.clone(),
                request.audio_enabled,
                outcomes,
            )
        };

        if *cancel.borrow() {
            let manifest = manifest_for(&outcomes);
            write_json(&run_dir.join(MANIFEST_FILE), &manifest).await?;
            logger.cancelled(&manifest);
            return Err(PipelineError::Cancelled {
                manifest: Box::new(manifest),
            });
        }

        let plan = plan_assembly(&outcomes, scenes.len())?;
        if plan.is_empty() {
            let manifest = manifest_for(&outcomes);
            write_json(&run_dir.join(MANIFEST_FILE), &manifest).await?;
            return Err(PipelineError::AssemblyEmpty {
                manifest: Box::new(manifest),
            });
        }

        let prepared = self.assembler.prepare(&plan).await;
        for (index, advisory) in &prepared.advisories {
            if let Some(outcome) = outcomes.iter_mut().find(|o| o.scene_index == *index) {
                outcome.audio = None;
                outcome.advise(advisory.clone());
            }
        }
        for (index, message) in &prepared.dropped {
            if let Some(outcome) = outcomes.iter_mut().find(|o| o.scene_index == *index) {
                record_scene_stage("assembly", "failed");
                logger.scene_failed(*index, "assembly", message);
                outcome.fail(ExclusionReason::AssemblyFailed, message.clone());
            }
        }

        if prepared.is_empty() {
            let manifest = manifest_for(&outcomes);
            write_json(&run_dir.join(MANIFEST_FILE), &manifest).await?;
            return Err(PipelineError::AssemblyEmpty {
                manifest: Box::new(manifest),
            });
        }

        let mut video = match self.assembler.render(prepared, &source_hash, &run_dir).await {
            Ok(video) => video,
            Err(e) => {
                let manifest = manifest_for(&outcomes);
                write_json(&run_dir.join(MANIFEST_FILE), &manifest).await?;
                return Err(e);
            }
        };

        let mut run_advisories = Vec::new();
        if request.narration_enabled {
            match self.narrate(&scenes, &video, &run_dir).await {
                Ok(narrated) => video.output_reference = narrated,
                Err(e) => {
                    logger.narration_failed(&e);
                    run_advisories.push(Advisory::NarrationFailed {
                        message: e.to_string(),
                    });
                }
            }
        }

        let mut manifest = manifest_for(&outcomes);
        manifest.advisories = run_advisories;
        manifest.output_reference = Some(video.output_reference.clone());
        write_json(&run_dir.join(MANIFEST_FILE), &manifest).await?;

        logger.finished(&manifest, &video.output_reference);

        Ok(RunOutput {
            run_id: run_id.clone(),
            run_dir,
            environments,
            scenes,
            manifest: Some(manifest),
            video: Some(video),
        })
    }

    async fn generate_scenes(
        &self,
        scenes: &[SceneDescriptor],
        request: &GenerationRequest,
        run_dir: &Path,
        cancel: &watch::Receiver<bool>,
        logger: &RunLogger,
    ) -> Vec<SceneOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_scene_parallel.max(1)));

        let tasks = scenes.iter().map(|scene| {
            let semaphore = semaphore.clone();
            let previous = scene
                .index
                .checked_sub(1)
                .and_then(|i| scenes.get(i as usize));

            async move {
                let _permit = match semaphore.acquire().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        return SceneOutcome::failed(
                            scene.index,
                            ExclusionReason::Cancelled,
                            format!("scene scheduler closed: {}", e),
                        )
                    }
                };

                self.run_scene(scene, previous, request, run_dir, cancel, logger)
                    .instrument(logger.scene_span(scene.index))
                    .await
            }
        });

        join_all(tasks).await
    }

    /// frame → video → audio for one scene; always returns a terminal outcome.
    async fn run_scene(
        &self,
        scene: &SceneDescriptor,
        previous: Option<&SceneDescriptor>,
        request: &GenerationRequest,
        run_dir: &Path,
        cancel: &watch::Receiver<bool>,
        logger: &RunLogger,
    ) -> SceneOutcome {
        let index = scene.index;
        if *cancel.borrow() {
            record_scene_stage("frame", "cancelled");
            return SceneOutcome::failed(index, ExclusionReason::Cancelled, "run cancelled before the scene started");
        }

        let scene_dir = run_dir.join(format!("scene_{}", index));
        if let Err(e) = tokio::fs::create_dir_all(&scene_dir).await {
            record_scene_stage("frame", "failed");
            return SceneOutcome::failed(index, ExclusionReason::FrameFailed, format!("scene folder: {}", e));
        }

        let mut outcome = SceneOutcome::new(index);

        let frame = match self.frames.generate(scene, &request.selection, &scene_dir).await {
            Ok(frame) => {
                record_scene_stage("frame", "ok");
                frame
            }
            Err(e) => {
                record_scene_stage("frame", "failed");
                logger.scene_failed(index, "frame", &e);
                outcome.fail(ExclusionReason::FrameFailed, e.to_string());
                return outcome;
            }
        };
        outcome.frame = Some(frame.clone());

        if *cancel.borrow() {
            record_scene_stage("video", "cancelled");
            outcome.fail(ExclusionReason::Cancelled, "run cancelled before video generation");
            return outcome;
        }

        let clip = match self.clips.generate_clip(&frame, scene, previous, &scene_dir).await {
            Ok(clip) => {
                record_scene_stage("video", "ok");
                clip
            }
            Err(e) => {
                record_scene_stage("video", "failed");
                logger.scene_failed(index, "video", &e);
                outcome.fail(ExclusionReason::VideoFailed, e.to_string());
                return outcome;
            }
        };

        if clip.duration_clamped {
            outcome.advise(Advisory::DurationClamped {
                requested: clip.requested_duration_seconds,
                actual: clip.actual_duration_seconds,
            });
        }

        if request.audio_enabled && scene.wants_sound() && !*cancel.borrow() {
            match &self.audio {
                Some(stage) => match stage.generate(scene, &clip, &scene_dir).await {
                    Ok(audio) => {
                        record_scene_stage("audio", "ok");
                        outcome.audio = Some(audio);
                    }
                    Err(e) => {
                        record_scene_stage("audio", "failed");
                        logger.scene_degraded(index, "audio", &e);
                        outcome.advise(Advisory::AudioFailed {
                            message: e.to_string(),
                        });
                    }
                },
                None => outcome.advise(Advisory::AudioFailed {
                    message: "no sound effect service configured".to_string(),
                }),
            }
        }

        outcome.video = Some(clip);
        info!(scene_index = index, "Scene complete");
        outcome
    }

    async fn narrate(
        &self,
        scenes: &[SceneDescriptor],
        video: &AssembledVideo,
        run_dir: &Path,
    ) -> PipelineResult<PathBuf> {
        let narrator = self.narrator.as_ref().ok_or_else(|| {
            PipelineError::invalid_request("no speech service configured")
        })?;

        let included = video.included_indices();
        let narrated: Vec<&SceneDescriptor> = scenes
            .iter()
            .filter(|s| included.contains(&s.index))
            .collect();

        narrator
            .narrate(
                &self.planner,
                &narrated,
                &video.output_reference,
                video.total_duration_seconds(),
                run_dir,
            )
            .await
    }
}

/// Hex SHA-256 of the script text.
pub fn script_hash(script: &str) -> String {
    let digest = Sha256::digest(script.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

fn run_dir_name(run_id: &RunId) -> String {
    let short: String = run_id.as_str().chars().filter(|c| *c != '-').take(8).collect();
    format!(
        "video_{}_{}",
        chrono::Utc::now().format("%Y%m%d_%H%M%S"),
        short
    )
}

async fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> PipelineResult<()> {
    let json = serde_json::to_vec_pretty(value)?;
    tokio::fs::write(path, json).await?;
    Ok(())
}
