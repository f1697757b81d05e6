//! In-memory collaborators for driving the pipeline without network or FFmpeg.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::watch;

use scast_media::MediaResult;
use scast_models::{IdentityModel, IdentityRole, IdentitySelection, VideoBackend};
use scast_pipeline::{MediaEditor, PipelineConfig, Services};
use scast_providers::{
    CompletionRequest, FrameGenerator, FrameRequest, GeneratedImage, GeneratedVideo,
    LanguageModel, MediaStore, ProviderError, ProviderResult, ResponseFormat, SegmentRequest,
    SoundEffects, SpeechSynthesizer, VideoEngine,
};

pub const FAIL_FRAME: &str = "FAIL_FRAME";
pub const FAIL_VIDEO: &str = "FAIL_VIDEO";
pub const FAIL_SOUND: &str = "FAIL_SOUND";
/// Frame requests carrying this marker never answer.
pub const STALL_FRAME: &str = "STALL_FRAME";

/// One planned scene: environment, movement, camera, duration, sound.
pub struct PlannedScene<'a>(pub &'a str, pub &'a str, pub &'a str, pub f64, pub Option<&'a str>);

pub fn scene_plan(scenes: &[PlannedScene<'_>]) -> String {
    let items: Vec<_> = scenes
        .iter()
        .enumerate()
        .map(|(i, PlannedScene(env, movement, camera, duration, sound))| {
            json!({
                "scene_name": format!("Scene {}", i + 1),
                "environment_description": env,
                "movement_description": movement,
                "emotions": "calm",
                "camera_instruction": camera,
                "duration_seconds": duration,
                "sound_effect_prompt": sound.unwrap_or("none"),
            })
        })
        .collect();
    serde_json::Value::Array(items).to_string()
}

pub fn selection(environment: bool, object: bool) -> IdentitySelection {
    let mut selection = IdentitySelection::new(IdentityModel::new(
        "ZARA",
        IdentityRole::Character,
        "https://weights/zara",
    ));
    if environment {
        selection = selection.with_environment(IdentityModel::new(
            "BAZAAR",
            IdentityRole::Environment,
            "https://weights/bazaar",
        ));
    }
    if object {
        selection = selection.with_object(IdentityModel::new(
            "MUGX",
            IdentityRole::Object,
            "https://weights/mug",
        ));
    }
    selection
}

pub fn config(output_dir: &Path) -> PipelineConfig {
    PipelineConfig {
        output_dir: output_dir.to_path_buf(),
        registry_dir: output_dir.join("registry"),
        call_timeout: Duration::from_secs(5),
        retry_base_delay: Duration::from_millis(1),
        ..PipelineConfig::default()
    }
}

/// Language model returning a fixed palette, plan and narration.
pub struct FakeLlm {
    pub plan: String,
    pub palette: String,
    pub narration_fails: bool,
    pub prompts: Mutex<Vec<String>>,
}

impl FakeLlm {
    pub fn new(plan: String) -> Arc<Self> {
        Arc::new(Self {
            plan,
            palette: r#"[{"scene_physical_environment": "a busy market"}]"#.to_string(),
            narration_fails: false,
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LanguageModel for FakeLlm {
    fn name(&self) -> &str {
        "fake"
    }

    async fn complete(&self, request: &CompletionRequest) -> ProviderResult<String> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        if request.format == ResponseFormat::Text {
            if self.narration_fails {
                return Err(ProviderError::from_http_status(500, "narration unavailable"));
            }
            return Ok("She walks through the market. She rests by the river.".to_string());
        }
        if request.prompt.contains("scene_physical_environment") {
            return Ok(self.palette.clone());
        }
        Ok(self.plan.clone())
    }
}

#[derive(Default)]
pub struct FakeFrames {
    pub prompts: Mutex<Vec<String>>,
    pub loras: Mutex<Vec<Vec<String>>>,
    count: AtomicUsize,
}

#[async_trait]
impl FrameGenerator for FakeFrames {
    async fn generate_frame(&self, request: &FrameRequest) -> ProviderResult<GeneratedImage> {
        self.prompts.lock().unwrap().push(request.prompt.clone());
        self.loras
            .lock()
            .unwrap()
            .push(request.loras.iter().map(|l| l.path.clone()).collect());
        if request.prompt.contains(FAIL_FRAME) {
            return Err(ProviderError::generation_failed("image service rejected the prompt"));
        }
        if request.prompt.contains(STALL_FRAME) {
            std::future::pending::<()>().await;
        }
        let n = self.count.fetch_add(1, Ordering::SeqCst);
        Ok(GeneratedImage {
            url: format!("https://frames/{}.jpg", n),
        })
    }
}

pub struct FakeVideo {
    pub backend: VideoBackend,
    pub requests: Mutex<Vec<SegmentRequest>>,
    /// Flipped after the first successful segment
    pub cancel_after_first: Option<watch::Sender<bool>>,
    count: AtomicUsize,
}

impl FakeVideo {
    pub fn new(backend: VideoBackend) -> Self {
        Self {
            backend,
            requests: Mutex::new(Vec::new()),
            cancel_after_first: None,
            count: AtomicUsize::new(0),
        }
    }

    pub fn requests(&self) -> Vec<SegmentRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn calls_matching(&self, needle: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.prompt.contains(needle))
            .count()
    }
}

#[async_trait]
impl VideoEngine for FakeVideo {
    fn backend(&self) -> VideoBackend {
        self.backend
    }

    async fn generate_segment(&self, request: &SegmentRequest) -> ProviderResult<GeneratedVideo> {
        self.requests.lock().unwrap().push(request.clone());
        if request.prompt.contains(FAIL_VIDEO) {
            return Err(ProviderError::from_http_status(503, "backend overloaded"));
        }
        let n = self.count.fetch_add(1, Ordering::SeqCst);
        if let Some(cancel) = &self.cancel_after_first {
            cancel.send(true).ok();
        }
        Ok(GeneratedVideo {
            url: format!("https://videos/{}.mp4", n),
            duration_seconds: request.duration_seconds,
        })
    }
}

/// Media host writing placeholder files on download.
#[derive(Default)]
pub struct FakeStore {
    pub uploads: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl MediaStore for FakeStore {
    async fn upload(&self, path: &Path, _content_type: &str) -> ProviderResult<String> {
        self.uploads.lock().unwrap().push(path.to_path_buf());
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("file");
        Ok(format!("https://uploads/{}", name))
    }

    async fn download(&self, url: &str, path: &Path) -> ProviderResult<()> {
        tokio::fs::write(path, url.as_bytes()).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeSound {
    pub requests: Mutex<Vec<(String, f64)>>,
}

#[async_trait]
impl SoundEffects for FakeSound {
    async fn generate_sound(&self, prompt: &str, duration_seconds: f64) -> ProviderResult<Vec<u8>> {
        self.requests
            .lock()
            .unwrap()
            .push((prompt.to_string(), duration_seconds));
        if prompt.contains(FAIL_SOUND) {
            return Err(ProviderError::from_http_status(400, "prompt rejected"));
        }
        Ok(b"ID3 fake mp3".to_vec())
    }
}

pub struct FakeSpeech {
    pub fail: bool,
}

#[async_trait]
impl SpeechSynthesizer for FakeSpeech {
    async fn synthesize(&self, _text: &str) -> ProviderResult<Vec<u8>> {
        if self.fail {
            return Err(ProviderError::from_http_status(401, "bad key"));
        }
        Ok(b"ID3 speech".to_vec())
    }
}

/// Records operations and touches every output file.
#[derive(Default)]
pub struct FakeEditor {
    pub ops: Mutex<Vec<String>>,
    pub scene_inputs: Mutex<Vec<PathBuf>>,
    pub fail_mux: bool,
    /// Clips under this scene folder fail to probe
    pub unreadable_scene: Option<&'static str>,
    pub fail_concat: bool,
}

impl FakeEditor {
    fn record(&self, op: &str) {
        self.ops.lock().unwrap().push(op.to_string());
    }

    pub fn count(&self, op: &str) -> usize {
        self.ops.lock().unwrap().iter().filter(|o| *o == op).count()
    }

    async fn touch(path: &Path) -> MediaResult<()> {
        tokio::fs::write(path, b"media").await?;
        Ok(())
    }
}

#[async_trait]
impl MediaEditor for FakeEditor {
    async fn duration(&self, _path: &Path) -> MediaResult<f64> {
        Ok(5.0)
    }

    async fn has_audio(&self, path: &Path) -> MediaResult<bool> {
        if let Some(folder) = self.unreadable_scene {
            if path.to_string_lossy().contains(folder) {
                return Err(scast_media::MediaError::invalid_media("moov atom not found"));
            }
        }
        Ok(false)
    }

    async fn concat_segments(&self, _inputs: &[PathBuf], output: &Path) -> MediaResult<()> {
        self.record("concat_segments");
        Self::touch(output).await
    }

    async fn extract_last_frame(&self, _video: &Path, output: &Path) -> MediaResult<()> {
        self.record("extract_last_frame");
        Self::touch(output).await
    }

    async fn mux_audio(&self, _video: &Path, _audio: &Path, output: &Path, _duration: f64) -> MediaResult<()> {
        self.record("mux_audio");
        if self.fail_mux {
            return Err(scast_media::MediaError::ffmpeg_failed("mux failed", None, Some(1)));
        }
        Self::touch(output).await
    }

    async fn add_silent_track(&self, _video: &Path, output: &Path, _duration: f64) -> MediaResult<()> {
        self.record("add_silent_track");
        Self::touch(output).await
    }

    async fn concat_scenes(&self, inputs: &[PathBuf], output: &Path, _expected: f64) -> MediaResult<()> {
        self.record("concat_scenes");
        *self.scene_inputs.lock().unwrap() = inputs.to_vec();
        if self.fail_concat {
            return Err(scast_media::MediaError::ffmpeg_failed("concat failed", None, Some(1)));
        }
        Self::touch(output).await
    }

    async fn fit_tempo(&self, _audio: &Path, output: &Path, _target: f64) -> MediaResult<()> {
        self.record("fit_tempo");
        Self::touch(output).await
    }

    async fn mix_narration(&self, _video: &Path, _narration: &Path, output: &Path) -> MediaResult<()> {
        self.record("mix_narration");
        Self::touch(output).await
    }
}

/// Everything a test may want to inspect after a run.
pub struct Harness {
    pub llm: Arc<FakeLlm>,
    pub frames: Arc<FakeFrames>,
    pub video: Arc<FakeVideo>,
    pub store: Arc<FakeStore>,
    pub sound: Arc<FakeSound>,
    pub editor: Arc<FakeEditor>,
}

impl Harness {
    pub fn new(plan: String, video: FakeVideo) -> Self {
        Self {
            llm: FakeLlm::new(plan),
            frames: Arc::new(FakeFrames::default()),
            video: Arc::new(video),
            store: Arc::new(FakeStore::default()),
            sound: Arc::new(FakeSound::default()),
            editor: Arc::new(FakeEditor::default()),
        }
    }

    pub fn services(&self) -> Services {
        Services {
            llm: self.llm.clone(),
            frames: self.frames.clone(),
            video: self.video.clone(),
            store: self.store.clone(),
            sound: Some(self.sound.clone()),
            speech: Some(Arc::new(FakeSpeech { fail: false })),
            editor: self.editor.clone(),
        }
    }
}
