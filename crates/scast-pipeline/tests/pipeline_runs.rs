//! End-to-end runs of the pipeline against in-memory services.

mod common;

use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::watch;

use scast_models::{
    Advisory, ExclusionReason, QualityPreset, RunManifest, SceneStatus, VideoBackend,
};
use scast_pipeline::{GenerationRequest, Pipeline, PipelineError};

use common::*;

const MARKET_RIVER: &str = "A woman walks through a busy market, then sits by a quiet river";

fn not_cancelled() -> watch::Receiver<bool> {
    watch::channel(false).1
}

fn read_manifest(path: &std::path::Path) -> RunManifest {
    let bytes = std::fs::read(path).unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn only_run_dir(output_dir: &std::path::Path) -> std::path::PathBuf {
    let dirs: Vec<_> = std::fs::read_dir(output_dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.file_name().unwrap().to_string_lossy().starts_with("video_"))
        .collect();
    assert_eq!(dirs.len(), 1);
    dirs[0].clone()
}

#[tokio::test]
async fn two_scene_script_produces_market_then_river() {
    let temp = TempDir::new().unwrap();
    let plan = scene_plan(&[
        PlannedScene("A busy market at noon", "She walks between stalls", "tracking", 5.0, None),
        PlannedScene("A quiet river at dusk", "She sits on the bank", "static", 5.0, None),
    ]);
    let harness = Harness::new(plan, FakeVideo::new(VideoBackend::EngineA));
    let pipeline = Pipeline::new(config(temp.path()), harness.services());

    let request = GenerationRequest::new(MARKET_RIVER, selection(false, false))
        .with_preset(QualityPreset::fixed(2));
    let output = pipeline.run(&request, not_cancelled()).await.unwrap();

    let indices: Vec<u32> = output.scenes.iter().map(|s| s.index).collect();
    assert_eq!(indices, vec![0, 1]);
    assert!(output.scenes[0].environment_description.contains("market"));
    assert!(output.scenes[1].environment_description.contains("river"));

    let manifest = output.manifest.unwrap();
    assert_eq!(manifest.included(), vec![0, 1]);
    assert!(manifest.is_full_success());
    assert_eq!(manifest.source_script_hash.len(), 64);

    let video = output.video.unwrap();
    assert_eq!(video.included_indices(), vec![0, 1]);
    assert_eq!(video.total_duration_seconds(), 10.0);
    assert!(video.output_reference.ends_with("final_video.mp4"));

    assert!(output.run_dir.join("scene_plan.json").exists());
    assert!(output.run_dir.join("environments.json").exists());
    assert_eq!(read_manifest(&output.run_dir.join("manifest.json")), manifest);
    assert!(output.run_dir.join("scene_0/first_frame.jpg").exists());
    assert!(output.run_dir.join("scene_1/clip.mp4").exists());
}

#[tokio::test]
async fn durations_are_quantized_and_clamped() {
    let temp = TempDir::new().unwrap();
    let plan = scene_plan(&[
        PlannedScene("A pier", "She runs", "static", 7.0, None),
        PlannedScene("A pier at night", "She stops", "static", 25.0, None),
    ]);
    let harness = Harness::new(plan, FakeVideo::new(VideoBackend::EngineA));
    let pipeline = Pipeline::new(config(temp.path()), harness.services());

    let request = GenerationRequest::new("She runs down the pier and stops.", selection(false, false))
        .with_preset(QualityPreset::fixed(2));
    let output = pipeline.run(&request, not_cancelled()).await.unwrap();
    let manifest = output.manifest.unwrap();

    assert_eq!(manifest.scenes[0].actual_duration_seconds, Some(9.0));
    assert!(manifest.scenes[0].advisories.is_empty());

    assert_eq!(manifest.scenes[1].actual_duration_seconds, Some(18.0));
    assert_eq!(
        manifest.scenes[1].advisories,
        vec![Advisory::DurationClamped {
            requested: 25.0,
            actual: 18.0
        }]
    );

    // 9 s is one native call; 18 s is two chained 9 s calls.
    let requests = harness.video.requests();
    assert_eq!(requests.len(), 3);
    let chained: Vec<_> = requests
        .iter()
        .filter(|r| r.image_url.starts_with("https://uploads/"))
        .collect();
    assert_eq!(chained.len(), 1);
    assert_eq!(chained[0].duration_seconds, 9);
    assert_eq!(harness.editor.count("extract_last_frame"), 1);
    assert_eq!(harness.editor.count("concat_segments"), 1);
}

#[tokio::test]
async fn failed_video_scene_is_excluded_and_siblings_kept_in_order() {
    let temp = TempDir::new().unwrap();
    let plan = scene_plan(&[
        PlannedScene("A market", "She walks", "tracking", 5.0, None),
        PlannedScene("A bridge", "She crosses", FAIL_VIDEO, 5.0, None),
        PlannedScene("A river", "She sits", "static", 5.0, None),
    ]);
    let harness = Harness::new(plan, FakeVideo::new(VideoBackend::EngineB));
    let pipeline = Pipeline::new(config(temp.path()), harness.services());

    let request = GenerationRequest::new("Market, bridge, river.", selection(false, false))
        .with_preset(QualityPreset::fixed(3));
    let output = pipeline.run(&request, not_cancelled()).await.unwrap();
    let manifest = output.manifest.unwrap();

    assert_eq!(manifest.included(), vec![0, 2]);
    assert_eq!(manifest.excluded(), vec![(1, ExclusionReason::VideoFailed)]);
    assert_eq!(manifest.scenes.len(), 3);

    // First attempt plus two retries.
    assert_eq!(harness.video.calls_matching(FAIL_VIDEO), 3);

    let inputs = harness.editor.scene_inputs.lock().unwrap().clone();
    assert_eq!(inputs.len(), 2);
    assert!(inputs[0].to_string_lossy().contains("scene_0"));
    assert!(inputs[1].to_string_lossy().contains("scene_2"));
}

#[tokio::test]
async fn every_video_failing_is_assembly_empty() {
    let temp = TempDir::new().unwrap();
    let plan = scene_plan(&[
        PlannedScene("A market", "She walks", FAIL_VIDEO, 5.0, None),
        PlannedScene("A river", "She sits", FAIL_VIDEO, 5.0, None),
    ]);
    let harness = Harness::new(plan, FakeVideo::new(VideoBackend::EngineC));
    let pipeline = Pipeline::new(config(temp.path()), harness.services());

    let request = GenerationRequest::new(MARKET_RIVER, selection(false, false))
        .with_preset(QualityPreset::fixed(2));
    let err = pipeline.run(&request, not_cancelled()).await.unwrap_err();

    match err {
        PipelineError::AssemblyEmpty { manifest } => {
            assert!(manifest.included().is_empty());
            assert_eq!(
                manifest.excluded(),
                vec![
                    (0, ExclusionReason::VideoFailed),
                    (1, ExclusionReason::VideoFailed)
                ]
            );
        }
        other => panic!("expected AssemblyEmpty, got {:?}", other),
    }
    assert_eq!(harness.editor.count("concat_scenes"), 0);
}

#[tokio::test]
async fn failed_frame_excludes_only_that_scene() {
    let temp = TempDir::new().unwrap();
    let plan = scene_plan(&[
        PlannedScene("A market", "She walks", FAIL_FRAME, 5.0, None),
        PlannedScene("A river", "She sits", "static", 5.0, None),
    ]);
    let harness = Harness::new(plan, FakeVideo::new(VideoBackend::EngineB));
    let pipeline = Pipeline::new(config(temp.path()), harness.services());

    let request = GenerationRequest::new(MARKET_RIVER, selection(false, false))
        .with_preset(QualityPreset::fixed(2));
    let output = pipeline.run(&request, not_cancelled()).await.unwrap();
    let manifest = output.manifest.unwrap();

    assert_eq!(manifest.included(), vec![1]);
    assert_eq!(manifest.excluded(), vec![(0, ExclusionReason::FrameFailed)]);
    assert_eq!(harness.video.calls_matching(FAIL_FRAME), 0);
}

#[tokio::test]
async fn omitted_role_trigger_never_reaches_a_prompt() {
    let temp = TempDir::new().unwrap();
    let plan = scene_plan(&[
        PlannedScene("A market", "She walks", "tracking", 5.0, None),
        PlannedScene("A river", "She sits", "static", 9.0, None),
    ]);
    let harness = Harness::new(plan, FakeVideo::new(VideoBackend::EngineA));
    let pipeline = Pipeline::new(config(temp.path()), harness.services());

    let request = GenerationRequest::new(MARKET_RIVER, selection(false, true))
        .with_preset(QualityPreset::fixed(2));
    pipeline.run(&request, not_cancelled()).await.unwrap();

    let prompts = harness.frames.prompts.lock().unwrap().clone();
    assert_eq!(prompts.len(), 2);
    for prompt in &prompts {
        assert!(prompt.contains("ZARA"));
        assert!(prompt.contains("MUGX"));
        assert!(!prompt.contains("BAZAAR"));
    }
    for request in harness.video.requests() {
        assert!(!request.prompt.contains("BAZAAR"));
    }

    // LoRAs follow the role order: character, then object.
    let loras = harness.frames.loras.lock().unwrap().clone();
    assert_eq!(loras[0], vec!["https://weights/zara", "https://weights/mug"]);
}

#[tokio::test]
async fn continuity_hint_follows_capability_table() {
    let temp = TempDir::new().unwrap();
    let plan = scene_plan(&[
        PlannedScene("A market", "She buys an orange", "tracking", 5.0, None),
        PlannedScene("A river", "She sits", "static", 5.0, None),
    ]);

    let harness = Harness::new(plan.clone(), FakeVideo::new(VideoBackend::EngineA));
    let pipeline = Pipeline::new(config(temp.path()), harness.services());
    let request = GenerationRequest::new(MARKET_RIVER, selection(false, false))
        .with_preset(QualityPreset::fixed(2));
    pipeline.run(&request, not_cancelled()).await.unwrap();
    assert_eq!(harness.video.calls_matching("Continues from the previous scene: She buys an orange"), 1);

    let harness = Harness::new(plan, FakeVideo::new(VideoBackend::EngineB));
    let pipeline = Pipeline::new(config(temp.path()), harness.services());
    pipeline.run(&request, not_cancelled()).await.unwrap();
    assert_eq!(harness.video.calls_matching("Continues from the previous scene"), 0);
}

#[tokio::test]
async fn sound_effects_follow_clip_duration_and_degrade_to_silence() {
    let temp = TempDir::new().unwrap();
    let plan = scene_plan(&[
        PlannedScene("A market", "She walks", "tracking", 7.0, Some("market chatter")),
        PlannedScene("A river", "She sits", "static", 5.0, None),
        PlannedScene("A bridge", "She waves", "static", 5.0, Some(FAIL_SOUND)),
    ]);
    let harness = Harness::new(plan, FakeVideo::new(VideoBackend::EngineA));
    let pipeline = Pipeline::new(config(temp.path()), harness.services());

    let request = GenerationRequest::new("Market, river, bridge.", selection(false, false))
        .with_preset(QualityPreset::fixed(3))
        .with_audio(true);
    let output = pipeline.run(&request, not_cancelled()).await.unwrap();
    let manifest = output.manifest.unwrap();

    // Audio failure never excludes a scene.
    assert_eq!(manifest.included(), vec![0, 1, 2]);
    assert!(manifest.scenes[0].has_audio);
    assert!(!manifest.scenes[1].has_audio);
    assert!(!manifest.scenes[2].has_audio);
    assert!(matches!(
        manifest.scenes[2].advisories.as_slice(),
        [Advisory::AudioFailed { .. }]
    ));

    let requests = harness.sound.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    assert!(requests.contains(&("market chatter".to_string(), 9.0)));

    assert_eq!(harness.editor.count("mux_audio"), 1);
    assert_eq!(harness.editor.count("add_silent_track"), 2);
}

#[tokio::test]
async fn audio_disabled_requests_no_sound() {
    let temp = TempDir::new().unwrap();
    let plan = scene_plan(&[PlannedScene("A market", "She walks", "tracking", 5.0, Some("chatter"))]);
    let harness = Harness::new(plan, FakeVideo::new(VideoBackend::EngineA));
    let pipeline = Pipeline::new(config(temp.path()), harness.services());

    let request = GenerationRequest::new("She walks.", selection(false, false))
        .with_preset(QualityPreset::fixed(1));
    let output = pipeline.run(&request, not_cancelled()).await.unwrap();

    assert!(harness.sound.requests.lock().unwrap().is_empty());
    assert!(!output.manifest.unwrap().scenes[0].has_audio);
}

#[tokio::test]
async fn metadata_only_stops_after_planning() {
    let temp = TempDir::new().unwrap();
    let plan = scene_plan(&[PlannedScene("A market", "She walks", "tracking", 5.0, None)]);
    let harness = Harness::new(plan, FakeVideo::new(VideoBackend::EngineA));
    let pipeline = Pipeline::new(config(temp.path()), harness.services());

    let request = GenerationRequest::new("She walks.", selection(false, false))
        .with_preset(QualityPreset::auto(3))
        .metadata_only();
    let output = pipeline.run(&request, not_cancelled()).await.unwrap();

    assert_eq!(output.scenes.len(), 1);
    assert!(output.manifest.is_none());
    assert!(output.video.is_none());
    assert!(output.run_dir.join("scene_plan.json").exists());
    assert!(harness.frames.prompts.lock().unwrap().is_empty());
    assert!(harness.video.requests().is_empty());
}

#[tokio::test]
async fn malformed_plan_fails_before_any_scene_work() {
    let temp = TempDir::new().unwrap();
    let harness = Harness::new("I could not do that".to_string(), FakeVideo::new(VideoBackend::EngineA));
    let pipeline = Pipeline::new(config(temp.path()), harness.services());

    let request = GenerationRequest::new(MARKET_RIVER, selection(false, false))
        .with_preset(QualityPreset::fixed(2));
    let err = pipeline.run(&request, not_cancelled()).await.unwrap_err();

    assert!(matches!(err, PipelineError::PlanningFailed(_)));
    assert!(harness.frames.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cancellation_stops_unstarted_scenes() {
    let temp = TempDir::new().unwrap();
    let plan = scene_plan(&[
        PlannedScene("A market", "She walks", "tracking", 5.0, None),
        PlannedScene("A bridge", "She crosses", "static", 5.0, None),
        PlannedScene("A river", "She sits", "static", 5.0, None),
    ]);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let mut video = FakeVideo::new(VideoBackend::EngineB);
    video.cancel_after_first = Some(cancel_tx);
    let harness = Harness::new(plan, video);

    let mut config = config(temp.path());
    config.max_scene_parallel = 1;
    let pipeline = Pipeline::new(config, harness.services());

    let request = GenerationRequest::new("Market, bridge, river.", selection(false, false))
        .with_preset(QualityPreset::fixed(3));
    let err = pipeline.run(&request, cancel_rx).await.unwrap_err();

    let manifest = match err {
        PipelineError::Cancelled { manifest } => manifest,
        other => panic!("expected Cancelled, got {:?}", other),
    };

    // The in-flight scene finishes; the rest never start.
    assert_eq!(manifest.included(), vec![0]);
    assert_eq!(
        manifest.excluded(),
        vec![
            (1, ExclusionReason::Cancelled),
            (2, ExclusionReason::Cancelled)
        ]
    );
    assert_eq!(harness.video.requests().len(), 1);
    assert_eq!(harness.editor.count("concat_scenes"), 0);
}

#[tokio::test]
async fn narration_is_mixed_or_reported() {
    let temp = TempDir::new().unwrap();
    let plan = scene_plan(&[
        PlannedScene("A market", "She walks", "tracking", 5.0, None),
        PlannedScene("A river", "She sits", "static", 5.0, None),
    ]);
    let request = GenerationRequest::new(MARKET_RIVER, selection(false, false))
        .with_preset(QualityPreset::fixed(2))
        .with_narration(true);

    let harness = Harness::new(plan.clone(), FakeVideo::new(VideoBackend::EngineA));
    let pipeline = Pipeline::new(config(temp.path()), harness.services());
    let output = pipeline.run(&request, not_cancelled()).await.unwrap();
    let manifest = output.manifest.unwrap();
    assert!(manifest.advisories.is_empty());
    assert!(output
        .video
        .unwrap()
        .output_reference
        .ends_with("final_video_narrated.mp4"));
    assert_eq!(harness.editor.count("mix_narration"), 1);

    let harness = Harness::new(plan, FakeVideo::new(VideoBackend::EngineA));
    let mut services = harness.services();
    services.speech = Some(Arc::new(FakeSpeech { fail: true }));
    let pipeline = Pipeline::new(config(temp.path()), services);
    let output = pipeline.run(&request, not_cancelled()).await.unwrap();
    let manifest = output.manifest.unwrap();
    assert!(matches!(
        manifest.advisories.as_slice(),
        [Advisory::NarrationFailed { .. }]
    ));
    assert!(output.video.unwrap().output_reference.ends_with("final_video.mp4"));
    assert_eq!(
        manifest.scenes.iter().map(|e| e.status).collect::<Vec<_>>(),
        vec![SceneStatus::Included, SceneStatus::Included]
    );
}

#[tokio::test]
async fn unmuxable_sound_falls_back_to_silence() {
    let temp = TempDir::new().unwrap();
    let plan = scene_plan(&[PlannedScene("A market", "She walks", "tracking", 5.0, Some("chatter"))]);
    let harness = Harness {
        editor: Arc::new(FakeEditor {
            fail_mux: true,
            ..FakeEditor::default()
        }),
        ..Harness::new(plan, FakeVideo::new(VideoBackend::EngineA))
    };
    let pipeline = Pipeline::new(config(temp.path()), harness.services());

    let request = GenerationRequest::new("She walks.", selection(false, false))
        .with_preset(QualityPreset::fixed(1))
        .with_audio(true);
    let output = pipeline.run(&request, not_cancelled()).await.unwrap();
    let manifest = output.manifest.unwrap();

    assert_eq!(manifest.included(), vec![0]);
    assert!(!manifest.scenes[0].has_audio);
    assert!(matches!(
        manifest.scenes[0].advisories.as_slice(),
        [Advisory::AudioFailed { .. }]
    ));
    assert!(output.video.unwrap().ordered_clips[0].audio.is_none());
    assert_eq!(harness.editor.count("add_silent_track"), 1);
}

#[tokio::test]
async fn unreadable_clip_is_dropped_at_assembly() {
    let temp = TempDir::new().unwrap();
    let plan = scene_plan(&[
        PlannedScene("A market", "She walks", "tracking", 5.0, None),
        PlannedScene("A bridge", "She crosses", "static", 5.0, None),
        PlannedScene("A river", "She sits", "static", 5.0, None),
    ]);
    let harness = Harness {
        editor: Arc::new(FakeEditor {
            unreadable_scene: Some("scene_1"),
            ..FakeEditor::default()
        }),
        ..Harness::new(plan, FakeVideo::new(VideoBackend::EngineB))
    };
    let pipeline = Pipeline::new(config(temp.path()), harness.services());

    let request = GenerationRequest::new("Market, bridge, river.", selection(false, false))
        .with_preset(QualityPreset::fixed(3));
    let output = pipeline.run(&request, not_cancelled()).await.unwrap();
    let manifest = output.manifest.unwrap();

    assert_eq!(manifest.included(), vec![0, 2]);
    assert_eq!(manifest.excluded(), vec![(1, ExclusionReason::AssemblyFailed)]);
    assert!(manifest.scenes[1]
        .detail
        .as_deref()
        .unwrap()
        .contains("moov atom not found"));
    assert_eq!(output.video.unwrap().included_indices(), vec![0, 2]);
    assert_eq!(read_manifest(&output.run_dir.join("manifest.json")), manifest);

    let inputs = harness.editor.scene_inputs.lock().unwrap().clone();
    assert_eq!(inputs.len(), 2);
    assert!(inputs[0].to_string_lossy().contains("scene_0"));
    assert!(inputs[1].to_string_lossy().contains("scene_2"));
}

#[tokio::test]
async fn no_readable_clip_is_assembly_empty() {
    let temp = TempDir::new().unwrap();
    let plan = scene_plan(&[PlannedScene("A market", "She walks", "tracking", 5.0, None)]);
    let harness = Harness {
        editor: Arc::new(FakeEditor {
            unreadable_scene: Some("scene_0"),
            ..FakeEditor::default()
        }),
        ..Harness::new(plan, FakeVideo::new(VideoBackend::EngineB))
    };
    let pipeline = Pipeline::new(config(temp.path()), harness.services());

    let request = GenerationRequest::new("She walks.", selection(false, false))
        .with_preset(QualityPreset::fixed(1));
    let err = pipeline.run(&request, not_cancelled()).await.unwrap_err();

    match err {
        PipelineError::AssemblyEmpty { manifest } => {
            assert_eq!(manifest.excluded(), vec![(0, ExclusionReason::AssemblyFailed)]);
        }
        other => panic!("expected AssemblyEmpty, got {:?}", other),
    }
    assert_eq!(harness.editor.count("concat_scenes"), 0);
    assert!(only_run_dir(temp.path()).join("manifest.json").exists());
}

#[tokio::test]
async fn failed_concatenation_still_writes_manifest() {
    let temp = TempDir::new().unwrap();
    let plan = scene_plan(&[
        PlannedScene("A busy market at noon", "She walks between stalls", "tracking", 5.0, None),
        PlannedScene("A quiet river at dusk", "She sits on the bank", "static", 5.0, None),
    ]);
    let harness = Harness {
        editor: Arc::new(FakeEditor {
            fail_concat: true,
            ..FakeEditor::default()
        }),
        ..Harness::new(plan, FakeVideo::new(VideoBackend::EngineA))
    };
    let pipeline = Pipeline::new(config(temp.path()), harness.services());

    let request = GenerationRequest::new(MARKET_RIVER, selection(false, false))
        .with_preset(QualityPreset::fixed(2));
    let err = pipeline.run(&request, not_cancelled()).await.unwrap_err();
    assert!(matches!(err, PipelineError::Media(_)));

    let manifest = read_manifest(&only_run_dir(temp.path()).join("manifest.json"));
    assert_eq!(manifest.scenes.len(), 2);
    assert!(manifest.output_reference.is_none());
}

#[tokio::test]
async fn stuck_frame_call_times_out_without_blocking_siblings() {
    let temp = TempDir::new().unwrap();
    let plan = scene_plan(&[
        PlannedScene("A market", "She walks", "tracking", 5.0, None),
        PlannedScene("A bridge", "She crosses", STALL_FRAME, 5.0, None),
        PlannedScene("A river", "She sits", "static", 5.0, None),
    ]);
    let harness = Harness::new(plan, FakeVideo::new(VideoBackend::EngineB));
    let mut config = config(temp.path());
    config.call_timeout = std::time::Duration::from_millis(50);
    let pipeline = Pipeline::new(config, harness.services());

    let request = GenerationRequest::new("Market, bridge, river.", selection(false, false))
        .with_preset(QualityPreset::fixed(3));
    let output = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        pipeline.run(&request, not_cancelled()),
    )
    .await
    .expect("run should finish once the stuck call times out")
    .unwrap();
    let manifest = output.manifest.unwrap();

    assert_eq!(manifest.included(), vec![0, 2]);
    assert_eq!(manifest.excluded(), vec![(1, ExclusionReason::FrameFailed)]);
    assert!(manifest.scenes[1].detail.as_deref().unwrap().contains("Timed out"));
    assert_eq!(harness.video.calls_matching(STALL_FRAME), 0);
}
