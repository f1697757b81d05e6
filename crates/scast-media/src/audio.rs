//! Audio track operations: muxing scene sound, silent tracks, narration.

use std::path::Path;

use scast_models::EncodingConfig;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Volume applied to the scene track when narration is mixed over it.
pub const SCENE_TRACK_VOLUME: f64 = 0.7;
/// Volume applied to narration.
pub const NARRATION_VOLUME: f64 = 1.0;

/// Replace a clip's audio with a sound effect, matched to the clip length.
///
/// Longer audio is cut at `video_duration`. Shorter audio is padded with
/// silence, never looped.
pub fn mux_audio_command(
    video: &Path,
    audio: &Path,
    output: &Path,
    video_duration: f64,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    FfmpegCommand::new(video, output)
        .input(audio)
        .filter_complex("[1:a]apad[a]")
        .map("0:v")
        .map("[a]")
        .video_codec("copy")
        .output_args(encoding.audio_args())
        .duration(video_duration)
}

pub async fn mux_audio(
    runner: &FfmpegRunner,
    video: &Path,
    audio: &Path,
    output: &Path,
    video_duration: f64,
    encoding: &EncodingConfig,
) -> MediaResult<()> {
    debug!(video = %video.display(), audio = %audio.display(), "Muxing scene audio");
    runner
        .run(&mux_audio_command(video, audio, output, video_duration, encoding))
        .await
}

/// Give a clip without audio a silent stereo track of the same length.
pub fn add_silent_track_command(
    video: &Path,
    output: &Path,
    video_duration: f64,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    FfmpegCommand::new(video, output)
        .lavfi_input(format!(
            "anullsrc=channel_layout=stereo:sample_rate={}",
            encoding.sample_rate
        ))
        .map("0:v")
        .map("1:a")
        .video_codec("copy")
        .output_args(encoding.audio_args())
        .duration(video_duration)
}

pub async fn add_silent_track(
    runner: &FfmpegRunner,
    video: &Path,
    output: &Path,
    video_duration: f64,
    encoding: &EncodingConfig,
) -> MediaResult<()> {
    runner
        .run(&add_silent_track_command(video, output, video_duration, encoding))
        .await
}

/// `atempo` stages that change speed by `ratio`.
///
/// A single `atempo` accepts 0.5 to 2.0, so larger changes are chained.
pub fn atempo_chain(ratio: f64) -> MediaResult<Vec<f64>> {
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(MediaError::invalid_argument(format!(
            "tempo ratio must be positive, got {}",
            ratio
        )));
    }

    let mut stages = Vec::new();
    let mut remaining = ratio;
    while remaining > 2.0 {
        stages.push(2.0);
        remaining /= 2.0;
    }
    while remaining < 0.5 {
        stages.push(0.5);
        remaining /= 0.5;
    }
    stages.push(remaining);
    Ok(stages)
}

/// Stretch or compress audio so it lasts `target_duration` seconds.
pub fn fit_tempo_command(
    audio: &Path,
    output: &Path,
    audio_duration: f64,
    target_duration: f64,
) -> MediaResult<FfmpegCommand> {
    if target_duration <= 0.0 {
        return Err(MediaError::invalid_argument("target duration must be positive"));
    }

    let filter = atempo_chain(audio_duration / target_duration)?
        .iter()
        .map(|stage| format!("atempo={:.6}", stage))
        .collect::<Vec<_>>()
        .join(",");

    Ok(FfmpegCommand::new(audio, output).audio_filter(filter))
}

pub async fn fit_tempo(
    runner: &FfmpegRunner,
    audio: &Path,
    output: &Path,
    audio_duration: f64,
    target_duration: f64,
) -> MediaResult<()> {
    runner
        .run(&fit_tempo_command(audio, output, audio_duration, target_duration)?)
        .await
}

/// Mix narration over a video's existing audio track.
///
/// The video's length wins; narration beyond it is dropped.
pub fn mix_narration_command(
    video: &Path,
    narration: &Path,
    output: &Path,
    encoding: &EncodingConfig,
) -> FfmpegCommand {
    let graph = format!(
        "[0:a]volume={scene}[a0];[1:a]volume={narr}[a1];\
         [a0][a1]amix=inputs=2:duration=first:dropout_transition=0[a]",
        scene = SCENE_TRACK_VOLUME,
        narr = NARRATION_VOLUME,
    );

    FfmpegCommand::new(video, output)
        .input(narration)
        .filter_complex(graph)
        .map("0:v")
        .map("[a]")
        .video_codec("copy")
        .output_args(encoding.audio_args())
}

pub async fn mix_narration(
    runner: &FfmpegRunner,
    video: &Path,
    narration: &Path,
    output: &Path,
    encoding: &EncodingConfig,
) -> MediaResult<()> {
    runner
        .run(&mix_narration_command(video, narration, output, encoding))
        .await
}
