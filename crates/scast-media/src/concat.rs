//! Concatenation of generated segments and scene clips.

use std::path::{Path, PathBuf};

use scast_models::EncodingConfig;
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};
use crate::progress::FfmpegProgress;

/// Body of a concat demuxer list file.
pub fn concat_list(inputs: &[PathBuf]) -> String {
    inputs
        .iter()
        .map(|path| {
            // Single quotes inside a quoted entry are written as '\''
            let escaped = path.to_string_lossy().replace('\'', r"'\''");
            format!("file '{}'\n", escaped)
        })
        .collect()
}

/// Join segments produced by one backend for one scene.
///
/// Segments share codec parameters, so streams are copied.
pub async fn concat_segments(
    runner: &FfmpegRunner,
    inputs: &[PathBuf],
    output: &Path,
) -> MediaResult<()> {
    match inputs {
        [] => return Err(MediaError::invalid_argument("no segments to concatenate")),
        [single] => {
            tokio::fs::copy(single, output).await?;
            return Ok(());
        }
        _ => {}
    }

    let list_path = output.with_extension("concat.txt");
    tokio::fs::write(&list_path, concat_list(inputs)).await?;

    let cmd = FfmpegCommand::new(&list_path, output)
        .output_args(["-c", "copy"]);
    let cmd = with_concat_demuxer(cmd);

    let result = runner.run(&cmd).await;
    let _ = tokio::fs::remove_file(&list_path).await;
    result
}

fn with_concat_demuxer(cmd: FfmpegCommand) -> FfmpegCommand {
    cmd.input_arg("-f")
        .input_arg("concat")
        .input_arg("-safe")
        .input_arg("0")
}

/// Filter graph joining `count` clips that each carry one video and one audio stream.
pub fn concat_filter(count: usize, encoding: &EncodingConfig) -> String {
    let mut graph = String::new();
    let scale = encoding
        .scale_filter()
        .map(|s| format!("{},", s))
        .unwrap_or_default();

    for i in 0..count {
        graph.push_str(&format!(
            "[{i}:v]{scale}fps=24,format=yuv420p,setpts=PTS-STARTPTS[v{i}];\
             [{i}:a]aresample={rate},aformat=channel_layouts=stereo,asetpts=PTS-STARTPTS[a{i}];",
            i = i,
            scale = scale,
            rate = encoding.sample_rate,
        ));
    }
    for i in 0..count {
        graph.push_str(&format!("[v{i}][a{i}]", i = i));
    }
    graph.push_str(&format!("concat=n={}:v=1:a=1[v][a]", count));
    graph
}

/// Concatenate scene clips in the given order into one re-encoded file.
///
/// Every input must have an audio stream.
pub fn concat_scenes_command(
    inputs: &[PathBuf],
    output: &Path,
    encoding: &EncodingConfig,
) -> MediaResult<FfmpegCommand> {
    let (first, rest) = inputs
        .split_first()
        .ok_or_else(|| MediaError::invalid_argument("no clips to concatenate"))?;

    let cmd = rest
        .iter()
        .fold(FfmpegCommand::new(first, output), |cmd, path| cmd.input(path));

    Ok(cmd
        .filter_complex(concat_filter(inputs.len(), encoding))
        .map("[v]")
        .map("[a]")
        .output_args(encoding.to_ffmpeg_args())
        .output_args(["-movflags", "+faststart"]))
}

pub async fn concat_scenes(
    runner: &FfmpegRunner,
    inputs: &[PathBuf],
    output: &Path,
    encoding: &EncodingConfig,
    expected_seconds: f64,
) -> MediaResult<()> {
    info!(clips = inputs.len(), output = %output.display(), "Concatenating scene clips");
    let cmd = concat_scenes_command(inputs, output, encoding)?;
    runner
        .run_with_progress(&cmd, move |p: FfmpegProgress| {
            debug!(fraction = p.fraction(expected_seconds), "Concat progress");
        })
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = concat_list(&[PathBuf::from("/tmp/a.mp4"), PathBuf::from("/tmp/it's.mp4")]);
        assert_eq!(list, "file '/tmp/a.mp4'\nfile '/tmp/it'\\''s.mp4'\n");
    }

    #[test]
    fn test_concat_filter_orders_inputs() {
        let graph = concat_filter(2, &EncodingConfig::default());
        let pairs = graph.find("[v0][a0][v1][a1]concat=n=2:v=1:a=1[v][a]");
        assert!(pairs.is_some());
        assert!(!graph.contains("scale="));
    }

    #[test]
    fn test_concat_scenes_command_uses_every_input_once() {
        let inputs: Vec<PathBuf> = ["s0.mp4", "s2.mp4"].iter().map(PathBuf::from).collect();
        let args = concat_scenes_command(&inputs, Path::new("final.mp4"), &EncodingConfig::default())
            .unwrap()
            .build_args();
        let sources: Vec<&String> = args
            .iter()
            .zip(args.iter().skip(1))
            .filter(|(flag, _)| *flag == "-i")
            .map(|(_, src)| src)
            .collect();
        assert_eq!(sources, vec!["s0.mp4", "s2.mp4"]);
    }

    #[test]
    fn test_concat_scenes_rejects_empty() {
        assert!(concat_scenes_command(&[], Path::new("x.mp4"), &EncodingConfig::default()).is_err());
    }
}
