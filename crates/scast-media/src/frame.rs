//! Frame extraction.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Offset from the end of the clip where the last frame is read.
const LAST_FRAME_OFFSET_SECS: f64 = 0.1;

pub fn extract_last_frame_command(video: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(video, output)
        .seek_from_end(LAST_FRAME_OFFSET_SECS)
        .output_args(["-update", "1"])
        .single_frame()
}

/// Write the final frame of `video` as an image.
pub async fn extract_last_frame(runner: &FfmpegRunner, video: &Path, output: &Path) -> MediaResult<()> {
    runner.run(&extract_last_frame_command(video, output)).await
}
