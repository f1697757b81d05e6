//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg's `-progress` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed relative to realtime
    pub speed: f64,
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Fraction of the expected output written, in `0.0..=1.0`.
    pub fn fraction(&self, total_seconds: f64) -> f64 {
        if total_seconds <= 0.0 {
            return 0.0;
        }
        (self.out_time_ms as f64 / 1000.0 / total_seconds).clamp(0.0, 1.0)
    }

    /// Fold one `key=value` line into the current state.
    ///
    /// Returns a snapshot at each `progress=` marker, which closes a block.
    pub(crate) fn apply_line(&mut self, line: &str) -> Option<FfmpegProgress> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            "out_time_us" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_ms = us / 1000;
                }
            }
            // Despite the name, ffmpeg reports microseconds here too
            "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_ms = us / 1000;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.frame = frame;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.speed = speed;
                }
            }
            "progress" => {
                self.is_complete = value == "end";
                return Some(self.clone());
            }
            _ => {}
        }
        None
    }

    /// Whether a stderr line belongs to the progress stream.
    pub(crate) fn is_progress_line(line: &str) -> bool {
        matches!(
            line.split_once('=').map(|(k, _)| k),
            Some(
                "frame" | "fps" | "stream_0_0_q" | "bitrate" | "total_size" | "out_time_us"
                    | "out_time_ms" | "out_time" | "dup_frames" | "drop_frames" | "speed"
                    | "progress"
            )
        )
    }
}
