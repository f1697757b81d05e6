//! FFmpeg CLI wrapper for scene clip assembly.
//!
//! This crate provides:
//! - Multi-input FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Timeout and cancellation for running commands
//! - Probing media files
//! - Audio muxing, silent tracks, narration mixing and tempo fitting
//! - Segment and scene concatenation
//! - Last-frame extraction for chaining generated segments

pub mod audio;
pub mod command;
pub mod concat;
pub mod error;
pub mod frame;
pub mod probe;
pub mod progress;

pub use audio::{add_silent_track, atempo_chain, fit_tempo, mix_narration, mux_audio};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use concat::{concat_scenes, concat_segments};
pub use error::{MediaError, MediaResult};
pub use frame::extract_last_frame;
pub use probe::{probe_duration, probe_media, MediaInfo};
pub use progress::FfmpegProgress;
