//! Video generation backends and their capability tables.
//!
//! Every backend is described by data: the clip durations it can produce,
//! how each duration is split into native generation calls, the highest
//! resolution it renders, and whether it honors continuity hints between
//! consecutive scenes. Callers never branch on the backend name to decide
//! any of these.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ModelError;

/// Output resolution tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum Resolution {
    #[serde(rename = "480p")]
    P480,
    #[serde(rename = "540p")]
    P540,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::P480 => "480p",
            Resolution::P540 => "540p",
            Resolution::P720 => "720p",
            Resolution::P1080 => "1080p",
        }
    }

    pub fn height(&self) -> u32 {
        match self {
            Resolution::P480 => 480,
            Resolution::P540 => 540,
            Resolution::P720 => 720,
            Resolution::P1080 => 1080,
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Static description of what a backend can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapabilityTable {
    /// Clip durations (seconds) the backend can deliver, ascending
    pub allowed_durations: &'static [u32],
    /// Native call lengths making up each allowed duration
    pub segment_plans: &'static [(u32, &'static [u32])],
    /// Highest resolution the backend renders
    pub max_resolution: Resolution,
    /// Whether a continuity hint from the previous scene is forwarded
    pub continuity_hints: bool,
}

impl CapabilityTable {
    /// Longest allowed duration.
    pub fn max_duration(&self) -> u32 {
        self.allowed_durations.last().copied().unwrap_or(0)
    }

    /// Native call lengths for an allowed duration.
    pub fn segments_for(&self, duration: u32) -> Vec<u32> {
        self.segment_plans
            .iter()
            .find(|(d, _)| *d == duration)
            .map(|(_, segments)| segments.to_vec())
            .unwrap_or_else(|| vec![duration])
    }

    /// Quantize a requested duration.
    ///
    /// Rounds up to the nearest allowed duration; requests above the
    /// maximum clamp to the maximum and are flagged.
    pub fn choose_duration(&self, requested: f64) -> DurationChoice {
        let fitting = self
            .allowed_durations
            .iter()
            .copied()
            .find(|d| requested.is_nan() || f64::from(*d) >= requested);

        let (duration_seconds, clamped) = match fitting {
            Some(d) => (d, false),
            None => (self.max_duration(), true),
        };

        DurationChoice {
            requested,
            duration_seconds,
            clamped,
            segments: self.segments_for(duration_seconds),
        }
    }
}

/// Result of quantizing a requested duration against a capability table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DurationChoice {
    pub requested: f64,
    pub duration_seconds: u32,
    /// True when the request exceeded the backend maximum
    pub clamped: bool,
    /// Native call lengths, generated in order and concatenated
    pub segments: Vec<u32>,
}

/// Interchangeable video generation backends.
///
/// Exactly one backend serves a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum VideoBackend {
    /// Luma Dream Machine ray-2 (direct API)
    EngineA,
    /// LTX Video on fal
    EngineB,
    /// Luma ray-2 on fal
    EngineC,
}

const ENGINE_A: CapabilityTable = CapabilityTable {
    allowed_durations: &[5, 9, 14, 18],
    segment_plans: &[(5, &[5]), (9, &[9]), (14, &[5, 9]), (18, &[9, 9])],
    max_resolution: Resolution::P720,
    continuity_hints: true,
};

const ENGINE_B: CapabilityTable = CapabilityTable {
    allowed_durations: &[5, 10],
    segment_plans: &[(5, &[5]), (10, &[5, 5])],
    max_resolution: Resolution::P480,
    continuity_hints: false,
};

const ENGINE_C: CapabilityTable = CapabilityTable {
    allowed_durations: &[5, 10],
    segment_plans: &[(5, &[5]), (10, &[5, 5])],
    max_resolution: Resolution::P540,
    continuity_hints: false,
};

impl VideoBackend {
    pub const ALL: &'static [VideoBackend] = &[
        VideoBackend::EngineA,
        VideoBackend::EngineB,
        VideoBackend::EngineC,
    ];

    pub fn capabilities(&self) -> &'static CapabilityTable {
        match self {
            VideoBackend::EngineA => &ENGINE_A,
            VideoBackend::EngineB => &ENGINE_B,
            VideoBackend::EngineC => &ENGINE_C,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VideoBackend::EngineA => "engine_a",
            VideoBackend::EngineB => "engine_b",
            VideoBackend::EngineC => "engine_c",
        }
    }
}

impl fmt::Display for VideoBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for VideoBackend {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "engine_a" | "a" | "luma" => Ok(VideoBackend::EngineA),
            "engine_b" | "b" | "ltx" => Ok(VideoBackend::EngineB),
            "engine_c" | "c" | "fal" => Ok(VideoBackend::EngineC),
            _ => Err(ModelError::UnknownBackend(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_a_rounds_up() {
        let choice = VideoBackend::EngineA.capabilities().choose_duration(7.0);
        assert_eq!(choice.duration_seconds, 9);
        assert!(!choice.clamped);
        assert_eq!(choice.segments, vec![9]);
    }

    #[test]
    fn test_engine_a_clamps_above_max() {
        let choice = VideoBackend::EngineA.capabilities().choose_duration(25.0);
        assert_eq!(choice.duration_seconds, 18);
        assert!(choice.clamped);
        assert_eq!(choice.segments, vec![9, 9]);
    }

    #[test]
    fn test_exact_duration_is_kept() {
        let choice = VideoBackend::EngineB.capabilities().choose_duration(10.0);
        assert_eq!(choice.duration_seconds, 10);
        assert!(!choice.clamped);
        assert_eq!(choice.segments, vec![5, 5]);
    }

    #[test]
    fn test_every_choice_is_allowed_or_clamped() {
        for backend in VideoBackend::ALL {
            let caps = backend.capabilities();
            for tenths in 1..300 {
                let requested = f64::from(tenths) / 10.0;
                let choice = caps.choose_duration(requested);
                assert!(caps.allowed_durations.contains(&choice.duration_seconds));
                assert_eq!(choice.clamped, requested > f64::from(caps.max_duration()));
                assert_eq!(
                    choice.segments.iter().sum::<u32>(),
                    choice.duration_seconds,
                    "segment plan for {} {}s",
                    backend,
                    choice.duration_seconds
                );
            }
        }
    }

    #[test]
    fn test_backend_parsing() {
        assert_eq!("engine-a".parse::<VideoBackend>(), Ok(VideoBackend::EngineA));
        assert_eq!("LTX".parse::<VideoBackend>(), Ok(VideoBackend::EngineB));
        assert!("sora".parse::<VideoBackend>().is_err());
    }
}
