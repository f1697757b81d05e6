//! Quality presets submitted with a generation request.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ModelError;

/// Upper bound used by `auto` when no explicit maximum is given.
pub const DEFAULT_AUTO_MAX_SCENES: u32 = 5;

/// How many scenes the planner may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum SceneCount {
    /// Exactly `count` scenes
    Fixed { count: u32 },
    /// Planner chooses, between 1 and `max`
    Auto { max: u32 },
}

impl SceneCount {
    /// Whether a plan with `n` scenes satisfies this bound.
    pub fn accepts(&self, n: usize) -> bool {
        match *self {
            SceneCount::Fixed { count } => n == count as usize,
            SceneCount::Auto { max } => n >= 1 && n <= max as usize,
        }
    }

    pub fn max(&self) -> u32 {
        match *self {
            SceneCount::Fixed { count } => count,
            SceneCount::Auto { max } => max,
        }
    }

    /// Cap an automatic maximum; fixed counts are kept as requested.
    pub fn capped(self, limit: u32) -> Self {
        match self {
            SceneCount::Auto { max } => SceneCount::Auto {
                max: max.min(limit).max(1),
            },
            fixed => fixed,
        }
    }
}

/// Target quality preset, e.g. `"2 scenes"`, `"auto"`, `"up to 4 scenes"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QualityPreset {
    pub scene_count: SceneCount,
}

impl QualityPreset {
    pub fn fixed(count: u32) -> Self {
        Self {
            scene_count: SceneCount::Fixed { count },
        }
    }

    pub fn auto(max: u32) -> Self {
        Self {
            scene_count: SceneCount::Auto { max },
        }
    }
}

impl Default for QualityPreset {
    fn default() -> Self {
        Self::auto(DEFAULT_AUTO_MAX_SCENES)
    }
}

impl fmt::Display for QualityPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.scene_count {
            SceneCount::Fixed { count: 1 } => write!(f, "1 scene"),
            SceneCount::Fixed { count } => write!(f, "{} scenes", count),
            SceneCount::Auto { max } => write!(f, "up to {} scenes", max),
        }
    }
}

fn parse_count(token: &str, input: &str) -> Result<u32, ModelError> {
    match token.parse::<u32>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ModelError::InvalidPreset(input.to_string())),
    }
}

impl FromStr for QualityPreset {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let words: Vec<&str> = normalized.split_whitespace().collect();

        match words.as_slice() {
            ["auto"] => Ok(Self::default()),
            [n] => Ok(Self::fixed(parse_count(n, s)?)),
            [n, "scene" | "scenes"] => Ok(Self::fixed(parse_count(n, s)?)),
            ["up", "to", n] | ["up", "to", n, "scene" | "scenes"] => {
                Ok(Self::auto(parse_count(n, s)?))
            }
            _ => Err(ModelError::InvalidPreset(s.to_string())),
        }
    }
}
