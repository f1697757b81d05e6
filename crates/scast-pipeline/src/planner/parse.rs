//! Validation of raw planner output.

use serde_json::{Map, Value};
use thiserror::Error;

use scast_models::{SceneCount, SceneDescriptor};
use scast_providers::strip_code_fences;

/// Why a model response could not be used as a scene plan.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanDefect {
    #[error("response is not valid JSON: {0}")]
    NotJson(String),

    #[error("response is not a list of scenes")]
    NotAList,

    #[error("scene {scene} is not an object")]
    NotAnObject { scene: usize },

    #[error("scene {scene} is missing required field {field}")]
    MissingField { scene: usize, field: &'static str },

    #[error("scene {scene} has an invalid duration: {value}")]
    BadDuration { scene: usize, value: String },

    #[error("expected {expected}, got {got} scenes")]
    WrongCount { expected: String, got: usize },
}

// Accepted spellings for each field, preferred name first.
const ENVIRONMENT: &[&str] = &["environment_description", "scene_physical_environment"];
const MOVEMENT: &[&str] = &["movement_description", "scene_movement_description"];
const CAMERA: &[&str] = &["camera_instruction", "scene_camera_movement"];
const DURATION: &[&str] = &["duration_seconds", "scene_duration"];
const NAME: &[&str] = &["scene_name", "name"];
const EMOTIONS: &[&str] = &["emotions", "scene_emotions"];
const SOUND: &[&str] = &["sound_effect_prompt", "scene_sound_effects_prompt"];

/// Parse and validate a scene plan.
///
/// Indices come from list order, so a valid plan is always `0..N-1`.
pub fn parse_scene_plan(text: &str, bound: SceneCount) -> Result<Vec<SceneDescriptor>, PlanDefect> {
    let items = scene_items(text)?;

    if !bound.accepts(items.len()) {
        return Err(PlanDefect::WrongCount {
            expected: describe_bound(bound),
            got: items.len(),
        });
    }

    items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let obj = item.as_object().ok_or(PlanDefect::NotAnObject { scene: i })?;
            parse_scene(i, obj)
        })
        .collect()
}

/// Parse an environment palette, keeping at most `limit` entries.
///
/// Returns `None` when the response has no usable shape.
pub fn parse_environments(text: &str, limit: usize) -> Option<Vec<String>> {
    let value: Value = serde_json::from_str(strip_code_fences(text)).ok()?;
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut obj) => match obj.remove("environments") {
            Some(Value::Array(items)) => items,
            _ => return None,
        },
        _ => return None,
    };

    let environments: Vec<String> = items
        .iter()
        .filter_map(|item| match item {
            Value::String(s) => Some(s.trim().to_string()),
            Value::Object(obj) => text_field(obj, &["scene_physical_environment", "description"])
                .map(str::to_string),
            _ => None,
        })
        .filter(|s| !s.is_empty())
        .take(limit)
        .collect();

    if environments.is_empty() {
        None
    } else {
        Some(environments)
    }
}

pub(crate) fn describe_bound(bound: SceneCount) -> String {
    match bound {
        SceneCount::Fixed { count } => format!("exactly {}", count),
        SceneCount::Auto { max } => format!("between 1 and {}", max),
    }
}

fn scene_items(text: &str) -> Result<Vec<Value>, PlanDefect> {
    let value: Value = serde_json::from_str(strip_code_fences(text))
        .map_err(|e| PlanDefect::NotJson(e.to_string()))?;
    match value {
        Value::Array(items) => Ok(items),
        Value::Object(mut obj) => match obj.remove("scenes") {
            Some(Value::Array(items)) => Ok(items),
            _ => Err(PlanDefect::NotAList),
        },
        _ => Err(PlanDefect::NotAList),
    }
}

fn parse_scene(index: usize, obj: &Map<String, Value>) -> Result<SceneDescriptor, PlanDefect> {
    let required = |names: &'static [&'static str]| {
        text_field(obj, names)
            .map(str::to_string)
            .ok_or(PlanDefect::MissingField {
                scene: index,
                field: names[0],
            })
    };

    let environment_description = required(ENVIRONMENT)?;
    let movement_description = required(MOVEMENT)?;
    let camera_instruction = required(CAMERA)?;
    let duration_seconds = duration_field(index, obj)?;

    let sound_effect_prompt = text_field(obj, SOUND)
        .filter(|s| !s.eq_ignore_ascii_case("none"))
        .map(str::to_string);

    Ok(SceneDescriptor {
        index: index as u32,
        scene_name: text_field(obj, NAME).unwrap_or_default().to_string(),
        environment_description,
        movement_description,
        emotions: text_field(obj, EMOTIONS).unwrap_or_default().to_string(),
        camera_instruction,
        duration_seconds,
        sound_effect_prompt,
    })
}

/// First non-empty string among the accepted spellings.
fn text_field<'a>(obj: &'a Map<String, Value>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| obj.get(*name))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn duration_field(index: usize, obj: &Map<String, Value>) -> Result<f64, PlanDefect> {
    let value = DURATION
        .iter()
        .find_map(|name| obj.get(*name))
        .ok_or(PlanDefect::MissingField {
            scene: index,
            field: DURATION[0],
        })?;

    let seconds = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().trim_end_matches('s').trim().parse::<f64>().ok(),
        _ => None,
    };

    match seconds {
        Some(s) if s.is_finite() && s > 0.0 => Ok(s),
        _ => Err(PlanDefect::BadDuration {
            scene: index,
            value: value.to_string(),
        }),
    }
}
