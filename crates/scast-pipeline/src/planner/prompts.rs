//! Planner prompt text.

use schemars::JsonSchema;

use scast_models::{SceneCount, SceneDescriptor, VideoBackend};

use super::parse::{describe_bound, PlanDefect};

pub(crate) const ENVIRONMENT_SYSTEM: &str =
    "You are an expert at describing physical environments for video scenes.";

pub(crate) const SCENE_SYSTEM: &str = "You are an expert at creating detailed scene descriptions.";

pub(crate) const NARRATION_SYSTEM: &str = "You are an expert at writing engaging narration scripts.";

/// Shape of one scene as requested from the model.
#[derive(JsonSchema)]
#[allow(dead_code)]
struct PlannedScene {
    /// Descriptive name capturing the essence of the moment
    scene_name: String,
    /// Setting, lighting, weather and time of day
    environment_description: String,
    /// Character appearance and movement, object interactions, flow of action
    movement_description: String,
    /// Mood, emotional undertones and visual emotional cues
    emotions: String,
    /// Shot type, angle and movement, or "static"
    camera_instruction: String,
    /// Requested duration in seconds
    duration_seconds: f64,
    /// Environmental, action and ambient sounds, or "none"
    sound_effect_prompt: Option<String>,
}

fn scene_schema() -> String {
    let schema = schemars::schema_for!(Vec<PlannedScene>);
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

pub(crate) fn environment_prompt(script: &str, max_environments: u32, custom: Option<&str>) -> String {
    let body = match custom {
        Some(custom) => custom.trim().to_string(),
        None => format!(
            "Create a JSON array of detailed physical environment descriptions based on the script.\n\
             Each environment should include setting details, lighting conditions, weather and \
             atmospheric conditions, time of day, and key objects in the scene.\n\
             Maximum number of physical environments is {}.\n\
             Several scenes will reuse the same environment, so keep the descriptions cohesive.",
            max_environments
        ),
    };

    format!(
        "Script:\n{}\n\n{}\n\n\
         Return only an array of objects with the format:\n\
         {{\"scene_physical_environment\": \"detailed description\"}}",
        script.trim(),
        body
    )
}

pub(crate) fn scene_prompt(
    script: &str,
    bound: SceneCount,
    suggested: u32,
    backend: VideoBackend,
    environments: &[String],
) -> String {
    let count = match bound {
        SceneCount::Fixed { count } => format!("Create exactly {} scenes.", count),
        SceneCount::Auto { max } => format!(
            "Create between 1 and {} scenes; about {} suits this script.",
            max, suggested
        ),
    };

    let durations = backend
        .capabilities()
        .allowed_durations
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ");

    let palette = if environments.is_empty() {
        String::new()
    } else {
        let listed = environments
            .iter()
            .enumerate()
            .map(|(i, e)| format!("{}. {}", i + 1, e))
            .collect::<Vec<_>>()
            .join("\n");
        format!(
            "\n\nUse one of these physical environments as each scene's environment_description, \
             reusing the same environment across consecutive scenes where the story allows:\n{}",
            listed
        )
    };

    format!(
        "Script:\n{script}\n\n\
         Break the script into scenes in story order. {count}\n\
         For every scene describe:\n\
         - character movements and actions, with appearance (age, clothing, style) kept consistent between scenes\n\
         - the mood and emotional cues\n\
         - the camera: shot type, angle and smooth movement, or \"static\"\n\
         - sound effects: environmental, action and ambient sounds, or \"none\" for silence\n\
         Each scene should pick up where the previous scene left off.\n\
         duration_seconds should be one of: {durations}.{palette}\n\n\
         Return only a JSON array matching this schema:\n{schema}",
        script = script.trim(),
        count = count,
        durations = durations,
        palette = palette,
        schema = scene_schema(),
    )
}

/// Reformulation used after a malformed first answer.
pub(crate) fn strict_scene_prompt(base: &str, defect: &PlanDefect, bound: SceneCount) -> String {
    format!(
        "{}\n\nYour previous answer was rejected: {}.\n\
         Respond with a bare JSON array of {} scene objects and nothing else. \
         Every object must have non-empty environment_description, movement_description and \
         camera_instruction strings and a positive numeric duration_seconds.",
        base,
        defect,
        describe_bound(bound)
    )
}

pub(crate) fn narration_prompt(scenes: &[&SceneDescriptor], total_seconds: f64) -> String {
    let descriptions = scenes
        .iter()
        .map(|s| {
            format!(
                "{}:\nEnvironment: {}\nAction: {}\nEmotional Atmosphere: {}\nCamera Movement: {}",
                if s.scene_name.is_empty() {
                    format!("Scene {}", s.index + 1)
                } else {
                    s.scene_name.clone()
                },
                s.environment_description,
                s.movement_description,
                s.emotions,
                s.camera_instruction
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let seconds = total_seconds.round() as u64;
    format!(
        "{}\n\nCreate a narration script for the scenes above. It should take about {} seconds \
         to read at a normal pace, roughly {} words. Write in the present tense, in clear and \
         engaging language for a voice-over, flowing smoothly between scenes.\n\
         Return the narration text only, without formatting or notes.",
        descriptions,
        seconds,
        seconds * 2
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scene_prompt_lists_backend_durations() {
        let prompt = scene_prompt("script", SceneCount::Fixed { count: 2 }, 2, VideoBackend::EngineA, &[]);
        assert!(prompt.contains("Create exactly 2 scenes."));
        assert!(prompt.contains("5, 9, 14, 18"));
        assert!(prompt.contains("environment_description"));
        assert!(!prompt.contains("physical environments as each"));
    }

    #[test]
    fn test_scene_prompt_includes_palette() {
        let envs = vec!["a market".to_string(), "a river".to_string()];
        let prompt = scene_prompt("script", SceneCount::Auto { max: 4 }, 2, VideoBackend::EngineB, &envs);
        assert!(prompt.contains("between 1 and 4 scenes; about 2"));
        assert!(prompt.contains("1. a market\n2. a river"));
    }

    #[test]
    fn test_narration_word_target() {
        let scene = SceneDescriptor {
            index: 0,
            scene_name: String::new(),
            environment_description: "pier".to_string(),
            movement_description: "runs".to_string(),
            emotions: String::new(),
            camera_instruction: "static".to_string(),
            duration_seconds: 9.0,
            sound_effect_prompt: None,
        };
        let prompt = narration_prompt(&[&scene], 9.0);
        assert!(prompt.starts_with("Scene 1:"));
        assert!(prompt.contains("roughly 18 words"));
    }
}
