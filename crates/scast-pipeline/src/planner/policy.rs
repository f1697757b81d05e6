//! Scene-count heuristic.

use scast_models::SceneCount;

/// Suggests how many scenes a script needs.
///
/// The suggestion only shapes the planner prompt. Plans are validated
/// against the preset bound, never against the suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneCountPolicy {
    /// Words of flowing prose covered by one scene
    pub narrative_words_per_scene: usize,
    /// Words of a bulleted or numbered script covered by one scene
    pub list_words_per_scene: usize,
}

impl Default for SceneCountPolicy {
    fn default() -> Self {
        Self {
            narrative_words_per_scene: 60,
            list_words_per_scene: 25,
        }
    }
}

impl SceneCountPolicy {
    /// Suggested count for `script`, always within `bound`.
    pub fn suggest(&self, script: &str, bound: SceneCount) -> u32 {
        match bound {
            SceneCount::Fixed { count } => count,
            SceneCount::Auto { max } => {
                let words = script.split_whitespace().count();
                let per_scene = if is_list_like(script) {
                    self.list_words_per_scene
                } else {
                    self.narrative_words_per_scene
                }
                .max(1);
                let wanted = words.div_ceil(per_scene).max(1);
                (wanted.min(max.max(1) as usize)) as u32
            }
        }
    }
}

/// True when most non-empty lines are list items.
fn is_list_like(script: &str) -> bool {
    let lines: Vec<&str> = script
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let items = lines.iter().filter(|l| is_list_item(l)).count();
    items >= 2 && items * 2 >= lines.len()
}

fn is_list_item(line: &str) -> bool {
    if line.starts_with(['-', '*', '•']) {
        return true;
    }
    let digits = line.chars().take_while(char::is_ascii_digit).count();
    digits > 0 && matches!(line[digits..].chars().next(), Some('.') | Some(')'))
}
