//! Pipeline metrics.

use metrics::counter;

pub mod names {
    /// Scene stage outcomes by stage and outcome.
    pub const SCENE_OUTCOMES_TOTAL: &str = "scast_scene_outcomes_total";

    /// Finished runs by result.
    pub const RUNS_TOTAL: &str = "scast_runs_total";
}

/// Record the result of one per-scene stage.
pub fn record_scene_stage(stage: &str, outcome: &str) {
    counter!(
        names::SCENE_OUTCOMES_TOTAL,
        "stage" => stage.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record a finished run.
pub fn record_run(result: &str) {
    counter!(names::RUNS_TOTAL, "result" => result.to_string()).increment(1);
}
