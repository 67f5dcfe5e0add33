//! Backend Lifecycle Adapter
//!
//! Converts the structured `lifecycle` object a server attaches to a record
//! into the canonical `LifecycleResult`. Performs no validation beyond
//! structural presence; per-type consumers decide whether to trust it.

use lifecycle_types::{
    BackendLifecycle, BackendStage, LifecycleResult, LifecycleStatus, StageStatus, SubStage,
    UNKNOWN_STAGE_NAME,
};
use tracing::debug;

/// Percent used for a stage key missing from the fixed table
pub const UNKNOWN_STAGE_PERCENT: u8 = 30;

/// Heuristic percent-complete for a stage key.
///
/// Absent (or blank) key is 0, unknown key is 30.
pub fn stage_percent(key: Option<&str>) -> u8 {
    let Some(key) = key.map(str::trim).filter(|k| !k.is_empty()) else {
        return 0;
    };
    match key {
        "draft" => 0,
        "pending_review" => 15,
        "rejected" => 15,
        "audited" => 50,
        "pushed" => 100,
        "effective" => 50,
        "executing" => 50,
        "delivered" => 75,
        "completed" => 100,
        _ => UNKNOWN_STAGE_PERCENT,
    }
}

/// Convert a backend-supplied lifecycle into a `LifecycleResult`.
///
/// `None` yields the empty result. A direct `percent` on the payload wins
/// over the key table.
pub fn adapt_backend_lifecycle(lifecycle: Option<&BackendLifecycle>) -> LifecycleResult {
    let Some(lifecycle) = lifecycle else {
        return LifecycleResult::empty();
    };

    let percent = match lifecycle.percent {
        Some(p) if p.is_finite() => p.round().clamp(0.0, 100.0) as u8,
        _ => stage_percent(lifecycle.current_stage_key.as_deref()),
    };

    let status = lifecycle
        .status
        .as_deref()
        .and_then(|s| s.parse::<LifecycleStatus>().ok());

    debug!(
        stage = ?lifecycle.current_stage_key,
        percent,
        stages = lifecycle.main_stages.len(),
        "adapted backend lifecycle"
    );

    LifecycleResult {
        percent,
        stage_name: lifecycle
            .current_stage_name
            .clone()
            .unwrap_or_else(|| UNKNOWN_STAGE_NAME.to_string()),
        status,
        main_stages: convert_stages(&lifecycle.main_stages),
        sub_stages: lifecycle.sub_stages.as_deref().map(convert_stages),
        next_step_suggestions: lifecycle.next_step_suggestions.clone(),
    }
}

fn convert_stages(stages: &[BackendStage]) -> Vec<SubStage> {
    stages
        .iter()
        .map(|s| {
            SubStage::new(
                s.key.clone(),
                s.label.clone(),
                s.status.parse().unwrap_or(StageStatus::Pending),
            )
        })
        .collect()
}
