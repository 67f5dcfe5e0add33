//! Stage-Table Deriver
//!
//! The one algorithm every document type runs:
//! 1. no record -> empty result
//! 2. a trusted server `lifecycle` -> adapter
//! 3. otherwise resolve raw status literals against the stage table and
//!    synthesize a backend-shaped lifecycle locally
//! 4. run that through the adapter
//!
//! Per-type behavior lives entirely in the `StageTable`.

use lifecycle_types::{BackendLifecycle, BackendStage, LifecycleResult, LifecycleStatus, StageStatus};
use serde_json::Value;
use tracing::{debug, warn};

use super::adapter::adapt_backend_lifecycle;
use super::definition::{StageDef, StageTable};
use super::record::RecordView;
use crate::error::LifecycleError;

/// Minimum Jaro-Winkler score for an unknown-literal hint
const HINT_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeriveOptions {
    /// Unknown status literals are errors instead of defaulting to the initial stage
    pub strict: bool,
}

impl DeriveOptions {
    pub fn strict() -> Self {
        Self { strict: true }
    }
}

/// Where a record sits in its stage sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagePosition {
    /// Stage or exception key reported as current
    pub key: String,
    /// Index of the stage shown active (or the terminal stage)
    pub stage_index: usize,
    pub exception: bool,
}

/// Lenient derivation: never fails, unknown literals fall back to the initial stage
pub fn derive(table: &StageTable, record: Option<&Value>) -> LifecycleResult {
    match try_derive(table, record, DeriveOptions::default()) {
        Ok(result) => result,
        Err(e) => {
            warn!(document_type = table.document_type(), error = %e, "lenient derivation failed");
            LifecycleResult::empty()
        }
    }
}

/// Derivation with explicit options
pub fn try_derive(
    table: &StageTable,
    record: Option<&Value>,
    options: DeriveOptions,
) -> Result<LifecycleResult, LifecycleError> {
    let Some(view) = RecordView::new(record) else {
        return Ok(LifecycleResult::empty());
    };

    if let Some(lifecycle) = view.lifecycle() {
        if table.accepts_backend(&lifecycle) {
            debug!(document_type = table.document_type(), "using server lifecycle");
            return Ok(adapt_backend_lifecycle(Some(&lifecycle)));
        }
        if lifecycle.has_stages() {
            warn!(
                document_type = table.document_type(),
                keys = ?lifecycle.stage_keys().collect::<Vec<_>>(),
                "server lifecycle does not match stage vocabulary, deriving locally"
            );
        }
    }

    let position = resolve_position(table, &view, options)?;
    let synthesized = synthesize(table, &view, &position, options)?;
    Ok(adapt_backend_lifecycle(Some(&synthesized)))
}

/// Resolve the current stage from the record's raw status fields
pub fn resolve_position(
    table: &StageTable,
    view: &RecordView<'_>,
    options: DeriveOptions,
) -> Result<StagePosition, LifecycleError> {
    let status_key = match view.first_text(table.status_fields()) {
        Some((field, literal)) => match table.resolve_status(&literal) {
            Some(key) => Some(key),
            None => {
                let closest = unknown_literal(table, field, &literal, table.status_literals(), options)?;
                warn!(
                    document_type = table.document_type(),
                    field,
                    literal = %literal,
                    closest = ?closest,
                    "unknown status literal, using initial stage"
                );
                None
            }
        },
        None => None,
    };

    let review_key = match view.first_text(table.review_status_fields()) {
        Some((field, literal)) => match table.resolve_review(&literal) {
            Some(key) => Some(key),
            // a known status value with no review outcome, e.g. still pending
            None if table.resolve_status(&literal).is_some() => {
                debug!(
                    document_type = table.document_type(),
                    field,
                    literal = %literal,
                    "review literal carries no outcome"
                );
                None
            }
            None => {
                let known = table.review_literals().chain(table.status_literals());
                let closest = unknown_literal(table, field, &literal, known, options)?;
                warn!(
                    document_type = table.document_type(),
                    field,
                    literal = %literal,
                    closest = ?closest,
                    "unknown review literal, ignored"
                );
                None
            }
        },
        None => None,
    };

    let key = pick_key(table, status_key, review_key);
    Ok(position_of(table, key))
}

/// Status exception, then review exception, then the further-along stage
fn pick_key<'t>(
    table: &'t StageTable,
    status_key: Option<&'t str>,
    review_key: Option<&'t str>,
) -> &'t str {
    if let Some(key) = status_key.filter(|k| table.is_exception(k)) {
        return key;
    }
    if let Some(key) = review_key.filter(|k| table.is_exception(k)) {
        return key;
    }
    [status_key, review_key]
        .into_iter()
        .flatten()
        .max_by_key(|k| table.stage_index(k).unwrap_or(0))
        .unwrap_or(table.initial_stage().key.as_str())
}

fn position_of(table: &StageTable, key: &str) -> StagePosition {
    match table.exception(key) {
        Some(exception) => StagePosition {
            key: key.to_string(),
            stage_index: table.stage_index(&exception.at).unwrap_or(0),
            exception: true,
        },
        None => StagePosition {
            key: key.to_string(),
            stage_index: table.stage_index(key).unwrap_or(0),
            exception: false,
        },
    }
}

/// Closest known literal, or the strict-mode error for `literal`
fn unknown_literal<'t>(
    table: &StageTable,
    field: &str,
    literal: &str,
    known: impl Iterator<Item = &'t str>,
    options: DeriveOptions,
) -> Result<Option<String>, LifecycleError> {
    let suggestion = closest_literal(literal, known);
    if options.strict {
        return Err(LifecycleError::UnknownStatus {
            document_type: table.document_type().to_string(),
            field: field.to_string(),
            value: literal.to_string(),
            suggestion,
        });
    }
    Ok(suggestion)
}

/// Closest known literal by Jaro-Winkler similarity
pub fn closest_literal<'t>(literal: &str, known: impl Iterator<Item = &'t str>) -> Option<String> {
    known
        .map(|k| (k, strsim::jaro_winkler(literal, k)))
        .filter(|(_, score)| *score >= HINT_THRESHOLD)
        .max_by(|a, b| a.1.total_cmp(&b.1).then_with(|| b.0.cmp(a.0)))
        .map(|(k, _)| k.to_string())
}

// ============================================================================
// LOCAL SYNTHESIS
// ============================================================================

fn synthesize(
    table: &StageTable,
    view: &RecordView<'_>,
    position: &StagePosition,
    options: DeriveOptions,
) -> Result<BackendLifecycle, LifecycleError> {
    let stages = table.stages();
    let terminal = !position.exception && position.stage_index == stages.len() - 1;

    let main_stages = stages
        .iter()
        .enumerate()
        .map(|(i, stage)| {
            let status = if terminal {
                StageStatus::Done
            } else {
                stage_status(i, position.stage_index)
            };
            BackendStage::new(stage.key.clone(), stage.label.clone(), status)
        })
        .collect();

    let (label, percent) = match table.exception(&position.key) {
        Some(exception) => (exception.label.clone(), exception.percent),
        None => {
            let stage = &stages[position.stage_index];
            (stage.label.clone(), stage.percent)
        }
    };

    let status = if position.exception {
        LifecycleStatus::Exception
    } else if terminal {
        LifecycleStatus::Success
    } else if stages[position.stage_index].in_progress {
        LifecycleStatus::Active
    } else {
        LifecycleStatus::Normal
    };

    debug!(
        document_type = table.document_type(),
        stage = %position.key,
        status = %status,
        "derived lifecycle locally"
    );

    Ok(BackendLifecycle {
        current_stage_key: Some(position.key.clone()),
        current_stage_name: Some(label),
        status: Some(status.as_str().to_string()),
        percent: percent.map(f64::from),
        main_stages,
        sub_stages: sub_stages(table, view, position, terminal, options)?,
        next_step_suggestions: Some(table.suggestions_for(&position.key)),
    })
}

fn stage_status(index: usize, current: usize) -> StageStatus {
    match index.cmp(&current) {
        std::cmp::Ordering::Less => StageStatus::Done,
        std::cmp::Ordering::Equal => StageStatus::Active,
        std::cmp::Ordering::Greater => StageStatus::Pending,
    }
}

fn sub_stages(
    table: &StageTable,
    view: &RecordView<'_>,
    position: &StagePosition,
    terminal: bool,
    options: DeriveOptions,
) -> Result<Option<Vec<BackendStage>>, LifecycleError> {
    let Some(pipeline) = table.sub_pipeline() else {
        return Ok(None);
    };
    let expands = table.stage_index(&pipeline.expands).unwrap_or(0);

    let fill = |status: StageStatus| -> Vec<BackendStage> {
        pipeline
            .stages
            .iter()
            .map(|s| BackendStage::new(s.key.clone(), s.label.clone(), status))
            .collect()
    };

    if position.exception || position.stage_index < expands {
        return Ok(Some(fill(StageStatus::Pending)));
    }
    if terminal || position.stage_index > expands {
        return Ok(Some(fill(StageStatus::Done)));
    }

    let current = match view.text(&pipeline.field) {
        Some(literal) => match table.resolve_sub(&literal) {
            Some(key) => sub_index(&pipeline.stages, key),
            None => {
                let closest = unknown_literal(table, &pipeline.field, &literal, table.sub_literals(), options)?;
                warn!(
                    document_type = table.document_type(),
                    field = %pipeline.field,
                    literal = %literal,
                    closest = ?closest,
                    "unknown sub-stage literal, using first sub-stage"
                );
                0
            }
        },
        None => 0,
    };

    Ok(Some(
        pipeline
            .stages
            .iter()
            .enumerate()
            .map(|(i, s)| BackendStage::new(s.key.clone(), s.label.clone(), stage_status(i, current)))
            .collect(),
    ))
}

fn sub_index(stages: &[StageDef], key: &str) -> usize {
    stages.iter().position(|s| s.key == key).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::definition::StageTableDef;
    use serde_json::json;

    const TABLE: &str = r#"
document_type: sample_demand
backend_guard: vocabulary
stages:
  - key: draft
    label: 草稿
  - key: pending_review
    label: 待审核
  - key: executing
    label: 执行中
    in_progress: true
  - key: completed
    label: 已完成
exceptions:
  - key: rejected
    label: 已驳回
    at: pending_review
status_aliases:
  executing: [已下推]
review_aliases:
  rejected: [驳回]
  executing: [通过]
suggestions:
  draft: [提交审核]
  rejected: [修改后重新提交]
sub_pipeline:
  expands: executing
  stages:
    - key: compute
      label: 需求计算
    - key: produce
      label: 生产
    - key: deliver
      label: 交付
  aliases:
    produce: [生产中]
"#;

    fn table() -> StageTable {
        let def: StageTableDef = serde_yaml::from_str(TABLE).unwrap();
        StageTable::try_from(def).unwrap()
    }

    fn statuses(result: &LifecycleResult) -> Vec<StageStatus> {
        result.main_stages.iter().map(|s| s.status).collect()
    }

    #[test]
    fn test_null_record() {
        assert_eq!(derive(&table(), None), LifecycleResult::empty());
        assert_eq!(derive(&table(), Some(&Value::Null)), LifecycleResult::empty());
    }

    #[test]
    fn test_middle_stage() {
        let result = derive(&table(), Some(&json!({"status": "待审核"})));
        use StageStatus::*;
        assert_eq!(statuses(&result), vec![Done, Active, Pending, Pending]);
        assert_eq!(result.stage_name, "待审核");
        assert_eq!(result.status, Some(LifecycleStatus::Normal));
        assert_eq!(result.percent, 15);
    }

    #[test]
    fn test_in_progress_stage_is_active_with_sub_pipeline() {
        let record = json!({"status": "已下推", "execution_status": "生产中"});
        let result = derive(&table(), Some(&record));
        assert_eq!(result.status, Some(LifecycleStatus::Active));
        let subs: Vec<_> = result.sub_stages.unwrap().iter().map(|s| s.status).collect();
        use StageStatus::*;
        assert_eq!(subs, vec![Done, Active, Pending]);
    }

    #[test]
    fn test_terminal_marks_everything_done() {
        let result = derive(&table(), Some(&json!({"status": "completed"})));
        assert!(result.main_stages.iter().all(|s| s.status == StageStatus::Done));
        assert_eq!(result.status, Some(LifecycleStatus::Success));
        assert!(result
            .sub_stages
            .unwrap()
            .iter()
            .all(|s| s.status == StageStatus::Done));
        assert_eq!(result.next_step_suggestions, Some(vec![]));
    }

    #[test]
    fn test_review_exception_overrides_status() {
        let record = json!({"status": "待审核", "review_status": "驳回"});
        let result = derive(&table(), Some(&record));
        use StageStatus::*;
        assert_eq!(statuses(&result), vec![Done, Active, Pending, Pending]);
        assert_eq!(result.stage_name, "已驳回");
        assert_eq!(result.status, Some(LifecycleStatus::Exception));
        assert_eq!(
            result.next_step_suggestions,
            Some(vec!["修改后重新提交".to_string()])
        );
        assert!(result
            .sub_stages
            .unwrap()
            .iter()
            .all(|s| s.status == StageStatus::Pending));
    }

    #[test]
    fn test_review_advances_stale_status() {
        let record = json!({"status": "待审核", "review_status": "通过"});
        let result = derive(&table(), Some(&record));
        assert_eq!(result.stage_name, "执行中");
    }

    #[test]
    fn test_unknown_literal_lenient_and_strict() {
        let record = json!({"status": "待审"});
        let result = derive(&table(), Some(&record));
        assert_eq!(result.stage_name, "草稿");
        assert_eq!(result.main_stages[0].status, StageStatus::Active);

        let err = try_derive(&table(), Some(&record), DeriveOptions::strict()).unwrap_err();
        match err {
            LifecycleError::UnknownStatus {
                field, suggestion, ..
            } => {
                assert_eq!(field, "status");
                assert_eq!(suggestion.as_deref(), Some("待审核"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_review_literal_is_ignored_or_rejected() {
        let record = json!({"status": "待审核", "review_status": "驳回了"});
        let result = derive(&table(), Some(&record));
        assert_eq!(result.stage_name, "待审核");
        assert_eq!(result.status, Some(LifecycleStatus::Normal));

        let err = try_derive(&table(), Some(&record), DeriveOptions::strict()).unwrap_err();
        match err {
            LifecycleError::UnknownStatus { field, value, .. } => {
                assert_eq!(field, "review_status");
                assert_eq!(value, "驳回了");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_pending_review_literal_is_not_an_error() {
        // a status value in the review field carries no outcome
        let record = json!({"status": "草稿", "review_status": "待审核"});
        let result = try_derive(&table(), Some(&record), DeriveOptions::strict()).unwrap();
        assert_eq!(result.stage_name, "草稿");
    }

    #[test]
    fn test_missing_status_is_initial_even_when_strict() {
        let result = try_derive(&table(), Some(&json!({"id": 1})), DeriveOptions::strict()).unwrap();
        assert_eq!(result.stage_name, "草稿");
        assert_eq!(result.next_step_suggestions, Some(vec!["提交审核".to_string()]));
    }

    #[test]
    fn test_foreign_backend_lifecycle_falls_through() {
        let record = json!({
            "status": "待审核",
            "lifecycle": {
                "current_stage_key": "sent",
                "current_stage_name": "已发送",
                "main_stages": [
                    {"key": "pending", "label": "待发送", "status": "done"},
                    {"key": "sent", "label": "已发送", "status": "active"}
                ]
            }
        });
        let result = derive(&table(), Some(&record));
        assert_eq!(result.stage_name, "待审核");
        assert_eq!(result.main_stages.len(), 4);
    }

    #[test]
    fn test_matching_backend_lifecycle_wins() {
        let record = json!({
            "status": "草稿",
            "lifecycle": {
                "current_stage_key": "executing",
                "current_stage_name": "执行中",
                "status": "active",
                "main_stages": [
                    {"key": "draft", "label": "草稿", "status": "done"},
                    {"key": "executing", "label": "执行中", "status": "active"}
                ]
            }
        });
        let result = derive(&table(), Some(&record));
        assert_eq!(result.stage_name, "执行中");
        assert_eq!(result.percent, 50);
        assert_eq!(result.main_stages.len(), 2);
    }

    #[test]
    fn test_closest_literal() {
        let known = ["已审核", "待审核", "草稿"];
        assert_eq!(
            closest_literal("已审", known.iter().copied()).as_deref(),
            Some("已审核")
        );
        assert_eq!(closest_literal("xyz", known.iter().copied()), None);
    }
}
