//! Lifecycle Types - Level 1 Foundation Types
//!
//! Pure data structures shared by the derivation engine and every piece of
//! rendering code that draws a document's progress.
//!
//! ## Architecture Level: LEVEL 1 (Foundation)
//!
//! This crate depends on nothing else in the workspace. The derivation engine
//! produces these shapes and page code only ever consumes them.
//!
//! ## Contents
//!
//! - `LifecycleResult` / `SubStage`: the canonical, render-ready projection
//! - `StageStatus` / `LifecycleStatus`: per-stage and overall classification
//! - `BackendLifecycle` / `BackendStage`: the structured payload a server may
//!   attach to a record under `lifecycle`
//!
//! ## Rules
//!
//! 1. **NO DERIVATION LOGIC** - Only data structures, constructors and accessors
//! 2. **SERIALIZABLE** - `LifecycleResult` serializes camelCase for the renderer,
//!    `BackendLifecycle` deserializes snake_case as the server sends it
//! 3. **VALUE SEMANTICS** - Results are recomputed per render and never mutated

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Placeholder stage name used when nothing is known about a document.
pub const UNKNOWN_STAGE_NAME: &str = "-";

// ============================================================================
// STAGE AND OVERALL STATUS
// ============================================================================

/// Classification of a single stage inside a stage list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StageStatus {
    Done,
    Active,
    #[default]
    Pending,
}

impl StageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Done => "done",
            Self::Active => "active",
            Self::Pending => "pending",
        }
    }
}

impl FromStr for StageStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "done" => Ok(Self::Done),
            "active" => Ok(Self::Active),
            "pending" => Ok(Self::Pending),
            other => Err(StatusParseError::UnknownStageStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for StageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Overall classification of a document's progress.
///
/// Drives color and semantics in rendering, independent of `percent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LifecycleStatus {
    #[default]
    Normal,
    Active,
    Success,
    Exception,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Active => "active",
            Self::Success => "success",
            Self::Exception => "exception",
        }
    }
}

impl FromStr for LifecycleStatus {
    type Err = StatusParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "normal" => Ok(Self::Normal),
            "active" => Ok(Self::Active),
            "success" => Ok(Self::Success),
            "exception" => Ok(Self::Exception),
            other => Err(StatusParseError::UnknownLifecycleStatus(other.to_string())),
        }
    }
}

impl std::fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusParseError {
    #[error("Unknown stage status: {0}")]
    UnknownStageStatus(String),
    #[error("Unknown lifecycle status: {0}")]
    UnknownLifecycleStatus(String),
}

// ============================================================================
// CANONICAL RESULT
// ============================================================================

/// One node of a stage list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubStage {
    /// Stable identifier, unique within its list
    pub key: String,
    pub label: String,
    pub status: StageStatus,
    /// Icon name understood by the renderer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Optional per-node completion (0-100)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<u8>,
}

impl SubStage {
    pub fn new(key: impl Into<String>, label: impl Into<String>, status: StageStatus) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            status,
            icon: None,
            percent: None,
        }
    }
}

/// Render-ready projection of a document's progress.
///
/// Computed fresh from a record on every render. An empty `main_stages`
/// means "no lifecycle to display", never an error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleResult {
    /// Overall completion estimate, 0-100
    pub percent: u8,
    /// Label of the current stage (may be an exception label)
    pub stage_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<LifecycleStatus>,
    #[serde(default)]
    pub main_stages: Vec<SubStage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_stages: Option<Vec<SubStage>>,
    /// Advisory only; never gates the action controller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step_suggestions: Option<Vec<String>>,
}

impl LifecycleResult {
    /// The zero result: `{percent: 0, stageName: "-", mainStages: []}`
    pub fn empty() -> Self {
        Self {
            percent: 0,
            stage_name: UNKNOWN_STAGE_NAME.to_string(),
            status: None,
            main_stages: Vec::new(),
            sub_stages: None,
            next_step_suggestions: None,
        }
    }

    /// True when there is nothing to render
    pub fn is_empty(&self) -> bool {
        self.main_stages.is_empty()
    }

    /// Look up a main stage by key
    pub fn stage(&self, key: &str) -> Option<&SubStage> {
        self.main_stages.iter().find(|s| s.key == key)
    }

    /// The first main stage currently marked active
    pub fn active_stage(&self) -> Option<&SubStage> {
        self.main_stages
            .iter()
            .find(|s| s.status == StageStatus::Active)
    }

    pub fn is_exception(&self) -> bool {
        self.status == Some(LifecycleStatus::Exception)
    }
}

impl Default for LifecycleResult {
    fn default() -> Self {
        Self::empty()
    }
}

// ============================================================================
// BACKEND-SUPPLIED PAYLOAD
// ============================================================================

/// Stage entry as sent by the server.
///
/// `status` stays a raw string so that one odd value does not discard the
/// whole payload; the adapter maps unknown values to pending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BackendStage {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub status: String,
}

impl BackendStage {
    pub fn new(key: impl Into<String>, label: impl Into<String>, status: StageStatus) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            status: status.as_str().to_string(),
        }
    }
}

/// Structured lifecycle object a server may attach to a record.
///
/// Unrecognized fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct BackendLifecycle {
    #[serde(default)]
    pub current_stage_key: Option<String>,
    #[serde(default)]
    pub current_stage_name: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Direct completion figure; when absent the adapter uses its key table
    #[serde(default)]
    pub percent: Option<f64>,
    #[serde(default)]
    pub main_stages: Vec<BackendStage>,
    #[serde(default)]
    pub sub_stages: Option<Vec<BackendStage>>,
    #[serde(default)]
    pub next_step_suggestions: Option<Vec<String>>,
}

impl BackendLifecycle {
    /// Structural presence check: a payload is only usable with stages
    pub fn has_stages(&self) -> bool {
        !self.main_stages.is_empty()
    }

    /// Keys of `main_stages`, in order
    pub fn stage_keys(&self) -> impl Iterator<Item = &str> {
        self.main_stages.iter().map(|s| s.key.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_result_shape() {
        let empty = LifecycleResult::empty();
        assert_eq!(empty.percent, 0);
        assert_eq!(empty.stage_name, "-");
        assert!(empty.is_empty());

        let json = serde_json::to_value(&empty).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"percent": 0, "stageName": "-", "mainStages": []})
        );
    }

    #[test]
    fn test_result_serializes_camel_case() {
        let result = LifecycleResult {
            percent: 50,
            stage_name: "已审核".to_string(),
            status: Some(LifecycleStatus::Normal),
            main_stages: vec![SubStage::new("draft", "草稿", StageStatus::Done)],
            sub_stages: None,
            next_step_suggestions: Some(vec!["下推".to_string()]),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["stageName"], "已审核");
        assert_eq!(json["status"], "normal");
        assert_eq!(json["mainStages"][0]["status"], "done");
        assert_eq!(json["nextStepSuggestions"][0], "下推");
        assert!(json.get("subStages").is_none());
    }

    #[test]
    fn test_backend_lifecycle_ignores_unknown_fields() {
        let payload = serde_json::json!({
            "current_stage_key": "audited",
            "current_stage_name": "已审核",
            "status": "normal",
            "main_stages": [{"key": "draft", "label": "草稿", "status": "done", "extra": 1}],
            "server_version": "2.1"
        });
        let lifecycle: BackendLifecycle = serde_json::from_value(payload).unwrap();
        assert!(lifecycle.has_stages());
        assert_eq!(lifecycle.stage_keys().collect::<Vec<_>>(), vec!["draft"]);
        assert_eq!(lifecycle.percent, None);
    }

    #[test]
    fn test_status_parsing() {
        assert_eq!("done".parse::<StageStatus>(), Ok(StageStatus::Done));
        assert_eq!(" active ".parse::<StageStatus>(), Ok(StageStatus::Active));
        assert!("finished".parse::<StageStatus>().is_err());
        assert_eq!(
            "exception".parse::<LifecycleStatus>(),
            Ok(LifecycleStatus::Exception)
        );
        assert!("warning".parse::<LifecycleStatus>().is_err());
    }
}
