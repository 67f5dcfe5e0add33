//! Stage Table Definitions
//!
//! Every document type's lifecycle is one declarative table loaded from YAML:
//! the ordered stage vocabulary, the exception states overlaid on it, the
//! raw-literal alias lists for each status field and the next-step
//! suggestions. `StageTableDef` is the serde shape; `StageTable` is the
//! validated form with lookup maps built once at load time.

use lifecycle_types::BackendLifecycle;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::error::LifecycleError;

/// Stage table as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageTableDef {
    /// Document type identifier (e.g., "purchase_order")
    pub document_type: String,
    /// Human-readable name of the document type
    #[serde(default)]
    pub label: String,
    /// When a server-supplied lifecycle is trusted
    pub backend_guard: BackendGuard,
    /// Raw fields consulted for the status literal, first non-empty wins
    #[serde(default = "default_status_fields")]
    pub status_fields: Vec<String>,
    /// Raw fields consulted for the review literal, first non-empty wins
    #[serde(default = "default_review_status_fields")]
    pub review_status_fields: Vec<String>,
    /// Canonical main stage sequence
    pub stages: Vec<StageDef>,
    /// Exception states and the stage each one interrupts
    #[serde(default)]
    pub exceptions: Vec<ExceptionDef>,
    /// Stage or exception key -> raw status literals
    #[serde(default)]
    pub status_aliases: BTreeMap<String, Vec<String>>,
    /// Stage or exception key -> raw review-status literals
    #[serde(default)]
    pub review_aliases: BTreeMap<String, Vec<String>>,
    /// Stage or exception key -> suggested next actions
    #[serde(default)]
    pub suggestions: BTreeMap<String, Vec<String>>,
    /// Finer-grained pipeline inside one main stage
    #[serde(default)]
    pub sub_pipeline: Option<SubPipelineDef>,
}

fn default_status_fields() -> Vec<String> {
    vec!["status".to_string()]
}

fn default_review_status_fields() -> Vec<String> {
    vec!["review_status".to_string()]
}

fn default_sub_field() -> String {
    "execution_status".to_string()
}

/// Trust policy for a record's `lifecycle` payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendGuard {
    /// Non-empty and every main stage key is in this table's vocabulary
    Vocabulary,
    /// Non-empty is enough
    NonEmpty,
}

/// A main stage or sub-stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDef {
    pub key: String,
    pub label: String,
    /// Overrides the adapter's key table when this stage is current
    #[serde(default)]
    pub percent: Option<u8>,
    /// Work is actively happening while in this stage
    #[serde(default)]
    pub in_progress: bool,
}

/// An exception overlaid on the stage it interrupts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExceptionDef {
    pub key: String,
    pub label: String,
    /// Stage key that is shown active while in this exception
    pub at: String,
    #[serde(default)]
    pub percent: Option<u8>,
}

/// Sub-stage pipeline expanding one main stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubPipelineDef {
    /// Main stage key this pipeline decomposes
    pub expands: String,
    /// Raw field carrying the sub-stage literal
    #[serde(default = "default_sub_field")]
    pub field: String,
    pub stages: Vec<StageDef>,
    /// Sub-stage key -> raw literals
    #[serde(default)]
    pub aliases: BTreeMap<String, Vec<String>>,
}

// ============================================================================
// VALIDATED TABLE
// ============================================================================

/// A stage table that passed validation, with literal lookups prebuilt
#[derive(Debug, Clone)]
pub struct StageTable {
    def: StageTableDef,
    stage_index: HashMap<String, usize>,
    status_lookup: HashMap<String, String>,
    review_lookup: HashMap<String, String>,
    sub_lookup: HashMap<String, String>,
}

impl StageTable {
    pub fn document_type(&self) -> &str {
        &self.def.document_type
    }

    pub fn label(&self) -> &str {
        &self.def.label
    }

    pub fn definition(&self) -> &StageTableDef {
        &self.def
    }

    pub fn backend_guard(&self) -> BackendGuard {
        self.def.backend_guard
    }

    pub fn stages(&self) -> &[StageDef] {
        &self.def.stages
    }

    pub fn status_fields(&self) -> &[String] {
        &self.def.status_fields
    }

    pub fn review_status_fields(&self) -> &[String] {
        &self.def.review_status_fields
    }

    pub fn sub_pipeline(&self) -> Option<&SubPipelineDef> {
        self.def.sub_pipeline.as_ref()
    }

    /// First stage of the sequence (validation guarantees one exists)
    pub fn initial_stage(&self) -> &StageDef {
        &self.def.stages[0]
    }

    pub fn stage_index(&self, key: &str) -> Option<usize> {
        self.stage_index.get(key).copied()
    }

    pub fn stage(&self, key: &str) -> Option<&StageDef> {
        self.stage_index(key).map(|i| &self.def.stages[i])
    }

    pub fn exception(&self, key: &str) -> Option<&ExceptionDef> {
        self.def.exceptions.iter().find(|e| e.key == key)
    }

    pub fn is_exception(&self, key: &str) -> bool {
        self.exception(key).is_some()
    }

    /// Last stage of the sequence
    pub fn is_terminal(&self, key: &str) -> bool {
        self.stage_index(key) == Some(self.def.stages.len() - 1)
    }

    /// Every key a stage list for this type may contain
    pub fn vocabulary(&self) -> impl Iterator<Item = &str> {
        self.def
            .stages
            .iter()
            .map(|s| s.key.as_str())
            .chain(self.def.exceptions.iter().map(|e| e.key.as_str()))
    }

    /// Structural discriminator for server-supplied payloads
    pub fn accepts_backend(&self, lifecycle: &BackendLifecycle) -> bool {
        if !lifecycle.has_stages() {
            return false;
        }
        match self.def.backend_guard {
            BackendGuard::NonEmpty => true,
            BackendGuard::Vocabulary => {
                let vocabulary: HashSet<&str> = self.vocabulary().collect();
                lifecycle.stage_keys().all(|k| vocabulary.contains(k))
            }
        }
    }

    /// Stage or exception key for a raw status literal
    pub fn resolve_status(&self, literal: &str) -> Option<&str> {
        self.status_lookup.get(literal.trim()).map(String::as_str)
    }

    /// Stage or exception key for a raw review-status literal
    pub fn resolve_review(&self, literal: &str) -> Option<&str> {
        self.review_lookup.get(literal.trim()).map(String::as_str)
    }

    /// Sub-stage key for a raw sub-pipeline literal
    pub fn resolve_sub(&self, literal: &str) -> Option<&str> {
        self.sub_lookup.get(literal.trim()).map(String::as_str)
    }

    /// All literals the status field understands
    pub fn status_literals(&self) -> impl Iterator<Item = &str> {
        self.status_lookup.keys().map(String::as_str)
    }

    /// All literals the review field understands
    pub fn review_literals(&self) -> impl Iterator<Item = &str> {
        self.review_lookup.keys().map(String::as_str)
    }

    pub fn sub_literals(&self) -> impl Iterator<Item = &str> {
        self.sub_lookup.keys().map(String::as_str)
    }

    /// Suggested next actions for a stage or exception key
    pub fn suggestions_for(&self, key: &str) -> Vec<String> {
        self.def.suggestions.get(key).cloned().unwrap_or_default()
    }
}

impl TryFrom<StageTableDef> for StageTable {
    type Error = LifecycleError;

    fn try_from(def: StageTableDef) -> Result<Self, Self::Error> {
        let doc = def.document_type.clone();
        let invalid = |message: String| LifecycleError::definition(doc.clone(), message);

        if def.document_type.trim().is_empty() {
            return Err(invalid("document_type must not be empty".to_string()));
        }
        if def.stages.is_empty() {
            return Err(invalid("at least one stage is required".to_string()));
        }
        if def.status_fields.is_empty() {
            return Err(invalid("status_fields must not be empty".to_string()));
        }

        let mut stage_index = HashMap::new();
        for (i, stage) in def.stages.iter().enumerate() {
            check_percent(&doc, &stage.key, stage.percent)?;
            if stage_index.insert(stage.key.clone(), i).is_some() {
                return Err(invalid(format!("duplicate stage key '{}'", stage.key)));
            }
        }

        let mut known: HashSet<String> = stage_index.keys().cloned().collect();
        for exception in &def.exceptions {
            check_percent(&doc, &exception.key, exception.percent)?;
            if !known.insert(exception.key.clone()) {
                return Err(invalid(format!("duplicate stage key '{}'", exception.key)));
            }
            if !stage_index.contains_key(&exception.at) {
                return Err(invalid(format!(
                    "exception '{}' interrupts unknown stage '{}'",
                    exception.key, exception.at
                )));
            }
        }

        // Keys and labels are implicit aliases of themselves
        let mut status_lookup = HashMap::new();
        for stage in &def.stages {
            insert_alias(&doc, &mut status_lookup, &stage.key, &stage.key)?;
            insert_alias(&doc, &mut status_lookup, &stage.label, &stage.key)?;
        }
        for exception in &def.exceptions {
            insert_alias(&doc, &mut status_lookup, &exception.key, &exception.key)?;
            insert_alias(&doc, &mut status_lookup, &exception.label, &exception.key)?;
        }
        for (key, literals) in &def.status_aliases {
            if !known.contains(key) {
                return Err(invalid(format!("status alias target '{}' is not a stage", key)));
            }
            for literal in literals {
                insert_alias(&doc, &mut status_lookup, literal, key)?;
            }
        }

        let mut review_lookup = HashMap::new();
        for (key, literals) in &def.review_aliases {
            if !known.contains(key) {
                return Err(invalid(format!("review alias target '{}' is not a stage", key)));
            }
            for literal in literals {
                insert_alias(&doc, &mut review_lookup, literal, key)?;
            }
        }

        for key in def.suggestions.keys() {
            if !known.contains(key) {
                return Err(invalid(format!("suggestions for unknown stage '{}'", key)));
            }
        }

        let mut sub_lookup = HashMap::new();
        if let Some(pipeline) = &def.sub_pipeline {
            if !stage_index.contains_key(&pipeline.expands) {
                return Err(invalid(format!(
                    "sub_pipeline expands unknown stage '{}'",
                    pipeline.expands
                )));
            }
            if pipeline.stages.is_empty() {
                return Err(invalid("sub_pipeline has no stages".to_string()));
            }
            let mut sub_keys = HashSet::new();
            for stage in &pipeline.stages {
                check_percent(&doc, &stage.key, stage.percent)?;
                if !sub_keys.insert(stage.key.clone()) {
                    return Err(invalid(format!("duplicate sub-stage key '{}'", stage.key)));
                }
                insert_alias(&doc, &mut sub_lookup, &stage.key, &stage.key)?;
                insert_alias(&doc, &mut sub_lookup, &stage.label, &stage.key)?;
            }
            for (key, literals) in &pipeline.aliases {
                if !sub_keys.contains(key) {
                    return Err(invalid(format!("sub alias target '{}' is not a sub-stage", key)));
                }
                for literal in literals {
                    insert_alias(&doc, &mut sub_lookup, literal, key)?;
                }
            }
        }

        Ok(Self {
            def,
            stage_index,
            status_lookup,
            review_lookup,
            sub_lookup,
        })
    }
}

fn check_percent(doc: &str, key: &str, percent: Option<u8>) -> Result<(), LifecycleError> {
    match percent {
        Some(p) if p > 100 => Err(LifecycleError::definition(
            doc,
            format!("percent {} for '{}' exceeds 100", p, key),
        )),
        _ => Ok(()),
    }
}

/// One literal, one target. Re-declaring the same pair is harmless.
fn insert_alias(
    doc: &str,
    lookup: &mut HashMap<String, String>,
    literal: &str,
    key: &str,
) -> Result<(), LifecycleError> {
    let literal = literal.trim();
    if literal.is_empty() {
        return Err(LifecycleError::definition(
            doc,
            format!("empty alias literal for '{}'", key),
        ));
    }
    match lookup.get(literal) {
        Some(existing) if existing != key => Err(LifecycleError::definition(
            doc,
            format!(
                "literal '{}' maps to both '{}' and '{}'",
                literal, existing, key
            ),
        )),
        Some(_) => Ok(()),
        None => {
            lookup.insert(literal.to_string(), key.to_string());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lifecycle_types::{BackendStage, StageStatus};

    const SAMPLE_TABLE: &str = r#"
document_type: sample_order
label: 示例单
backend_guard: vocabulary
stages:
  - key: draft
    label: 草稿
  - key: pending_review
    label: 待审核
  - key: audited
    label: 已审核
exceptions:
  - key: rejected
    label: 已驳回
    at: pending_review
status_aliases:
  pending_review: [已提交, PENDING]
  rejected: [驳回]
review_aliases:
  audited: [通过]
suggestions:
  draft: [提交审核]
"#;

    fn sample() -> StageTable {
        let def: StageTableDef = serde_yaml::from_str(SAMPLE_TABLE).unwrap();
        StageTable::try_from(def).unwrap()
    }

    #[test]
    fn test_parse_and_lookup() {
        let table = sample();
        assert_eq!(table.document_type(), "sample_order");
        assert_eq!(table.status_fields(), ["status".to_string()]);
        assert_eq!(table.initial_stage().key, "draft");
        assert_eq!(table.resolve_status(" 已提交 "), Some("pending_review"));
        assert_eq!(table.resolve_status("草稿"), Some("draft"));
        assert_eq!(table.resolve_status("已驳回"), Some("rejected"));
        assert_eq!(table.resolve_status("???"), None);
        assert_eq!(table.resolve_review("通过"), Some("audited"));
        assert!(table.is_terminal("audited"));
        assert!(!table.is_terminal("draft"));
        assert_eq!(table.suggestions_for("draft"), vec!["提交审核".to_string()]);
        assert!(table.suggestions_for("audited").is_empty());
    }

    #[test]
    fn test_vocabulary_guard() {
        let table = sample();
        let own = BackendLifecycle {
            main_stages: vec![
                BackendStage::new("draft", "草稿", StageStatus::Done),
                BackendStage::new("rejected", "已驳回", StageStatus::Active),
            ],
            ..Default::default()
        };
        let foreign = BackendLifecycle {
            main_stages: vec![
                BackendStage::new("pending", "待报价", StageStatus::Done),
                BackendStage::new("sent", "已发送", StageStatus::Active),
            ],
            ..Default::default()
        };
        assert!(table.accepts_backend(&own));
        assert!(!table.accepts_backend(&foreign));
        assert!(!table.accepts_backend(&BackendLifecycle::default()));
    }

    #[test]
    fn test_conflicting_alias_rejected() {
        let yaml = SAMPLE_TABLE.replace("rejected: [驳回]", "rejected: [已提交]");
        let def: StageTableDef = serde_yaml::from_str(&yaml).unwrap();
        let err = StageTable::try_from(def).unwrap_err();
        assert!(err.to_string().contains("maps to both"));
    }

    #[test]
    fn test_exception_must_interrupt_known_stage() {
        let yaml = SAMPLE_TABLE.replace("at: pending_review", "at: shipped");
        let def: StageTableDef = serde_yaml::from_str(&yaml).unwrap();
        let err = StageTable::try_from(def).unwrap_err();
        assert!(err.to_string().contains("unknown stage 'shipped'"));
    }

    #[test]
    fn test_suggestion_keys_validated() {
        let yaml = SAMPLE_TABLE.replace("draft: [提交审核]", "closed: [归档]");
        let def: StageTableDef = serde_yaml::from_str(&yaml).unwrap();
        assert!(StageTable::try_from(def).is_err());
    }

    #[test]
    fn test_missing_guard_fails_to_parse() {
        let yaml = SAMPLE_TABLE.replace("backend_guard: vocabulary\n", "");
        assert!(serde_yaml::from_str::<StageTableDef>(&yaml).is_err());
    }
}
