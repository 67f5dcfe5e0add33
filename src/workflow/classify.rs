//! Status classification for the workflow action controller.
//!
//! A record belongs to a class when either its status or its review status
//! is one of that class's literals. Some document types keep workflow state
//! in `status`, some in `review_status`, some in both inconsistently, so
//! either field matching is enough.

use serde::{Deserialize, Serialize};

/// Workflow position of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Draft,
    Pending,
    Approved,
    Rejected,
    Unknown,
}

impl StatusClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatusClass::Draft => "draft",
            StatusClass::Pending => "pending",
            StatusClass::Approved => "approved",
            StatusClass::Rejected => "rejected",
            StatusClass::Unknown => "unknown",
        }
    }

    /// Draft and rejected records can be (re)submitted
    pub fn can_submit(&self) -> bool {
        matches!(self, StatusClass::Draft | StatusClass::Rejected)
    }
}

impl std::fmt::Display for StatusClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Raw literals belonging to each class
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusClassification {
    pub draft: Vec<String>,
    pub pending: Vec<String>,
    pub approved: Vec<String>,
    pub rejected: Vec<String>,
}

impl StatusClassification {
    /// Bilingual literals most review-driven documents use
    pub fn standard() -> Self {
        let owned = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            draft: owned(&["draft", "DRAFT", "草稿"]),
            pending: owned(&["pending_review", "PENDING", "待审核", "审核中"]),
            approved: owned(&["audited", "APPROVED", "已审核", "审核通过", "通过", "已通过"]),
            rejected: owned(&["rejected", "REJECTED", "已驳回", "审核驳回", "驳回"]),
        }
    }

    pub fn with_draft<I, S>(mut self, literals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.draft = literals.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_pending<I, S>(mut self, literals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.pending = literals.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_approved<I, S>(mut self, literals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.approved = literals.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rejected<I, S>(mut self, literals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rejected = literals.into_iter().map(Into::into).collect();
        self
    }
}

/// Classify a record once from its two status fields.
///
/// When several classes match, Draft wins over Rejected, Rejected over
/// Pending, Pending over Approved.
pub fn classify(
    status: Option<&str>,
    review_status: Option<&str>,
    classification: &StatusClassification,
) -> StatusClass {
    let values: Vec<&str> = [status, review_status]
        .into_iter()
        .flatten()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .collect();

    let matches = |literals: &[String]| {
        literals
            .iter()
            .any(|literal| values.contains(&literal.trim()))
    };

    if matches(&classification.draft) {
        StatusClass::Draft
    } else if matches(&classification.rejected) {
        StatusClass::Rejected
    } else if matches(&classification.pending) {
        StatusClass::Pending
    } else if matches(&classification.approved) {
        StatusClass::Approved
    } else {
        StatusClass::Unknown
    }
}
