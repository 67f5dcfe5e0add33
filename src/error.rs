//! Error types for lifecycle derivation and workflow actions
//!
//! Three layers, three enums:
//! - `LifecycleError`: stage-table loading/validation and strict derivation
//! - `ActionError`: a state-changing call failed (network, HTTP, handler)
//! - `WorkflowError`: the action controller was driven in a way its
//!   configuration does not allow. These are programming errors and are
//!   never turned into user notifications.

use thiserror::Error;

use crate::workflow::ActionKind;

/// Errors from stage-table definitions and strict derivation
#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Invalid stage table '{document_type}': {message}")]
    Definition {
        document_type: String,
        message: String,
    },

    #[error("Duplicate stage table for document type '{0}'")]
    DuplicateDefinition(String),

    #[error("Unknown document type: {0}")]
    UnknownDocumentType(String),

    #[error(
        "Unknown {field} literal '{value}' for {document_type}{}",
        .suggestion.as_ref().map(|s| format!(" (closest known: '{}')", s)).unwrap_or_default()
    )]
    UnknownStatus {
        document_type: String,
        field: String,
        value: String,
        suggestion: Option<String>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl LifecycleError {
    pub fn definition(document_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Definition {
            document_type: document_type.into(),
            message: message.into(),
        }
    }
}

/// Failure of a state-changing call.
///
/// Caught at the controller boundary and surfaced as an error notification.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// Non-2xx response; `message` is the backend's own explanation
    #[error("{message}")]
    Http { status: u16, message: String },

    /// Non-2xx response without a readable explanation
    #[error("HTTP error! status: {status}")]
    Status { status: u16 },

    #[error("Request failed: {0}")]
    Transport(String),

    #[error("Invalid URL: {0}")]
    Url(String),

    #[error("{0}")]
    Failed(String),
}

impl ActionError {
    /// Free-form failure raised by a caller-supplied handler
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }
}

impl From<reqwest::Error> for ActionError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => Self::Status {
                status: status.as_u16(),
            },
            None => Self::Transport(error.to_string()),
        }
    }
}

impl From<url::ParseError> for ActionError {
    fn from(error: url::ParseError) -> Self {
        Self::Url(error.to_string())
    }
}

/// Misuse of the workflow action controller
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("No '{0}' action configured and no apiPrefix bound")]
    NotConfigured(ActionKind),

    #[error("Record has no '{0}' value")]
    MissingRecordId(String),

    #[error("Action '{0}' is already in flight")]
    ActionInFlight(ActionKind),

    #[error("Action '{0}' is not offered for this record")]
    NotOffered(ActionKind),

    #[error("No confirmation dialog is open")]
    NothingToConfirm,
}
