//! Workflow actions on documents: submit, approve, reject, revoke

pub mod actions;
pub mod api;
pub mod classify;
pub mod controller;

pub use actions::{ActionHandler, ActionKind, ActionMap, ActionResponse, FnAction, RestAction};
pub use api::ApiClient;
pub use classify::{classify, StatusClass, StatusClassification};
pub use controller::{
    ActionButton, ButtonSize, ButtonTheme, ConfirmText, ConfirmTexts, Modal, Notification,
    NotificationLevel, WorkflowActionController, WorkflowActionsProps, MAX_PENDING_NOTIFICATIONS,
};
