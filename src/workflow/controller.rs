//! WorkflowActionController - headless workflow action component
//!
//! Decides which transition buttons a record offers and drives one
//! transition at a time through an explicit state machine:
//!
//! ```text
//! idle --request--> confirming --confirm--> in flight --complete--> idle
//!                       |                                  |
//!                       +--cancel--> idle                  +--> notification (+ on_success)
//! ```
//!
//! The controller never mutates the record; callers refetch in `on_success`.

use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::actions::{ActionKind, ActionMap, ActionResponse};
use super::classify::{classify, StatusClass, StatusClassification};
use crate::error::{ActionError, WorkflowError};
use crate::lifecycle::{RecordId, RecordView};

/// Submit label when the backend chains an automatic approval
pub const AUTO_APPROVE_SUBMIT_LABEL: &str = "提交并自动审核";

// =============================================================================
// PROPS
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonTheme {
    #[default]
    Button,
    Link,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonSize {
    Small,
    #[default]
    Middle,
    Large,
}

/// Confirmation dialog text for one action
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmText {
    pub title: String,
    pub message: String,
}

/// Per-action confirmation overrides
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfirmTexts {
    pub submit: Option<ConfirmText>,
    pub approve: Option<ConfirmText>,
    pub reject: Option<ConfirmText>,
    pub revoke: Option<ConfirmText>,
}

impl ConfirmTexts {
    pub fn get(&self, kind: ActionKind) -> Option<&ConfirmText> {
        match kind {
            ActionKind::Submit => self.submit.as_ref(),
            ActionKind::Approve => self.approve.as_ref(),
            ActionKind::Reject => self.reject.as_ref(),
            ActionKind::Revoke => self.revoke.as_ref(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowActionsProps {
    /// Primary-key field of the record
    pub row_key: String,
    pub status_field: String,
    pub review_status_field: String,
    pub classification: StatusClassification,
    /// Noun used in default dialog text (e.g. "采购订单")
    pub entity_name: String,
    pub auto_approve_when_submit: bool,
    pub theme: ButtonTheme,
    pub size: ButtonSize,
    pub confirm_texts: ConfirmTexts,
}

impl Default for WorkflowActionsProps {
    fn default() -> Self {
        Self {
            row_key: "id".to_string(),
            status_field: "status".to_string(),
            review_status_field: "review_status".to_string(),
            classification: StatusClassification::standard(),
            entity_name: "单据".to_string(),
            auto_approve_when_submit: false,
            theme: ButtonTheme::default(),
            size: ButtonSize::default(),
            confirm_texts: ConfirmTexts::default(),
        }
    }
}

impl WorkflowActionsProps {
    pub fn label(&self, kind: ActionKind) -> &'static str {
        match kind {
            ActionKind::Submit if self.auto_approve_when_submit => AUTO_APPROVE_SUBMIT_LABEL,
            other => other.label(),
        }
    }

    /// Override text, else templated from the entity name
    pub fn confirm_text(&self, kind: ActionKind) -> ConfirmText {
        if let Some(text) = self.confirm_texts.get(kind) {
            return text.clone();
        }
        let label = self.label(kind);
        let message = match kind {
            ActionKind::Submit if self.auto_approve_when_submit => format!(
                "提交后将自动审核通过，确定要提交该{}吗？",
                self.entity_name
            ),
            ActionKind::Reject => format!("确定要驳回该{}吗？请填写驳回原因。", self.entity_name),
            _ => format!("确定要{}该{}吗？", label, self.entity_name),
        };
        ConfirmText {
            title: format!("确认{}", label),
            message,
        }
    }
}

// =============================================================================
// VIEW STATE
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionButton {
    pub kind: ActionKind,
    pub label: String,
    pub loading: bool,
    pub disabled: bool,
    pub danger: bool,
    pub theme: ButtonTheme,
    pub size: ButtonSize,
}

/// Overlay state. One dialog at a time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Modal {
    #[default]
    None,
    Confirm {
        kind: ActionKind,
        record_id: RecordId,
        title: String,
        message: String,
        /// Textarea contents; `Some` only for reject
        reject_reason: Option<String>,
    },
}

impl Modal {
    pub fn is_open(&self) -> bool {
        !matches!(self, Modal::None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// Transient message shown after an action settles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }
}

/// Undrained notifications kept before the oldest are dropped
pub const MAX_PENDING_NOTIFICATIONS: usize = 16;

/// Future returned by `confirm`; owns everything it needs
pub type ActionFuture = BoxFuture<'static, Result<ActionResponse, ActionError>>;

// =============================================================================
// CONTROLLER
// =============================================================================

pub struct WorkflowActionController {
    props: WorkflowActionsProps,
    actions: ActionMap,
    on_success: Option<Box<dyn FnMut() + Send>>,
    modal: Modal,
    in_flight: Option<ActionKind>,
    notifications: Vec<Notification>,
}

impl WorkflowActionController {
    pub fn new(props: WorkflowActionsProps, actions: ActionMap) -> Self {
        Self {
            props,
            actions,
            on_success: None,
            modal: Modal::None,
            in_flight: None,
            notifications: Vec::new(),
        }
    }

    /// Called once after every successful transition (typically a reload)
    pub fn with_on_success(mut self, callback: impl FnMut() + Send + 'static) -> Self {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn props(&self) -> &WorkflowActionsProps {
        &self.props
    }

    pub fn modal(&self) -> &Modal {
        &self.modal
    }

    pub fn in_flight(&self) -> Option<ActionKind> {
        self.in_flight
    }

    /// Notifications not yet drained, oldest first.
    ///
    /// Hosts drain them with `take_notifications` once shown. Only the last
    /// `MAX_PENDING_NOTIFICATIONS` are kept.
    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    /// Workflow class of a record
    pub fn classify(&self, record: Option<&Value>) -> StatusClass {
        let Some(view) = RecordView::new(record) else {
            return StatusClass::Unknown;
        };
        let status = view.text(&self.props.status_field);
        let review_status = view.text(&self.props.review_status_field);
        let class = classify(status.as_deref(), review_status.as_deref(), &self.props.classification);
        if class == StatusClass::Unknown && (status.is_some() || review_status.is_some()) {
            debug!(
                entity = %self.props.entity_name,
                status = ?status,
                review_status = ?review_status,
                "status matches no workflow class, no actions offered"
            );
        }
        class
    }

    /// Action kinds offered for a record; none without an id
    pub fn offered(&self, record: Option<&Value>) -> Vec<ActionKind> {
        let has_id = RecordView::new(record)
            .and_then(|view| view.id(&self.props.row_key))
            .is_some();
        if !has_id {
            return Vec::new();
        }
        match self.classify(record) {
            StatusClass::Draft | StatusClass::Rejected => vec![ActionKind::Submit],
            StatusClass::Pending if self.actions.has(ActionKind::Reject) => {
                vec![ActionKind::Approve, ActionKind::Reject]
            }
            StatusClass::Pending => vec![ActionKind::Approve],
            StatusClass::Approved => vec![ActionKind::Revoke],
            StatusClass::Unknown => Vec::new(),
        }
    }

    /// Buttons to render. While an action is in flight it shows loading and
    /// every other button is disabled.
    pub fn buttons(&self, record: Option<&Value>) -> Vec<ActionButton> {
        self.offered(record)
            .into_iter()
            .map(|kind| {
                let loading = self.in_flight == Some(kind);
                ActionButton {
                    kind,
                    label: self.props.label(kind).to_string(),
                    loading,
                    disabled: self.in_flight.is_some() && !loading,
                    danger: matches!(kind, ActionKind::Reject | ActionKind::Revoke),
                    theme: self.props.theme,
                    size: self.props.size,
                }
            })
            .collect()
    }

    /// Open the confirmation dialog for `kind` on `record`
    pub fn request(&mut self, kind: ActionKind, record: Option<&Value>) -> Result<(), WorkflowError> {
        if let Some(current) = self.in_flight {
            return Err(WorkflowError::ActionInFlight(current));
        }
        let record_id = RecordView::new(record)
            .and_then(|view| view.id(&self.props.row_key))
            .ok_or_else(|| WorkflowError::MissingRecordId(self.props.row_key.clone()))?;
        if !self.offered(record).contains(&kind) {
            return Err(WorkflowError::NotOffered(kind));
        }
        if !self.actions.has(kind) {
            return Err(WorkflowError::NotConfigured(kind));
        }

        let ConfirmText { title, message } = self.props.confirm_text(kind);
        debug!(action = %kind, id = %record_id, "confirmation opened");
        self.modal = Modal::Confirm {
            kind,
            record_id,
            title,
            message,
            reject_reason: (kind == ActionKind::Reject).then(String::new),
        };
        Ok(())
    }

    /// Update the reject textarea. Ignored unless a reject dialog is open.
    pub fn set_reject_reason(&mut self, reason: impl Into<String>) {
        if let Modal::Confirm {
            reject_reason: Some(current),
            ..
        } = &mut self.modal
        {
            *current = reason.into();
        }
    }

    /// Close the dialog without acting
    pub fn cancel(&mut self) {
        self.modal = Modal::None;
    }

    /// Accept the open dialog: the action goes in flight and its call is
    /// returned for the caller to await, then hand to `complete`.
    pub fn confirm(&mut self) -> Result<ActionFuture, WorkflowError> {
        if let Some(current) = self.in_flight {
            return Err(WorkflowError::ActionInFlight(current));
        }
        let (kind, record_id, reject_reason) = match &self.modal {
            Modal::Confirm {
                kind,
                record_id,
                reject_reason,
                ..
            } => (*kind, record_id.clone(), reject_reason.clone()),
            Modal::None => return Err(WorkflowError::NothingToConfirm),
        };
        let handler = self
            .actions
            .get(kind)
            .ok_or(WorkflowError::NotConfigured(kind))?;

        self.modal = Modal::None;
        self.in_flight = Some(kind);
        debug!(action = %kind, id = %record_id, "action started");

        Ok(async move { handler.call(&record_id, reject_reason.as_deref()).await }.boxed())
    }

    /// Settle the in-flight action. Returns the notification posted.
    pub fn complete(&mut self, outcome: Result<ActionResponse, ActionError>) -> Option<Notification> {
        let Some(kind) = self.in_flight.take() else {
            warn!("complete called with no action in flight");
            return None;
        };
        let label = self.props.label(kind);

        let notification = match outcome {
            Ok(response) => {
                let message = if response.demand_synced {
                    format!("{}成功，已同步更新关联需求", label)
                } else {
                    format!("{}成功", label)
                };
                if let Some(callback) = self.on_success.as_mut() {
                    callback();
                }
                Notification::success(message)
            }
            Err(e) => {
                warn!(action = %kind, error = %e, "action failed");
                let message = e.to_string();
                if message.trim().is_empty() {
                    Notification::error(format!("{}失败", label))
                } else {
                    Notification::error(message)
                }
            }
        };

        if self.notifications.len() >= MAX_PENDING_NOTIFICATIONS {
            self.notifications.remove(0);
        }
        self.notifications.push(notification.clone());
        Some(notification)
    }

    /// `confirm`, await the call, `complete`
    pub async fn run_confirmed(&mut self) -> Result<Notification, WorkflowError> {
        let call = self.confirm()?;
        let outcome = call.await;
        // confirm() left exactly one action in flight, so complete() posts
        self.complete(outcome).ok_or(WorkflowError::NothingToConfirm)
    }
}
