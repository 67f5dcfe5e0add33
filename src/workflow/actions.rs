//! Workflow actions: the four state transitions and their handlers.
//!
//! Handlers are supplied by the page (`FnAction` wraps any async closure)
//! or synthesized from an API prefix (`RestAction`). `ActionMap` holds at
//! most one handler per kind; a kind with no handler is a configuration
//! error surfaced by the controller.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

use super::api::ApiClient;
use crate::error::ActionError;
use crate::lifecycle::RecordId;

/// Query parameter carrying a rejection reason
pub const REJECTION_REASON_PARAM: &str = "rejection_reason";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Submit,
    Approve,
    Reject,
    Revoke,
}

impl ActionKind {
    pub const ALL: [ActionKind; 4] = [
        ActionKind::Submit,
        ActionKind::Approve,
        ActionKind::Reject,
        ActionKind::Revoke,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::Submit => "submit",
            ActionKind::Approve => "approve",
            ActionKind::Reject => "reject",
            ActionKind::Revoke => "revoke",
        }
    }

    /// Last path segment of the REST endpoint
    pub fn endpoint(&self) -> &'static str {
        match self {
            ActionKind::Revoke => "unapprove",
            other => other.as_str(),
        }
    }

    /// Button and dialog label
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::Submit => "提交",
            ActionKind::Approve => "审核通过",
            ActionKind::Reject => "驳回",
            ActionKind::Revoke => "撤销审核",
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ActionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "submit" => Ok(ActionKind::Submit),
            "approve" => Ok(ActionKind::Approve),
            "reject" => Ok(ActionKind::Reject),
            "revoke" | "unapprove" => Ok(ActionKind::Revoke),
            other => Err(format!("unknown action: {}", other)),
        }
    }
}

/// Side-effect flags a transition may report
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    /// The change was propagated to the linked demand
    #[serde(default)]
    pub demand_synced: bool,
}

impl ActionResponse {
    /// Void and non-object responses carry no flags
    pub fn from_value(value: &Value) -> Self {
        if !value.is_object() {
            return Self::default();
        }
        serde_json::from_value(value.clone()).unwrap_or_default()
    }
}

/// Performs one state transition against the backend
#[async_trait]
pub trait ActionHandler: Send + Sync {
    /// `reason` is `Some` only for rejections, possibly empty
    async fn call(&self, id: &RecordId, reason: Option<&str>) -> Result<ActionResponse, ActionError>;
}

/// Adapts an async closure into an `ActionHandler`
pub struct FnAction<F>(pub F);

#[async_trait]
impl<F, Fut> ActionHandler for FnAction<F>
where
    F: Fn(RecordId, Option<String>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ActionResponse, ActionError>> + Send + 'static,
{
    async fn call(&self, id: &RecordId, reason: Option<&str>) -> Result<ActionResponse, ActionError> {
        (self.0)(id.clone(), reason.map(str::to_string)).await
    }
}

/// `POST {prefix}/{id}/{endpoint}` against the API client's base URL
#[derive(Debug, Clone)]
pub struct RestAction {
    client: ApiClient,
    api_prefix: String,
    kind: ActionKind,
}

impl RestAction {
    pub fn new(client: ApiClient, api_prefix: impl Into<String>, kind: ActionKind) -> Self {
        Self {
            client,
            api_prefix: api_prefix.into(),
            kind,
        }
    }

    pub fn path(&self, id: &RecordId) -> String {
        format!(
            "{}/{}/{}",
            self.api_prefix.trim_end_matches('/'),
            id,
            self.kind.endpoint()
        )
    }
}

#[async_trait]
impl ActionHandler for RestAction {
    async fn call(&self, id: &RecordId, reason: Option<&str>) -> Result<ActionResponse, ActionError> {
        let path = self.path(id);
        let query: Vec<(&str, &str)> = match (self.kind, reason) {
            (ActionKind::Reject, Some(reason)) => vec![(REJECTION_REASON_PARAM, reason)],
            _ => Vec::new(),
        };
        let body = self.client.post_action(&path, &query).await?;
        let response = ActionResponse::from_value(&body);
        debug!(path = %path, demand_synced = response.demand_synced, "workflow action completed");
        Ok(response)
    }
}

/// At most one handler per action kind
#[derive(Clone, Default)]
pub struct ActionMap {
    submit: Option<Arc<dyn ActionHandler>>,
    approve: Option<Arc<dyn ActionHandler>>,
    reject: Option<Arc<dyn ActionHandler>>,
    revoke: Option<Arc<dyn ActionHandler>>,
}

impl ActionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// REST handlers for all four kinds
    pub fn from_api_prefix(client: ApiClient, api_prefix: &str) -> Self {
        Self::new().with_api_fallback(client, api_prefix)
    }

    pub fn with_handler(mut self, kind: ActionKind, handler: impl ActionHandler + 'static) -> Self {
        *self.slot_mut(kind) = Some(Arc::new(handler));
        self
    }

    /// Register an async closure `(id, reason) -> Result<ActionResponse, ActionError>`
    pub fn with_fn<F, Fut>(self, kind: ActionKind, f: F) -> Self
    where
        F: Fn(RecordId, Option<String>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<ActionResponse, ActionError>> + Send + 'static,
    {
        self.with_handler(kind, FnAction(f))
    }

    /// Fill every kind without an explicit handler with a REST handler
    pub fn with_api_fallback(mut self, client: ApiClient, api_prefix: &str) -> Self {
        for kind in ActionKind::ALL {
            let slot = self.slot_mut(kind);
            if slot.is_none() {
                *slot = Some(Arc::new(RestAction::new(client.clone(), api_prefix, kind)));
            }
        }
        self
    }

    pub fn get(&self, kind: ActionKind) -> Option<Arc<dyn ActionHandler>> {
        self.slot(kind).clone()
    }

    pub fn has(&self, kind: ActionKind) -> bool {
        self.slot(kind).is_some()
    }

    fn slot(&self, kind: ActionKind) -> &Option<Arc<dyn ActionHandler>> {
        match kind {
            ActionKind::Submit => &self.submit,
            ActionKind::Approve => &self.approve,
            ActionKind::Reject => &self.reject,
            ActionKind::Revoke => &self.revoke,
        }
    }

    fn slot_mut(&mut self, kind: ActionKind) -> &mut Option<Arc<dyn ActionHandler>> {
        match kind {
            ActionKind::Submit => &mut self.submit,
            ActionKind::Approve => &mut self.approve,
            ActionKind::Reject => &mut self.reject,
            ActionKind::Revoke => &mut self.revoke,
        }
    }
}

impl std::fmt::Debug for ActionMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let configured: Vec<&str> = ActionKind::ALL
            .iter()
            .filter(|k| self.has(**k))
            .map(|k| k.as_str())
            .collect();
        f.debug_struct("ActionMap")
            .field("configured", &configured)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoints() {
        assert_eq!(ActionKind::Submit.endpoint(), "submit");
        assert_eq!(ActionKind::Revoke.endpoint(), "unapprove");
        assert_eq!("unapprove".parse::<ActionKind>(), Ok(ActionKind::Revoke));
        assert!("delete".parse::<ActionKind>().is_err());
    }

    #[test]
    fn test_rest_path() {
        let action = RestAction::new(
            ApiClient::new("http://localhost:8000/api/v1"),
            "/purchase-orders/",
            ActionKind::Revoke,
        );
        assert_eq!(action.path(&RecordId::from(12)), "/purchase-orders/12/unapprove");
    }

    #[test]
    fn test_response_flags() {
        assert!(ActionResponse::from_value(&json!({"demand_synced": true})).demand_synced);
        assert!(!ActionResponse::from_value(&json!({"id": 3})).demand_synced);
        assert!(!ActionResponse::from_value(&Value::Null).demand_synced);
        assert!(!ActionResponse::from_value(&json!("ok")).demand_synced);
    }

    #[test]
    fn test_api_fallback_keeps_explicit_handlers() {
        let map = ActionMap::new()
            .with_fn(ActionKind::Submit, |_, _| async { Ok(ActionResponse::default()) })
            .with_api_fallback(ApiClient::new("http://localhost"), "/demands");
        assert!(ActionKind::ALL.iter().all(|k| map.has(*k)));
        assert!(!ActionMap::new().has(ActionKind::Reject));
    }

    #[tokio::test]
    async fn test_fn_action_receives_reason() {
        let map = ActionMap::new().with_fn(ActionKind::Reject, |id, reason| async move {
            assert_eq!(id.as_str(), "5");
            assert_eq!(reason.as_deref(), Some(""));
            Ok(ActionResponse {
                demand_synced: true,
            })
        });
        let handler = map.get(ActionKind::Reject).unwrap();
        let response = handler.call(&RecordId::from(5), Some("")).await.unwrap();
        assert!(response.demand_synced);
    }
}
