//! API client for backend workflow transitions

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::ActionError;

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Absolute URL for `path` with `query` appended
    pub fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, ActionError> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query.iter().copied());
        }
        Ok(url)
    }

    /// POST with no body.
    ///
    /// `{success: true, data}` and `{code: 200, data}` envelopes are unwrapped
    /// to `data`. A 2xx carrying `{success: false, error}` or a numeric
    /// `code` other than 200 is a failure. A 2xx body that is empty or not JSON yields `Value::Null`.
    pub async fn post_action(&self, path: &str, query: &[(&str, &str)]) -> Result<Value, ActionError> {
        let url = self.url(path, query)?;
        debug!(%url, "POST workflow action");

        let response = self.client.post(url).send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if !status.is_success() {
            let status = status.as_u16();
            return Err(match error_detail(&text) {
                Some(message) => ActionError::Http { status, message },
                None => ActionError::Status { status },
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        match serde_json::from_str(&text) {
            Ok(value) => unwrap_envelope(value),
            Err(_) => Ok(Value::Null),
        }
    }
}

const DEFAULT_FAILURE: &str = "请求失败";

/// Payload of a 2xx response body, or the failure it reports
fn unwrap_envelope(value: Value) -> Result<Value, ActionError> {
    let mut body = match value {
        Value::Object(body) => body,
        other => return Ok(other),
    };

    match body.get("success").and_then(Value::as_bool) {
        Some(true) if body.contains_key("data") => {
            return Ok(body.remove("data").unwrap_or(Value::Null));
        }
        Some(false) if body.contains_key("error") => {
            let message = body
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .filter(|m| !m.is_empty())
                .unwrap_or(DEFAULT_FAILURE);
            return Err(ActionError::failed(message));
        }
        _ => {}
    }

    match body.get("code").and_then(Value::as_i64) {
        Some(200) if body.contains_key("data") => return Ok(body.remove("data").unwrap_or(Value::Null)),
        Some(200) | None => {}
        Some(_) => return Err(ActionError::failed(legacy_message(&body))),
    }

    Ok(Value::Object(body))
}

fn legacy_message(body: &serde_json::Map<String, Value>) -> &str {
    body.get("message")
        .and_then(Value::as_str)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_FAILURE)
}

/// Human-readable reason from a non-2xx body, if the backend gave one
fn error_detail(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    let body = parsed.as_object()?;

    if body.get("success").and_then(Value::as_bool) == Some(false) {
        if let Some(error) = body.get("error") {
            let message = ["message", "details"]
                .iter()
                .find_map(|key| error.get(*key).and_then(Value::as_str))
                .unwrap_or(DEFAULT_FAILURE);
            return Some(message.to_string());
        }
    }

    match body.get("detail") {
        Some(Value::String(detail)) if !detail.is_empty() => return Some(detail.clone()),
        // validation errors: first entry's `msg`
        Some(Value::Array(items)) if !items.is_empty() => {
            let message = items[0]
                .get("msg")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| Value::Array(items.clone()).to_string());
            return Some(message);
        }
        Some(detail) if detail.is_object() => return Some(detail.to_string()),
        _ => {}
    }

    match body.get("code").and_then(Value::as_i64) {
        Some(code) if code != 200 => Some(legacy_message(body).to_string()),
        _ => None,
    }
}
