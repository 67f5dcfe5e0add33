//! Null-safe access to raw document records
//!
//! Records arrive as arbitrary JSON from the REST API. Field names are
//! snake_case from the backend but some pages hand over camelCase copies,
//! so every lookup tries the snake_case name first and then its camelCase
//! spelling. Nothing here ever fails: missing or malformed data is `None`.

use lifecycle_types::BackendLifecycle;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Field holding the server-computed lifecycle
pub const LIFECYCLE_FIELD: &str = "lifecycle";

/// Primary key of a record, normalized to its string form
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Read-only view over a JSON object record
#[derive(Debug, Clone, Copy)]
pub struct RecordView<'a> {
    value: &'a Value,
}

impl<'a> RecordView<'a> {
    /// `None` for absent, null or non-object records
    pub fn new(record: Option<&'a Value>) -> Option<Self> {
        match record {
            Some(value) if value.is_object() => Some(Self { value }),
            _ => None,
        }
    }

    pub fn raw(&self) -> &'a Value {
        self.value
    }

    /// Field by snake_case name, falling back to camelCase
    pub fn field(&self, name: &str) -> Option<&'a Value> {
        let direct = self.value.get(name).filter(|v| !v.is_null());
        direct.or_else(|| {
            let camel = to_camel_case(name);
            if camel == name {
                None
            } else {
                self.value.get(camel.as_str()).filter(|v| !v.is_null())
            }
        })
    }

    /// Trimmed, non-empty text of a string or number field
    pub fn text(&self, name: &str) -> Option<String> {
        match self.field(name)? {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// First field in `names` carrying text, with the field it came from
    pub fn first_text<'n>(&self, names: &'n [String]) -> Option<(&'n str, String)> {
        names
            .iter()
            .find_map(|name| self.text(name).map(|value| (name.as_str(), value)))
    }

    /// Primary key under `row_key`
    pub fn id(&self, row_key: &str) -> Option<RecordId> {
        self.text(row_key).map(RecordId)
    }

    /// Server-supplied lifecycle, if present and well-formed.
    ///
    /// A payload that fails to deserialize is logged and treated as absent.
    pub fn lifecycle(&self) -> Option<BackendLifecycle> {
        let value = self.field(LIFECYCLE_FIELD)?;
        if !value.is_object() {
            return None;
        }
        match serde_json::from_value::<BackendLifecycle>(value.clone()) {
            Ok(lifecycle) => Some(lifecycle),
            Err(e) => {
                warn!(error = %e, "ignoring malformed lifecycle payload");
                None
            }
        }
    }
}

/// `review_status` -> `reviewStatus`
pub fn to_camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;
    for ch in name.chars() {
        if ch == '_' {
            upper_next = !out.is_empty();
        } else if upper_next {
            out.extend(ch.to_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}
