//! Environment configuration
//!
//! | Variable               | Default                        |
//! |------------------------|--------------------------------|
//! | `MES_API_BASE_URL`     | `http://localhost:8000/api/v1` |
//! | `MES_LIFECYCLE_DIR`    | unset (built-in tables only)   |
//! | `MES_LIFECYCLE_STRICT` | `false`                        |
//!
//! Binaries call `dotenvy::dotenv()` before `LifecycleConfig::from_env()`.

use std::path::PathBuf;

use crate::lifecycle::DeriveOptions;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/v1";

pub const ENV_API_BASE_URL: &str = "MES_API_BASE_URL";
pub const ENV_LIFECYCLE_DIR: &str = "MES_LIFECYCLE_DIR";
pub const ENV_LIFECYCLE_STRICT: &str = "MES_LIFECYCLE_STRICT";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecycleConfig {
    /// Base URL the REST action fallback posts to
    pub api_base_url: String,
    /// Directory of YAML stage tables overriding the built-ins
    pub lifecycle_dir: Option<PathBuf>,
    /// Reject unknown status literals instead of defaulting
    pub strict: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            lifecycle_dir: None,
            strict: false,
        }
    }
}

impl LifecycleConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup (environment, test map)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            api_base_url: non_empty(ENV_API_BASE_URL)
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string()),
            lifecycle_dir: non_empty(ENV_LIFECYCLE_DIR).map(PathBuf::from),
            strict: non_empty(ENV_LIFECYCLE_STRICT)
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
        }
    }

    pub fn derive_options(&self) -> DeriveOptions {
        DeriveOptions {
            strict: self.strict,
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
