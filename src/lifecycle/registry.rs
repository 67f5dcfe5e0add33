//! LifecycleRegistry - document type -> validated stage table
//!
//! The process-wide registry is built once: the embedded tables, overlaid
//! by `MES_LIFECYCLE_DIR` when set. Derivation through the registry never
//! fails for a page; problems are logged and the empty result returned.

use lifecycle_types::LifecycleResult;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock};
use tracing::{error, info, warn};

use super::definition::StageTable;
use super::deriver::{self, DeriveOptions};
use super::loader::DefinitionLoader;
use crate::config::LifecycleConfig;
use crate::error::LifecycleError;

/// Global registry instance.
static GLOBAL: OnceLock<Arc<LifecycleRegistry>> = OnceLock::new();

#[derive(Debug, Clone, Default)]
pub struct LifecycleRegistry {
    tables: HashMap<String, Arc<StageTable>>,
    options: DeriveOptions,
}

impl LifecycleRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Embedded tables. An invalid table is logged and skipped.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for (name, result) in DefinitionLoader::load_builtin() {
            match result {
                Ok(table) => {
                    if let Err(e) = registry.insert(table) {
                        error!(file = name, error = %e, "skipping built-in stage table");
                    }
                }
                Err(e) => error!(file = name, error = %e, "skipping built-in stage table"),
            }
        }
        registry
    }

    /// Embedded tables, failing on the first invalid one
    pub fn try_builtin() -> Result<Self, LifecycleError> {
        let mut registry = Self::empty();
        for (_, result) in DefinitionLoader::load_builtin() {
            registry.insert(result?)?;
        }
        Ok(registry)
    }

    /// Built-ins overlaid with every table in `dir`
    pub fn from_dir(dir: &Path) -> Result<Self, LifecycleError> {
        let mut registry = Self::try_builtin()?;
        let tables = DefinitionLoader::load_from_dir(dir)?;
        for table in tables.into_values() {
            registry.replace(table);
        }
        Ok(registry)
    }

    pub fn from_config(config: &LifecycleConfig) -> Result<Self, LifecycleError> {
        let registry = match &config.lifecycle_dir {
            Some(dir) => Self::from_dir(dir)?,
            None => Self::try_builtin()?,
        };
        Ok(registry.with_options(config.derive_options()))
    }

    /// Process-wide registry, initialized from the environment on first use.
    ///
    /// A broken override directory falls back to the built-ins.
    pub fn global() -> &'static Arc<LifecycleRegistry> {
        GLOBAL.get_or_init(|| {
            let config = LifecycleConfig::from_env();
            let registry = Self::from_config(&config).unwrap_or_else(|e| {
                error!(error = %e, "failed to load stage tables, using built-ins");
                Self::builtin()
            });
            info!(count = registry.len(), "lifecycle registry initialized");
            Arc::new(registry)
        })
    }

    /// Install a custom global registry. Returns it back if already initialized.
    pub fn init_global(registry: LifecycleRegistry) -> Result<(), Arc<LifecycleRegistry>> {
        GLOBAL.set(Arc::new(registry))
    }

    pub fn with_options(mut self, options: DeriveOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> DeriveOptions {
        self.options
    }

    /// Add a table; a second table for the same document type is an error
    pub fn insert(&mut self, table: StageTable) -> Result<(), LifecycleError> {
        let document_type = table.document_type().to_string();
        if self.tables.contains_key(&document_type) {
            return Err(LifecycleError::DuplicateDefinition(document_type));
        }
        self.tables.insert(document_type, Arc::new(table));
        Ok(())
    }

    /// Add or override a table
    pub fn replace(&mut self, table: StageTable) {
        let document_type = table.document_type().to_string();
        if self
            .tables
            .insert(document_type.clone(), Arc::new(table))
            .is_some()
        {
            info!(document_type = %document_type, "stage table overridden");
        }
    }

    pub fn get(&self, document_type: &str) -> Option<&Arc<StageTable>> {
        self.tables.get(document_type)
    }

    pub fn table(&self, document_type: &str) -> Result<&Arc<StageTable>, LifecycleError> {
        self.get(document_type)
            .ok_or_else(|| LifecycleError::UnknownDocumentType(document_type.to_string()))
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Registered document types, sorted
    pub fn document_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Lenient derivation. Unknown document types yield the empty result.
    pub fn derive(&self, document_type: &str, record: Option<&Value>) -> LifecycleResult {
        match self.get(document_type) {
            Some(table) => deriver::derive(table, record),
            None => {
                warn!(document_type, "no stage table registered");
                LifecycleResult::empty()
            }
        }
    }

    /// Derivation honoring this registry's options
    pub fn try_derive(
        &self,
        document_type: &str,
        record: Option<&Value>,
    ) -> Result<LifecycleResult, LifecycleError> {
        let table = self.table(document_type)?;
        deriver::try_derive(table, record, self.options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_has_every_table() {
        let registry = LifecycleRegistry::try_builtin().unwrap();
        assert_eq!(registry.len(), 22);
        assert_eq!(LifecycleRegistry::builtin().len(), 22);
        assert!(registry.get("purchase_order").is_some());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn test_duplicate_insert_rejected() {
        let mut registry = LifecycleRegistry::try_builtin().unwrap();
        let table = (**registry.get("reporting").unwrap()).clone();
        let err = registry.insert(table).unwrap_err();
        assert!(matches!(err, LifecycleError::DuplicateDefinition(t) if t == "reporting"));
    }

    #[test]
    fn test_unknown_document_type() {
        let registry = LifecycleRegistry::builtin();
        assert_eq!(
            registry.derive("invoice", Some(&json!({"status": "草稿"}))),
            LifecycleResult::empty()
        );
        assert!(matches!(
            registry.try_derive("invoice", None),
            Err(LifecycleError::UnknownDocumentType(_))
        ));
    }

    #[test]
    fn test_directory_overrides_builtin() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("reporting.yaml"),
            r#"
document_type: reporting
backend_guard: non_empty
stages:
  - key: submitted
    label: 已提交
  - key: confirmed
    label: 已确认
"#,
        )
        .unwrap();

        let registry = LifecycleRegistry::from_dir(dir.path()).unwrap();
        assert_eq!(registry.len(), 22);
        let result = registry.derive("reporting", Some(&json!({"status": "已提交"})));
        assert_eq!(result.stage_name, "已提交");
        assert_eq!(result.main_stages.len(), 2);
    }

    #[test]
    fn test_strict_options_from_config() {
        let config = LifecycleConfig {
            strict: true,
            ..Default::default()
        };
        let registry = LifecycleRegistry::from_config(&config).unwrap();
        let record = json!({"status": "???"});
        assert!(registry.try_derive("purchase_order", Some(&record)).is_err());
        assert_eq!(registry.derive("purchase_order", Some(&record)).stage_name, "草稿");
    }
}
