//! Stage table loading from YAML files, directories and embedded sources

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use super::definition::{StageTable, StageTableDef};
use crate::error::LifecycleError;

/// Built-in stage tables shipped with the crate, as (file name, YAML)
pub const BUILTIN_TABLES: &[(&str, &str)] = &[
    ("work_order.yaml", include_str!("../../config/lifecycles/work_order.yaml")),
    ("purchase_order.yaml", include_str!("../../config/lifecycles/purchase_order.yaml")),
    (
        "purchase_requisition.yaml",
        include_str!("../../config/lifecycles/purchase_requisition.yaml"),
    ),
    ("quotation.yaml", include_str!("../../config/lifecycles/quotation.yaml")),
    ("sales_delivery.yaml", include_str!("../../config/lifecycles/sales_delivery.yaml")),
    ("shipment_notice.yaml", include_str!("../../config/lifecycles/shipment_notice.yaml")),
    ("demand.yaml", include_str!("../../config/lifecycles/demand.yaml")),
    (
        "demand_computation.yaml",
        include_str!("../../config/lifecycles/demand_computation.yaml"),
    ),
    ("production_plan.yaml", include_str!("../../config/lifecycles/production_plan.yaml")),
    ("material_borrow.yaml", include_str!("../../config/lifecycles/material_borrow.yaml")),
    ("other_outbound.yaml", include_str!("../../config/lifecycles/other_outbound.yaml")),
    ("rework_order.yaml", include_str!("../../config/lifecycles/rework_order.yaml")),
    (
        "outsource_work_order.yaml",
        include_str!("../../config/lifecycles/outsource_work_order.yaml"),
    ),
    ("exception_process.yaml", include_str!("../../config/lifecycles/exception_process.yaml")),
    (
        "incoming_inspection.yaml",
        include_str!("../../config/lifecycles/incoming_inspection.yaml"),
    ),
    ("receivable.yaml", include_str!("../../config/lifecycles/receivable.yaml")),
    ("reporting.yaml", include_str!("../../config/lifecycles/reporting.yaml")),
    ("delivery_notice.yaml", include_str!("../../config/lifecycles/delivery_notice.yaml")),
    (
        "maintenance_reminder.yaml",
        include_str!("../../config/lifecycles/maintenance_reminder.yaml"),
    ),
    ("stocktaking.yaml", include_str!("../../config/lifecycles/stocktaking.yaml")),
    ("purchase_receipt.yaml", include_str!("../../config/lifecycles/purchase_receipt.yaml")),
    ("other_inbound.yaml", include_str!("../../config/lifecycles/other_inbound.yaml")),
];

pub struct DefinitionLoader;

impl DefinitionLoader {
    /// Parse and validate a single table from a YAML string
    pub fn load_from_str(yaml: &str) -> Result<StageTable, LifecycleError> {
        let def: StageTableDef = serde_yaml::from_str(yaml)?;
        StageTable::try_from(def)
    }

    /// Load a single table from a file
    pub fn load_from_file(path: &Path) -> Result<StageTable, LifecycleError> {
        let content = std::fs::read_to_string(path)?;
        let table = Self::load_from_str(&content)?;
        debug!(
            path = %path.display(),
            document_type = table.document_type(),
            "loaded stage table"
        );
        Ok(table)
    }

    /// Load every `.yaml`/`.yml` table in a directory.
    ///
    /// A missing directory yields no tables. Two files declaring the same
    /// document type is an error.
    pub fn load_from_dir(dir: &Path) -> Result<HashMap<String, StageTable>, LifecycleError> {
        let mut tables = HashMap::new();

        if !dir.exists() {
            return Ok(tables);
        }

        for path in find_yaml_files(dir)? {
            let table = Self::load_from_file(&path)?;
            let document_type = table.document_type().to_string();
            if tables.insert(document_type.clone(), table).is_some() {
                return Err(LifecycleError::DuplicateDefinition(document_type));
            }
        }

        info!(
            dir = %dir.display(),
            count = tables.len(),
            "loaded stage tables from directory"
        );
        Ok(tables)
    }

    /// Every embedded table, parsed independently so one bad entry does not
    /// hide the others
    pub fn load_builtin() -> Vec<(&'static str, Result<StageTable, LifecycleError>)> {
        BUILTIN_TABLES
            .iter()
            .map(|(name, yaml)| (*name, Self::load_from_str(yaml)))
            .collect()
    }
}

/// YAML files directly inside `dir`, sorted for deterministic load order
fn find_yaml_files(dir: &Path) -> Result<Vec<PathBuf>, LifecycleError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_file()
            && path
                .extension()
                .map(|e| e == "yaml" || e == "yml")
                .unwrap_or(false)
        {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const MINIMAL: &str = r#"
document_type: ticket
backend_guard: non_empty
stages:
  - key: open
    label: 待处理
  - key: closed
    label: 已关闭
"#;

    #[test]
    fn test_every_builtin_table_is_valid() {
        for (name, result) in DefinitionLoader::load_builtin() {
            let table = result.unwrap_or_else(|e| panic!("{name}: {e}"));
            assert_eq!(format!("{}.yaml", table.document_type()), name);
        }
    }

    #[test]
    fn test_load_from_dir_sorted_and_filtered() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("ticket.yaml"), MINIMAL).unwrap();
        fs::write(
            dir.path().join("other.yml"),
            MINIMAL.replace("ticket", "other_ticket"),
        )
        .unwrap();
        fs::write(dir.path().join("README.md"), "not a table").unwrap();

        let tables = DefinitionLoader::load_from_dir(dir.path()).unwrap();
        assert_eq!(tables.len(), 2);
        assert!(tables.contains_key("ticket"));
        assert!(tables.contains_key("other_ticket"));
    }

    #[test]
    fn test_duplicate_document_type_in_dir() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.yaml"), MINIMAL).unwrap();
        fs::write(dir.path().join("b.yaml"), MINIMAL).unwrap();

        let err = DefinitionLoader::load_from_dir(dir.path()).unwrap_err();
        assert!(matches!(err, LifecycleError::DuplicateDefinition(t) if t == "ticket"));
    }

    #[test]
    fn test_missing_dir_is_empty() {
        let tables = DefinitionLoader::load_from_dir(Path::new("/nonexistent/lifecycles")).unwrap();
        assert!(tables.is_empty());
    }

    #[test]
    fn test_invalid_yaml_reports_error() {
        let err = DefinitionLoader::load_from_str("document_type: [").unwrap_err();
        assert!(matches!(err, LifecycleError::Yaml(_)));
    }
}
