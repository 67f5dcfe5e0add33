//! MES Lifecycle - document lifecycle derivation and workflow actions
//!
//! Every business document type (work order, purchase order, quotation,
//! incoming inspection, ...) is rendered with the same progress model: a
//! percent, the current stage, an ordered stage list and suggested next
//! steps. Records only carry ad-hoc status strings, so each type's stage
//! vocabulary and status aliases live in a declarative YAML table and one
//! generic deriver turns a record into a `LifecycleResult`.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mes_lifecycle::lifecycle::purchase_order_lifecycle;
//! use serde_json::json;
//!
//! let record = json!({"id": 7, "status": "待审核", "review_status": "已驳回"});
//! let lifecycle = purchase_order_lifecycle(Some(&record));
//! assert_eq!(lifecycle.stage_name, "已驳回");
//! ```

// Core error handling
pub mod error;

// Environment configuration
pub mod config;

// Stage tables, derivation, per-document entry points
pub mod lifecycle;

// Submit / approve / reject / revoke controller
pub mod workflow;

pub use config::LifecycleConfig;
pub use error::{ActionError, LifecycleError, WorkflowError};
pub use lifecycle::{DocumentType, LifecycleRegistry};
pub use lifecycle_types::{
    BackendLifecycle, BackendStage, LifecycleResult, LifecycleStatus, StageStatus, SubStage,
};
pub use workflow::{ActionKind, ActionMap, WorkflowActionController, WorkflowActionsProps};
