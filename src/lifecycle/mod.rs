//! Document lifecycle derivation
//!
//! Every document type shares one algorithm (`deriver`) parameterized by a
//! declarative stage table (`definition`, loaded by `loader`, indexed by
//! `registry`). A trusted server-supplied lifecycle short-circuits local
//! derivation through the `adapter`.

pub mod adapter;
pub mod definition;
pub mod deriver;
pub mod documents;
pub mod loader;
pub mod record;
pub mod registry;

pub use adapter::{adapt_backend_lifecycle, stage_percent};
pub use definition::{BackendGuard, StageTable, StageTableDef};
pub use deriver::{derive, try_derive, DeriveOptions};
pub use documents::*;
pub use loader::DefinitionLoader;
pub use record::{RecordId, RecordView};
pub use registry::LifecycleRegistry;
