//! Lifecycle Command Line Interface
//!
//! Inspect stage tables, derive a record's lifecycle, and fire workflow
//! transitions against the REST backend.
//!
//! # Usage
//!
//! ```bash
//! # List document types
//! lifecycle_cli types
//!
//! # Derive a lifecycle (record JSON from a file or stdin)
//! echo '{"id":1,"status":"待审核","review_status":"已驳回"}' | lifecycle_cli derive --type purchase_order
//!
//! # Validate an override directory of stage tables
//! lifecycle_cli validate --dir ./lifecycles
//!
//! # Reject a purchase order
//! lifecycle_cli action --prefix /purchase-orders --id 42 reject --reason "价格偏高"
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::ExitCode;

use mes_lifecycle::lifecycle::{DefinitionLoader, DocumentType, LifecycleRegistry, RecordId};
use mes_lifecycle::workflow::{ActionKind, ActionMap, ApiClient};
use mes_lifecycle::LifecycleConfig;

#[derive(Parser)]
#[command(name = "lifecycle_cli")]
#[command(version = "0.1.0")]
#[command(about = "Document lifecycle derivation and workflow actions")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List document types with a stage table
    Types,

    /// Derive the lifecycle of a record
    Derive {
        /// Document type (e.g., purchase_order)
        #[arg(long = "type", short = 't')]
        document_type: String,

        /// Record JSON file (reads stdin if not provided)
        #[arg(long, short)]
        record: Option<PathBuf>,

        /// Fail on unknown status literals
        #[arg(long)]
        strict: bool,
    },

    /// Validate stage tables (built-ins when no directory is given)
    Validate {
        #[arg(long, short)]
        dir: Option<PathBuf>,
    },

    /// Run a workflow transition via the REST API
    Action {
        /// API prefix of the document resource (e.g., /purchase-orders)
        #[arg(long, short)]
        prefix: String,

        /// Record id
        #[arg(long)]
        id: String,

        /// API base URL (overrides MES_API_BASE_URL)
        #[arg(long)]
        base_url: Option<String>,

        #[command(subcommand)]
        action: ActionCommand,
    },
}

#[derive(Subcommand, Clone)]
enum ActionCommand {
    Submit,
    Approve,
    Reject {
        /// Rejection reason (may be empty)
        #[arg(long, default_value = "")]
        reason: String,
    },
    Revoke,
}

impl ActionCommand {
    fn kind(&self) -> ActionKind {
        match self {
            ActionCommand::Submit => ActionKind::Submit,
            ActionCommand::Approve => ActionKind::Approve,
            ActionCommand::Reject { .. } => ActionKind::Reject,
            ActionCommand::Revoke => ActionKind::Revoke,
        }
    }

    fn reason(&self) -> Option<&str> {
        match self {
            ActionCommand::Reject { reason } => Some(reason.as_str()),
            _ => None,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = LifecycleConfig::from_env();

    let result = match cli.command {
        Commands::Types => cmd_types(&config),
        Commands::Derive {
            document_type,
            record,
            strict,
        } => cmd_derive(&config, &document_type, record, strict),
        Commands::Validate { dir } => cmd_validate(dir),
        Commands::Action {
            prefix,
            id,
            base_url,
            action,
        } => cmd_action(&config, &prefix, &id, base_url, action).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

fn cmd_types(config: &LifecycleConfig) -> Result<()> {
    let registry = LifecycleRegistry::from_config(config)?;
    for document_type in registry.document_types() {
        let table = registry.table(document_type)?;
        let stages: Vec<&str> = table.stages().iter().map(|s| s.key.as_str()).collect();
        println!("{:<24} {:<10} {}", document_type, table.label(), stages.join(" -> "));
    }
    Ok(())
}

fn cmd_derive(
    config: &LifecycleConfig,
    document_type: &str,
    record: Option<PathBuf>,
    strict: bool,
) -> Result<()> {
    // Validates the name against the known document types
    let document_type: DocumentType = document_type.parse()?;

    let mut config = config.clone();
    config.strict |= strict;
    let registry = LifecycleRegistry::from_config(&config)?;

    let source = read_input(record)?;
    let value: serde_json::Value =
        serde_json::from_str(&source).context("record is not valid JSON")?;

    let result = registry.try_derive(document_type.as_str(), Some(&value))?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn cmd_validate(dir: Option<PathBuf>) -> Result<()> {
    match dir {
        Some(dir) => {
            let tables = DefinitionLoader::load_from_dir(&dir)
                .with_context(|| format!("Failed to load {}", dir.display()))?;
            let mut names: Vec<&String> = tables.keys().collect();
            names.sort();
            for name in names {
                println!("ok  {}", name);
            }
            println!("{} stage tables valid", tables.len());
        }
        None => {
            let registry = LifecycleRegistry::try_builtin()?;
            println!("{} built-in stage tables valid", registry.len());
        }
    }
    Ok(())
}

async fn cmd_action(
    config: &LifecycleConfig,
    prefix: &str,
    id: &str,
    base_url: Option<String>,
    action: ActionCommand,
) -> Result<()> {
    let base_url = base_url.unwrap_or_else(|| config.api_base_url.clone());
    let actions = ActionMap::from_api_prefix(ApiClient::new(&base_url), prefix);
    let kind = action.kind();

    let handler = actions
        .get(kind)
        .with_context(|| format!("no handler for {}", kind))?;
    let response = handler
        .call(&RecordId::new(id), action.reason())
        .await
        .with_context(|| format!("{} {}/{} failed", kind, prefix, id))?;

    println!(
        "{} ok{}",
        kind.label(),
        if response.demand_synced {
            " (demand synced)"
        } else {
            ""
        }
    );
    Ok(())
}

fn read_input(file: Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            Ok(buffer)
        }
    }
}
