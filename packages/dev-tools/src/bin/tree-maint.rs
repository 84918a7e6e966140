//! Tree Maintenance Binary
//!
//! Admin entry point for the maintenance path: integrity checks, full
//! rebuilds from parent pointers, shape statistics and purging soft-deleted
//! rows. Runs against the same database files the application uses.
//!
//! # Usage
//!
//! ```bash
//! # Report corruption in the menu tree (read-only)
//! cargo run --bin tree-maint -- validate menu
//!
//! # Recompute coordinates after a bulk import
//! cargo run --bin tree-maint -- rebuild organization
//!
//! # Print the taxonomy
//! cargo run --bin tree-maint -- render taxonomy
//! ```
//!
//! # Environment Variables
//!
//! - `HIERARCHY_DATA_DIR`: Database directory (default: `~/.hierarchy/database`)
//! - `HIERARCHY_LOCK_TIMEOUT_MS`: Per-tree lock acquisition timeout
//! - `HIERARCHY_BUSY_TIMEOUT_MS`: SQLite busy timeout
//! - `RUST_LOG`: Logging level (e.g., "info", "debug", "trace")
//!
//! Exits non-zero when `validate` finds violations, so it can gate scripts.

use std::env;
use std::process::ExitCode;

use hierarchy_core::config::DATA_DIR_ENV;
use hierarchy_core::models::TreeKind;
use hierarchy_core::{EngineConfig, HierarchyService};

const USAGE: &str = "usage: tree-maint <validate|rebuild|stats|purge|render> <menu|taxonomy|organization|all>";

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (command, target) = match args.as_slice() {
        [command, target] => (command.as_str(), target.as_str()),
        _ => {
            eprintln!("{}", USAGE);
            return Ok(ExitCode::from(2));
        }
    };

    let kinds = if target == "all" {
        TreeKind::ALL.to_vec()
    } else {
        vec![target.parse::<TreeKind>().map_err(anyhow::Error::msg)?]
    };

    let mut config = EngineConfig::from_env();
    if env::var(DATA_DIR_ENV).is_err() {
        let home_dir =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Failed to get home directory"))?;
        config.data_dir = home_dir.join(".hierarchy").join("database");
    }
    tracing::info!("Database directory: {:?}", config.data_dir);

    let service = HierarchyService::open(config).await?;

    let mut clean = true;
    for kind in kinds {
        match command {
            "validate" => {
                let report = service.validate(kind).await?;
                println!(
                    "{}: {} rows checked, {} violations",
                    kind,
                    report.rows_checked,
                    report.violations.len()
                );
                for description in report.descriptions() {
                    println!("  {}", description);
                }
                clean &= report.is_valid();
            }
            "rebuild" => {
                let rows = service.rebuild(kind).await?;
                println!("{}: rebuilt {} rows", kind, rows);
            }
            "stats" => {
                let stats = service.tree_stats(kind).await?;
                println!("{}: {}", kind, serde_json::to_string_pretty(&stats)?);
            }
            "purge" => {
                let rows = service.purge_deleted(kind).await?;
                println!("{}: purged {} soft-deleted rows", kind, rows);
            }
            "render" => {
                println!("{}:", kind);
                for branch in service.get_tree(kind).await? {
                    print!("{}", branch.render());
                }
            }
            other => {
                eprintln!("unknown command: {}\n{}", other, USAGE);
                return Ok(ExitCode::from(2));
            }
        }
    }

    Ok(if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
