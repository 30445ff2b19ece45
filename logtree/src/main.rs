// Forbid unwrap() in production code to prevent panics from corrupt logs.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
//! `logtree-dump`: print every node record in a log file.
//!
//! ```text
//! logtree-dump [--verbose] [PATH]
//! ```
//!
//! `PATH` defaults to `LOGTREE_LOG_PATH`. With `--verbose`, internal node
//! entries and leaf data are printed in full.

use std::path::PathBuf;

use logtree::log::{LogBuffer, Loggable};
use logtree::tree::TreeNode;
use logtree::{EngineConfig, Environment};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logtree=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = match EngineConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    let mut verbose = false;
    let mut path = None;
    for arg in std::env::args().skip(1) {
        if arg == "--verbose" || arg == "-v" {
            verbose = true;
        } else {
            path = Some(PathBuf::from(arg));
        }
    }
    let path = path.unwrap_or_else(|| config.log_path.clone());

    let log = match LogBuffer::open(&path) {
        Ok(log) => log,
        Err(e) => {
            tracing::error!("Failed to open log {}: {e}", path.display());
            std::process::exit(1);
        }
    };

    let entries = match log.entries() {
        Ok(entries) => entries,
        Err(e) => {
            tracing::error!("Failed to read log {}: {e}", path.display());
            std::process::exit(1);
        }
    };

    for entry in &entries {
        let mut out = String::new();
        entry.node.dump_log(&mut out, verbose);
        println!(
            "{:#010x} {:<10} v{} {}",
            entry.lsn,
            entry.node.get_type(),
            entry.header.version,
            out
        );
    }

    match Environment::recover(config, None, &log) {
        Ok((_, result)) => println!(
            "{} entries ({} internal, {} leaf), max node id {}",
            result.entries_scanned, result.internal_nodes, result.leaf_nodes, result.max_node_id
        ),
        Err(e) => {
            tracing::error!("Failed to recover node ids: {e}");
            std::process::exit(1);
        }
    }
}
