//! Engine configuration module.
//!
//! This module provides configuration loading for the node core from
//! environment variables.
//!
//! # Environment Variables
//!
//! - `LOGTREE_NODE_MAX_ENTRIES`: Fanout of main-tree internal nodes (default: `128`)
//! - `LOGTREE_DUP_NODE_MAX_ENTRIES`: Fanout of duplicate-tree internal nodes (default: `128`)
//! - `LOGTREE_LOG_PATH`: Log file read by `logtree-dump` (default: `./data/node.log`)
//!
//! # Invariants
//!
//! - Both fanouts are in `1..=u16::MAX`, since entry counts are logged as `u16`
//! - `log_path` is always a valid path (may not exist yet)

use std::path::PathBuf;

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Maximum number of entries in an IN or BIN.
    pub node_max_entries: u16,
    /// Maximum number of entries in a DIN or DBIN.
    pub dup_node_max_entries: u16,
    /// Path of the log file inspected by the dump tool.
    pub log_path: PathBuf,
}

/// Error returned when loading configuration fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// An environment variable has an invalid value.
    InvalidValue { name: String, message: String },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { name, message } => {
                write!(f, "invalid value for {name}: {message}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            node_max_entries: Self::DEFAULT_NODE_MAX_ENTRIES,
            dup_node_max_entries: Self::DEFAULT_NODE_MAX_ENTRIES,
            log_path: PathBuf::from(Self::DEFAULT_LOG_PATH),
        }
    }
}

impl EngineConfig {
    /// Default fanout for every internal node variant.
    pub const DEFAULT_NODE_MAX_ENTRIES: u16 = 128;
    /// Default log file path.
    pub const DEFAULT_LOG_PATH: &'static str = "./data/node.log";

    /// Load configuration from environment variables.
    ///
    /// Unset variables take their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if a fanout variable is set but is not an integer in
    /// `1..=65535`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            node_max_entries: Self::load_fanout("LOGTREE_NODE_MAX_ENTRIES")?,
            dup_node_max_entries: Self::load_fanout("LOGTREE_DUP_NODE_MAX_ENTRIES")?,
            log_path: Self::load_log_path(),
        })
    }

    fn load_log_path() -> PathBuf {
        std::env::var("LOGTREE_LOG_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(Self::DEFAULT_LOG_PATH))
    }

    fn load_fanout(name: &str) -> Result<u16, ConfigError> {
        match std::env::var(name) {
            Ok(value) => Self::parse_fanout(name, &value),
            Err(_) => Ok(Self::DEFAULT_NODE_MAX_ENTRIES),
        }
    }

    /// Parse a fanout value, rejecting zero and anything that does not fit a `u16`.
    fn parse_fanout(name: &str, value: &str) -> Result<u16, ConfigError> {
        match value.trim().parse::<u16>() {
            Ok(0) => Err(ConfigError::InvalidValue {
                name: name.to_string(),
                message: "must be greater than zero".to_string(),
            }),
            Ok(fanout) => Ok(fanout),
            Err(_) => Err(ConfigError::InvalidValue {
                name: name.to_string(),
                message: format!("'{value}' is not a valid entry count (must be 1-65535)"),
            }),
        }
    }
}
