//! CLI Common Utilities
//!
//! Shared initialization and context management for CLI commands.

use std::path::Path;
use std::sync::Arc;

use crate::config::{Config, ConfigLoader};
use crate::storage::{Database, SharedDatabase};
use crate::types::{PulseError, Result};

/// Command execution context
///
/// Created via `CommandContext::load()` for commands that touch the database,
/// or `CommandContext::load_config()` for commands that only need settings.
#[derive(Clone)]
pub struct CommandContext {
    pub config: Config,
    pub db: SharedDatabase,
}

impl CommandContext {
    /// Load configuration, then open and initialize the database it names.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = Self::load_config(config_path)?;
        let db = Database::open(&config.storage.database_path)?;
        db.initialize()?;

        Ok(Self {
            config,
            db: Arc::new(db),
        })
    }

    /// Load configuration only, from `config_path` when given.
    pub fn load_config(config_path: Option<&Path>) -> Result<Config> {
        match config_path {
            Some(path) => ConfigLoader::load_from_file(path),
            None => ConfigLoader::load(),
        }
    }
}

/// Output format accepted by listing commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
}

impl Format {
    pub fn parse(raw: &str) -> Result<Self> {
        match raw.to_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(PulseError::Config(format!(
                "Invalid format '{}'. Valid values: text, json",
                raw
            ))),
        }
    }
}
