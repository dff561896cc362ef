//! Init Command
//!
//! Create the project config (if missing) and the database schema.

use std::path::Path;

use crate::cli::CommandContext;
use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::storage::Database;
use crate::types::Result;

pub fn run(config_path: Option<&Path>, force: bool) -> Result<()> {
    let output = Output::new();

    // An explicit config file is left alone
    if config_path.is_none() {
        let config_file = ConfigLoader::init_project(force)?.join("config.toml");
        output.success(&format!("Project config: {}", config_file.display()));
    }

    let config = CommandContext::load_config(config_path)?;
    let db = Database::open(&config.storage.database_path)?;
    db.initialize()?;

    output.success(&format!(
        "Database ready: {} (schema v{})",
        config.storage.database_path.display(),
        db.schema_version()?
    ));
    output.info("Next: tradepulse analyze --ticker NVDA --date 2025-03-14");
    Ok(())
}
