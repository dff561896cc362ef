//! Config Command
//!
//! Usage:
//!   tradepulse config show [-f toml|json]
//!   tradepulse config path

use std::path::Path;

use crate::cli::CommandContext;
use crate::cli::ui::Output;
use crate::config::ConfigLoader;
use crate::types::{PulseError, Result};

/// Print the effective configuration. API keys are never printed.
pub fn show(config_path: Option<&Path>, format: &str) -> Result<()> {
    let as_json = match format.to_lowercase().as_str() {
        "toml" => false,
        "json" => true,
        _ => {
            return Err(PulseError::Config(format!(
                "Invalid format '{}'. Valid values: toml, json",
                format
            )));
        }
    };

    let config = CommandContext::load_config(config_path)?;
    println!("{}", ConfigLoader::render(&config, as_json)?);
    Ok(())
}

/// Print where configuration is read from, in merge order
pub fn path(config_path: Option<&Path>) -> Result<()> {
    let output = Output::new();
    output.header("Configuration Sources");

    if let Some(explicit) = config_path {
        output.field("File", &describe(explicit));
    } else {
        match ConfigLoader::global_config_path() {
            Some(global) => output.field("Global", &describe(&global)),
            None => output.field("Global", "(no home directory)"),
        }
        output.field("Project", &describe(&ConfigLoader::project_config_path()));
    }
    output.field("Env", "TRADEPULSE_<SECTION>__<KEY>");
    Ok(())
}

fn describe(path: &Path) -> String {
    let state = if path.exists() { "found" } else { "missing" };
    format!("{} ({})", path.display(), state)
}
