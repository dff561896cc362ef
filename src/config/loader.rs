//! Configuration Loader (Figment-based)
//!
//! Loads and merges configuration from multiple sources using Figment:
//! 1. Built-in defaults (Serialized)
//! 2. Global config (~/.config/tradepulse/config.toml)
//! 3. Project config (.tradepulse/config.toml)
//! 4. Environment variables (TRADEPULSE_* prefix, `__` between levels)

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use super::types::Config;
use crate::constants::storage::PROJECT_DIR;
use crate::types::{PulseError, Result};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with full resolution chain:
    /// defaults → global → project → env vars
    pub fn load() -> Result<Config> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            debug!("Loading global config from: {}", global_path.display());
            figment = figment.merge(Toml::file(&global_path));
        }

        let project_path = Self::project_config_path();
        if project_path.exists() {
            debug!("Loading project config from: {}", project_path.display());
            figment = figment.merge(Toml::file(&project_path));
        }

        Self::extract(figment.merge(Self::env_provider()))
    }

    /// Load configuration from a specific file (plus env overrides)
    pub fn load_from_file(path: &Path) -> Result<Config> {
        if !path.exists() {
            return Err(PulseError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Self::extract(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Toml::file(path))
                .merge(Self::env_provider()),
        )
    }

    /// `TRADEPULSE_PRODUCER__DEEP_THINK_LLM` -> `producer.deep_think_llm`
    fn env_provider() -> Env {
        Env::prefixed("TRADEPULSE_").split("__").lowercase(true)
    }

    fn extract(figment: Figment) -> Result<Config> {
        let config: Config = figment
            .extract()
            .map_err(|e| PulseError::Config(format!("Configuration error: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    // =========================================================================
    // Path Management
    // =========================================================================

    /// Get path to global config directory (~/.config/tradepulse/)
    pub fn global_dir() -> Option<PathBuf> {
        env::var("XDG_CONFIG_HOME")
            .ok()
            .map(PathBuf::from)
            .or_else(|| {
                env::var("HOME")
                    .ok()
                    .map(|home| PathBuf::from(home).join(".config"))
            })
            .map(|p| p.join("tradepulse"))
    }

    pub fn global_config_path() -> Option<PathBuf> {
        Self::global_dir().map(|dir| dir.join("config.toml"))
    }

    pub fn project_config_path() -> PathBuf {
        Self::project_dir().join("config.toml")
    }

    pub fn project_dir() -> PathBuf {
        PathBuf::from(PROJECT_DIR)
    }

    // =========================================================================
    // Rendering
    // =========================================================================

    /// Effective configuration as TOML or pretty JSON. Keys are never included.
    pub fn render(config: &Config, as_json: bool) -> Result<String> {
        if as_json {
            Ok(serde_json::to_string_pretty(config)?)
        } else {
            toml::to_string_pretty(config).map_err(|e| PulseError::Config(e.to_string()))
        }
    }

    // =========================================================================
    // Initialization
    // =========================================================================

    /// Create `.tradepulse/` with a default config file if missing
    pub fn init_project(force: bool) -> Result<PathBuf> {
        let project_dir = Self::project_dir();
        Self::init_project_at(&project_dir, force)?;
        Ok(project_dir)
    }

    fn init_project_at(project_dir: &Path, force: bool) -> Result<PathBuf> {
        fs::create_dir_all(project_dir)?;

        let config_path = project_dir.join("config.toml");
        if !config_path.exists() || force {
            fs::write(&config_path, Self::default_project_config())?;
            info!("Created project config: {}", config_path.display());
        } else {
            debug!("Project config exists: {}", config_path.display());
        }
        Ok(config_path)
    }

    fn default_project_config() -> String {
        r#"# TradePulse Project Configuration
# API keys are better supplied through the environment:
#   TRADEPULSE_PRODUCER__OPENAI_API_KEY, TRADEPULSE_PRODUCER__FINNHUB_API_KEY

version = "1.0"

[producer]
command = "tradingagents-stream"
llm_provider = "openai"
deep_think_llm = "gpt-4.1-mini"
quick_think_llm = "gpt-4.1-mini"
max_debate_rounds = 1
online_tools = true

[storage]
database_path = ".tradepulse/analysis.db"

[session]
event_buffer = 64
default_analysts = ["market", "social", "news", "fundamentals"]
"#
        .to_string()
    }
}
