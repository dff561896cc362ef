//! Configuration Types
//!
//! All configuration structures with sensible defaults.
//! Supports global (~/.config/tradepulse/) and project (.tradepulse/) level configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::constants::{analysts, producer, session, storage};
use crate::tracker::Analyst;
use crate::types::{PulseError, Result};

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Analysis pipeline settings
    pub producer: ProducerConfig,

    /// Persistence settings
    pub storage: StorageConfig,

    /// Session driving settings
    pub session: SessionConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            producer: ProducerConfig::default(),
            storage: StorageConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl Config {
    /// Validate configuration values are within acceptable ranges.
    /// Returns `PulseError::Config` on validation failure.
    pub fn validate(&self) -> Result<()> {
        if self.session.event_buffer == 0 {
            return Err(PulseError::Config(
                "session.event_buffer must be greater than 0".to_string(),
            ));
        }

        if self.producer.max_debate_rounds == 0 {
            return Err(PulseError::Config(
                "producer.max_debate_rounds must be greater than 0".to_string(),
            ));
        }

        if self.producer.command.trim().is_empty() {
            return Err(PulseError::Config(
                "producer.command must not be empty".to_string(),
            ));
        }

        for key in &self.session.default_analysts {
            key.parse::<Analyst>()
                .map_err(|_| PulseError::Config(format!("Unknown analyst in session.default_analysts: {}", key)))?;
        }

        Ok(())
    }
}

// =============================================================================
// Producer Configuration
// =============================================================================

/// Settings for the analysis pipeline process
///
/// API keys are never serialized and are redacted in debug output. The
/// producer converts them to `SecretString` when it spawns the pipeline.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerConfig {
    /// Pipeline executable
    pub command: String,

    /// Extra arguments placed before the request flags
    pub args: Vec<String>,

    /// LLM provider name passed to the pipeline
    pub llm_provider: String,

    /// Model for deep reasoning steps
    pub deep_think_llm: String,

    /// Model for quick steps
    pub quick_think_llm: String,

    /// Bull/bear and risk debate rounds
    pub max_debate_rounds: u32,

    /// Allow the pipeline to call online data tools
    pub online_tools: bool,

    /// Custom LLM backend endpoint
    pub backend_url: Option<String>,

    /// Never serialized to output
    #[serde(skip_serializing)]
    pub openai_api_key: Option<String>,

    /// Never serialized to output
    #[serde(skip_serializing)]
    pub finnhub_api_key: Option<String>,
}

impl std::fmt::Debug for ProducerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerConfig")
            .field("command", &self.command)
            .field("args", &self.args)
            .field("llm_provider", &self.llm_provider)
            .field("deep_think_llm", &self.deep_think_llm)
            .field("quick_think_llm", &self.quick_think_llm)
            .field("max_debate_rounds", &self.max_debate_rounds)
            .field("online_tools", &self.online_tools)
            .field("backend_url", &self.backend_url)
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "[REDACTED]"))
            .field("finnhub_api_key", &self.finnhub_api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            command: producer::DEFAULT_COMMAND.to_string(),
            args: Vec::new(),
            llm_provider: producer::DEFAULT_LLM_PROVIDER.to_string(),
            deep_think_llm: producer::DEFAULT_MODEL.to_string(),
            quick_think_llm: producer::DEFAULT_MODEL.to_string(),
            max_debate_rounds: producer::DEFAULT_MAX_DEBATE_ROUNDS,
            online_tools: true,
            backend_url: None,
            openai_api_key: None,
            finnhub_api_key: None,
        }
    }
}

impl ProducerConfig {
    /// Non-secret settings handed to the pipeline as `--config`
    pub fn pipeline_settings(&self) -> serde_json::Value {
        let mut settings = serde_json::json!({
            "llm_provider": self.llm_provider,
            "deep_think_llm": self.deep_think_llm,
            "quick_think_llm": self.quick_think_llm,
            "max_debate_rounds": self.max_debate_rounds,
            "online_tools": self.online_tools,
        });
        if let (Some(url), Some(obj)) = (&self.backend_url, settings.as_object_mut()) {
            obj.insert("backend_url".to_string(), serde_json::Value::String(url.clone()));
        }
        settings
    }
}

// =============================================================================
// Storage Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// SQLite database file
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(storage::DEFAULT_DATABASE_PATH),
        }
    }
}

// =============================================================================
// Session Configuration
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Capacity of the event channel
    pub event_buffer: usize,

    /// Analysts used when a run names none
    pub default_analysts: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            event_buffer: session::DEFAULT_EVENT_BUFFER,
            default_analysts: analysts::ALL.iter().map(|a| a.to_string()).collect(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
