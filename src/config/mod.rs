//! Configuration Management
//!
//! Unified configuration system with hierarchical resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/tradepulse/config.toml)
//! 3. Project config (.tradepulse/config.toml)
//! 4. Environment variables (TRADEPULSE_*, `__` between levels)

mod loader;
mod types;

pub use loader::ConfigLoader;
pub use types::*;
