//! Init command implementation
//!
//! Writes a starter `duet.toml` for the chosen provider.

use super::output::Output;
use crate::utils::toml_config::{DuetConfig, ProviderKind, DEFAULT_CONFIG_FILE};
use std::fs;
use std::path::PathBuf;

/// Result of the init operation
#[derive(Debug, PartialEq, Eq)]
pub enum InitResult {
    /// Initialization completed successfully
    Success,
    /// duet.toml already exists and --force was not given
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to initialize
    pub path: PathBuf,
    /// Overwrite an existing file
    pub force: bool,
    pub provider: ProviderKind,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    output.banner();
    output.header("Initializing duet");

    let config_path = config.path.join(DEFAULT_CONFIG_FILE);
    if config_path.exists() && !config.force {
        output.warning(&format!("{} already exists!", config_path.display()));
        output.hint("Use --force to overwrite it");
        return InitResult::AlreadyExists;
    }

    if !config.path.exists() {
        if let Err(e) = fs::create_dir_all(&config.path) {
            output.error(&format!("Failed to create {}: {}", config.path.display(), e));
            return InitResult::Error(e.to_string());
        }
    }

    if let Err(e) = fs::write(&config_path, DuetConfig::starter_toml(config.provider)) {
        output.error(&format!("Failed to write {}: {}", config_path.display(), e));
        return InitResult::Error(e.to_string());
    }
    output.created("config", &config_path.display().to_string());

    output.hint(&format!(
        "Set {} in your environment or a .env file, then run:",
        config.provider.default_api_key_env()
    ));
    output.command("duet research \"your question\"");
    InitResult::Success
}
