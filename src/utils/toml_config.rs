//! TOML-based configuration for duet
//!
//! This module provides declarative configuration for the model provider,
//! research-loop governance, logging and per-mode model overrides via a TOML
//! file (`duet.toml`).
//!
//! Every section has defaults, so an empty file (or no file at all) is a valid
//! configuration. The provider type and base URL can be overridden from the
//! environment with `DUET_PROVIDER` and `DUET_API_BASE`.

use crate::llm::gemini::DEFAULT_GEMINI_API_BASE;
use crate::llm::openai::DEFAULT_OPENAI_API_BASE;
use crate::llm::Provider;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// File looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "duet.toml";

/// Root configuration structure loaded from duet.toml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DuetConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub research: ResearchConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Per-mode role overrides, keyed by mode name (`fast`, `balanced`, `deep`)
    #[serde(default)]
    pub modes: HashMap<String, RoleModels>,

    /// Role models applied when the session runs in custom mode
    #[serde(default)]
    pub custom_models: RoleModels,
}

// ============= Provider Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    Gemini,
    OpenAI,
}

impl ProviderKind {
    pub fn default_api_key_env(self) -> &'static str {
        match self {
            ProviderKind::Gemini => "GEMINI_API_KEY",
            ProviderKind::OpenAI => "OPENAI_API_KEY",
        }
    }

    pub fn default_api_base(self) -> &'static str {
        match self {
            ProviderKind::Gemini => DEFAULT_GEMINI_API_BASE,
            ProviderKind::OpenAI => DEFAULT_OPENAI_API_BASE,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::OpenAI => write!(f, "openai"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(ProviderKind::Gemini),
            "openai" => Ok(ProviderKind::OpenAI),
            other => Err(ConfigError::ValidationError(format!(
                "Unknown provider type '{}' (expected 'gemini' or 'openai')",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(rename = "type", default)]
    pub kind: ProviderKind,

    /// Environment variable containing the API key. Defaults per provider type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Base URL of the API. Defaults per provider type.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base: Option<String>,
}

impl ProviderConfig {
    pub fn api_key_env(&self) -> &str {
        self.api_key_env
            .as_deref()
            .unwrap_or_else(|| self.kind.default_api_key_env())
    }

    pub fn api_base(&self) -> &str {
        self.api_base
            .as_deref()
            .unwrap_or_else(|| self.kind.default_api_base())
    }
}

// ============= Research Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    /// Completed search cycles required before a finish is honoured
    #[serde(default = "default_min_search_cycles")]
    pub min_search_cycles: usize,

    /// Upper end of the cycle range the planner is asked to aim for
    #[serde(default = "default_target_max_search_cycles")]
    pub target_max_search_cycles: usize,

    /// Enforced ceiling; unset means the planner alone decides when to stop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_search_cycles: Option<usize>,

    /// Pause after every planner thought, in milliseconds
    #[serde(default = "default_pacing_delay_ms")]
    pub pacing_delay_ms: u64,

    #[serde(default = "default_max_concurrent_searches")]
    pub max_concurrent_searches: usize,

    /// Extra attempts per failed search call
    #[serde(default)]
    pub search_retries: u32,

    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,
}

fn default_min_search_cycles() -> usize {
    7
}

fn default_target_max_search_cycles() -> usize {
    17
}

fn default_pacing_delay_ms() -> u64 {
    400
}

fn default_max_concurrent_searches() -> usize {
    4
}

/// Ten minutes; retry waits double from here.
const MAX_RETRY_BASE_DELAY_MS: u64 = 600_000;

fn default_retry_base_delay_ms() -> u64 {
    500
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            min_search_cycles: default_min_search_cycles(),
            target_max_search_cycles: default_target_max_search_cycles(),
            max_search_cycles: None,
            pacing_delay_ms: default_pacing_delay_ms(),
            max_concurrent_searches: default_max_concurrent_searches(),
            search_retries: 0,
            retry_base_delay_ms: default_retry_base_delay_ms(),
        }
    }
}

impl ResearchConfig {
    pub fn pacing_delay(&self) -> Duration {
        Duration::from_millis(self.pacing_delay_ms)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

// ============= Logging Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON log lines instead of the human-readable format
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// ============= Model Overrides =============

/// Optional model identifier per research role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleModels {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub planner: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub searcher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synthesizer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clarification: Option<String>,
}

impl RoleModels {
    /// Entries of `other` that are set take precedence.
    pub fn merged_with(&self, other: &RoleModels) -> RoleModels {
        RoleModels {
            planner: other.planner.clone().or_else(|| self.planner.clone()),
            searcher: other.searcher.clone().or_else(|| self.searcher.clone()),
            synthesizer: other.synthesizer.clone().or_else(|| self.synthesizer.clone()),
            clarification: other
                .clarification
                .clone()
                .or_else(|| self.clarification.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.planner.is_none()
            && self.searcher.is_none()
            && self.synthesizer.is_none()
            && self.clarification.is_none()
    }
}

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Failed to serialize TOML: {0}")]
    SerializeError(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl DuetConfig {
    /// Load configuration from a TOML file and apply environment overrides.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides()?;
        config.validate()?;

        info!(path = %path.display(), provider = %config.provider.kind, "Loaded configuration");
        Ok(config)
    }

    /// Load an explicitly named file, or `duet.toml` from the working
    /// directory when present, or the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = path {
            return Self::load(path);
        }

        let default_path = Path::new(DEFAULT_CONFIG_FILE);
        if default_path.exists() {
            return Self::load(default_path);
        }

        debug!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply `DUET_PROVIDER` / `DUET_API_BASE` from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Apply provider overrides using `lookup` as the variable source.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(kind) = lookup("DUET_PROVIDER").filter(|v| !v.trim().is_empty()) {
            let kind: ProviderKind = kind.parse()?;
            if kind != self.provider.kind {
                debug!(from = %self.provider.kind, to = %kind, "Provider overridden from environment");
                // Key env and base belong to the previous provider type.
                self.provider = ProviderConfig {
                    kind,
                    api_key_env: None,
                    api_base: None,
                };
            }
        }
        if let Some(base) = lookup("DUET_API_BASE").filter(|v| !v.trim().is_empty()) {
            self.provider.api_base = Some(base);
        }
        Ok(())
    }

    /// Validate the configuration for internal consistency.
    ///
    /// The API key is checked separately by [`DuetConfig::api_key`], so
    /// configuration can be inspected without credentials.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let research = &self.research;

        if research.max_concurrent_searches == 0 {
            return Err(ConfigError::ValidationError(
                "research.max_concurrent_searches must be at least 1".to_string(),
            ));
        }

        if let Some(max) = research.max_search_cycles {
            if max < research.min_search_cycles {
                return Err(ConfigError::ValidationError(format!(
                    "research.max_search_cycles ({}) is below research.min_search_cycles ({})",
                    max, research.min_search_cycles
                )));
            }
        }

        if research.retry_base_delay_ms > MAX_RETRY_BASE_DELAY_MS {
            return Err(ConfigError::ValidationError(format!(
                "research.retry_base_delay_ms ({}) exceeds {}",
                research.retry_base_delay_ms, MAX_RETRY_BASE_DELAY_MS
            )));
        }

        if research.target_max_search_cycles < research.min_search_cycles {
            return Err(ConfigError::ValidationError(format!(
                "research.target_max_search_cycles ({}) is below research.min_search_cycles ({})",
                research.target_max_search_cycles, research.min_search_cycles
            )));
        }

        for name in self.modes.keys() {
            if !matches!(name.as_str(), "fast" | "balanced" | "deep") {
                return Err(ConfigError::ValidationError(format!(
                    "Unknown mode '{}' in [modes] (expected fast, balanced or deep; use [custom_models] for custom)",
                    name
                )));
            }
        }

        Ok(())
    }

    /// Get the provider API key from the environment
    pub fn api_key(&self) -> Result<String, ConfigError> {
        let env_name = self.provider.api_key_env();
        std::env::var(env_name)
            .ok()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(env_name.to_string()))
    }

    /// Build the runtime provider, resolving the API key.
    pub fn llm_provider(&self) -> Result<Provider, ConfigError> {
        self.llm_provider_with_key(self.api_key()?)
    }

    pub fn llm_provider_with_key(&self, api_key: String) -> Result<Provider, ConfigError> {
        let api_base = self.provider.api_base().to_string();
        Ok(match self.provider.kind {
            ProviderKind::Gemini => Provider::Gemini { api_key, api_base },
            ProviderKind::OpenAI => Provider::OpenAI { api_key, api_base },
        })
    }

    /// Starter configuration written by `duet init`.
    pub fn starter_toml(kind: ProviderKind) -> String {
        format!(
            r#"# duet configuration

[provider]
type = "{kind}"
api_key_env = "{key_env}"
# api_base = "{base}"

[research]
min_search_cycles = 7
target_max_search_cycles = 17
# max_search_cycles = 30
pacing_delay_ms = 400
max_concurrent_searches = 4
search_retries = 0
retry_base_delay_ms = 500

[logging]
level = "info"
json = false

# Override individual roles of a built-in mode:
# [modes.balanced]
# synthesizer = "a-stronger-model"

# Models used when running with --mode custom:
# [custom_models]
# planner = "..."
# searcher = "..."
# synthesizer = "..."
# clarification = "..."
"#,
            kind = kind,
            key_env = kind.default_api_key_env(),
            base = kind.default_api_base(),
        )
    }
}
