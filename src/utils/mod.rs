/// `duet.toml` loading, defaults, environment overrides and validation.
pub mod toml_config;

pub use toml_config::{ConfigError, DuetConfig, ProviderKind, RoleModels};
