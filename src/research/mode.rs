//! Research modes and per-role model resolution.

use crate::types::AppError;
use crate::utils::toml_config::{DuetConfig, ProviderKind, RoleModels};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Named model-configuration profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Fast,
    #[default]
    Balanced,
    Deep,
    /// Balanced profile with per-role overrides
    Custom,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Fast, Mode::Balanced, Mode::Deep, Mode::Custom];

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Fast => "fast",
            Mode::Balanced => "balanced",
            Mode::Deep => "deep",
            Mode::Custom => "custom",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fast" => Ok(Mode::Fast),
            "balanced" => Ok(Mode::Balanced),
            "deep" => Ok(Mode::Deep),
            "custom" => Ok(Mode::Custom),
            other => Err(AppError::InvalidInput(format!("Unknown research mode '{}'", other))),
        }
    }
}

/// Stage of the pipeline a model is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelRole {
    Planner,
    Searcher,
    Synthesizer,
    Clarification,
}

impl fmt::Display for ModelRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ModelRole::Planner => "planner",
            ModelRole::Searcher => "searcher",
            ModelRole::Synthesizer => "synthesizer",
            ModelRole::Clarification => "clarification",
        };
        f.write_str(name)
    }
}

/// Concrete model identifier for every role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelProfile {
    pub planner: String,
    pub searcher: String,
    pub synthesizer: String,
    pub clarification: String,
}

impl ModelProfile {
    fn uniform(model: &str) -> Self {
        Self {
            planner: model.to_string(),
            searcher: model.to_string(),
            synthesizer: model.to_string(),
            clarification: model.to_string(),
        }
    }

    pub fn model(&self, role: ModelRole) -> &str {
        match role {
            ModelRole::Planner => &self.planner,
            ModelRole::Searcher => &self.searcher,
            ModelRole::Synthesizer => &self.synthesizer,
            ModelRole::Clarification => &self.clarification,
        }
    }

    /// Replace roles for which `overrides` holds a non-empty identifier.
    fn apply(&mut self, overrides: &RoleModels) {
        fn set(slot: &mut String, value: &Option<String>) {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                *slot = v.to_string();
            }
        }
        set(&mut self.planner, &overrides.planner);
        set(&mut self.searcher, &overrides.searcher);
        set(&mut self.synthesizer, &overrides.synthesizer);
        set(&mut self.clarification, &overrides.clarification);
    }
}

/// Built-in profile of a provider family for a non-custom mode.
pub fn builtin_profile(kind: ProviderKind, mode: Mode) -> ModelProfile {
    match (kind, mode) {
        (ProviderKind::Gemini, Mode::Fast) => ModelProfile::uniform("gemini-2.5-flash-lite"),
        (ProviderKind::Gemini, Mode::Deep) => ModelProfile::uniform("gemini-2.5-pro"),
        (ProviderKind::Gemini, Mode::Balanced | Mode::Custom) => ModelProfile {
            planner: "gemini-2.5-flash".to_string(),
            searcher: "gemini-2.5-flash".to_string(),
            synthesizer: "gemini-2.5-pro".to_string(),
            clarification: "gemini-2.5-flash".to_string(),
        },
        (ProviderKind::OpenAI, Mode::Fast) => ModelProfile::uniform("gpt-4o-mini"),
        (ProviderKind::OpenAI, Mode::Deep) => ModelProfile::uniform("gpt-4o"),
        (ProviderKind::OpenAI, Mode::Balanced | Mode::Custom) => ModelProfile {
            planner: "gpt-4o".to_string(),
            searcher: "gpt-4o-mini".to_string(),
            synthesizer: "gpt-4o".to_string(),
            clarification: "gpt-4o-mini".to_string(),
        },
    }
}

/// Maps a [`Mode`] to concrete model identifiers.
///
/// Resolution order: built-in profile, then `[modes.<name>]` from the config.
/// Custom mode starts from the resolved balanced profile and then applies the
/// session's custom overrides. Custom overrides are ignored for every other
/// mode.
#[derive(Debug, Clone, Default)]
pub struct ModelResolver {
    kind: ProviderKind,
    mode_overrides: HashMap<String, RoleModels>,
}

impl ModelResolver {
    pub fn new(kind: ProviderKind, mode_overrides: HashMap<String, RoleModels>) -> Self {
        Self {
            kind,
            mode_overrides,
        }
    }

    pub fn from_config(config: &DuetConfig) -> Self {
        Self::new(config.provider.kind, config.modes.clone())
    }

    pub fn resolve(&self, mode: Mode, custom: Option<&RoleModels>) -> ModelProfile {
        let base_mode = match mode {
            Mode::Custom => Mode::Balanced,
            other => other,
        };

        let mut profile = builtin_profile(self.kind, base_mode);
        if let Some(overrides) = self.mode_overrides.get(base_mode.as_str()) {
            profile.apply(overrides);
        }

        if mode == Mode::Custom {
            if let Some(custom) = custom {
                profile.apply(custom);
            }
        }
        profile
    }

    pub fn model_for(&self, mode: Mode, role: ModelRole, custom: Option<&RoleModels>) -> String {
        self.resolve(mode, custom).model(role).to_string()
    }
}
