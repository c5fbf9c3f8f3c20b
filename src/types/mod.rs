use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

// ============= Clarification Types =============

/// Speaker of a clarification turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClarificationTurn {
    pub role: TurnRole,
    pub content: String,
}

impl ClarificationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            content: content.into(),
        }
    }
}

/// Result of one clarification round-trip.
///
/// Serializes to the clarification wire contract:
/// `{"type":"question"|"summary","content":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "lowercase")]
pub enum ClarificationOutcome {
    Question(String),
    Summary(String),
}

// ============= Research Progress Types =============

/// Debate persona acting on a planner turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentPersona {
    Alpha,
    Beta,
}

impl AgentPersona {
    /// Role title used in prompts.
    pub fn title(self) -> &'static str {
        match self {
            AgentPersona::Alpha => "Strategist",
            AgentPersona::Beta => "Tactician",
        }
    }

    pub fn other(self) -> Self {
        match self {
            AgentPersona::Alpha => AgentPersona::Beta,
            AgentPersona::Beta => AgentPersona::Alpha,
        }
    }
}

impl fmt::Display for AgentPersona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentPersona::Alpha => write!(f, "Alpha"),
            AgentPersona::Beta => write!(f, "Beta"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Thought,
    Search,
    Read,
    Synthesis,
}

/// Payload of a progress update: a single text or an ordered list of texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UpdateContent {
    Text(String),
    List(Vec<String>),
}

impl UpdateContent {
    /// Flatten the content, joining list entries with `separator`.
    pub fn joined(&self, separator: &str) -> String {
        match self {
            UpdateContent::Text(text) => text.clone(),
            UpdateContent::List(items) => items.join(separator),
        }
    }
}

impl From<String> for UpdateContent {
    fn from(value: String) -> Self {
        UpdateContent::Text(value)
    }
}

impl From<&str> for UpdateContent {
    fn from(value: &str) -> Self {
        UpdateContent::Text(value.to_string())
    }
}

impl From<Vec<String>> for UpdateContent {
    fn from(value: Vec<String>) -> Self {
        UpdateContent::List(value)
    }
}

/// One entry of the append-only progress log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchUpdate {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: UpdateKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persona: Option<AgentPersona>,
    pub content: UpdateContent,
}

// ============= Source Types =============

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub url: String,
    pub title: String,
}

/// Drop citations whose url was already seen, keeping the first occurrence
/// and the original order.
pub fn dedupe_citations(citations: impl IntoIterator<Item = Citation>) -> Vec<Citation> {
    let mut seen = std::collections::HashSet::new();
    citations
        .into_iter()
        .filter(|c| seen.insert(c.url.clone()))
        .collect()
}

/// File attached to a session. The payload is base64 encoded.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileData {
    pub name: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
    pub data: String,
}

impl FileData {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Read a file from disk into a transportable attachment.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            AppError::InvalidInput(format!("Failed to read '{}': {}", path.display(), e))
        })?;

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let mime_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            name,
            mime_type,
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        })
    }

    pub fn is_image(&self) -> bool {
        self.mime_type.starts_with("image/")
    }
}

// Payloads can be megabytes; keep them out of logs.
impl fmt::Debug for FileData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileData")
            .field("name", &self.name)
            .field("mime_type", &self.mime_type)
            .field("data_len", &self.data.len())
            .finish()
    }
}

/// What a finished session hands to the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalResearchData {
    pub report: String,
    pub citations: Vec<Citation>,
    pub research_time_ms: u64,
}

// ============= Error Types =============

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Research was cancelled")]
    Cancelled,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn is_cancellation(&self) -> bool {
        matches!(self, AppError::Cancelled)
    }
}

impl From<crate::utils::toml_config::ConfigError> for AppError {
    fn from(err: crate::utils::toml_config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
