//! LLM Client abstractions and provider management
//!
//! This module provides the single invocation contract every stage of the
//! research loop talks to:
//! - **Gemini**: web-search grounding with structured citations
//! - **OpenAI**: any OpenAI-compatible chat completions endpoint, no citations
//!
//! Callers never branch on the provider. What a backend can do is reported by
//! [`LLMClient::capabilities`].

use crate::llm::capabilities::ProviderCapabilities;
use crate::types::{Citation, FileData, Result};
use async_trait::async_trait;

/// Generic LLM client trait for provider abstraction
///
/// All backends implement this trait, so the planner, the clarification
/// controller and the search unit stay provider-agnostic.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Send one structured prompt and return the raw text plus any citations.
    async fn generate(&self, request: &GenerateRequest) -> Result<LLMResponse>;

    /// What this backend supports
    fn capabilities(&self) -> ProviderCapabilities;

    /// Human-readable backend name, used in logs
    fn provider_name(&self) -> &str;
}

/// Author of a content block in a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentRole {
    User,
    Model,
}

/// One element of a prompt: plain text or an inline binary attachment.
#[derive(Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    Attachment { mime_type: String, data: String },
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text(text.into())
    }

    pub fn attachment(file: &FileData) -> Self {
        Part::Attachment {
            mime_type: file.mime_type.clone(),
            data: file.data.clone(),
        }
    }
}

impl std::fmt::Debug for Part {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Part::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Part::Attachment { mime_type, data } => f
                .debug_struct("Attachment")
                .field("mime_type", mime_type)
                .field("data_len", &data.len())
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Content {
    pub role: ContentRole,
    pub parts: Vec<Part>,
}

impl Content {
    pub fn user(parts: Vec<Part>) -> Self {
        Self {
            role: ContentRole::User,
            parts,
        }
    }

    pub fn model(parts: Vec<Part>) -> Self {
        Self {
            role: ContentRole::Model,
            parts,
        }
    }

    /// Concatenated text parts, attachments skipped.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(text.as_str()),
                Part::Attachment { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// A single model invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    /// Model identifier resolved from the active mode
    pub model: String,
    /// Ordered turn history
    pub contents: Vec<Content>,
    pub system_instruction: Option<String>,
    /// `None` leaves the provider default in place
    pub temperature: Option<f32>,
    /// Ask the backend to ground the answer with web search
    pub enable_web_search: bool,
    /// Ask the backend to emit a JSON document
    pub json_response: bool,
}

impl GenerateRequest {
    pub fn new(model: impl Into<String>, contents: Vec<Content>) -> Self {
        Self {
            model: model.into(),
            contents,
            system_instruction: None,
            temperature: None,
            enable_web_search: false,
            json_response: false,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system_instruction = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_web_search(mut self, enabled: bool) -> Self {
        self.enable_web_search = enabled;
        self
    }

    pub fn with_json_response(mut self, enabled: bool) -> Self {
        self.json_response = enabled;
        self
    }

    /// All text of the last user turn; handy for logging and test doubles.
    pub fn last_user_text(&self) -> String {
        self.contents
            .iter()
            .rev()
            .find(|c| c.role == ContentRole::User)
            .map(Content::text)
            .unwrap_or_default()
    }
}

/// Response from an LLM generation request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LLMResponse {
    /// The text content of the response
    pub content: String,
    /// Grounding sources, empty on backends without citation support
    pub citations: Vec<Citation>,
    /// The reason generation stopped, when the backend reports one
    pub finish_reason: Option<String>,
}

impl LLMResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }
}

/// Provider enum for runtime selection
///
/// | Provider | Web search | Citations | Attachments |
/// |----------|------------|-----------|-------------|
/// | Gemini   | ✅ | ✅ | ✅ any inline type |
/// | OpenAI   | ❌ | ❌ | images only |
#[derive(Debug, Clone)]
pub enum Provider {
    /// Google Gemini REST API
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::Gemini {
    ///     api_key: "AIza...".to_string(),
    ///     api_base: "https://generativelanguage.googleapis.com/v1beta".to_string(),
    /// };
    /// ```
    Gemini { api_key: String, api_base: String },

    /// OpenAI API provider (including compatible APIs)
    OpenAI { api_key: String, api_base: String },
}

impl Provider {
    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn create_client(&self) -> Result<Box<dyn LLMClient>> {
        match self {
            Provider::Gemini { api_key, api_base } => Ok(Box::new(
                super::gemini::GeminiClient::new(api_key.clone(), api_base.clone())?,
            )),
            Provider::OpenAI { api_key, api_base } => Ok(Box::new(
                super::openai::OpenAIClient::new(api_key.clone(), api_base.clone())?,
            )),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::Gemini { .. } => "Gemini",
            Provider::OpenAI { .. } => "OpenAI",
        }
    }

    pub fn capabilities(&self) -> ProviderCapabilities {
        match self {
            Provider::Gemini { .. } => ProviderCapabilities::gemini(),
            Provider::OpenAI { .. } => ProviderCapabilities::openai_compatible(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_name() {
        let gemini = Provider::Gemini {
            api_key: "".to_string(),
            api_base: "".to_string(),
        };
        assert_eq!(gemini.name(), "Gemini");

        let openai = Provider::OpenAI {
            api_key: "".to_string(),
            api_base: "".to_string(),
        };
        assert_eq!(openai.name(), "OpenAI");
    }

    #[test]
    fn test_provider_capabilities() {
        let gemini = Provider::Gemini {
            api_key: "k".to_string(),
            api_base: "http://localhost".to_string(),
        };
        assert!(gemini.capabilities().supports_citations);

        let openai = Provider::OpenAI {
            api_key: "k".to_string(),
            api_base: "http://localhost".to_string(),
        };
        assert!(!openai.capabilities().supports_citations);
    }

    #[test]
    fn test_create_client_reports_provider() {
        let provider = Provider::OpenAI {
            api_key: "test".to_string(),
            api_base: "http://localhost:9999/v1".to_string(),
        };
        let client = provider.create_client().unwrap();
        assert_eq!(client.provider_name(), "OpenAI");
    }

    #[test]
    fn test_last_user_text() {
        let request = GenerateRequest::new(
            "m",
            vec![
                Content::user(vec![Part::text("first")]),
                Content::model(vec![Part::text("reply")]),
                Content::user(vec![Part::text("second"), Part::text("more")]),
            ],
        );
        assert_eq!(request.last_user_text(), "second\nmore");
    }

    #[test]
    fn test_attachment_debug_hides_payload() {
        let part = Part::Attachment {
            mime_type: "image/png".to_string(),
            data: "QUFBQUFB".to_string(),
        };
        let rendered = format!("{:?}", part);
        assert!(rendered.contains("data_len"));
        assert!(!rendered.contains("QUFBQUFB"));
    }
}
