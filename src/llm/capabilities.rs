//! Backend capability flags
//!
//! The two supported backends differ in what they return: Gemini grounds
//! answers with Google Search and reports the sources it used, an
//! OpenAI-compatible endpoint returns plain text. The difference is a property
//! of the upstream service, so it is surfaced as data instead of being
//! papered over at call sites.

use crate::llm::client::GenerateRequest;
use serde::{Deserialize, Serialize};

/// Capabilities that a backend may support.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderCapabilities {
    /// Whether responses carry grounding citations
    #[serde(default)]
    pub supports_citations: bool,

    /// Whether the backend can run a web search while answering
    #[serde(default)]
    pub supports_web_search: bool,

    /// Whether inline binary attachments are accepted
    #[serde(default)]
    pub supports_attachments: bool,

    /// Whether attachments other than images are accepted
    #[serde(default)]
    pub supports_document_attachments: bool,

    /// Whether the backend can be forced into JSON output
    #[serde(default)]
    pub supports_json_mode: bool,
}

impl ProviderCapabilities {
    pub fn gemini() -> Self {
        Self {
            supports_citations: true,
            supports_web_search: true,
            supports_attachments: true,
            supports_document_attachments: true,
            supports_json_mode: true,
        }
    }

    pub fn openai_compatible() -> Self {
        Self {
            supports_citations: false,
            supports_web_search: false,
            supports_attachments: true,
            supports_document_attachments: false,
            supports_json_mode: false,
        }
    }

    /// Whether an attachment of `mime_type` can be forwarded as-is.
    pub fn accepts_attachment(&self, mime_type: &str) -> bool {
        if !self.supports_attachments {
            return false;
        }
        self.supports_document_attachments || mime_type.starts_with("image/")
    }

    /// Request options this backend will not honor.
    pub fn ignored_features(&self, request: &GenerateRequest) -> Vec<&'static str> {
        let mut ignored = Vec::new();
        if request.enable_web_search && !self.supports_web_search {
            ignored.push("web_search");
        }
        if request.json_response && !self.supports_json_mode {
            ignored.push("json_mode");
        }
        ignored
    }
}
