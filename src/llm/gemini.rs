//! Google Gemini backend.
//!
//! Differences from the OpenAI-compatible backend:
//! - Auth via `?key=API_KEY` query parameter
//! - System instruction is a top-level `system_instruction` field
//! - Roles are `"user"` / `"model"`
//! - Web search is the `google_search` tool and its sources come back as
//!   `groundingMetadata.groundingChunks`

use crate::llm::capabilities::ProviderCapabilities;
use crate::llm::client::{Content, ContentRole, GenerateRequest, LLMClient, LLMResponse, Part};
use crate::types::{dedupe_citations, AppError, Citation, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GeminiClient {
    client: Client,
    api_key: String,
    api_base: String,
}

impl GeminiClient {
    pub fn new(api_key: String, api_base: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(180))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::LLM(format!("Failed to build HTTP client: {}", e)))?;

        let api_base = if api_base.trim().is_empty() {
            DEFAULT_GEMINI_API_BASE.to_string()
        } else {
            api_base.trim_end_matches('/').to_string()
        };

        Ok(Self {
            client,
            api_key,
            api_base,
        })
    }

    fn endpoint_url(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.api_base, model)
    }

    fn content_to_json(content: &Content) -> Value {
        let role = match content.role {
            ContentRole::User => "user",
            ContentRole::Model => "model",
        };
        let parts: Vec<Value> = content
            .parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => json!({ "text": text }),
                Part::Attachment { mime_type, data } => json!({
                    "inline_data": { "mime_type": mime_type, "data": data }
                }),
            })
            .collect();
        json!({ "role": role, "parts": parts })
    }

    pub(crate) fn build_request_body(request: &GenerateRequest) -> Value {
        let contents: Vec<Value> = request.contents.iter().map(Self::content_to_json).collect();
        let mut body = json!({ "contents": contents });

        if let Some(system) = &request.system_instruction {
            body["system_instruction"] = json!({ "parts": [{ "text": system }] });
        }

        let mut generation_config = serde_json::Map::new();
        if let Some(temperature) = request.temperature {
            generation_config.insert("temperature".to_string(), json!(temperature));
        }
        if request.json_response {
            generation_config.insert("responseMimeType".to_string(), json!("application/json"));
        }
        if !generation_config.is_empty() {
            body["generationConfig"] = Value::Object(generation_config);
        }

        if request.enable_web_search {
            body["tools"] = json!([{ "google_search": {} }]);
        }

        body
    }

    pub(crate) fn parse_response(body: &Value) -> Result<LLMResponse> {
        let candidate = body["candidates"]
            .as_array()
            .and_then(|c| c.first())
            .ok_or_else(|| AppError::LLM("Gemini response contained no candidates".to_string()))?;

        let content = candidate["content"]["parts"]
            .as_array()
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p["text"].as_str())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let citations = candidate["groundingMetadata"]["groundingChunks"]
            .as_array()
            .map(|chunks| {
                chunks
                    .iter()
                    .filter_map(|chunk| {
                        let uri = chunk["web"]["uri"].as_str()?;
                        let title = chunk["web"]["title"]
                            .as_str()
                            .filter(|t| !t.is_empty())
                            .unwrap_or(uri);
                        Some(Citation {
                            url: uri.to_string(),
                            title: title.to_string(),
                        })
                    })
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        let finish_reason = candidate["finishReason"].as_str().map(str::to_string);
        if content.is_empty() {
            warn!(finish_reason = ?finish_reason, "Gemini returned an empty candidate");
        }

        Ok(LLMResponse {
            content,
            citations: dedupe_citations(citations),
            finish_reason,
        })
    }

    fn map_http_error(status: reqwest::StatusCode, body_text: &str) -> AppError {
        match status.as_u16() {
            401 | 403 => AppError::LLM(format!(
                "Gemini rejected the API key (HTTP {}): {}",
                status, body_text
            )),
            429 => AppError::LLM(format!("Gemini rate limit exceeded: {}", body_text)),
            _ => AppError::LLM(format!("HTTP {} from Gemini API: {}", status, body_text)),
        }
    }
}

#[async_trait]
impl LLMClient for GeminiClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<LLMResponse> {
        let body = Self::build_request_body(request);
        debug!(
            model = %request.model,
            turns = request.contents.len(),
            web_search = request.enable_web_search,
            "Sending Gemini request"
        );

        let response = self
            .client
            .post(self.endpoint_url(&request.model))
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::LLM(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| AppError::LLM(format!("Failed to read Gemini response: {}", e)))?;

        if !status.is_success() {
            return Err(Self::map_http_error(status, &body_text));
        }

        let json: Value = serde_json::from_str(&body_text)
            .map_err(|e| AppError::LLM(format!("Invalid JSON from Gemini: {}", e)))?;
        Self::parse_response(&json)
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::gemini()
    }

    fn provider_name(&self) -> &str {
        "Gemini"
    }
}
