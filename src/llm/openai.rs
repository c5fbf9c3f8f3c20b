use crate::llm::capabilities::ProviderCapabilities;
use crate::llm::client::{Content, ContentRole, GenerateRequest, LLMClient, LLMResponse, Part};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
///
/// This backend has no grounding mechanism: `enable_web_search` and
/// `json_response` are ignored and responses never carry citations.
pub struct OpenAIClient {
    client: Client,
    api_key: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

impl OpenAIClient {
    pub fn new(api_key: String, api_base: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(180))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AppError::LLM(format!("Failed to build HTTP client: {}", e)))?;

        let api_base = if api_base.trim().is_empty() {
            DEFAULT_OPENAI_API_BASE.to_string()
        } else {
            api_base.trim_end_matches('/').to_string()
        };

        Ok(Self {
            client,
            api_key,
            api_base,
        })
    }

    fn message_to_json(content: &Content) -> Value {
        let role = match content.role {
            ContentRole::User => "user",
            ContentRole::Model => "assistant",
        };

        let has_attachment = content
            .parts
            .iter()
            .any(|p| matches!(p, Part::Attachment { .. }));

        if !has_attachment {
            return json!({ "role": role, "content": content.text() });
        }

        let parts: Vec<Value> = content
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::Text(text) => Some(json!({ "type": "text", "text": text })),
                Part::Attachment { mime_type, data } if mime_type.starts_with("image/") => {
                    Some(json!({
                        "type": "image_url",
                        "image_url": { "url": format!("data:{};base64,{}", mime_type, data) }
                    }))
                }
                Part::Attachment { mime_type, .. } => {
                    warn!(mime_type = %mime_type, "Dropping attachment unsupported by OpenAI-compatible backend");
                    None
                }
            })
            .collect();
        json!({ "role": role, "content": parts })
    }

    pub(crate) fn build_request_body(request: &GenerateRequest) -> Value {
        let mut messages = Vec::with_capacity(request.contents.len() + 1);
        if let Some(system) = &request.system_instruction {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.extend(request.contents.iter().map(Self::message_to_json));

        let mut body = json!({
            "model": request.model,
            "messages": messages,
        });
        if let Some(temperature) = request.temperature {
            body["temperature"] = json!(temperature);
        }
        body
    }
}

#[async_trait]
impl LLMClient for OpenAIClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<LLMResponse> {
        for feature in self.capabilities().ignored_features(request) {
            debug!(feature, model = %request.model, "Ignoring option unsupported by OpenAI-compatible backend");
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&Self::build_request_body(request))
            .send()
            .await
            .map_err(|e| AppError::LLM(format!("OpenAI API error: {}", e)))?;

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| AppError::LLM(format!("Failed to read OpenAI response: {}", e)))?;

        if !status.is_success() {
            return Err(AppError::LLM(format!(
                "HTTP {} from OpenAI API: {}",
                status, body_text
            )));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body_text)
            .map_err(|e| AppError::LLM(format!("Invalid JSON from OpenAI: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| AppError::LLM("No response from OpenAI".to_string()))?;

        Ok(LLMResponse {
            content: choice.message.content.unwrap_or_default(),
            citations: Vec::new(),
            finish_reason: choice.finish_reason,
        })
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities::openai_compatible()
    }

    fn provider_name(&self) -> &str {
        "OpenAI"
    }
}
