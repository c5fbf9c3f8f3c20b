//! Mock implementations for testing.
//!
//! [`MockLLMClient`] routes each request by model name. Tests give every
//! research role a distinct model (see [`test_config`]) and then script the
//! replies each role should see.

#![allow(dead_code)]

use async_trait::async_trait;
use duet::llm::{GenerateRequest, LLMClient, LLMResponse, ProviderCapabilities};
use duet::types::{AppError, Citation, Result};
use duet::utils::toml_config::{DuetConfig, RoleModels};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

pub const PLANNER: &str = "test-planner";
pub const SEARCHER: &str = "test-searcher";
pub const SYNTHESIZER: &str = "test-synthesizer";
pub const CLARIFIER: &str = "test-clarifier";

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum Reply {
    Text(String),
    Grounded {
        text: String,
        citations: Vec<Citation>,
    },
    Fail(String),
    /// Never resolves; only cancellation gets the caller out.
    Hang,
}

type Handler = Arc<dyn Fn(&GenerateRequest) -> Reply + Send + Sync>;

/// Scriptable LLM client.
///
/// Queued replies for a model are consumed first; once a queue is empty the
/// model's handler (if any) answers. Anything else is an error.
pub struct MockLLMClient {
    queues: Mutex<HashMap<String, VecDeque<Reply>>>,
    handlers: Mutex<HashMap<String, Handler>>,
    requests: Mutex<Vec<GenerateRequest>>,
    capabilities: ProviderCapabilities,
    delay: Option<Duration>,
}

impl Default for MockLLMClient {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLLMClient {
    pub fn new() -> Self {
        Self {
            queues: Mutex::new(HashMap::new()),
            handlers: Mutex::new(HashMap::new()),
            requests: Mutex::new(Vec::new()),
            capabilities: ProviderCapabilities::gemini(),
            delay: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: ProviderCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Sleep before every reply.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn push(&self, model: &str, reply: Reply) -> &Self {
        self.queues
            .lock()
            .entry(model.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub fn push_text(&self, model: &str, text: impl Into<String>) -> &Self {
        self.push(model, Reply::Text(text.into()))
    }

    pub fn handle<F>(&self, model: &str, handler: F) -> &Self
    where
        F: Fn(&GenerateRequest) -> Reply + Send + Sync + 'static,
    {
        self.handlers
            .lock()
            .insert(model.to_string(), Arc::new(handler));
        self
    }

    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests.lock().clone()
    }

    pub fn requests_for(&self, model: &str) -> Vec<GenerateRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.model == model)
            .cloned()
            .collect()
    }

    fn next_reply(&self, request: &GenerateRequest) -> Reply {
        if let Some(reply) = self
            .queues
            .lock()
            .get_mut(&request.model)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }
        let handler = self.handlers.lock().get(&request.model).cloned();
        match handler {
            Some(handler) => handler(request),
            None => Reply::Fail(format!("no scripted reply for model {}", request.model)),
        }
    }
}

#[async_trait]
impl LLMClient for MockLLMClient {
    async fn generate(&self, request: &GenerateRequest) -> Result<LLMResponse> {
        self.requests.lock().push(request.clone());
        let reply = self.next_reply(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match reply {
            Reply::Text(text) => Ok(LLMResponse::text(text)),
            Reply::Grounded { text, citations } => Ok(LLMResponse {
                content: text,
                citations,
                finish_reason: Some("STOP".to_string()),
            }),
            Reply::Fail(message) => Err(AppError::LLM(message)),
            Reply::Hang => std::future::pending().await,
        }
    }

    fn capabilities(&self) -> ProviderCapabilities {
        self.capabilities
    }

    fn provider_name(&self) -> &str {
        "mock"
    }
}

// ============= Fixtures =============

/// Config with a distinct model per role and no pacing delay.
pub fn test_config() -> DuetConfig {
    let mut config = DuetConfig::default();
    config.research.pacing_delay_ms = 0;
    config.research.retry_base_delay_ms = 1;
    config.custom_models = test_models();
    config
}

pub fn test_models() -> RoleModels {
    RoleModels {
        planner: Some(PLANNER.to_string()),
        searcher: Some(SEARCHER.to_string()),
        synthesizer: Some(SYNTHESIZER.to_string()),
        clarification: Some(CLARIFIER.to_string()),
    }
}

pub fn citation(url: &str, title: &str) -> Citation {
    Citation {
        url: url.to_string(),
        title: title.to_string(),
    }
}

// ============= Planner turns =============

pub fn debate(thought: &str) -> String {
    json!({ "thought": thought, "action": "continue_debate" }).to_string()
}

pub fn search(thought: &str, queries: &[&str]) -> String {
    json!({ "thought": thought, "action": "search", "queries": queries }).to_string()
}

pub fn finish(thought: &str, reason: &str) -> String {
    json!({ "thought": thought, "action": "finish", "finish_reason": reason }).to_string()
}

// ============= Clarification turns =============

pub fn question(content: &str) -> String {
    json!({ "type": "question", "content": content }).to_string()
}

pub fn summary(content: &str) -> String {
    json!({ "type": "summary", "content": content }).to_string()
}

/// The query a search request was built for.
pub fn search_query(request: &GenerateRequest) -> String {
    let text = request.last_user_text();
    let marker = "for the query: \"";
    text.find(marker)
        .map(|start| {
            let rest = &text[start + marker.len()..];
            rest.rsplit_once('"').map_or(rest, |(q, _)| q).to_string()
        })
        .unwrap_or_default()
}
