//! Search Execution Unit: one grounded model call per query.

use crate::llm::{Content, GenerateRequest, LLMClient, Part};
use crate::research::cancel::{pause, run_cancellable};
use crate::types::{dedupe_citations, Citation, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

const SEARCH_SYSTEM_PROMPT: &str = "You are an AI search summarizer.";

/// Summary of one executed query, tagged with the query it answers.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// `Summary for "<query>": <model text>`
    pub text: String,
    /// Unique by url, first occurrence kept
    pub citations: Vec<Citation>,
}

pub struct SearchExecutor {
    client: Arc<dyn LLMClient>,
    retries: u32,
    retry_base_delay: Duration,
}

impl SearchExecutor {
    /// Executor without retries: a failed call is returned as-is.
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self {
            client,
            retries: 0,
            retry_base_delay: Duration::from_millis(500),
        }
    }

    /// Retry failed calls up to `retries` extra times, doubling the delay
    /// from `base_delay` after each failure.
    pub fn with_retry(mut self, retries: u32, base_delay: Duration) -> Self {
        self.retries = retries;
        self.retry_base_delay = base_delay;
        self
    }

    /// Whether the backend grounds summaries with a live web search.
    pub fn is_grounded(&self) -> bool {
        self.client.capabilities().supports_web_search
    }

    fn retry_delay(&self, attempt: u32) -> Duration {
        self.retry_base_delay
            .checked_mul(2u32.saturating_pow(attempt.min(5)))
            .unwrap_or(Duration::MAX)
    }

    pub fn build_request(query: &str, model: &str) -> GenerateRequest {
        let prompt = format!(
            "Always reply in the same language as the user's input.\nConcisely summarize key information for the query: \"{}\"",
            query
        );
        GenerateRequest::new(model, vec![Content::user(vec![Part::text(prompt)])])
            .with_system(SEARCH_SYSTEM_PROMPT)
            .with_web_search(true)
    }

    pub async fn execute(
        &self,
        query: &str,
        model: &str,
        cancel: &CancellationToken,
    ) -> Result<SearchResult> {
        let request = Self::build_request(query, model);
        let mut attempt = 0u32;

        let response = loop {
            match run_cancellable(cancel, self.client.generate(&request)).await {
                Ok(response) => break response,
                Err(e) if e.is_cancellation() || attempt >= self.retries => return Err(e),
                Err(e) => {
                    let delay = self.retry_delay(attempt);
                    attempt += 1;
                    warn!(
                        query = %query,
                        attempt,
                        max_retries = self.retries,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Search call failed, retrying"
                    );
                    pause(cancel, delay).await?;
                }
            }
        };

        let citations = if self.client.capabilities().supports_citations {
            dedupe_citations(response.citations)
        } else {
            Vec::new()
        };
        debug!(query = %query, citations = citations.len(), "Search completed");

        Ok(SearchResult {
            text: format!("Summary for \"{}\": {}", query, response.content),
            citations,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_enables_web_search() {
        let request = SearchExecutor::build_request("rust borrow checker", "m");
        assert!(request.enable_web_search);
        assert!(request
            .last_user_text()
            .ends_with("Concisely summarize key information for the query: \"rust borrow checker\""));
        assert!(request.temperature.is_none());
    }

    #[test]
    fn test_retry_delay_doubles_and_saturates() {
        let client: Arc<dyn LLMClient> =
            Arc::new(crate::llm::openai::OpenAIClient::new("k".into(), String::new()).unwrap());
        let executor = SearchExecutor::new(Arc::clone(&client)).with_retry(3, Duration::from_millis(100));
        assert_eq!(executor.retry_delay(0), Duration::from_millis(100));
        assert_eq!(executor.retry_delay(2), Duration::from_millis(400));
        assert_eq!(executor.retry_delay(9), Duration::from_millis(3200));

        let huge = SearchExecutor::new(client).with_retry(3, Duration::from_millis(u64::MAX));
        assert_eq!(huge.retry_delay(4), Duration::MAX);
        assert!(!huge.is_grounded());
    }
}
