//! Clarification dialogue: turns a raw query into a refined research brief.
//!
//! The controller performs one model round-trip per call. A question is
//! appended to the transcript as a model turn and handed back to the caller,
//! who collects the human answer and calls again. A summary ends the phase.

use crate::llm::{Content, GenerateRequest, LLMClient, Part};
use crate::research::cancel::run_cancellable;
use crate::research::parser::parse_json_object;
use crate::types::{ClarificationOutcome, ClarificationTurn, FileData, Result, TurnRole};
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Brief used when the clarification model cannot produce a usable answer.
pub const CLARIFICATION_FAILED_SUMMARY: &str =
    "Clarification process failed. Proceeding with original query.";

const CLARIFICATION_TEMPERATURE: f32 = 0.5;

const CLARIFICATION_SYSTEM_PROMPT: &str = r#"**YOUR ONLY JOB IS TO PRODUCE A SINGLE, RAW JSON OBJECT.**
Do not write any other text. Your entire response must start with `{` and end with `}`. Do not wrap it in markdown fences.

Always reply in the same language as the user's input.

Your role is to ask clarifying questions that refine a user's research request. Use web search to inform your questions.

**RULES:**
1. **ASK, DON'T ANSWER:** Your goal is to ask questions, not to provide answers. Use search results to formulate better questions.
2. **VERIFY:** Always search. Your internal knowledge may be outdated. Do not argue with the user about facts you can verify.
3. **ONE QUESTION AT A TIME:** Ask exactly one targeted question per turn.
4. **FINISH:** After 2-4 questions you MUST stop asking and provide a summary.

**JSON FORMATS (CHOOSE ONE):**
1. To ask a question: { "type": "question", "content": "Your single, focused question." }
2. To give the final summary: { "type": "summary", "content": "One paragraph describing the refined research goal." }"#;

#[derive(Debug, Deserialize)]
struct RawClarification {
    #[serde(rename = "type")]
    kind: Option<String>,
    content: Option<String>,
}

pub struct ClarificationController {
    client: Arc<dyn LLMClient>,
}

impl ClarificationController {
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self { client }
    }

    /// First user turn of a dialogue, noting the attachment by name.
    pub fn initial_turn(query: &str, file: Option<&FileData>) -> ClarificationTurn {
        match file {
            Some(file) => ClarificationTurn::user(format!("{}\n\n[File attached: {}]", query, file.name)),
            None => ClarificationTurn::user(query),
        }
    }

    /// The attachment bytes travel only with transcript index 0.
    pub fn build_request(
        model: &str,
        transcript: &[ClarificationTurn],
        file: Option<&FileData>,
    ) -> GenerateRequest {
        let contents = transcript
            .iter()
            .enumerate()
            .map(|(index, turn)| {
                let mut parts = vec![Part::text(turn.content.clone())];
                match turn.role {
                    TurnRole::User => {
                        if let (0, Some(file)) = (index, file) {
                            parts.push(Part::attachment(file));
                        }
                        Content::user(parts)
                    }
                    TurnRole::Model => Content::model(parts),
                }
            })
            .collect();

        GenerateRequest::new(model, contents)
            .with_system(CLARIFICATION_SYSTEM_PROMPT)
            .with_temperature(CLARIFICATION_TEMPERATURE)
            .with_web_search(true)
    }

    /// Map raw model output onto an outcome. Anything unusable becomes the
    /// fallback summary.
    pub fn interpret(raw: &str) -> ClarificationOutcome {
        let parsed = parse_json_object::<RawClarification>(raw);
        let (kind, content) = match parsed {
            Some(RawClarification {
                kind: Some(kind),
                content: Some(content),
            }) if !content.trim().is_empty() => (kind, content),
            _ => {
                warn!(raw_len = raw.len(), "Failed to parse clarification response");
                return ClarificationOutcome::Summary(CLARIFICATION_FAILED_SUMMARY.to_string());
            }
        };

        match kind.as_str() {
            "question" => ClarificationOutcome::Question(content),
            "summary" => ClarificationOutcome::Summary(content),
            other => {
                warn!(kind = %other, "Unknown clarification response type");
                ClarificationOutcome::Summary(CLARIFICATION_FAILED_SUMMARY.to_string())
            }
        }
    }

    /// Run one round-trip over `transcript`.
    ///
    /// A question is appended to `transcript` as a model turn. Upstream
    /// failures are returned to the caller.
    pub async fn step(
        &self,
        transcript: &mut Vec<ClarificationTurn>,
        model: &str,
        file: Option<&FileData>,
        cancel: &CancellationToken,
    ) -> Result<ClarificationOutcome> {
        let request = Self::build_request(model, transcript, file);
        debug!(model = %model, turns = transcript.len(), "Requesting clarification");

        let response = run_cancellable(cancel, self.client.generate(&request)).await?;
        let outcome = Self::interpret(&response.content);

        match &outcome {
            ClarificationOutcome::Question(question) => {
                transcript.push(ClarificationTurn::model(question.clone()));
                info!(round = transcript.len() / 2, "Clarification question received");
            }
            ClarificationOutcome::Summary(_) => {
                info!(turns = transcript.len(), "Clarification finished with summary");
            }
        }
        Ok(outcome)
    }
}
