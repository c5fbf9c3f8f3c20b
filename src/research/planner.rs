//! Deliberative Planner
//!
//! Two personas, Alpha (Strategist) and Beta (Tactician), take turns reasoning
//! about the next research step. Each planning session starts fresh with Alpha
//! and ends with either a batch of search queries or a decision to finish.
//!
//! Rules enforced in code rather than left to the model:
//! - the first turn of a session can only continue the debate
//! - `finish` is rejected until the floor of completed search cycles is met
//! - a malformed model response ends the whole research run

use crate::llm::{Content, GenerateRequest, LLMClient, Part};
use crate::research::cancel::{ensure_active, pause, run_cancellable};
use crate::research::events::UpdateLog;
use crate::research::parser::parse_json_object;
use crate::types::{AgentPersona, FileData, ResearchUpdate, Result, UpdateKind};
use crate::utils::toml_config::ResearchConfig;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

const PLANNER_TEMPERATURE: f32 = 0.7;
const PLANNER_SYSTEM_PROMPT: &str = "You are an AI research planner.";

/// Terminal result of one planning session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannerDecision {
    Search(Vec<String>),
    Finish(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlannerAction {
    ContinueDebate,
    Search,
    Finish,
    Unknown,
}

impl PlannerAction {
    fn parse(action: &str) -> Self {
        match action.trim() {
            "continue_debate" => PlannerAction::ContinueDebate,
            "search" => PlannerAction::Search,
            "finish" => PlannerAction::Finish,
            _ => PlannerAction::Unknown,
        }
    }
}

/// One model turn as it arrives on the wire.
///
/// Only `thought` and `action` decide whether a turn is well formed. A
/// wrongly typed `queries` or `finish_reason` reads as absent.
#[derive(Debug, Deserialize)]
struct PlannerTurn {
    thought: Option<String>,
    action: Option<String>,
    #[serde(default, deserialize_with = "lenient_queries")]
    queries: Option<Vec<String>>,
    #[serde(default, deserialize_with = "lenient_string")]
    finish_reason: Option<String>,
}

/// Keep the string entries of a `queries` array; anything else is `None`.
fn lenient_queries<'de, D>(deserializer: D) -> std::result::Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(Value::as_array)
        .map(|arr| arr.iter().filter_map(|v| v.as_str()).map(str::to_string).collect()))
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Value>::deserialize(deserializer)?
        .as_ref()
        .and_then(Value::as_str)
        .map(str::to_string))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DebateEntry {
    pub persona: AgentPersona,
    pub thought: String,
}

/// Search and learning context derived from the update log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HistoryDigest {
    /// Content of each `search` update, list entries joined by `, `,
    /// updates joined by `; `
    pub searches: String,
    /// `read` updates joined by `\n---\n`
    pub learnings: String,
    /// Number of `search` updates
    pub search_cycles: usize,
}

impl HistoryDigest {
    pub fn from_updates(updates: &[ResearchUpdate]) -> Self {
        let searches: Vec<String> = updates
            .iter()
            .filter(|u| u.kind == UpdateKind::Search)
            .map(|u| u.content.joined(", "))
            .collect();
        let learnings: Vec<String> = updates
            .iter()
            .filter(|u| u.kind == UpdateKind::Read)
            .map(|u| u.content.joined("\n"))
            .collect();

        Self {
            search_cycles: searches.len(),
            searches: searches.join("; "),
            learnings: learnings.join("\n---\n"),
        }
    }
}

/// Inputs that stay fixed for a whole research run.
#[derive(Debug, Clone, Copy)]
pub struct PlannerContext<'a> {
    pub query: &'a str,
    pub clarified_context: &'a str,
    pub file: Option<&'a FileData>,
    pub model: &'a str,
}

pub struct DeliberativePlanner {
    client: Arc<dyn LLMClient>,
    min_search_cycles: usize,
    target_max_search_cycles: usize,
    pacing_delay: Duration,
}

impl DeliberativePlanner {
    pub fn new(client: Arc<dyn LLMClient>, config: &ResearchConfig) -> Self {
        Self {
            client,
            min_search_cycles: config.min_search_cycles,
            target_max_search_cycles: config.target_max_search_cycles,
            pacing_delay: config.pacing_delay(),
        }
    }

    /// Run one planning session against the current state of `log`.
    pub async fn plan(
        &self,
        ctx: &PlannerContext<'_>,
        log: &UpdateLog,
        cancel: &CancellationToken,
    ) -> Result<PlannerDecision> {
        let digest = HistoryDigest::from_updates(&log.snapshot());
        let mut transcript: Vec<DebateEntry> = Vec::new();
        let mut persona = AgentPersona::Alpha;

        info!(
            search_cycles = digest.search_cycles,
            min_search_cycles = self.min_search_cycles,
            "Starting planning session"
        );

        loop {
            ensure_active(cancel)?;
            let is_first_turn = transcript.is_empty();

            let request = self.build_request(ctx, &digest, &transcript, persona);
            let response = run_cancellable(cancel, self.client.generate(&request)).await?;

            let turn = parse_json_object::<PlannerTurn>(&response.content);
            let (thought, action, turn) = match turn {
                Some(turn) => match (turn.thought.clone(), turn.action.clone()) {
                    (Some(thought), Some(action))
                        if !thought.trim().is_empty() && !action.trim().is_empty() =>
                    {
                        (thought, PlannerAction::parse(&action), turn)
                    }
                    _ => return Ok(Self::abandon(log, persona)),
                },
                None => return Ok(Self::abandon(log, persona)),
            };

            log.thought(Some(persona), thought.clone());
            transcript.push(DebateEntry {
                persona,
                thought: thought.clone(),
            });
            debug!(persona = %persona, action = ?action, "Planner turn");

            pause(cancel, self.pacing_delay).await?;

            if action == PlannerAction::Finish && digest.search_cycles < self.min_search_cycles {
                warn!(
                    persona = %persona,
                    search_cycles = digest.search_cycles,
                    min_search_cycles = self.min_search_cycles,
                    "Finish rejected before minimum search cycles"
                );
                let violation = format!(
                    "Rule violation: Cannot finish before {} search cycles. Continuing debate. My previous thought was: {}",
                    self.min_search_cycles, thought
                );
                log.thought(Some(persona), violation.clone());
                transcript.push(DebateEntry {
                    persona,
                    thought: violation,
                });
                persona = persona.other();
                continue;
            }

            if is_first_turn && action != PlannerAction::ContinueDebate {
                info!(persona = %persona, action = ?action, "First debate turn coerced to continue_debate");
                persona = persona.other();
                continue;
            }

            match action {
                PlannerAction::Finish => {
                    let reason = turn
                        .finish_reason
                        .filter(|r| !r.trim().is_empty())
                        .unwrap_or_else(|| format!("{} decided to finish.", persona));
                    info!(persona = %persona, reason = %reason, "Planner decided to finish");
                    return Ok(PlannerDecision::Finish(reason));
                }
                PlannerAction::Search => {
                    let queries: Vec<String> = turn
                        .queries
                        .unwrap_or_default()
                        .into_iter()
                        .map(|q| q.trim().to_string())
                        .filter(|q| !q.is_empty())
                        .collect();
                    if !queries.is_empty() {
                        info!(persona = %persona, queries = queries.len(), "Planner chose to search");
                        return Ok(PlannerDecision::Search(queries));
                    }
                }
                PlannerAction::ContinueDebate | PlannerAction::Unknown => {}
            }

            persona = persona.other();
        }
    }

    fn abandon(log: &UpdateLog, persona: AgentPersona) -> PlannerDecision {
        warn!(persona = %persona, "Planner returned a malformed response, finishing research");
        log.thought(
            None,
            format!("Agent {} failed to respond. Finishing research.", persona),
        );
        PlannerDecision::Finish(format!(
            "Agent {} failed to generate a valid action.",
            persona
        ))
    }

    fn build_request(
        &self,
        ctx: &PlannerContext<'_>,
        digest: &HistoryDigest,
        transcript: &[DebateEntry],
        persona: AgentPersona,
    ) -> GenerateRequest {
        let mut parts = vec![Part::text(self.build_prompt(ctx, digest, transcript, persona))];
        if let Some(file) = ctx.file {
            parts.push(Part::attachment(file));
        }

        GenerateRequest::new(ctx.model, vec![Content::user(parts)])
            .with_system(PLANNER_SYSTEM_PROMPT)
            .with_temperature(PLANNER_TEMPERATURE)
            .with_json_response(true)
    }

    pub(crate) fn build_prompt(
        &self,
        ctx: &PlannerContext<'_>,
        digest: &HistoryDigest,
        transcript: &[DebateEntry],
        persona: AgentPersona,
    ) -> String {
        let conversation = if transcript.is_empty() {
            "You are Agent Alpha, starting the conversation. Propose the initial strategy.".to_string()
        } else {
            transcript
                .iter()
                .map(|entry| format!("{}: {}", entry.persona, entry.thought))
                .collect::<Vec<_>>()
                .join("\n")
        };

        let searches = if digest.searches.is_empty() {
            "None yet."
        } else {
            digest.searches.as_str()
        };
        let learnings = if digest.learnings.is_empty() {
            "No learnings yet."
        } else {
            digest.learnings.as_str()
        };

        let first_turn_rule = if transcript.is_empty() {
            "**Critical Rule for Agent Alpha (First Turn):** As this is the first turn of the debate, propose an initial strategy. Your action MUST be 'continue_debate'.\n\n"
        } else {
            ""
        };

        format!(
            r#"You are Agent {persona} ({title}).
Engage in a critical debate to decide the next research step. The goal is to formulate novel and effective search queries through collaboration.

Always reply in the same language as the user's input.

**Overall Research Context:**
* User's Original Query: "{query}"
* Refined Research Goal (from user conversation): "{context}"
* Provided File: {file}
* Total search cycles so far: {cycles}.
* Previously Executed Searches: <searches>{searches}</searches>
* Synthesized Learnings from Past Searches: <learnings>{learnings}</learnings>

**Current Planning Conversation:**
{conversation}

**Your Task & Rules:**
1. **Analyze All Context:** Critically analyze the refined goal, the learnings from past searches, the provided file content, and the ongoing debate.
2. **Avoid Redundancy:** Do NOT propose search queries that are identical or semantically very similar to queries already in <searches>. Explore new avenues, deepen understanding, or challenge existing findings.
3. **Provide Your 'thought':** Articulate your reasoning, addressing the other agent if they have spoken.
4. **Choose ONE Action:**
   * 'continue_debate': Continue the discussion and refine the strategy. Let the other agent respond.
   * 'search': When you are confident in the next 1-4 queries. This ends the current planning session.
   * 'finish': ONLY if you are certain the research is comprehensive enough. You MUST provide a clear 'finish_reason'.
5. **Research Cycle Rules:**
   * The 'finish' action is disabled until at least {min} search cycles are complete. (Current cycles: {cycles}).
   * Aim to conclude the research between {min} and {max} cycles. Do not extend research unnecessarily.

{first_turn_rule}**RESPONSE FORMAT:**
Your entire output MUST be a single JSON object. Example: {{ "thought": "...", "action": "search", "queries": ["query1", "query2"] }}"#,
            persona = persona,
            title = persona.title(),
            query = ctx.query,
            context = ctx.clarified_context,
            file = ctx.file.map(|f| f.name.as_str()).unwrap_or("None"),
            cycles = digest.search_cycles,
            searches = searches,
            learnings = learnings,
            conversation = conversation,
            min = self.min_search_cycles,
            max = self.target_max_search_cycles,
            first_turn_rule = first_turn_rule,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UpdateContent;

    fn update(id: u64, kind: UpdateKind, content: UpdateContent) -> ResearchUpdate {
        ResearchUpdate {
            id,
            kind,
            persona: None,
            content,
        }
    }

    #[test]
    fn test_history_digest() {
        let updates = vec![
            update(0, UpdateKind::Thought, "thinking".into()),
            update(1, UpdateKind::Search, UpdateContent::List(vec!["a".into(), "b".into()])),
            update(2, UpdateKind::Read, "learned a".into()),
            update(3, UpdateKind::Search, "c".into()),
            update(4, UpdateKind::Read, "learned c".into()),
        ];

        let digest = HistoryDigest::from_updates(&updates);
        assert_eq!(digest.search_cycles, 2);
        assert_eq!(digest.searches, "a, b; c");
        assert_eq!(digest.learnings, "learned a\n---\nlearned c");
    }

    #[test]
    fn test_wrongly_typed_optional_fields_read_as_absent() {
        let turn: PlannerTurn = parse_json_object(
            r#"{"thought":"t","action":"search","queries":"one query","finish_reason":0}"#,
        )
        .unwrap();
        assert_eq!(turn.thought.as_deref(), Some("t"));
        assert_eq!(turn.queries, None);
        assert_eq!(turn.finish_reason, None);

        let turn: PlannerTurn =
            parse_json_object(r#"{"thought":"t","action":"search","queries":["a",3,null,"b"]}"#)
                .unwrap();
        assert_eq!(turn.queries, Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_action_parse() {
        assert_eq!(PlannerAction::parse("search"), PlannerAction::Search);
        assert_eq!(PlannerAction::parse(" finish "), PlannerAction::Finish);
        assert_eq!(PlannerAction::parse("continue_debate"), PlannerAction::ContinueDebate);
        assert_eq!(PlannerAction::parse("dance"), PlannerAction::Unknown);
    }

    #[test]
    fn test_prompt_contents() {
        struct Never;
        #[async_trait::async_trait]
        impl LLMClient for Never {
            async fn generate(&self, _: &GenerateRequest) -> Result<crate::llm::LLMResponse> {
                unreachable!()
            }
            fn capabilities(&self) -> crate::llm::ProviderCapabilities {
                Default::default()
            }
            fn provider_name(&self) -> &str {
                "never"
            }
        }

        let planner = DeliberativePlanner::new(Arc::new(Never), &ResearchConfig::default());
        let file = FileData::new("data.csv", "text/csv", "YQ==");
        let ctx = PlannerContext {
            query: "solid state batteries",
            clarified_context: "commercial timelines",
            file: Some(&file),
            model: "m",
        };

        let first = planner.build_prompt(&ctx, &HistoryDigest::default(), &[], AgentPersona::Alpha);
        assert!(first.starts_with("You are Agent Alpha (Strategist)."));
        assert!(first.contains("<searches>None yet.</searches>"));
        assert!(first.contains("<learnings>No learnings yet.</learnings>"));
        assert!(first.contains("Provided File: data.csv"));
        assert!(first.contains("Your action MUST be 'continue_debate'"));
        assert!(first.contains("between 7 and 17 cycles"));

        let transcript = vec![DebateEntry {
            persona: AgentPersona::Alpha,
            thought: "start broad".into(),
        }];
        let second =
            planner.build_prompt(&ctx, &HistoryDigest::default(), &transcript, AgentPersona::Beta);
        assert!(second.starts_with("You are Agent Beta (Tactician)."));
        assert!(second.contains("Alpha: start broad"));
        assert!(!second.contains("First Turn"));
    }
}
