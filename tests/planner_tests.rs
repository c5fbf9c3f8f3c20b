//! Tests for the two-persona deliberative planner.

mod common;

use common::mocks::*;
use duet::research::events::UpdateLog;
use duet::research::planner::{DeliberativePlanner, PlannerContext, PlannerDecision};
use duet::types::{AgentPersona, AppError, ResearchUpdate, UpdateKind};
use duet::utils::toml_config::ResearchConfig;
use rstest::rstest;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn research_config() -> ResearchConfig {
    test_config().research
}

fn context() -> PlannerContext<'static> {
    PlannerContext {
        query: "solid-state batteries",
        clarified_context: "Commercial readiness of solid-state batteries for EVs",
        file: None,
        model: PLANNER,
    }
}

fn log_with_cycles(cycles: usize) -> UpdateLog {
    let log = UpdateLog::new();
    for i in 0..cycles {
        log.search(format!("earlier query {}", i));
        log.read(format!("Summary for \"earlier query {}\": ...", i));
    }
    log
}

fn thoughts_after(updates: &[ResearchUpdate], first_id: u64) -> Vec<(Option<AgentPersona>, String)> {
    updates
        .iter()
        .filter(|u| u.id >= first_id && u.kind == UpdateKind::Thought)
        .map(|u| (u.persona, u.content.joined("")))
        .collect()
}

async fn plan(client: &Arc<MockLLMClient>, log: &UpdateLog) -> duet::Result<PlannerDecision> {
    let planner = DeliberativePlanner::new(client.clone(), &research_config());
    planner.plan(&context(), log, &CancellationToken::new()).await
}

#[tokio::test]
async fn test_malformed_first_response_finishes_research() {
    let client = Arc::new(MockLLMClient::new());
    client.push_text(PLANNER, "I think we should search for batteries.");
    let log = UpdateLog::new();

    let decision = plan(&client, &log).await.unwrap();

    assert_eq!(
        decision,
        PlannerDecision::Finish("Agent Alpha failed to generate a valid action.".into())
    );
    let updates = log.snapshot();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].persona, None);
    assert_eq!(
        updates[0].content.joined(""),
        "Agent Alpha failed to respond. Finishing research."
    );
}

#[tokio::test]
async fn test_missing_action_mid_debate_blames_current_persona() {
    let client = Arc::new(MockLLMClient::new());
    client
        .push_text(PLANNER, debate("Start broad."))
        .push_text(PLANNER, r#"{"thought": "Hmm"}"#);
    let log = UpdateLog::new();

    let decision = plan(&client, &log).await.unwrap();

    assert_eq!(
        decision,
        PlannerDecision::Finish("Agent Beta failed to generate a valid action.".into())
    );
}

#[rstest]
#[case(0)]
#[case(1)]
#[case(2)]
#[case(3)]
#[case(4)]
#[case(5)]
#[case(6)]
#[tokio::test]
async fn test_finish_rejected_below_floor(#[case] cycles: usize) {
    let client = Arc::new(MockLLMClient::new());
    client
        .push_text(PLANNER, debate("Map the landscape first."))
        .push_text(PLANNER, finish("We know enough.", "done"))
        .push_text(PLANNER, search("Then dig deeper.", &["sulfide electrolyte yields"]));
    let log = log_with_cycles(cycles);
    let first_id = log.len() as u64;

    let decision = plan(&client, &log).await.unwrap();

    assert_eq!(
        decision,
        PlannerDecision::Search(vec!["sulfide electrolyte yields".into()])
    );

    let thoughts = thoughts_after(&log.snapshot(), first_id);
    assert_eq!(thoughts.len(), 4);
    assert_eq!(thoughts[1], (Some(AgentPersona::Beta), "We know enough.".to_string()));
    assert_eq!(thoughts[2].0, Some(AgentPersona::Beta));
    assert_eq!(
        thoughts[2].1,
        "Rule violation: Cannot finish before 7 search cycles. Continuing debate. My previous thought was: We know enough."
    );
    // The turn passes to the other persona after a rejected finish.
    assert_eq!(thoughts[3].0, Some(AgentPersona::Alpha));

    let requests = client.requests_for(PLANNER);
    assert_eq!(requests.len(), 3);
    assert!(requests[2].last_user_text().contains("You are Agent Alpha (Strategist)"));
    assert!(requests[2].last_user_text().contains("Rule violation"));
}

#[tokio::test]
async fn test_finish_accepted_at_floor() {
    let client = Arc::new(MockLLMClient::new());
    client
        .push_text(PLANNER, debate("Check coverage."))
        .push_text(PLANNER, finish("Coverage is complete.", "All angles covered."));
    let log = log_with_cycles(7);

    let decision = plan(&client, &log).await.unwrap();

    assert_eq!(decision, PlannerDecision::Finish("All angles covered.".into()));
}

#[tokio::test]
async fn test_finish_without_reason_names_persona() {
    let client = Arc::new(MockLLMClient::new());
    client
        .push_text(PLANNER, debate("Check coverage."))
        .push_text(PLANNER, r#"{"thought": "Done.", "action": "finish"}"#);
    let log = log_with_cycles(7);

    let decision = plan(&client, &log).await.unwrap();

    assert_eq!(decision, PlannerDecision::Finish("Beta decided to finish.".into()));
}

#[tokio::test]
async fn test_first_turn_is_coerced_to_debate() {
    let client = Arc::new(MockLLMClient::new());
    client
        .push_text(PLANNER, search("Search right away.", &["premature"]))
        .push_text(PLANNER, search("Agreed, but narrower.", &["narrow query"]));
    let log = UpdateLog::new();

    let decision = plan(&client, &log).await.unwrap();

    assert_eq!(decision, PlannerDecision::Search(vec!["narrow query".into()]));
    let personas: Vec<_> = log.snapshot().iter().map(|u| u.persona).collect();
    assert_eq!(
        personas,
        vec![Some(AgentPersona::Alpha), Some(AgentPersona::Beta)]
    );
}

#[tokio::test]
async fn test_personas_alternate_every_turn() {
    let client = Arc::new(MockLLMClient::new());
    for i in 0..4 {
        client.push_text(PLANNER, debate(&format!("point {}", i)));
    }
    client.push_text(PLANNER, search("Ready.", &["q1", "q2"]));
    let log = UpdateLog::new();

    let decision = plan(&client, &log).await.unwrap();

    assert_eq!(decision, PlannerDecision::Search(vec!["q1".into(), "q2".into()]));
    let personas: Vec<_> = log.snapshot().iter().filter_map(|u| u.persona).collect();
    use AgentPersona::*;
    assert_eq!(personas, vec![Alpha, Beta, Alpha, Beta, Alpha]);
}

#[tokio::test]
async fn test_search_without_queries_keeps_debating() {
    let client = Arc::new(MockLLMClient::new());
    client
        .push_text(PLANNER, debate("Open."))
        .push_text(PLANNER, search("Search nothing?", &["", "   "]))
        .push_text(PLANNER, search("Proper batch.", &["  padded query  "]));
    let log = UpdateLog::new();

    let decision = plan(&client, &log).await.unwrap();

    assert_eq!(decision, PlannerDecision::Search(vec!["padded query".into()]));
    assert_eq!(client.requests_for(PLANNER).len(), 3);
}

#[tokio::test]
async fn test_queries_given_as_string_keep_debating() {
    let client = Arc::new(MockLLMClient::new());
    client
        .push_text(PLANNER, debate("Open."))
        .push_text(
            PLANNER,
            r#"{"thought":"Let's look it up.","action":"search","queries":"sulfide electrolytes"}"#,
        )
        .push_text(PLANNER, search("As a list this time.", &["sulfide electrolytes"]));
    let log = UpdateLog::new();

    let decision = plan(&client, &log).await.unwrap();

    assert_eq!(
        decision,
        PlannerDecision::Search(vec!["sulfide electrolytes".into()])
    );
    assert_eq!(client.requests_for(PLANNER).len(), 3);
    let thoughts = thoughts_after(&log.snapshot(), 0);
    assert_eq!(
        thoughts[1],
        (Some(AgentPersona::Beta), "Let's look it up.".to_string())
    );
    assert_eq!(thoughts[2].0, Some(AgentPersona::Alpha));
}

#[tokio::test]
async fn test_non_string_queries_are_dropped() {
    let client = Arc::new(MockLLMClient::new());
    client
        .push_text(PLANNER, debate("Open."))
        .push_text(
            PLANNER,
            r#"{"thought":"Mixed batch.","action":"search","queries":[42,"cell yields",null]}"#,
        );
    let log = UpdateLog::new();

    let decision = plan(&client, &log).await.unwrap();

    assert_eq!(decision, PlannerDecision::Search(vec!["cell yields".into()]));
}

#[tokio::test]
async fn test_wrongly_typed_finish_reason_is_ignored() {
    let client = Arc::new(MockLLMClient::new());
    client
        .push_text(PLANNER, debate("Open."))
        .push_text(
            PLANNER,
            r#"{"thought":"Keep going.","action":"continue_debate","finish_reason":0}"#,
        )
        .push_text(PLANNER, search("Enough talk.", &["pilot lines"]));
    let log = UpdateLog::new();

    let decision = plan(&client, &log).await.unwrap();

    assert_eq!(decision, PlannerDecision::Search(vec!["pilot lines".into()]));
    assert_eq!(thoughts_after(&log.snapshot(), 0).len(), 3);
}

#[tokio::test]
async fn test_numeric_finish_reason_falls_back_to_persona() {
    let client = Arc::new(MockLLMClient::new());
    client
        .push_text(PLANNER, debate("Check coverage."))
        .push_text(PLANNER, r#"{"thought": "Done.", "action": "finish", "finish_reason": 7}"#);
    let log = log_with_cycles(7);

    let decision = plan(&client, &log).await.unwrap();

    assert_eq!(decision, PlannerDecision::Finish("Beta decided to finish.".into()));
}

#[tokio::test]
async fn test_planner_request_shape() {
    let client = Arc::new(MockLLMClient::new());
    client
        .push_text(PLANNER, debate("Open."))
        .push_text(PLANNER, search("Go.", &["q"]));
    let log = log_with_cycles(2);

    plan(&client, &log).await.unwrap();

    let request = &client.requests_for(PLANNER)[0];
    assert!(request.json_response);
    assert!(!request.enable_web_search);
    assert_eq!(request.temperature, Some(0.7));
    assert_eq!(
        request.system_instruction.as_deref(),
        Some("You are an AI research planner.")
    );
    let prompt = request.last_user_text();
    assert!(prompt.contains("Total search cycles so far: 2."));
    assert!(prompt.contains("<searches>earlier query 0; earlier query 1</searches>"));
    assert!(prompt.contains("Your action MUST be 'continue_debate'"));
}

#[tokio::test]
async fn test_cancelled_before_first_turn() {
    let client = Arc::new(MockLLMClient::new());
    client.push_text(PLANNER, debate("never sent"));
    let planner = DeliberativePlanner::new(client.clone(), &research_config());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = planner.plan(&context(), &UpdateLog::new(), &cancel).await;

    assert!(matches!(result, Err(AppError::Cancelled)));
    assert!(client.requests().is_empty());
}

#[tokio::test]
async fn test_upstream_error_propagates() {
    let client = Arc::new(MockLLMClient::new());
    client.push(PLANNER, Reply::Fail("503".into()));

    let result = plan(&client, &UpdateLog::new()).await;

    assert!(matches!(result, Err(AppError::LLM(_))));
}
