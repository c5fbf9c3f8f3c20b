//! Deliberative deep research
//!
//! This module turns a raw question into a cited report:
//! - [`session::ResearchSession`] - owns one run and its phase machine
//! - [`clarification::ClarificationController`] - refines the request with the user
//! - [`planner::DeliberativePlanner`] - Alpha/Beta debate deciding the next step
//! - [`search::SearchExecutor`] - grounded search calls with citation dedup
//! - [`coordinator::ResearchCoordinator`] - the plan → search → learn loop
//! - [`synthesis::ReportSynthesizer`] - writes the final report
//!
//! # Usage
//!
//! ```ignore
//! use duet::research::session::ResearchSession;
//! use duet::types::ClarificationOutcome;
//!
//! let mut session = ResearchSession::new(client, &config);
//! session.set_query("How close are solid-state batteries to mass production?")?;
//!
//! let mut outcome = session.start_clarification().await?;
//! while let ClarificationOutcome::Question(question) = outcome {
//!     outcome = session.answer(ask_user(&question)).await?;
//! }
//!
//! let data = session.run_research().await?;
//! println!("{}", data.report);
//! ```
//!
//! # Research Workflow
//!
//! 1. **Clarification** - a short question/answer exchange yields the refined brief
//! 2. **Planning** - the personas debate until one commits to queries or finishes
//! 3. **Searching** - each query becomes one grounded model call
//! 4. **Learning** - summaries are fed back into the next planning session
//! 5. **Synthesis** - the full history and sources become the final report

/// Cooperative cancellation helpers.
pub mod cancel;
/// Clarification dialogue controller.
pub mod clarification;
/// The iterative research loop.
pub mod coordinator;
/// Shared progress log.
pub mod events;
/// Research modes and model resolution.
pub mod mode;
/// JSON extraction from model output.
pub mod parser;
/// Two-persona deliberative planner.
pub mod planner;
/// Search execution.
pub mod search;
/// Session phase machine.
pub mod session;
/// Final report synthesis.
pub mod synthesis;

pub use coordinator::{ResearchCoordinator, ResearchJob, ResearchOutcome};
pub use events::UpdateLog;
pub use mode::{Mode, ModelProfile, ModelResolver, ModelRole};
pub use planner::{DeliberativePlanner, PlannerDecision};
pub use session::{ResearchSession, SessionPhase};
pub use synthesis::{LlmReportSynthesizer, ReportSynthesizer, SynthesisRequest};
