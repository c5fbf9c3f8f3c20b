//! Research session state machine.
//!
//! A session moves through `Idle → Clarifying → Researching → Complete`.
//! `reset` returns to `Idle` from any phase and cancels whatever is running.
//! Every other move is rejected with [`AppError::InvalidState`].

use crate::llm::LLMClient;
use crate::research::clarification::{ClarificationController, CLARIFICATION_FAILED_SUMMARY};
use crate::research::coordinator::{ResearchCoordinator, ResearchJob};
use crate::research::events::UpdateLog;
use crate::research::mode::{Mode, ModelResolver, ModelRole};
use crate::research::synthesis::ReportSynthesizer;
use crate::types::{
    AppError, ClarificationOutcome, ClarificationTurn, FileData, FinalResearchData,
    ResearchUpdate, Result, TurnRole,
};
use crate::utils::toml_config::{DuetConfig, RoleModels};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Report shown when a run is cancelled.
pub const CANCELLED_REPORT: &str = "The research process was cancelled.";
/// Report shown when a run fails for any other reason.
pub const FAILED_REPORT: &str = "An error occurred during the research process.";

/// Current phase of a research session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    /// Collecting the query, mode and attachment
    Idle,
    /// Exchanging clarification questions with the user
    Clarifying,
    /// Running the research loop
    Researching,
    /// Final data available
    Complete,
}

impl SessionPhase {
    fn can_transition_to(self, next: SessionPhase) -> bool {
        use SessionPhase::*;
        matches!(
            (self, next),
            (Idle, Clarifying) | (Idle, Researching) | (Clarifying, Researching) | (Researching, Complete)
        )
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Clarifying => "clarifying",
            SessionPhase::Researching => "researching",
            SessionPhase::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// One user's research session: owns all mutable state of a run.
pub struct ResearchSession {
    id: Uuid,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    phase: SessionPhase,

    query: String,
    mode: Mode,
    custom_models: RoleModels,
    file: Option<FileData>,

    transcript: Vec<ClarificationTurn>,
    clarified_context: Option<String>,
    log: Arc<UpdateLog>,
    observer: Option<mpsc::UnboundedSender<ResearchUpdate>>,
    cancel: CancellationToken,
    final_data: Option<FinalResearchData>,

    resolver: ModelResolver,
    clarifier: ClarificationController,
    coordinator: ResearchCoordinator,
}

impl ResearchSession {
    pub fn new(client: Arc<dyn LLMClient>, config: &DuetConfig) -> Self {
        let resolver = ModelResolver::from_config(config);
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            phase: SessionPhase::Idle,
            query: String::new(),
            mode: Mode::default(),
            custom_models: config.custom_models.clone(),
            file: None,
            transcript: Vec::new(),
            clarified_context: None,
            log: Arc::new(UpdateLog::new()),
            observer: None,
            cancel: CancellationToken::new(),
            final_data: None,
            clarifier: ClarificationController::new(Arc::clone(&client)),
            coordinator: ResearchCoordinator::new(client, resolver.clone(), config.research.clone()),
            resolver,
        }
    }

    /// Stream every progress update to `observer` as it is emitted.
    pub fn with_observer(mut self, observer: mpsc::UnboundedSender<ResearchUpdate>) -> Self {
        self.log = Arc::new(UpdateLog::with_observer(observer.clone()));
        self.observer = Some(observer);
        self
    }

    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn ReportSynthesizer>) -> Self {
        self.coordinator = self.coordinator.with_synthesizer(synthesizer);
        self
    }

    // ============= Accessors =============

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn file(&self) -> Option<&FileData> {
        self.file.as_ref()
    }

    pub fn transcript(&self) -> &[ClarificationTurn] {
        &self.transcript
    }

    pub fn clarified_context(&self) -> Option<&str> {
        self.clarified_context.as_deref()
    }

    pub fn updates(&self) -> Vec<ResearchUpdate> {
        self.log.snapshot()
    }

    pub fn final_data(&self) -> Option<&FinalResearchData> {
        self.final_data.as_ref()
    }

    /// Token of the current run; cancel it from another task to stop the run.
    ///
    /// Each run gets a fresh token: one is created with the session and a new
    /// one on every [`ResearchSession::reset`].
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the dialogue is waiting for the user to answer a question.
    pub fn awaiting_answer(&self) -> bool {
        self.phase == SessionPhase::Clarifying
            && self
                .transcript
                .last()
                .is_some_and(|turn| turn.role == TurnRole::Model)
    }

    // ============= Idle-phase setup =============

    pub fn set_query(&mut self, query: impl Into<String>) -> Result<()> {
        self.require(SessionPhase::Idle, "set the query")?;
        self.query = query.into();
        Ok(())
    }

    pub fn set_mode(&mut self, mode: Mode) -> Result<()> {
        self.require(SessionPhase::Idle, "change the mode")?;
        self.mode = mode;
        Ok(())
    }

    /// Per-role models used when the mode is custom.
    pub fn set_custom_models(&mut self, models: RoleModels) -> Result<()> {
        self.require(SessionPhase::Idle, "change custom models")?;
        self.custom_models = models;
        Ok(())
    }

    pub fn attach_file(&mut self, file: FileData) -> Result<()> {
        self.require(SessionPhase::Idle, "attach a file")?;
        info!(name = %file.name, mime_type = %file.mime_type, "File attached");
        self.file = Some(file);
        Ok(())
    }

    pub fn remove_file(&mut self) -> Result<Option<FileData>> {
        self.require(SessionPhase::Idle, "remove the file")?;
        Ok(self.file.take())
    }

    // ============= Clarification =============

    /// Open the dialogue with the query (and attachment note) as first turn.
    pub async fn start_clarification(&mut self) -> Result<ClarificationOutcome> {
        self.require(SessionPhase::Idle, "start clarification")?;
        if self.query.trim().is_empty() {
            return Err(AppError::InvalidInput("Research query is empty".to_string()));
        }

        self.transition(SessionPhase::Clarifying)?;
        self.transcript = vec![ClarificationController::initial_turn(
            &self.query,
            self.file.as_ref(),
        )];
        self.clarify().await
    }

    /// Answer the pending clarification question.
    pub async fn answer(&mut self, answer: impl Into<String>) -> Result<ClarificationOutcome> {
        if !self.awaiting_answer() {
            return Err(AppError::InvalidState(format!(
                "Cannot answer a clarification question while {}",
                self.describe_wait()
            )));
        }
        self.transcript.push(ClarificationTurn::user(answer));
        self.clarify().await
    }

    /// Use the raw query as the brief and go straight to research.
    pub fn skip_clarification(&mut self) -> Result<()> {
        self.require(SessionPhase::Idle, "skip clarification")?;
        if self.query.trim().is_empty() {
            return Err(AppError::InvalidInput("Research query is empty".to_string()));
        }
        self.clarified_context = Some(self.query.clone());
        self.transition(SessionPhase::Researching)
    }

    async fn clarify(&mut self) -> Result<ClarificationOutcome> {
        let model = self.resolver.model_for(
            self.mode,
            ModelRole::Clarification,
            Some(&self.custom_models),
        );

        let step = self
            .clarifier
            .step(&mut self.transcript, &model, self.file.as_ref(), &self.cancel)
            .await;

        let outcome = match step {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancellation() => return Err(e),
            Err(e) => {
                warn!(error = %e, "Clarification step failed, proceeding with original query");
                ClarificationOutcome::Summary(CLARIFICATION_FAILED_SUMMARY.to_string())
            }
        };

        if let ClarificationOutcome::Summary(summary) = &outcome {
            self.clarified_context = Some(summary.clone());
            self.transition(SessionPhase::Researching)?;
        }
        Ok(outcome)
    }

    // ============= Research =============

    /// Run the research loop to completion.
    ///
    /// Always ends in `Complete`: failures and cancellation produce a
    /// placeholder report with no citations. Elapsed time is recorded either
    /// way.
    pub async fn run_research(&mut self) -> Result<&FinalResearchData> {
        self.require(SessionPhase::Researching, "run research")?;

        let job = ResearchJob {
            query: self.query.clone(),
            clarified_context: self
                .clarified_context
                .clone()
                .unwrap_or_else(|| self.query.clone()),
            mode: self.mode,
            custom_models: Some(self.custom_models.clone()),
            file: self.file.clone(),
        };

        let started = Instant::now();
        let result = self
            .coordinator
            .research(&job, &self.log, &self.cancel)
            .await;
        let research_time_ms = started.elapsed().as_millis() as u64;

        let data = match result {
            Ok(outcome) => FinalResearchData {
                report: outcome.report,
                citations: outcome.citations,
                research_time_ms,
            },
            Err(e) if e.is_cancellation() => {
                info!(research_time_ms, "Research cancelled");
                FinalResearchData {
                    report: CANCELLED_REPORT.to_string(),
                    citations: Vec::new(),
                    research_time_ms,
                }
            }
            Err(e) => {
                error!(error = %e, research_time_ms, "Research failed");
                FinalResearchData {
                    report: FAILED_REPORT.to_string(),
                    citations: Vec::new(),
                    research_time_ms,
                }
            }
        };

        self.transition(SessionPhase::Complete)?;
        Ok(self.final_data.insert(data))
    }

    /// Cancel anything in flight and return to a blank idle session.
    pub fn reset(&mut self) {
        self.cancel.cancel();
        info!(session_id = %self.id, from = %self.phase, "Session reset");

        self.phase = SessionPhase::Idle;
        self.query.clear();
        self.mode = Mode::default();
        self.file = None;
        self.transcript.clear();
        self.clarified_context = None;
        self.final_data = None;
        self.log = Arc::new(match &self.observer {
            Some(observer) => UpdateLog::with_observer(observer.clone()),
            None => UpdateLog::new(),
        });
        self.cancel = CancellationToken::new();
        self.updated_at = Utc::now();
    }

    fn transition(&mut self, next: SessionPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(AppError::InvalidState(format!(
                "Cannot move session from {} to {}",
                self.phase, next
            )));
        }
        info!(session_id = %self.id, from = %self.phase, to = %next, "Session transition");
        self.phase = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    fn require(&self, phase: SessionPhase, action: &str) -> Result<()> {
        if self.phase == phase {
            Ok(())
        } else {
            Err(AppError::InvalidState(format!(
                "Cannot {} while session is {}",
                action, self.phase
            )))
        }
    }

    fn describe_wait(&self) -> String {
        if self.phase == SessionPhase::Clarifying {
            "no question is pending".to_string()
        } else {
            format!("session is {}", self.phase)
        }
    }
}
