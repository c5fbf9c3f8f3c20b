//! Iterative research loop
//!
//! Alternates planning sessions with concurrent search batches until the
//! planner finishes or the optional cycle ceiling is hit, then hands the
//! collected learnings and sources to the report synthesizer.

use crate::llm::LLMClient;
use crate::research::cancel::{ensure_active, run_cancellable};
use crate::research::events::UpdateLog;
use crate::research::mode::{Mode, ModelProfile, ModelResolver};
use crate::research::planner::{DeliberativePlanner, PlannerContext, PlannerDecision};
use crate::research::search::{SearchExecutor, SearchResult};
use crate::research::synthesis::{LlmReportSynthesizer, ReportSynthesizer, SynthesisRequest};
use crate::types::{dedupe_citations, Citation, FileData, Result, UpdateKind};
use crate::utils::toml_config::{ResearchConfig, RoleModels};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Inputs of one research run.
#[derive(Debug, Clone, Default)]
pub struct ResearchJob {
    pub query: String,
    /// Refined brief from the clarification phase
    pub clarified_context: String,
    pub mode: Mode,
    /// Only consulted in custom mode
    pub custom_models: Option<RoleModels>,
    pub file: Option<FileData>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResearchOutcome {
    pub report: String,
    /// Every source seen during the run, unique by url, in first-seen order
    pub citations: Vec<Citation>,
}

/// Runs the plan → search → learn loop until the planner finishes, then hands
/// the accumulated history to the synthesizer.
pub struct ResearchCoordinator {
    planner: DeliberativePlanner,
    search: SearchExecutor,
    synthesizer: Arc<dyn ReportSynthesizer>,
    resolver: ModelResolver,
    config: ResearchConfig,
}

impl ResearchCoordinator {
    pub fn new(client: Arc<dyn LLMClient>, resolver: ModelResolver, config: ResearchConfig) -> Self {
        Self {
            planner: DeliberativePlanner::new(Arc::clone(&client), &config),
            search: SearchExecutor::new(Arc::clone(&client))
                .with_retry(config.search_retries, config.retry_base_delay()),
            synthesizer: Arc::new(LlmReportSynthesizer::new(client)),
            resolver,
            config,
        }
    }

    /// Replace the default model-backed synthesizer.
    pub fn with_synthesizer(mut self, synthesizer: Arc<dyn ReportSynthesizer>) -> Self {
        self.synthesizer = synthesizer;
        self
    }

    pub fn models_for(&self, job: &ResearchJob) -> ModelProfile {
        self.resolver.resolve(job.mode, job.custom_models.as_ref())
    }

    /// Execute deep research for `job`, appending progress to `log`.
    ///
    /// Returns [`crate::AppError::Cancelled`] as soon as `cancel` fires; the
    /// synthesizer is never invoked for a cancelled run.
    pub async fn research(
        &self,
        job: &ResearchJob,
        log: &UpdateLog,
        cancel: &CancellationToken,
    ) -> Result<ResearchOutcome> {
        let models = self.models_for(job);
        let ctx = PlannerContext {
            query: &job.query,
            clarified_context: &job.clarified_context,
            file: job.file.as_ref(),
            model: &models.planner,
        };
        let mut citations: Vec<Citation> = Vec::new();

        info!(mode = %job.mode, planner = %models.planner, searcher = %models.searcher, "Starting research");
        if !self.search.is_grounded() {
            warn!("Backend has no web search, summaries rely on model knowledge only");
        }

        let finish_reason = loop {
            ensure_active(cancel)?;

            if let Some(max) = self.config.max_search_cycles {
                let cycles = log.search_cycles();
                if cycles >= max {
                    warn!(cycles, max, "Search cycle ceiling reached");
                    break format!("Reached the configured limit of {} search cycles.", max);
                }
            }

            match self.planner.plan(&ctx, log, cancel).await? {
                PlannerDecision::Finish(reason) => break reason,
                PlannerDecision::Search(mut queries) => {
                    if let Some(max) = self.config.max_search_cycles {
                        let remaining = max.saturating_sub(log.search_cycles());
                        if queries.len() > remaining {
                            warn!(requested = queries.len(), remaining, "Trimming search batch to cycle ceiling");
                            queries.truncate(remaining);
                        }
                    }
                    let results = self.run_batch(&queries, &models.searcher, log, cancel).await?;
                    for result in results {
                        citations.extend(result.citations);
                    }
                }
            }
        };

        ensure_active(cancel)?;
        log.thought(None, format!("Research complete: {}", finish_reason));
        log.emit(
            UpdateKind::Synthesis,
            None,
            "Synthesizing the final report from all learnings.",
        );

        let citations = dedupe_citations(citations);
        let request = SynthesisRequest {
            query: job.query.clone(),
            clarified_context: job.clarified_context.clone(),
            updates: log.snapshot(),
            citations: citations.clone(),
            mode: job.mode,
            model: models.synthesizer.clone(),
            file: job.file.clone(),
        };

        let report = run_cancellable(cancel, self.synthesizer.synthesize(request)).await?;
        info!(citations = citations.len(), cycles = log.search_cycles(), "Research finished");

        Ok(ResearchOutcome { report, citations })
    }

    /// One search cycle per query. `search` updates are emitted in query order
    /// before any call starts, `read` updates in query order once all calls
    /// have returned.
    async fn run_batch(
        &self,
        queries: &[String],
        model: &str,
        log: &UpdateLog,
        cancel: &CancellationToken,
    ) -> Result<Vec<SearchResult>> {
        ensure_active(cancel)?;
        for query in queries {
            log.search(query.clone());
        }
        info!(queries = queries.len(), "Running search batch");

        let results: Vec<SearchResult> = stream::iter(queries)
            .map(|query| self.search.execute(query, model, cancel))
            .buffered(self.config.max_concurrent_searches.max(1))
            .try_collect()
            .await?;

        for result in &results {
            log.read(result.text.clone());
        }
        Ok(results)
    }
}
