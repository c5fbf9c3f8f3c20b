//! Final report synthesis.
//!
//! The research loop only depends on [`ReportSynthesizer`]. The default
//! implementation asks the synthesizer-role model to write a markdown report
//! from the accumulated learnings and sources.

use crate::llm::{Content, GenerateRequest, LLMClient, Part};
use crate::research::mode::Mode;
use crate::types::{AppError, Citation, FileData, ResearchUpdate, Result, UpdateKind};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

/// Everything a synthesizer may draw on.
#[derive(Debug, Clone)]
pub struct SynthesisRequest {
    pub query: String,
    pub clarified_context: String,
    pub updates: Vec<ResearchUpdate>,
    pub citations: Vec<Citation>,
    pub mode: Mode,
    /// Synthesizer-role model resolved for the run
    pub model: String,
    pub file: Option<FileData>,
}

#[async_trait]
pub trait ReportSynthesizer: Send + Sync {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<String>;
}

pub struct LlmReportSynthesizer {
    client: Arc<dyn LLMClient>,
}

impl LlmReportSynthesizer {
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self { client }
    }

    fn build_prompt(request: &SynthesisRequest) -> String {
        let learnings = request
            .updates
            .iter()
            .filter(|u| u.kind == UpdateKind::Read)
            .map(|u| u.content.joined("\n"))
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        let sources = if request.citations.is_empty() {
            "No sources were recorded.".to_string()
        } else {
            request
                .citations
                .iter()
                .enumerate()
                .map(|(i, c)| format!("[{}] {} - {}", i + 1, c.title, c.url))
                .collect::<Vec<_>>()
                .join("\n")
        };

        format!(
            r#"Write a comprehensive research report in markdown.

Always reply in the same language as the user's input.

User's Original Query: "{query}"
Refined Research Goal: "{context}"
Provided File: {file}

<learnings>
{learnings}
</learnings>

<sources>
{sources}
</sources>

Structure the report with a title, an executive summary, thematic sections and a conclusion.
Ground every claim in the learnings above and cite sources inline as [n] using the numbering in <sources>.
Do not invent sources."#,
            query = request.query,
            context = request.clarified_context,
            file = request.file.as_ref().map(|f| f.name.as_str()).unwrap_or("None"),
            learnings = if learnings.is_empty() { "No learnings were gathered." } else { learnings.as_str() },
            sources = sources,
        )
    }
}

#[async_trait]
impl ReportSynthesizer for LlmReportSynthesizer {
    async fn synthesize(&self, request: SynthesisRequest) -> Result<String> {
        let mut parts = vec![Part::text(Self::build_prompt(&request))];
        if let Some(file) = &request.file {
            parts.push(Part::attachment(file));
        }

        let generate = GenerateRequest::new(request.model.clone(), vec![Content::user(parts)])
            .with_system("You are an expert research analyst writing the final report.");

        info!(model = %request.model, citations = request.citations.len(), "Synthesizing report");
        let response = self.client.generate(&generate).await?;

        if response.content.trim().is_empty() {
            return Err(AppError::LLM("Synthesizer returned an empty report".to_string()));
        }
        Ok(response.content)
    }
}
