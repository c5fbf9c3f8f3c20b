//! # duet - deliberative deep research
//!
//! A research agent that turns a question into a cited report. Two planner
//! personas, Alpha the Strategist and Beta the Tactician, debate what to
//! search next; grounded web searches feed their learnings back into the
//! debate until the research is deep enough to synthesize.
//!
//! ## Overview
//!
//! duet can be used in two ways:
//!
//! 1. **As a CLI** - Run the `duet` binary
//! 2. **As a library** - Drive a [`ResearchSession`] from your own code
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use duet::{DuetConfig, ResearchSession};
//! use duet::types::ClarificationOutcome;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = DuetConfig::load_or_default(None)?;
//!     let client = Arc::from(config.llm_provider()?.create_client()?);
//!
//!     let mut session = ResearchSession::new(client, &config);
//!     session.set_query("What limits perovskite solar cell lifetimes?")?;
//!     session.skip_clarification()?;
//!
//!     let data = session.run_research().await?;
//!     println!("{}", data.report);
//!     Ok(())
//! }
//! ```
//!
//! ## Modules
//!
//! - [`llm`] - model invocation over Gemini and OpenAI-compatible APIs
//! - [`research`] - clarification, planning, searching and synthesis
//! - [`types`] - shared data types and [`AppError`]
//! - [`utils`] - `duet.toml` configuration
//! - [`cli`] - command-line parsing and terminal output

/// Command-line interface and terminal output.
pub mod cli;
/// LLM client implementations.
pub mod llm;
/// Research session, planner and loop.
pub mod research;
/// Core types and error handling.
pub mod types;
/// Configuration.
pub mod utils;

pub use llm::{LLMClient, LLMResponse, Provider, ProviderCapabilities};
pub use research::{Mode, ResearchSession, SessionPhase};
pub use types::{AppError, FinalResearchData, ResearchUpdate, Result};
pub use utils::toml_config::DuetConfig;
