//! CLI module for duet
//!
//! Provides command-line interface parsing for the `duet` binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod init;
pub mod output;

use crate::research::Mode;
use crate::utils::toml_config::{ProviderKind, RoleModels};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// duet - deliberative deep research
///
/// Clarifies a research request, lets two planner personas debate the search
/// strategy, runs grounded web searches and writes a cited report.
#[derive(Parser, Debug)]
#[command(
    name = "duet",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "duet - deliberative deep research agent",
    long_about = "Clarifies a research request, lets two planner personas (Alpha the Strategist\n\
                  and Beta the Tactician) debate the search strategy, runs grounded web searches\n\
                  and synthesizes a cited report.",
    after_help = "EXAMPLES:\n    \
                  duet init                                  # Write a starter duet.toml\n    \
                  duet research \"state of fusion startups\"   # Interactive research run\n    \
                  duet research \"...\" --mode deep -o out.md  # Deep mode, report to file\n    \
                  duet config --validate                     # Check configuration and API key"
)]
pub struct Cli {
    /// Path to the configuration file (defaults to ./duet.toml when present)
    #[arg(short, long, global = true, env = "DUET_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Provider choices accepted by `duet init`
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderArg {
    Gemini,
    Openai,
}

impl From<ProviderArg> for ProviderKind {
    fn from(value: ProviderArg) -> Self {
        match value {
            ProviderArg::Gemini => ProviderKind::Gemini,
            ProviderArg::Openai => ProviderKind::OpenAI,
        }
    }
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a research session
    ///
    /// Asks clarifying questions on stdin, then streams the planner debate,
    /// searches and learnings until the report is ready. Ctrl-C cancels.
    Research(ResearchArgs),

    /// Show configuration information
    Config {
        /// Validate the configuration and check the API key is set
        #[arg(long)]
        validate: bool,
    },

    /// Write a starter duet.toml
    Init {
        /// Directory to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing duet.toml
        #[arg(short, long)]
        force: bool,

        /// LLM provider to configure
        #[arg(long, value_enum, default_value = "gemini")]
        provider: ProviderArg,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct ResearchArgs {
    /// The research question
    pub query: String,

    /// Model profile to use
    #[arg(short, long, value_enum, default_value = "balanced")]
    pub mode: Mode,

    /// Attach a file (image or document) to the request
    #[arg(short, long)]
    pub file: Option<PathBuf>,

    /// Planner model (custom mode)
    #[arg(long)]
    pub planner_model: Option<String>,

    /// Searcher model (custom mode)
    #[arg(long)]
    pub searcher_model: Option<String>,

    /// Synthesizer model (custom mode)
    #[arg(long)]
    pub synthesizer_model: Option<String>,

    /// Clarification model (custom mode)
    #[arg(long)]
    pub clarification_model: Option<String>,

    /// Use the query as-is instead of asking clarifying questions
    #[arg(long)]
    pub skip_clarification: bool,

    /// Write the report and sources to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ResearchArgs {
    /// Model overrides given on the command line.
    pub fn model_overrides(&self) -> RoleModels {
        RoleModels {
            planner: self.planner_model.clone(),
            searcher: self.searcher_model.clone(),
            synthesizer: self.synthesizer_model.clone(),
            clarification: self.clarification_model.clone(),
        }
    }

    /// Whether model flags were given for a mode that does not read them.
    pub fn has_ignored_overrides(&self) -> bool {
        self.mode != Mode::Custom && !self.model_overrides().is_empty()
    }
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
