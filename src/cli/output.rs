//! Colored output helpers for CLI
//!
//! Provides consistent, colored terminal output for the duet CLI. Progress
//! updates are colored by persona: Alpha cyan, Beta magenta.

use crate::research::ModelProfile;
use crate::types::{AgentPersona, Citation, FinalResearchData, ResearchUpdate, UpdateKind};
use owo_colors::OwoColorize;
use std::io::{self, Write};

/// Output style configuration
#[derive(Debug, Clone, Copy)]
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    pub fn banner(&self) {
        let version = format!("v{}", env!("CARGO_PKG_VERSION"));
        if self.colored {
            println!(
                "\n  {} {}  {}\n",
                "duet".bright_cyan().bold(),
                version.dimmed(),
                "deliberative deep research".bright_white()
            );
        } else {
            println!("\n  duet {}  deliberative deep research\n", version);
        }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "✓".green().bold(), message.green());
        } else {
            println!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "•".blue(), message);
        } else {
            println!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            println!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            println!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    pub fn created(&self, file_type: &str, path: &str) {
        if self.colored {
            println!(
                "  {} {} {}",
                "✓".green().bold(),
                file_type.dimmed(),
                path.bright_white()
            );
        } else {
            println!("  [CREATED] {} {}", file_type, path);
        }
    }

    /// Print a header for a section
    pub fn header(&self, title: &str) {
        if self.colored {
            println!("\n  {}", title.bright_white().bold().underline());
        } else {
            println!("\n  === {} ===", title);
        }
    }

    /// Print a key-value pair
    pub fn kv(&self, key: &str, value: &str) {
        if self.colored {
            println!("    {}: {}", key.dimmed(), value.bright_white());
        } else {
            println!("    {}: {}", key, value);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            println!("\n  {} {}", "💡".dimmed(), message.dimmed().italic());
        } else {
            println!("\n  [TIP] {}", message);
        }
    }

    /// Print a command suggestion
    pub fn command(&self, cmd: &str) {
        if self.colored {
            println!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            println!("     $ {}", cmd);
        }
    }

    pub fn newline(&self) {
        println!();
    }

    /// One-line rendering of a progress update, without color codes.
    pub fn format_update(update: &ResearchUpdate) -> String {
        let label = match (update.kind, update.persona) {
            (UpdateKind::Thought, Some(persona)) => {
                format!("{} ({})", persona, persona.title())
            }
            (UpdateKind::Thought, None) => "system".to_string(),
            (UpdateKind::Search, _) => "search".to_string(),
            (UpdateKind::Read, _) => "read".to_string(),
            (UpdateKind::Synthesis, _) => "synthesis".to_string(),
        };
        format!("#{:<3} {:<22} {}", update.id, label, update.content.joined(", "))
    }

    pub fn update(&self, update: &ResearchUpdate) {
        let line = Self::format_update(update);
        if !self.colored {
            println!("  {}", line);
            return;
        }
        match (update.kind, update.persona) {
            (UpdateKind::Thought, Some(AgentPersona::Alpha)) => println!("  {}", line.cyan()),
            (UpdateKind::Thought, Some(AgentPersona::Beta)) => println!("  {}", line.magenta()),
            (UpdateKind::Thought, None) => println!("  {}", line.yellow()),
            (UpdateKind::Search, _) => println!("  {}", line.bright_blue().bold()),
            (UpdateKind::Read, _) => println!("  {}", line.dimmed()),
            (UpdateKind::Synthesis, _) => println!("  {}", line.green().bold()),
        }
    }

    pub fn question(&self, question: &str) {
        if self.colored {
            println!("\n  {} {}", "?".bright_yellow().bold(), question.bright_white());
        } else {
            println!("\n  [?] {}", question);
        }
    }

    /// Prompt marker before reading an answer
    pub fn prompt(&self) {
        if self.colored {
            print!("  {} ", ">".bright_yellow().bold());
        } else {
            print!("  > ");
        }
        io::stdout().flush().ok();
    }

    pub fn models(&self, title: &str, profile: &ModelProfile) {
        if self.colored {
            println!("\n    {}", title.cyan().bold());
        } else {
            println!("\n    --- {} ---", title);
        }
        self.kv("planner", &profile.planner);
        self.kv("searcher", &profile.searcher);
        self.kv("synthesizer", &profile.synthesizer);
        self.kv("clarification", &profile.clarification);
    }

    /// Markdown document holding the report and its numbered sources.
    pub fn render_report(data: &FinalResearchData) -> String {
        let mut doc = data.report.trim_end().to_string();
        if !data.citations.is_empty() {
            doc.push_str("\n\n## Sources\n\n");
            doc.push_str(&Self::render_sources(&data.citations));
        }
        doc.push('\n');
        doc
    }

    fn render_sources(citations: &[Citation]) -> String {
        citations
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{}. [{}]({})", i + 1, c.title, c.url))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn report(&self, data: &FinalResearchData) {
        self.header("Report");
        println!("\n{}", Self::render_report(data));
        let seconds = format!("{:.1}s", data.research_time_ms as f64 / 1000.0);
        if self.colored {
            println!("  {} {}", "research time".dimmed(), seconds.bright_white());
        } else {
            println!("  research time: {}", seconds);
        }
    }
}
