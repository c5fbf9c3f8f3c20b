use anyhow::{bail, Context};
use duet::cli::init::{self, InitConfig, InitResult};
use duet::cli::output::Output;
use duet::cli::{Cli, Commands, ResearchArgs};
use duet::llm::LLMClient;
use duet::research::{Mode, ModelResolver, ResearchSession};
use duet::types::{ClarificationOutcome, FileData};
use duet::utils::toml_config::DuetConfig;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command {
        Commands::Init {
            path,
            force,
            provider,
        } => match init::run(
            InitConfig {
                path,
                force,
                provider: provider.into(),
            },
            &output,
        ) {
            InitResult::Success => Ok(()),
            InitResult::AlreadyExists => std::process::exit(1),
            InitResult::Error(e) => bail!(e),
        },
        Commands::Config { validate } => {
            let config = DuetConfig::load_or_default(cli.config.as_deref())?;
            init_tracing(&config, cli.verbose);
            show_config(&config, validate, &output)
        }
        Commands::Research(args) => {
            let config = DuetConfig::load_or_default(cli.config.as_deref())?;
            init_tracing(&config, cli.verbose);
            research(config, args, cli.verbose, output).await
        }
    }
}

/// `RUST_LOG` wins, then `--verbose`, then `[logging].level`. Logs go to
/// stderr so stdout stays clean for the report.
fn init_tracing(config: &DuetConfig, verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose {
            "debug"
        } else {
            config.logging.level.as_str()
        };
        EnvFilter::new(format!("duet={level},warn"))
    });

    let json = config.logging.json;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| {
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
        }))
        .init();
}

fn show_config(config: &DuetConfig, validate: bool, output: &Output) -> anyhow::Result<()> {
    output.header("Provider");
    output.kv("type", &config.provider.kind.to_string());
    output.kv("api_key_env", config.provider.api_key_env());
    output.kv("api_base", config.provider.api_base());

    let research = &config.research;
    output.header("Research");
    output.kv("min_search_cycles", &research.min_search_cycles.to_string());
    output.kv(
        "target_max_search_cycles",
        &research.target_max_search_cycles.to_string(),
    );
    output.kv(
        "max_search_cycles",
        &research
            .max_search_cycles
            .map_or_else(|| "unlimited".to_string(), |max| max.to_string()),
    );
    output.kv("pacing_delay_ms", &research.pacing_delay_ms.to_string());
    output.kv(
        "max_concurrent_searches",
        &research.max_concurrent_searches.to_string(),
    );
    output.kv("search_retries", &research.search_retries.to_string());

    output.header("Models");
    let resolver = ModelResolver::from_config(config);
    for mode in Mode::ALL {
        output.models(
            mode.as_str(),
            &resolver.resolve(mode, Some(&config.custom_models)),
        );
    }

    if validate {
        output.newline();
        match config.api_key() {
            Ok(_) => output.success(&format!(
                "Configuration is valid and {} is set",
                config.provider.api_key_env()
            )),
            Err(e) => {
                output.error(&e.to_string());
                bail!("configuration is missing credentials");
            }
        }
    }
    Ok(())
}

async fn research(
    config: DuetConfig,
    args: ResearchArgs,
    verbose: bool,
    output: Output,
) -> anyhow::Result<()> {
    let provider = config
        .llm_provider()
        .context("Set the API key in your environment or a .env file")?;
    let capabilities = provider.capabilities();
    let client: Arc<dyn LLMClient> = Arc::from(provider.create_client()?);

    output.banner();

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = ResearchSession::new(client, &config).with_observer(tx);
    let printer = tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            output.update(&update);
        }
    });

    let cancel = session.cancellation_token();
    spawn_interrupt_handler(cancel.clone(), output);

    session.set_query(args.query.as_str())?;
    session.set_mode(args.mode)?;
    if args.has_ignored_overrides() {
        output.warning(&format!(
            "Model flags only apply in custom mode; {} mode uses its configured models",
            args.mode
        ));
    }
    session.set_custom_models(config.custom_models.merged_with(&args.model_overrides()))?;

    if let Some(path) = &args.file {
        let file = FileData::from_path(path)?;
        if !capabilities.accepts_attachment(&file.mime_type) {
            output.warning(&format!(
                "{} may ignore {} attachments",
                config.provider.kind, file.mime_type
            ));
        }
        session.attach_file(file)?;
    }

    if verbose {
        let resolver = ModelResolver::from_config(&config);
        let models = config.custom_models.merged_with(&args.model_overrides());
        output.models(args.mode.as_str(), &resolver.resolve(args.mode, Some(&models)));
    }

    if args.skip_clarification {
        session.skip_clarification()?;
    } else if !clarify(&mut session, &cancel, output).await? {
        output.warning("Cancelled during clarification");
        return Ok(());
    }

    output.header("Research");
    let data = session.run_research().await?.clone();
    drop(session);
    printer.await.ok();

    match &args.output {
        Some(path) => {
            std::fs::write(path, Output::render_report(&data))
                .with_context(|| format!("Failed to write {}", path.display()))?;
            output.created("report", &path.display().to_string());
        }
        None => output.report(&data),
    }
    Ok(())
}

/// Drive the clarification dialogue on stdin. Returns `false` if cancelled.
async fn clarify(
    session: &mut ResearchSession,
    cancel: &CancellationToken,
    output: Output,
) -> anyhow::Result<bool> {
    output.header("Clarification");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    let mut outcome = match session.start_clarification().await {
        Ok(outcome) => outcome,
        Err(e) if e.is_cancellation() => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    while let ClarificationOutcome::Question(question) = outcome {
        output.question(&question);
        output.prompt();

        let answer = match read_answer(&mut lines, cancel).await? {
            Some(answer) => answer,
            None => return Ok(false),
        };

        outcome = match session.answer(answer).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_cancellation() => return Ok(false),
            Err(e) => return Err(e.into()),
        };
    }

    if let Some(brief) = session.clarified_context() {
        output.info(&format!("Research brief: {}", brief));
    }
    Ok(true)
}

async fn read_answer(
    lines: &mut Lines<BufReader<Stdin>>,
    cancel: &CancellationToken,
) -> anyhow::Result<Option<String>> {
    tokio::select! {
        _ = cancel.cancelled() => Ok(None),
        line = lines.next_line() => match line? {
            Some(line) => Ok(Some(line)),
            None => bail!("Input closed before clarification finished"),
        },
    }
}

/// First Ctrl-C cancels the run cooperatively; a second one exits.
fn spawn_interrupt_handler(cancel: CancellationToken, output: Output) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        output.warning("Cancelling... press Ctrl-C again to quit immediately");
        cancel.cancel();

        if tokio::signal::ctrl_c().await.is_ok() {
            std::process::exit(130);
        }
    });
}
