// Process entry: CLI, goal prompt, wiring of the real collaborators.
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use crate::agent_engine::engine::AgentEngine;
use crate::agent_engine::journal::StepJournal;
use crate::agent_engine::state::{Goal, RunSummary};
use crate::config::{load_config, AppConfig};
use crate::errors::GridPilotResult;
use crate::executor::dispatcher::Executor;
use crate::executor::input::EnigoDriver;
use crate::llm::providers::http_act::HttpActPlanner;
use crate::perception::screenshot::PrimaryMonitorSource;
use crate::perception::store::ScreenshotStore;

#[derive(Debug, Parser)]
#[command(name = "gridpilot", version, about = "Remote-planned desktop automation loop")]
pub struct Cli {
    /// Automation goal; prompted for interactively when omitted.
    #[arg(long)]
    pub goal: Option<String>,

    /// Path to config.toml.
    #[arg(long)]
    pub config: Option<PathBuf>,
}

pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Reads one line from `input` after printing the prompt.
pub fn prompt_goal(input: &mut impl BufRead, output: &mut impl Write) -> GridPilotResult<Goal> {
    write!(output, "Enter your goal: ")?;
    output.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Goal::new(line)
}

pub fn main_entry() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    // Ignore a missing .env
    let _ = dotenvy::dotenv();

    let config = match load_config(cli.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = %e, "failed to load config");
            return ExitCode::FAILURE;
        }
    };

    let goal = match cli.goal {
        Some(text) => Goal::new(text),
        None => {
            let stdin = std::io::stdin();
            prompt_goal(&mut stdin.lock(), &mut std::io::stdout())
        }
    };
    let goal = match goal {
        Ok(g) => g,
        Err(e) => {
            tracing::error!(error = %e, "no goal given, exiting");
            return ExitCode::FAILURE;
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            tracing::error!(error = %e, "failed to start tokio runtime");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run_goal(goal, config)) {
        Ok(summary) if summary.success => {
            tracing::info!(steps = summary.steps, reason = %summary.reason, "goal finished");
            ExitCode::SUCCESS
        }
        Ok(summary) => {
            tracing::warn!(steps = summary.steps, reason = %summary.reason, "run stopped before completion");
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!(error = %e, "run aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run_goal(goal: Goal, config: AppConfig) -> GridPilotResult<RunSummary> {
    let screen = PrimaryMonitorSource::new(&config.perception);
    let planner = HttpActPlanner::new(&config.planner)?;
    let driver = EnigoDriver::new(&config.input)?;
    let executor = Executor::new(Box::new(driver), &config.input);

    tracing::info!(endpoint = %config.planner.endpoint(), "planner configured");

    let mut engine = AgentEngine::new(
        goal,
        config.agent.clone(),
        Box::new(screen),
        Box::new(planner),
        executor,
    );

    if let Some(dir) = config.perception.screenshot_dir() {
        match ScreenshotStore::open(dir) {
            Ok(store) => engine = engine.with_screenshots(store),
            Err(e) => tracing::warn!(error = %e, "screenshot directory unavailable; not saving screenshots"),
        }
    }

    if config.journal.enabled {
        match StepJournal::new(config.journal.dir.as_deref()) {
            Ok(journal) => engine = engine.with_journal(journal),
            Err(e) => tracing::warn!(error = %e, "step journal unavailable"),
        }
    }

    engine.run().await
}
