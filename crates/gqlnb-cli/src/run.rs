//! Run command implementation for the gqlnb CLI.
//!
//! Executes the code cells of a notebook against one of its configured
//! endpoints, printing outputs as they arrive.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use gqlnb_core::{
    ControllerRegistry, EndpointRegistry, ExecutionConfig, GraphqlConfigRegistry, HttpDispatcher,
    TracingCallback,
};

use crate::colors;
use crate::output::print_event;
use crate::prompt::{TerminalPrompter, parse_vars};

/// Options for `gqlnb run`.
pub struct RunOptions {
    pub notebook: String,
    pub endpoint: Option<String>,
    pub cells: Vec<usize>,
    pub vars: Vec<String>,
    pub timeout: Option<u64>,
    pub config: Option<PathBuf>,
    pub no_input: bool,
}

/// Execute a notebook.
pub async fn execute(options: RunOptions) -> anyhow::Result<()> {
    let start = Instant::now();
    let document = gqlnb_sync::read_notebook(&options.notebook)?;

    let mut config = ExecutionConfig::default();
    if let Some(secs) = options.timeout {
        config = config.with_request_timeout(Duration::from_secs(secs));
    }

    let interactive = !options.no_input && std::io::stdin().is_terminal();
    let prompter = Arc::new(TerminalPrompter::new(parse_vars(&options.vars)?, interactive));
    let dispatcher = Arc::new(HttpDispatcher::new(&config)?);
    let registry = ControllerRegistry::new(dispatcher, prompter, config)
        .with_callback(Arc::new(TracingCallback));

    let endpoints: Box<dyn EndpointRegistry> = match &options.config {
        Some(path) => Box::new(GraphqlConfigRegistry::with_config_file(path)),
        None => Box::new(GraphqlConfigRegistry::new()),
    };
    let controllers = registry.ensure_controllers(&document, endpoints.as_ref())?;
    let controller = match &options.endpoint {
        Some(name) => controllers.by_name(name)?,
        None => controllers.preferred(),
    };

    println!(
        "\n{}gqlnb{} - Running {}{}{} against {}{}{}",
        colors::BOLD,
        colors::RESET,
        colors::CYAN,
        document.path.display(),
        colors::RESET,
        colors::BOLD,
        controller.label(),
        colors::RESET
    );
    println!("{}", "─".repeat(50));

    let indices: Vec<usize> = if options.cells.is_empty() {
        document.code_cells().map(|(index, _)| index).collect()
    } else {
        options.cells.clone()
    };

    if indices.is_empty() {
        println!("\n{}No code cells found in notebook.{}", colors::YELLOW, colors::RESET);
        return Ok(());
    }

    let mut failed = 0usize;
    let mut cancelled = false;

    for index in indices {
        let Some(cell) = document.cells.get(index) else {
            anyhow::bail!("cell {} does not exist ({} cells)", index, document.cells.len());
        };
        if !cell.is_executable() {
            tracing::debug!(cell = index, "skipping markup cell");
            continue;
        }

        let mut execution = controller.execute_cell(index, cell);
        let cancel = execution.cancel_token();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });

        while let Some(event) = execution.next_event().await {
            print_event(&event);
        }
        interrupt.abort();

        let summary = execution.wait().await?;
        match summary.outcome {
            gqlnb_core::CellOutcome::Succeeded => {}
            gqlnb_core::CellOutcome::Failed => failed += 1,
            gqlnb_core::CellOutcome::Cancelled => {
                cancelled = true;
                break;
            }
        }
    }

    println!("\n{}", "─".repeat(50));
    let elapsed = start.elapsed().as_secs_f64();
    if cancelled {
        println!("{}Interrupted{} after {:.2}s", colors::YELLOW, colors::RESET, elapsed);
        anyhow::bail!("execution cancelled");
    }
    if failed > 0 {
        println!("{}Failed{} {} cell(s) in {:.2}s", colors::RED, colors::RESET, failed, elapsed);
        anyhow::bail!("{} cell(s) failed", failed);
    }
    println!("{}Completed{} in {:.2}s", colors::GREEN, colors::RESET, elapsed);
    Ok(())
}
