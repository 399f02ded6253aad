//! gqlnb CLI - Run GraphQL notebooks from the terminal.

mod colors;
mod endpoints;
mod new;
mod output;
mod prompt;
mod run;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "gqlnb")]
#[command(about = "Run GraphQL notebooks from the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute the code cells of a notebook
    Run {
        /// Path to the notebook (.gqlnb file)
        notebook: String,

        /// Endpoint name from the GraphQL config (default: the project's default)
        #[arg(short, long)]
        endpoint: Option<String>,

        /// Run only these cells (zero-based, repeatable)
        #[arg(long = "cell")]
        cells: Vec<usize>,

        /// Variable value as name=value (repeatable)
        #[arg(long = "var")]
        vars: Vec<String>,

        /// Request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// GraphQL config file to use instead of searching for one
        #[arg(long)]
        config: Option<PathBuf>,

        /// Never prompt; missing variables use their defaults
        #[arg(long)]
        no_input: bool,
    },

    /// List the endpoints available to a notebook
    Endpoints {
        /// Path to a notebook or directory
        #[arg(default_value = ".")]
        path: String,

        /// GraphQL config file to use instead of searching for one
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Create a new notebook
    New {
        /// Name of the notebook (extension optional)
        name: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env()
            .add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    // Core errors carry recovery hints
    let format_error = |err: anyhow::Error| -> anyhow::Error {
        if let Some(core_err) = err.downcast_ref::<gqlnb_core::Error>() {
            anyhow::anyhow!("{}", core_err.with_hint())
        } else {
            err
        }
    };

    match cli.command {
        Commands::Run {
            notebook,
            endpoint,
            cells,
            vars,
            timeout,
            config,
            no_input,
        } => {
            let options = run::RunOptions {
                notebook,
                endpoint,
                cells,
                vars,
                timeout,
                config,
                no_input,
            };
            run::execute(options).await.map_err(format_error)?;
        }

        Commands::Endpoints { path, config } => {
            endpoints::execute(&path, config).map_err(format_error)?;
        }

        Commands::New { name } => {
            new::execute(&name).map_err(format_error)?;
        }
    }

    Ok(())
}
