//! Rampart - Development Tools

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rampart-tools")]
#[command(about = "Development tools for Rampart")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate level and stat table files
    Validate {
        /// Path to data directory
        #[arg(default_value = "levels")]
        path: PathBuf,

        /// Stat tables to check levels against (built-in when omitted)
        #[arg(long)]
        data: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Validate { path, data } => {
            tracing::info!("Validating data files in: {}", path.display());
            let result = rampart_tools::validate::load_reference_data(data.as_deref())
                .and_then(|data| rampart_tools::validate::validate_data_directory(&path, &data));
            match result {
                Ok(count) => {
                    tracing::info!("Validation passed ({count} files)");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    tracing::error!("Validation failed: {e}");
                    ExitCode::FAILURE
                }
            }
        }
    }
}
