//! Headless battle runner.
//!
//! This binary runs battles without graphics, controlled via JSON on
//! stdin/stdout. Designed for AI agents and CI testing.
//!
//! # Usage
//!
//! ```bash
//! # Interactive mode - read commands from stdin
//! cargo run -p rampart_headless
//!
//! # Interactive mode with a level already loaded
//! cargo run -p rampart_headless -- run --level levels/meadow.ron --auto-state
//!
//! # Play a scripted build order to the end and print the result
//! cargo run -p rampart_headless -- play --level levels/meadow.ron \
//!     --build archer@6,4 --build cannon@10,6 --speed 4
//!
//! # Check that every level in a directory plays the same way twice
//! cargo run -p rampart_headless -- verify --levels levels
//! ```
//!
//! # Protocol
//!
//! Input (stdin): JSON commands, one per line
//! Output (stdout): JSON responses, one per line
//! Logs (stderr): Debug information
//!
//! See the protocol module for command/response format.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use rampart_core::math::Fixed;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rampart_headless::{
    level_loader::{load_game_data, load_level, load_level_directory},
    play::{play_level, BuildStep, PlayConfig},
    runner::{HeadlessConfig, HeadlessRunner},
};

#[derive(Parser)]
#[command(name = "rampart_headless")]
#[command(about = "Headless tower-defense runner for AI testing and CI")]
#[command(version)]
struct Cli {
    /// Enable verbose logging to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Stat table RON file (built-in tables when omitted)
    #[arg(long, global = true)]
    data: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive session on stdin/stdout
    Run {
        /// Level file to load on startup
        #[arg(short, long)]
        level: Option<PathBuf>,

        /// Output state after every tick command
        #[arg(long)]
        auto_state: bool,
    },

    /// Play a level with a scripted build order and print the result
    Play {
        /// Level file to play
        #[arg(short, long)]
        level: PathBuf,

        /// Tower to build before the first wave, as kind@x,y (repeatable)
        #[arg(short, long = "build")]
        build: Vec<BuildStep>,

        /// Game speed multiplier
        #[arg(long, default_value = "1")]
        speed: f64,

        /// Tick limit
        #[arg(long, default_value = "108000")]
        max_ticks: u64,

        /// Call each wave as soon as the intermission starts
        #[arg(long)]
        call_early: bool,
    },

    /// Play every level in a directory twice and compare state hashes
    Verify {
        /// Directory of level files
        #[arg(long, default_value = "levels")]
        levels: PathBuf,

        /// Tick limit per run
        #[arg(long, default_value = "108000")]
        max_ticks: u64,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging to stderr (stdout is for protocol)
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        None => cmd_run(None, false, cli.data),
        Some(Commands::Run { level, auto_state }) => cmd_run(level, auto_state, cli.data),
        Some(Commands::Play {
            level,
            build,
            speed,
            max_ticks,
            call_early,
        }) => cmd_play(level, build, speed, max_ticks, call_early, cli.data),
        Some(Commands::Verify { levels, max_ticks }) => cmd_verify(levels, max_ticks, cli.data),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            tracing::error!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_run(level: Option<PathBuf>, auto_state: bool, data: Option<PathBuf>) -> Result<(), String> {
    tracing::info!("Starting headless runner");

    let config = HeadlessConfig {
        auto_state_output: auto_state,
        level_path: level,
        data_path: data,
    };
    let mut runner = HeadlessRunner::with_config(config).map_err(|e| e.to_string())?;
    runner
        .run_stdio()
        .map_err(|e| format!("Protocol stream failed: {e}"))
}

fn cmd_play(
    level: PathBuf,
    build: Vec<BuildStep>,
    speed: f64,
    max_ticks: u64,
    call_early: bool,
    data: Option<PathBuf>,
) -> Result<(), String> {
    let data = load_game_data(data.as_deref()).map_err(|e| e.to_string())?;
    let definition = load_level(&level, &data).map_err(|e| e.to_string())?;
    let speed = Fixed::checked_from_num(speed).ok_or_else(|| format!("Speed {speed} is out of range"))?;

    tracing::info!(level = %definition.id, towers = build.len(), "Playing scripted battle");
    let config = PlayConfig {
        build_order: build,
        speed,
        max_ticks,
        call_early,
    };
    let report = play_level(data, definition, &config).map_err(|e| e.to_string())?;
    let json = serde_json::to_string_pretty(&report).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

fn cmd_verify(levels: PathBuf, max_ticks: u64, data: Option<PathBuf>) -> Result<(), String> {
    let data = load_game_data(data.as_deref()).map_err(|e| e.to_string())?;
    let loaded = load_level_directory(&levels, &data).map_err(|e| e.to_string())?;
    tracing::info!("Verifying {} levels in {}", loaded.len(), levels.display());

    let config = PlayConfig {
        max_ticks,
        ..PlayConfig::default()
    };
    let mut failures = 0;
    for (path, definition) in loaded {
        let first = play_level(data.clone(), definition.clone(), &config).map_err(|e| e.to_string())?;
        let second = play_level(data.clone(), definition, &config).map_err(|e| e.to_string())?;
        if first.state_hash == second.state_hash {
            tracing::info!(level = %first.level, hash = first.state_hash, "Deterministic");
        } else {
            failures += 1;
            tracing::error!(
                "{}: hashes differ ({} vs {})",
                path.display(),
                first.state_hash,
                second.state_hash
            );
        }
    }

    if failures == 0 {
        Ok(())
    } else {
        Err(format!("{failures} level(s) are non-deterministic"))
    }
}
