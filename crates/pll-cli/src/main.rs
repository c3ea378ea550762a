//! PLL CLI - Partitioned lazy list runner
//!
//! A command-line interface for inspecting partition layouts and exercising
//! the lazy/cached lifecycle of derived PLLs on the local worker pool.
//!
//! # Usage
//!
//! ```bash
//! # Show how 10 rows are split into 3 partitions
//! pll plan --rows 10 --partitions 3
//!
//! # Build, cache, evict and recompute a small pipeline
//! pll run --rows 1000000 --modulo 3
//!
//! # Show the merged configuration
//! pll config show
//! ```

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use pll_config::{LogFormat, LoggingConfig};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

mod commands;
mod progress;

/// PLL - Partitioned lazy lists with lineage and caching
#[derive(Parser, Debug)]
#[command(name = "pll")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    global: GlobalOptions,
}

/// Global options available to all commands
#[derive(Args, Debug, Clone)]
struct GlobalOptions {
    /// Workspace directory holding `.pll/config.toml`
    #[arg(long, short = 'w', global = true, env = "PLL_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// Enable verbose output
    #[arg(long, short = 'v', global = true)]
    verbose: bool,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Number of worker threads (0 = one per CPU)
    #[arg(long, global = true, env = "PLL_WORKERS")]
    workers: Option<usize>,
}

impl GlobalOptions {
    /// Convert global options to config overrides
    pub fn to_config_overrides(&self) -> pll_config::ConfigOverrides {
        pll_config::ConfigOverrides {
            workers: self.workers,
            ..Default::default()
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show how a collection would be split into partitions
    Plan(commands::plan::PlanArgs),

    /// Build a pipeline, cache it, evict it and verify recomputation
    Run(commands::run::RunArgs),

    /// View and manage configuration
    #[command(subcommand)]
    Config(commands::config::ConfigCommand),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = commands::load_config(&cli.global)?;
    init_logging(&cli.global, &config.logging)?;

    match cli.command {
        Commands::Plan(args) => commands::plan::execute(args, cli.global),
        Commands::Run(args) => commands::run::execute(args, cli.global, &config),
        Commands::Config(cmd) => commands::config::execute(cmd, cli.global, &config),
    }
}

/// Install the global tracing subscriber, writing to stderr.
///
/// `--quiet` and `--verbose` win over `RUST_LOG`, which wins over the
/// configured level.
fn init_logging(global: &GlobalOptions, logging: &LoggingConfig) -> Result<()> {
    let filter = if global.quiet {
        EnvFilter::new("error")
    } else if global.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level))
    };

    let builder = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    match logging.format {
        LogFormat::Text => {
            tracing::subscriber::set_global_default(builder.with_ansi(true).finish())?
        }
        LogFormat::Json => tracing::subscriber::set_global_default(builder.json().finish())?,
    }
    Ok(())
}
