//! Config command - View and manage configuration
//!
//! - Show the effective (merged) configuration
//! - Write a default local configuration file

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use pll_config::{ConfigLoader, PllConfig};
use serde::Serialize;

use super::{print_info, resolve_workspace};
use crate::GlobalOptions;

/// Config management commands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show(ShowArgs),

    /// Create `.pll/config.toml` in the workspace with default values
    Init,

    /// Show configuration file paths
    Path(ShowArgs),
}

/// Arguments for the show and path commands
#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Output as JSON
    #[arg(long)]
    json: bool,
}

/// Configuration paths
#[derive(Debug, Clone, Serialize)]
pub struct ConfigPaths {
    /// Global config file path
    pub global: Option<PathBuf>,
    /// Local config file path
    pub local: PathBuf,
    /// Whether global config exists
    pub global_exists: bool,
    /// Whether local config exists
    pub local_exists: bool,
}

/// Execute the config command
pub fn execute(cmd: ConfigCommand, global: GlobalOptions, config: &PllConfig) -> Result<()> {
    match cmd {
        ConfigCommand::Show(args) => execute_show(args, config),
        ConfigCommand::Init => execute_init(global),
        ConfigCommand::Path(args) => execute_path(args, global),
    }
}

fn execute_show(args: ShowArgs, config: &PllConfig) -> Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        print!("{}", config.to_toml()?);
    }
    Ok(())
}

fn execute_init(global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(&global)?;
    let loader = ConfigLoader::new();
    let existed = loader.local_config_path(&workspace).exists();

    let path = loader
        .init_local(&workspace)
        .context("Failed to initialize local configuration")?;

    if existed {
        print_info(
            &format!("Configuration already exists: {}", path.display()),
            global.quiet,
        );
    } else {
        print_info(
            &format!("Created configuration: {}", path.display()),
            global.quiet,
        );
    }
    println!("{}", path.display());
    Ok(())
}

fn execute_path(args: ShowArgs, global: GlobalOptions) -> Result<()> {
    let workspace = resolve_workspace(&global)?;
    let loader = ConfigLoader::new();

    let global_path = loader.global_config_path();
    let local_path = loader.local_config_path(&workspace);
    let paths = ConfigPaths {
        global_exists: global_path.as_ref().is_some_and(|p| p.exists()),
        global: global_path,
        local_exists: local_path.exists(),
        local: local_path,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&paths)?);
        return Ok(());
    }

    match paths.global {
        Some(ref path) => println!(
            "global: {} ({})",
            path.display(),
            if paths.global_exists { "found" } else { "missing" }
        ),
        None => println!("global: (no home directory)"),
    }
    println!(
        "local:  {} ({})",
        paths.local.display(),
        if paths.local_exists { "found" } else { "missing" }
    );
    Ok(())
}
