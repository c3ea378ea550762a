//! CLI command implementations

pub mod config;
pub mod plan;
pub mod run;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use pll_config::{ConfigLoader, PllConfig};
use pll_core::{ContextConfig, PllContext};

use crate::GlobalOptions;

/// Resolve the workspace path from options or current directory.
pub fn resolve_workspace(global: &GlobalOptions) -> Result<PathBuf> {
    match global.workspace {
        Some(ref path) => Ok(path.clone()),
        None => std::env::current_dir().context("Failed to get current directory"),
    }
}

/// Load the merged configuration (global → local → CLI overrides).
pub fn load_config(global: &GlobalOptions) -> Result<PllConfig> {
    let workspace = resolve_workspace(global)?;
    let overrides = global.to_config_overrides();
    ConfigLoader::new()
        .load(&workspace, Some(&overrides))
        .context("Failed to load configuration")
}

/// Execution context settings derived from configuration
pub fn context_config(config: &PllConfig) -> ContextConfig {
    ContextConfig {
        workers: config.runner.workers,
        default_partitions: config.runner.default_partitions,
        thread_name_prefix: config.runner.thread_name_prefix.clone(),
    }
}

/// Create the execution context for a command.
pub fn create_context(config: &PllConfig) -> Result<Arc<PllContext>> {
    PllContext::new(context_config(config)).context("Failed to create execution context")
}

/// Print an info message (respects quiet flag).
pub fn print_info(message: &str, quiet: bool) {
    if !quiet {
        eprintln!("{}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_config_follows_runner() {
        let mut config = PllConfig::default();
        config.runner.workers = 3;
        config.runner.default_partitions = 9;
        config.runner.thread_name_prefix = "custom".to_string();

        let context = context_config(&config);
        assert_eq!(context.workers, 3);
        assert_eq!(context.default_partitions, 9);
        assert_eq!(context.thread_name_prefix, "custom");
    }
}
