//! Layered configuration loading.
//!
//! A workspace's effective configuration is built from, in order:
//! 1. built-in defaults
//! 2. the user's file, `~/.pll/config.toml`
//! 3. the workspace file, `<workspace>/.pll/config.toml`
//! 4. command-line overrides
//!
//! Each layer only replaces the values it sets to something other than the
//! default, so a file may mention a single key.

use crate::error::ConfigError;
use crate::{ConfigOverrides, LoggingConfig, PllConfig, RunnerConfig};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Configuration directory name, both under the home directory and in a
/// workspace.
const CONFIG_DIR: &str = ".pll";

/// Locates and merges configuration layers.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// User-level config directory (`~/.pll`), if a home directory exists
    global_config_dir: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader rooted at the current user's home directory.
    pub fn new() -> Self {
        Self {
            global_config_dir: dirs::home_dir().map(|h| h.join(CONFIG_DIR)),
        }
    }

    /// Loader reading user-level configuration from `global_dir`.
    pub fn with_global_dir(global_dir: impl Into<PathBuf>) -> Self {
        Self {
            global_config_dir: Some(global_dir.into()),
        }
    }

    pub fn global_config_path(&self) -> Option<PathBuf> {
        self.global_config_dir
            .as_ref()
            .map(|d| d.join(CONFIG_FILE_NAME))
    }

    pub fn local_config_path(&self, workspace_root: &Path) -> PathBuf {
        workspace_root.join(CONFIG_DIR).join(CONFIG_FILE_NAME)
    }

    /// Effective configuration for a workspace.
    ///
    /// The merged result is validated, so a bad value in any layer is
    /// reported here rather than when the runner starts.
    pub fn load(
        &self,
        workspace_root: &Path,
        overrides: Option<&ConfigOverrides>,
    ) -> Result<PllConfig, ConfigError> {
        let layers = [self.load_global()?, self.load_local(workspace_root)?];
        let mut config = layers
            .into_iter()
            .flatten()
            .fold(PllConfig::default(), merge_configs);

        if let Some(ovr) = overrides {
            config.apply_overrides(ovr);
        }

        config.validate()?;
        Ok(config)
    }

    /// User-level configuration, if the file exists.
    pub fn load_global(&self) -> Result<Option<PllConfig>, ConfigError> {
        match self.global_config_path() {
            Some(path) => read_layer(&path),
            None => {
                debug!("No home directory, skipping user configuration");
                Ok(None)
            }
        }
    }

    /// Workspace configuration, if the file exists.
    pub fn load_local(&self, workspace_root: &Path) -> Result<Option<PllConfig>, ConfigError> {
        read_layer(&self.local_config_path(workspace_root))
    }

    /// Write `config` as the workspace configuration, creating `.pll/`.
    pub fn save_local(&self, workspace_root: &Path, config: &PllConfig) -> Result<(), ConfigError> {
        write_layer(&self.local_config_path(workspace_root), config)
    }

    /// Write a default workspace configuration unless one already exists.
    ///
    /// Returns the file path either way.
    pub fn init_local(&self, workspace_root: &Path) -> Result<PathBuf, ConfigError> {
        let path = self.local_config_path(workspace_root);
        if !path.exists() {
            write_layer(&path, &PllConfig::default())?;
        }
        Ok(path)
    }
}

fn read_layer(path: &Path) -> Result<Option<PllConfig>, ConfigError> {
    if !path.exists() {
        trace!(path = %path.display(), "no configuration file");
        return Ok(None);
    }

    debug!(path = %path.display(), "loading configuration");
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::read_file(path, e))?;
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| ConfigError::parse_toml(path, e))
}

fn write_layer(path: &Path, config: &PllConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::create_dir(parent, e))?;
    }
    let content = config.to_toml()?;
    std::fs::write(path, content).map_err(|e| ConfigError::write_file(path, e))
}

/// The overlay's value unless it is the default
fn prefer<T: PartialEq>(base: T, overlay: T, default: &T) -> T {
    if overlay != *default {
        overlay
    } else {
        base
    }
}

fn merge_configs(base: PllConfig, overlay: PllConfig) -> PllConfig {
    let runner = RunnerConfig::default();
    let logging = LoggingConfig::default();
    PllConfig {
        runner: RunnerConfig {
            workers: prefer(base.runner.workers, overlay.runner.workers, &runner.workers),
            default_partitions: prefer(
                base.runner.default_partitions,
                overlay.runner.default_partitions,
                &runner.default_partitions,
            ),
            thread_name_prefix: prefer(
                base.runner.thread_name_prefix,
                overlay.runner.thread_name_prefix,
                &runner.thread_name_prefix,
            ),
        },
        logging: LoggingConfig {
            level: prefer(base.logging.level, overlay.logging.level, &logging.level),
            format: prefer(base.logging.format, overlay.logging.format, &logging.format),
        },
    }
}
