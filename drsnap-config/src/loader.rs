// Standard library imports
use std::fs;
use std::path::{Path, PathBuf};

// External crate imports
use anyhow::{bail, Context, Result};
use tracing::debug;

// Internal imports
use crate::config::AppConfig;

pub const CONFIG_FILE_NAME: &str = "drsnap.yaml";

/// Finds and loads the drsnap configuration.
///
/// Priority chain:
/// 1. **Explicit path:** a `--config` argument; it must exist.
/// 2. **Working directory:** `drsnap.yaml` in the directory drsnap runs from.
/// 3. **User configuration:** `<config dir>/drsnap/config.yaml`.
/// 4. **Defaults:** nothing found is not an error.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    working_dir: PathBuf,
    user_config_dir: Option<PathBuf>,
}

impl ConfigLoader {
    /// Loader rooted at the current directory and the platform config directory.
    pub fn new() -> Result<Self> {
        let working_dir =
            std::env::current_dir().context("Could not determine current directory")?;
        Ok(Self {
            working_dir,
            user_config_dir: dirs::config_dir().map(|d| d.join("drsnap")),
        })
    }

    /// Loader with explicit search locations.
    pub fn with_dirs(working_dir: impl Into<PathBuf>, user_config_dir: Option<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            user_config_dir,
        }
    }

    pub fn load(&self, explicit: Option<&Path>) -> Result<AppConfig> {
        // Priority 1: explicit path
        if let Some(path) = explicit {
            if !path.exists() {
                bail!("Configuration file {} does not exist", path.display());
            }
            return self.load_file(path);
        }

        // Priority 2: working directory
        let local = self.working_dir.join(CONFIG_FILE_NAME);
        if local.exists() {
            return self.load_file(&local);
        }

        // Priority 3: user configuration
        if let Some(dir) = &self.user_config_dir {
            let user = dir.join("config.yaml");
            if user.exists() {
                return self.load_file(&user);
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(AppConfig::default())
    }

    fn load_file(&self, path: &Path) -> Result<AppConfig> {
        debug!("Loading config from: {}", path.display());
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file at {}", path.display()))?;

        let mut config: AppConfig = if contents.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml_ng::from_str(&contents)
                .with_context(|| format!("Failed to parse {}", path.display()))?
        };

        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;

        // Store the source path for debugging purposes.
        config.source_path = Some(path.to_path_buf());

        Ok(config)
    }
}
