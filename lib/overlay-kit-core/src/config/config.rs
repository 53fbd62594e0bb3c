use crate::config::config_serializer::serialize_config;
use crate::paths;
use log::{trace, warn};
use once_cell::sync::Lazy;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Could not determine default config directory")]
    NoConfigDir,

    #[error("Failed to access config file '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct Config {
    /// The path the config file was loaded from
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// How long a closed overlay stays on screen for its exit transition, in milliseconds
    pub exit_animation_ms: u64,
    /// How often the display surface advances exit transitions, in milliseconds
    pub tick_interval_ms: u64,
    /// Whether closed overlays are still drawn while they exit
    pub show_closing: bool,
    /// The prompt shown by the interactive shell
    pub prompt: String,
}

static CURRENT_CONFIG: Lazy<Arc<RwLock<Config>>> =
    Lazy::new(|| Arc::new(RwLock::new(Config::default())));

impl Config {
    pub fn load(config_path: Option<&Path>, save: bool) -> Result<Self, ConfigError> {
        let path = match config_path {
            Some(p) => p.to_path_buf(),
            None => paths::default_config_path().ok_or(ConfigError::NoConfigDir)?,
        };

        if !path.exists() {
            Self::create_default_config_file(&path)?;
            trace!("Created default config file at: {}", path.display());
        }

        let contents = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;

        let mut config: Config =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;

        config.config_path = Some(path.clone());

        // Write back so fields added since the file was created show up in it
        if save {
            if let Err(e) = config.save_to_file(&path) {
                warn!("Failed to update config file with missing fields: {e}");
            }
        }

        Ok(config)
    }

    fn create_default_config_file(path: &Path) -> Result<(), ConfigError> {
        Config::default().save_to_file(path)
    }

    pub fn set_config(config: Config) {
        *CURRENT_CONFIG
            .write()
            .unwrap_or_else(PoisonError::into_inner) = config;
    }

    pub fn current() -> RwLockReadGuard<'static, Config> {
        CURRENT_CONFIG
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn exit_animation_ms() -> u64 {
        Self::current().exit_animation_ms
    }

    pub fn tick_interval_ms() -> u64 {
        Self::current().tick_interval_ms
    }

    pub fn show_closing() -> bool {
        Self::current().show_closing
    }

    pub fn prompt() -> String {
        Self::current().prompt.clone()
    }

    /// Save the config to a file, with each field's documentation above it
    pub fn save_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_error)?;
        }

        let contents = serialize_config(self)?;
        fs::write(path, contents).map_err(io_error)?;
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            config_path: None,
            exit_animation_ms: 300,
            tick_interval_ms: 16,
            show_closing: true,
            prompt: "overlay> ".to_string(),
        }
    }
}
