//! User configuration settings
//!
//! Layered configuration: defaults → config file → environment variables (`HC_*`)

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Error, Result};

/// Largest page GitHub serves for list endpoints
pub const MAX_PAGE_SIZE: u8 = 100;

/// Application configuration
///
/// Never holds credentials; the token only lives in memory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the GitHub REST API (GitHub Enterprise: `https://host/api/v3`)
    pub api_base_url: String,

    /// User-Agent header sent with every API request
    pub user_agent: String,

    /// Items requested per page when listing repositories and branches
    pub page_size: u8,

    /// Commit message used when the user leaves the message blank
    pub default_commit_message: String,

    /// Base directory proposed for clones and local working copies
    pub clone_dir: Option<PathBuf>,

    /// HTTP request timeout in seconds
    pub request_timeout_secs: u64,

    /// UI refresh rate in FPS
    pub ui_refresh_fps: u32,

    /// Enable debug logging
    pub debug: bool,

    /// Log file path used in TUI mode
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: "https://api.github.com".to_string(),
            user_agent: format!("hub-commander/{}", env!("CARGO_PKG_VERSION")),
            page_size: MAX_PAGE_SIZE,
            default_commit_message: "Commit made from hub-commander".to_string(),
            clone_dir: None,
            request_timeout_secs: 30,
            ui_refresh_fps: 30,
            debug: false,
            log_file: None,
        }
    }
}

impl Config {
    /// Load configuration from all sources
    pub fn load() -> Result<Self> {
        let config_path = Self::config_file_path()?;
        Self::load_from(&config_path)
    }

    /// Load configuration using a specific config file
    pub fn load_from(config_path: &Path) -> Result<Self> {
        let config: Config = Figment::new()
            // Start with defaults
            .merge(Serialized::defaults(Config::default()))
            // Layer config file if it exists
            .merge(Toml::file(config_path))
            // Layer environment variables (HC_API_BASE_URL, HC_PAGE_SIZE, ...)
            .merge(Env::prefixed("HC_"))
            .extract()
            .map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject values the rest of the application cannot work with
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 || self.page_size > MAX_PAGE_SIZE {
            return Err(ConfigError::InvalidValue {
                key: "page_size".to_string(),
                reason: format!("must be between 1 and {}", MAX_PAGE_SIZE),
            }
            .into());
        }

        if let Err(e) = url::Url::parse(&self.api_base_url) {
            return Err(ConfigError::InvalidValue {
                key: "api_base_url".to_string(),
                reason: e.to_string(),
            }
            .into());
        }

        if self.ui_refresh_fps == 0 {
            return Err(ConfigError::InvalidValue {
                key: "ui_refresh_fps".to_string(),
                reason: "must be positive".to_string(),
            }
            .into());
        }

        Ok(())
    }

    /// Get the configuration file path
    pub fn config_file_path() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path
    pub fn data_dir() -> Result<PathBuf> {
        let dirs = Self::project_dirs()?;
        Ok(dirs.data_dir().to_path_buf())
    }

    /// Log file used by the TUI
    pub fn log_file_path(&self) -> Result<PathBuf> {
        match self.log_file {
            Some(ref path) => Ok(path.clone()),
            None => Ok(Self::data_dir()?.join("hub-commander.log")),
        }
    }

    /// Directory proposed for a repository's working copy
    pub fn proposed_local_path(&self, repo_name: &str) -> Option<PathBuf> {
        self.clone_dir.as_ref().map(|dir| dir.join(repo_name))
    }

    /// Ensure all required directories exist
    pub fn ensure_directories(&self) -> Result<()> {
        let dirs = Self::project_dirs()?;

        for dir in [dirs.config_dir(), dirs.data_dir()] {
            std::fs::create_dir_all(dir).map_err(|_e| {
                Error::Config(ConfigError::DirectoryCreationFailed(dir.to_path_buf()))
            })?;
        }

        Ok(())
    }

    /// Save current configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path()?;
        self.save_to(&config_path)
    }

    /// Save current configuration to a specific file
    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|_e| {
                Error::Config(ConfigError::DirectoryCreationFailed(parent.to_path_buf()))
            })?;
        }

        let toml =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        std::fs::write(config_path, toml).map_err(|e| ConfigError::SaveFailed(e.to_string()))?;

        Ok(())
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "hub-commander", "hub-commander").ok_or_else(|| {
            Error::Config(ConfigError::LoadFailed(
                "Could not determine home directory".to_string(),
            ))
        })
    }
}
