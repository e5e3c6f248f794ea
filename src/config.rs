//! Configuration management for the data model registry
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (datamodels.toml)
//! - Environment variables (DATAMODELS_*)
//!
//! ## Example config file (datamodels.toml):
//! ```toml
//! [store]
//! path = "./registry"
//! git_history = true
//! author = "Platform Team"
//!
//! [registration]
//! initial_version = 1
//! max_version_retries = 3
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Storage settings
    #[serde(default)]
    pub store: StoreConfig,

    /// Registration behaviour
    #[serde(default)]
    pub registration: RegistrationConfig,
}

/// File store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory of the file store
    #[serde(default = "default_store_path")]
    pub path: PathBuf,

    /// Commit and tag every registration in a Git repository at the root
    #[serde(default)]
    pub git_history: bool,

    /// Author recorded in Git history
    #[serde(default)]
    pub author: Option<String>,
}

/// Registration configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistrationConfig {
    /// Version of a package's first data model when the caller supplies none
    #[serde(default = "default_initial_version")]
    pub initial_version: u32,

    /// How often a registration is retried after losing a version race
    /// to another writer of the same store
    #[serde(default = "default_max_version_retries")]
    pub max_version_retries: u32,
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./datamodels")
}

fn default_initial_version() -> u32 {
    1
}

fn default_max_version_retries() -> u32 {
    3
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
            git_history: false,
            author: None,
        }
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            initial_version: default_initial_version(),
            max_version_retries: default_max_version_retries(),
        }
    }
}

impl RegistryConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration from a specific file
    pub fn load_from(config_path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "datamodels.toml",
            ".datamodels.toml",
            "config/datamodels.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "datamodels", "registry") {
            let xdg_config = config_dir.config_dir().join("datamodels.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // DATAMODELS_STORE__PATH=... etc.
        builder = builder.add_source(
            Environment::with_prefix("DATAMODELS")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get the store path (resolves relative paths)
    pub fn store_path(&self) -> PathBuf {
        if self.store.path.is_absolute() {
            self.store.path.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.store.path)
        }
    }
}
