//! Configuration management for the object store
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (vault.toml)
//! - Environment variables (VAULT__*)
//!
//! ## Example config file (vault.toml):
//! ```toml
//! [vault]
//! root = "~/Notes"
//! schema_dir = "_schemas"
//! records_dir = "objects"
//! extension = "json"
//!
//! [watch]
//! recursive = true
//! ignore_hidden = true
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::Result;
use crate::store::StoreLayout;
use crate::watch::WatchOptions;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Vault location and layout
    #[serde(default)]
    pub vault: VaultConfig,

    /// Watcher settings
    #[serde(default)]
    pub watch: WatchOptions,
}

/// Vault configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Path to the vault root
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Schema directory, relative to the root
    #[serde(default = "default_schema_dir")]
    pub schema_dir: PathBuf,

    /// Record tree, relative to the root
    #[serde(default = "default_records_dir")]
    pub records_dir: PathBuf,

    /// Extension of structured-data files
    #[serde(default = "default_extension")]
    pub extension: String,
}

// Default value functions
fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_schema_dir() -> PathBuf {
    StoreLayout::default().schema_dir
}

fn default_records_dir() -> PathBuf {
    StoreLayout::default().records_dir
}

fn default_extension() -> String {
    StoreLayout::default().extension
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            schema_dir: default_schema_dir(),
            records_dir: default_records_dir(),
            extension: default_extension(),
        }
    }
}

impl StoreConfig {
    /// Load configuration, layering an explicit file on top of the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = ["vault.toml", ".vault.toml", "config/vault.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "familiar", "vault-objects") {
            let xdg_config = config_dir.config_dir().join("vault.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // VAULT__VAULT__ROOT, VAULT__WATCH__RECURSIVE, ...
        builder = builder.add_source(
            Environment::with_prefix("VAULT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Vault root (resolves relative paths against the working directory)
    pub fn vault_root(&self) -> PathBuf {
        if self.vault.root.is_absolute() {
            self.vault.root.clone()
        } else {
            std::env::current_dir()
                .unwrap_or_default()
                .join(&self.vault.root)
        }
    }

    /// Store layout described by this configuration
    pub fn layout(&self) -> StoreLayout {
        StoreLayout {
            schema_dir: self.vault.schema_dir.clone(),
            records_dir: self.vault.records_dir.clone(),
            extension: self.vault.extension.clone(),
        }
    }
}
