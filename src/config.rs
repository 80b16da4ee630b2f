//! Application configuration management.
//!
//! Configuration is layered with figment, later layers overriding earlier ones:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. `config.toml` in the platform config directory
//! 3. Environment variables prefixed with `PCAPCACHE_` (e.g. `PCAPCACHE_ENABLED=false`)
//!
//! The only setting required for correct behavior is `enabled`, which picks
//! between the real cache and the disabled one at process start. Everything
//! else has a sensible default.

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cache::DEFAULT_MAX_AGE_DAYS;

/// File name of the store inside the platform cache directory.
pub const STORE_FILE_NAME: &str = "analysis_cache.db";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "PCAPCACHE_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Whether analysis results are cached at all.
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Store file override; the platform cache directory is used when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,

    /// Default age threshold for eviction sweeps, in days.
    #[serde(default = "default_max_age_days")]
    pub max_age_days: u32,

    /// Run `compact` after an eviction sweep that removed entries.
    #[serde(default)]
    pub compact_after_evict: bool,
}

fn default_enabled() -> bool {
    true
}

fn default_max_age_days() -> u32 {
    DEFAULT_MAX_AGE_DAYS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            store_path: None,
            max_age_days: default_max_age_days(),
            compact_after_evict: false,
        }
    }
}

impl Config {
    /// Load the configuration from the default locations.
    ///
    /// Falls back to defaults (with a debug log) if the layers cannot be
    /// merged, so a broken config file never prevents startup.
    pub fn load() -> Self {
        match Self::config_path().and_then(|path| Self::load_from(&path)) {
            Ok(config) => config,
            Err(e) => {
                log::debug!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        }
    }

    /// Load with `config_file` as the TOML layer. A missing file is skipped.
    pub fn load_from(config_file: &Path) -> Result<Self> {
        Self::figment(config_file)
            .extract()
            .with_context(|| format!("Invalid configuration in {}", config_file.display()))
    }

    /// The layered figment used by [`Config::load_from`].
    pub fn figment(config_file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Save the configuration as TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = self.to_toml()?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))?;
        Ok(())
    }

    /// Render as pretty TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }

    /// Store file to use: the override if set, else the platform default.
    pub fn resolved_store_path(&self) -> Result<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(path.clone()),
            None => Self::default_store_path(),
        }
    }

    /// Default platform-specific configuration file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Default platform-specific store path (per-user cache directory).
    pub fn default_store_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.cache_dir().join(STORE_FILE_NAME))
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("org", "pcapcache", "pcapcache")
            .ok_or_else(|| anyhow::anyhow!("Failed to determine project directories"))
    }
}
