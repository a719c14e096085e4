//! CLI configuration management.
//!
//! Holds the cookie prefix and the cookie attributes used when rendering
//! `Set-Cookie` headers.
//!
//! Configuration is stored at `~/.config/tokenkeep/config.json`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tokenkeep_core::CookieSettings;

/// Application name used for the config directory path
const APP_NAME: &str = "tokenkeep";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Prefix used when neither config, environment nor flag names one
const DEFAULT_PREFIX: &str = "app";

/// Environment variable overriding the configured prefix
pub const PREFIX_ENV: &str = "TOKENKEEP_PREFIX";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub prefix: Option<String>,
    pub cookies: CookieSettings,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Resolve the prefix: explicit flag, then environment, then config file
    pub fn resolve_prefix(&self, flag: Option<&str>) -> String {
        flag.map(str::to_string)
            .or_else(|| std::env::var(PREFIX_ENV).ok().filter(|p| !p.is_empty()))
            .or_else(|| self.prefix.clone())
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string())
    }
}
