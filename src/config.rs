use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

/// Client configuration, read from `config.toml` in the user config
/// directory. Every field has a default, so no file is required.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Base URL of the Growtwitter API server.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Request timeout applied to every call.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Config {
    /// Load from the given path, or from the default location when none is
    /// given. A missing file yields the defaults; a malformed file is an
    /// error worth surfacing rather than silently ignoring.
    pub fn load(path: Option<&Path>) -> Result<Config> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match Self::default_path() {
                Some(p) => p,
                None => return Ok(Config::default()),
            },
        };

        if !path.exists() {
            return Ok(Config::default());
        }

        let raw = fs::read_to_string(&path)
            .with_context(|| format!("could not read config file {}", path.display()))?;
        let config: Config = toml::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|base| base.join("growtwitter").join("config.toml"))
    }
}
