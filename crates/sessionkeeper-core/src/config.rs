//! Application configuration management.
//!
//! This module resolves where the backend lives and how long a session may
//! last. Values come from `~/.config/sessionkeeper/config.json`, and each one
//! can be overridden by an environment variable (a `.env` file is honored
//! by the binary):
//!
//! - `SESSIONKEEPER_ORIGIN`: scheme and host of the backend
//! - `SESSIONKEEPER_BACKEND_URL`: path prefix appended to the origin
//! - `SESSIONKEEPER_LOGON_TIMEOUT`: session timeout in milliseconds

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "sessionkeeper";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Path of the login endpoint, relative to the backend base URL
const LOGIN_PATH: &str = "/user/auth";

pub const ENV_ORIGIN: &str = "SESSIONKEEPER_ORIGIN";
pub const ENV_BACKEND_URL: &str = "SESSIONKEEPER_BACKEND_URL";
pub const ENV_LOGON_TIMEOUT: &str = "SESSIONKEEPER_LOGON_TIMEOUT";

/// Session timeout in hours when nothing else is configured
pub const DEFAULT_LOGON_TIMEOUT_HOURS: i64 = 24;

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Scheme and host, e.g. `https://example.org`
    pub origin: Option<String>,
    /// Path prefix of the backend API, e.g. `/api`
    pub backend_url: Option<String>,
    pub logon_timeout_ms: Option<i64>,
    pub last_username: Option<String>,
}

impl Config {
    /// Load the config file (if any) and apply environment overrides
    pub fn load() -> Result<Self> {
        let mut config = Self::load_file()?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    fn load_file() -> Result<Self> {
        let path = Self::config_path()?;
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Override fields from environment-style settings looked up via `var`.
    ///
    /// A timeout override that is not a positive number is ignored, leaving
    /// whatever the file (or the one-day default) says.
    pub fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(origin) = var(ENV_ORIGIN) {
            self.origin = Some(origin);
        }
        if let Some(prefix) = var(ENV_BACKEND_URL) {
            self.backend_url = Some(prefix);
        }
        if let Some(raw) = var(ENV_LOGON_TIMEOUT) {
            match parse_timeout_ms(&raw) {
                Some(ms) => self.logon_timeout_ms = Some(ms),
                None => warn!(value = %raw, "Ignoring non-numeric {}", ENV_LOGON_TIMEOUT),
            }
        }
    }

    /// Fully resolved login endpoint: origin + backend prefix + `/user/auth`.
    /// An origin of `"null"` (an opaque origin) counts as empty.
    pub fn login_url(&self) -> String {
        let origin = match self.origin.as_deref() {
            Some("null") | None => "",
            Some(origin) => origin,
        };
        let prefix = self.backend_url.as_deref().unwrap_or("");
        format!("{}{}{}", origin, prefix, LOGIN_PATH)
    }

    pub fn default_timeout(&self) -> Duration {
        self.logon_timeout_ms
            .filter(|ms| *ms > 0)
            .map(Duration::milliseconds)
            .unwrap_or_else(|| Duration::hours(DEFAULT_LOGON_TIMEOUT_HOURS))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory holding the persisted session
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}

fn parse_timeout_ms(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    let ms = raw
        .parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f as i64))?;
    (ms > 0).then_some(ms)
}
