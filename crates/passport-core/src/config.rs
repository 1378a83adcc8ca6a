//! Client configuration management.
//!
//! This module handles loading and saving the passport configuration: the
//! account service location, cookie scoping, the login page used after
//! sign-out, and the request context sent with every call.
//!
//! Configuration is stored at `~/.config/gwin-passport/config.json` and can be
//! overridden with `PASSPORT_*` environment variables.

use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "gwin-passport";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Session jar file name in cache directory
const SESSION_FILE: &str = "session.json";

/// Development gateway of the account service
const DEFAULT_BASE_URL: &str = "http://117.50.92.210:9113";

/// Cookies are shared by every console subdomain
const DEFAULT_COOKIE_DOMAIN: &str = ".cdgwin.com";

const DEFAULT_LOGIN_URL: &str = "//account.console.cdgwin.com/login";

/// HTTP request timeout in seconds.
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Lifetime of cookies written without an explicit expiry
const DEFAULT_COOKIE_TTL_DAYS: i64 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PassportConfig {
    pub base_url: String,
    pub cookie_domain: String,
    pub login_url: String,
    pub request_timeout_secs: u64,
    pub cookie_ttl_days: i64,
    /// Tenant sent as request context
    pub entity_id: Option<String>,
    /// Calling channel sent as request context
    pub channel: Option<String>,
}

impl Default for PassportConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            cookie_domain: DEFAULT_COOKIE_DOMAIN.to_string(),
            login_url: DEFAULT_LOGIN_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            cookie_ttl_days: DEFAULT_COOKIE_TTL_DAYS,
            entity_id: None,
            channel: None,
        }
    }
}

impl PassportConfig {
    /// Load the config file (if any), then apply environment overrides
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse config file")?
        } else {
            Self::default()
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply `PASSPORT_*` overrides from `lookup`
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(v) = lookup("PASSPORT_BASE_URL") {
            self.base_url = v;
        }
        if let Some(v) = lookup("PASSPORT_COOKIE_DOMAIN") {
            self.cookie_domain = v;
        }
        if let Some(v) = lookup("PASSPORT_LOGIN_URL") {
            self.login_url = v;
        }
        if let Some(v) = lookup("PASSPORT_TIMEOUT_SECS") {
            self.request_timeout_secs = v
                .parse()
                .with_context(|| format!("PASSPORT_TIMEOUT_SECS is not a number: {}", v))?;
        }
        if let Some(v) = lookup("PASSPORT_ENTITY_ID") {
            self.entity_id = Some(v);
        }
        if let Some(v) = lookup("PASSPORT_CHANNEL") {
            self.channel = Some(v);
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    /// Path of the file-backed session jar
    pub fn session_file(&self) -> Result<PathBuf> {
        Ok(self.cache_dir()?.join(SESSION_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_deployment() {
        let config = PassportConfig::default();
        assert_eq!(config.cookie_domain, ".cdgwin.com");
        assert_eq!(config.login_url, "//account.console.cdgwin.com/login");
        assert_eq!(config.cookie_ttl_days, 1);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: PassportConfig =
            serde_json::from_str(r#"{"base_url": "https://api.cdgwin.com"}"#).unwrap();
        assert_eq!(config.base_url, "https://api.cdgwin.com");
        assert_eq!(config.request_timeout_secs, 30);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PASSPORT_BASE_URL", "https://staging.cdgwin.com"),
            ("PASSPORT_TIMEOUT_SECS", "5"),
            ("PASSPORT_ENTITY_ID", "gwin"),
        ]
        .into_iter()
        .collect();

        let mut config = PassportConfig::default();
        config
            .apply_overrides(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.base_url, "https://staging.cdgwin.com");
        assert_eq!(config.request_timeout_secs, 5);
        assert_eq!(config.entity_id.as_deref(), Some("gwin"));
        assert!(config.channel.is_none());
    }

    #[test]
    fn test_bad_timeout_override_fails() {
        let mut config = PassportConfig::default();
        let result = config.apply_overrides(|key| {
            (key == "PASSPORT_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }
}
