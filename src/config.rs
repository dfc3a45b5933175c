//! Configuration management for cookieswitch
//!
//! Handles persistent settings: which site is managed, which cookie carries
//! the account id, where accounts and the browser cookie database live.
//! Supports Windows, macOS, and Linux.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Site whose cookies are managed
pub const DEFAULT_DOMAIN: &str = "bilibili.com";

/// Cookie whose value is the numeric user id of the live account
///
/// The engine reads it to tell which stored account is live without a
/// network round trip, and falls back to it when the identity endpoint is
/// unavailable.
pub const IDENTITY_COOKIE: &str = "DedeUserID";

/// Endpoint reporting the identity behind the request cookies
pub const DEFAULT_IDENTITY_ENDPOINT: &str = "https://api.bilibili.com/x/web-interface/nav";

/// Timeout for identity lookups
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;

/// Name of the account store file inside the config directory
pub const ACCOUNTS_FILE: &str = "accounts.json";

/// Errors that can occur while loading or saving configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No per-user config directory on this platform
    #[error("Could not determine config directory")]
    NoConfigDir,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid config file
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// What the session engine needs to know about the managed site
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteConfig {
    /// Domain whose cookies form the live session
    pub domain: String,
    /// Name of the cookie carrying the live account id
    pub identity_cookie: String,
    /// Cookie store holding the live session; `""` is the browser's default
    /// store, containers and private windows use their own
    pub store_id: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            domain: DEFAULT_DOMAIN.to_string(),
            identity_cookie: IDENTITY_COOKIE.to_string(),
            store_id: String::new(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    /// Domain whose cookies are switched
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Cookie carrying the live account id
    #[serde(default = "default_identity_cookie")]
    pub identity_cookie: String,
    /// Cookie store (Firefox `originAttributes`) holding the live session
    #[serde(default)]
    pub store_id: String,
    /// Identity lookup endpoint
    #[serde(default = "default_identity_endpoint")]
    pub identity_endpoint: String,
    /// Explicit Firefox `cookies.sqlite`; discovered when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookie_db_path: Option<PathBuf>,
    /// Explicit account store file; `<config dir>/accounts.json` when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accounts_path: Option<PathBuf>,
    /// Background auto-save interval in minutes (0 disables)
    #[serde(default = "default_auto_save_interval")]
    pub auto_save_interval: u32,
    /// Identity lookup timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_domain() -> String {
    DEFAULT_DOMAIN.to_string()
}

fn default_identity_cookie() -> String {
    IDENTITY_COOKIE.to_string()
}

fn default_identity_endpoint() -> String {
    DEFAULT_IDENTITY_ENDPOINT.to_string()
}

fn default_auto_save_interval() -> u32 {
    5
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            identity_cookie: default_identity_cookie(),
            store_id: String::new(),
            identity_endpoint: default_identity_endpoint(),
            cookie_db_path: None,
            accounts_path: None,
            auto_save_interval: default_auto_save_interval(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl AppConfig {
    /// Gets the config directory path (cross-platform)
    pub fn config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "windows")]
        {
            std::env::var("APPDATA")
                .ok()
                .map(|p| PathBuf::from(p).join("cookieswitch"))
        }

        #[cfg(target_os = "macos")]
        {
            std::env::var("HOME")
                .ok()
                .map(|p| PathBuf::from(p).join("Library/Application Support/cookieswitch"))
        }

        #[cfg(target_os = "linux")]
        {
            std::env::var("XDG_CONFIG_HOME")
                .ok()
                .map(PathBuf::from)
                .or_else(|| std::env::var("HOME").ok().map(|p| PathBuf::from(p).join(".config")))
                .map(|p| p.join("cookieswitch"))
        }

        #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
        {
            None
        }
    }

    /// Gets the config file path
    pub fn config_path() -> Option<PathBuf> {
        Self::config_dir().map(|dir| dir.join("config.json"))
    }

    /// Loads configuration from the default location, falling back to defaults
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => Self::load_from(&path).unwrap_or_else(|e| {
                tracing::warn!("Ignoring unreadable config {:?}: {}", path, e);
                Self::default()
            }),
            _ => Self::default(),
        }
    }

    /// Loads configuration from an explicit file
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Saves configuration to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::config_path().ok_or(ConfigError::NoConfigDir)?;
        self.save_to(&path)
    }

    /// Saves configuration to an explicit file
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Site settings for the session engine
    pub fn site(&self) -> SiteConfig {
        SiteConfig {
            domain: self.domain.clone(),
            identity_cookie: self.identity_cookie.clone(),
            store_id: self.store_id.clone(),
        }
    }

    /// Resolved path of the account store
    pub fn accounts_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.accounts_path {
            Some(path) => Ok(path.clone()),
            None => Self::config_dir()
                .map(|dir| dir.join(ACCOUNTS_FILE))
                .ok_or(ConfigError::NoConfigDir),
        }
    }

    /// Background auto-save period, if enabled
    pub fn auto_save_period(&self) -> Option<Duration> {
        match self.auto_save_interval {
            0 => None,
            minutes => Some(Duration::from_secs(u64::from(minutes) * 60)),
        }
    }

    /// Identity lookup timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
