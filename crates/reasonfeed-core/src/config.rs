//! Configuration management for reasonfeed.
//!
//! Loads configuration from ${REASONFEED_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

/// Environment variable overriding the configured base URL.
pub const BASE_URL_ENV: &str = "REASONFEED_BASE_URL";
/// Environment variable supplying the bearer token when the config has none.
pub const TOKEN_ENV: &str = "REASONFEED_TOKEN";

pub mod paths {
    //! Path resolution for reasonfeed configuration and log directories.
    //!
    //! REASONFEED_HOME resolution order:
    //! 1. REASONFEED_HOME environment variable (if set)
    //! 2. ~/.config/reasonfeed (default)

    use std::path::PathBuf;

    /// Returns the reasonfeed home directory.
    ///
    /// Falls back to the current directory when no home directory is known.
    pub fn reasonfeed_home() -> PathBuf {
        if let Ok(home) = std::env::var("REASONFEED_HOME") {
            return PathBuf::from(home);
        }

        dirs::home_dir()
            .map(|h| h.join(".config").join("reasonfeed"))
            .unwrap_or_else(|| PathBuf::from(".reasonfeed"))
    }

    /// Returns the path to the config.toml file.
    pub fn config_path() -> PathBuf {
        reasonfeed_home().join("config.toml")
    }
}

/// Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Agent API base URL (scheme + host + optional port)
    pub base_url: String,

    /// Bearer token; falls back to `REASONFEED_TOKEN`
    pub token: Option<String>,

    /// Channel whose transcript is polled (server default when unset)
    pub channel_id: Option<String>,

    /// Number of most recent transcript messages fetched per poll
    pub history_limit: u32,

    /// Seconds between transcript polls
    pub poll_interval_secs: u64,

    /// Timeout for each history fetch, in seconds
    pub request_timeout_secs: u64,

    /// Timeout for message submission, in seconds
    pub submit_timeout_secs: u64,

    /// Fixed delay before reconnecting the reasoning stream, in seconds
    pub reconnect_delay_secs: u64,

    /// Connect timeout for the reasoning stream, in seconds
    pub connect_timeout_secs: u64,

    /// Optional log file (relative paths resolve against REASONFEED_HOME)
    pub log_file: Option<String>,

    /// Base URL given on the command line; beats env and file
    #[serde(skip)]
    pub base_url_override: Option<String>,
}

impl Config {
    pub const DEFAULT_BASE_URL: &'static str = "http://localhost:8080";
    pub const DEFAULT_HISTORY_LIMIT: u32 = 20;
    pub const MAX_HISTORY_LIMIT: u32 = 200;
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 2;
    pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 5;
    pub const DEFAULT_SUBMIT_TIMEOUT_SECS: u64 = 10;
    pub const DEFAULT_RECONNECT_DELAY_SECS: u64 = 5;
    pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

    /// Loads configuration from the default path.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Loads configuration from a specific path.
    /// Returns defaults if file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config from {}", path.display()))?;
            toml::from_str(&contents)
                .with_context(|| format!("Failed to parse config from {}", path.display()))
        } else {
            Ok(Config::default())
        }
    }

    /// Writes the commented default template to `path`.
    ///
    /// # Errors
    /// Fails if the file already exists or cannot be written.
    pub fn init(path: &Path) -> Result<()> {
        if path.exists() {
            bail!("Config file already exists at {}", path.display());
        }
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, default_config_template())
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }

    /// Resolves the base URL with precedence: override > env > config > default.
    ///
    /// # Errors
    /// Returns an error if the chosen URL does not parse.
    pub fn resolved_base_url(&self) -> Result<String> {
        let from_env = std::env::var(BASE_URL_ENV).ok();
        let chosen = [
            self.base_url_override.as_deref(),
            from_env.as_deref(),
            Some(self.base_url.as_str()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|url| !url.is_empty())
        .unwrap_or(Self::DEFAULT_BASE_URL);
        url::Url::parse(chosen).with_context(|| format!("Invalid base URL: {chosen}"))?;
        Ok(chosen.trim_end_matches('/').to_string())
    }

    /// Resolves the bearer token with precedence: config > env.
    ///
    /// A missing token is not an error; the server decides what it allows.
    pub fn resolved_token(&self) -> Option<String> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .or_else(|| {
                std::env::var(TOKEN_ENV)
                    .ok()
                    .map(|token| token.trim().to_string())
                    .filter(|token| !token.is_empty())
            })
    }

    pub fn history_limit(&self) -> u32 {
        self.history_limit.clamp(1, Self::MAX_HISTORY_LIMIT)
    }

    pub fn poll_interval(&self) -> Duration {
        secs_at_least_one(self.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        secs_at_least_one(self.request_timeout_secs)
    }

    pub fn submit_timeout(&self) -> Duration {
        secs_at_least_one(self.submit_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        secs_at_least_one(self.reconnect_delay_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        secs_at_least_one(self.connect_timeout_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: Self::DEFAULT_BASE_URL.to_string(),
            token: None,
            channel_id: None,
            history_limit: Self::DEFAULT_HISTORY_LIMIT,
            poll_interval_secs: Self::DEFAULT_POLL_INTERVAL_SECS,
            request_timeout_secs: Self::DEFAULT_REQUEST_TIMEOUT_SECS,
            submit_timeout_secs: Self::DEFAULT_SUBMIT_TIMEOUT_SECS,
            reconnect_delay_secs: Self::DEFAULT_RECONNECT_DELAY_SECS,
            connect_timeout_secs: Self::DEFAULT_CONNECT_TIMEOUT_SECS,
            log_file: None,
            base_url_override: None,
        }
    }
}

fn secs_at_least_one(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

/// Returns the default config template with comments.
///
/// Embedded from default_config.toml at compile time.
fn default_config_template() -> &'static str {
    include_str!("../default_config.toml")
}
