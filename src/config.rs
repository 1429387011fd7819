//! Configuration for docgate

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::Operation;

/// Upper bound for any configured timeout, in seconds (one day)
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Environment variable overriding `mongo_uri`
pub const MONGO_URI_ENV: &str = "DOCGATE_MONGO_URI";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// MongoDB connection string
    #[serde(default = "default_mongo_uri")]
    pub mongo_uri: String,

    /// Address the HTTP server binds to
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// HTTP server port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// First path segment of the action-dispatch endpoint
    #[serde(default = "default_action_prefix")]
    pub action_prefix: String,

    /// First path segment of the REST endpoints
    #[serde(default = "default_rest_prefix")]
    pub rest_prefix: String,

    /// Per-operation deadlines
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// REST variant settings
    #[serde(default)]
    pub rest: RestConfig,
}

/// Deadlines in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect: u64,

    #[serde(default = "default_write_timeout")]
    pub insert: u64,

    /// Find gets the longest budget since result sets are materialized in full
    #[serde(default = "default_find_timeout")]
    pub find: u64,

    #[serde(default = "default_write_timeout")]
    pub update: u64,

    #[serde(default = "default_write_timeout")]
    pub delete: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestConfig {
    /// Let `DELETE` without query parameters remove every document in the collection
    #[serde(default = "default_true")]
    pub allow_unfiltered_delete: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            mongo_uri: default_mongo_uri(),
            bind_address: default_bind_address(),
            http_port: default_http_port(),
            action_prefix: default_action_prefix(),
            rest_prefix: default_rest_prefix(),
            timeouts: TimeoutConfig::default(),
            rest: RestConfig::default(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect: default_connect_timeout(),
            insert: default_write_timeout(),
            find: default_find_timeout(),
            update: default_write_timeout(),
            delete: default_write_timeout(),
        }
    }
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            allow_unfiltered_delete: true,
        }
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect)
    }

    /// Budget for a single operation, measured from request start
    pub fn budget(&self, operation: Operation) -> Duration {
        let secs = match operation {
            Operation::Insert => self.insert,
            Operation::Find => self.find,
            Operation::UpdateMany => self.update,
            Operation::DeleteMany => self.delete,
        };
        Duration::from_secs(secs)
    }
}

impl Config {
    /// Load config from `path`, or from the default location, or fall back to defaults.
    /// `DOCGATE_MONGO_URI` overrides the file.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => match Self::config_path() {
                Some(path) if path.exists() => Self::load_from(&path)?,
                _ => Config::default(),
            },
        };

        if let Ok(uri) = std::env::var(MONGO_URI_ENV) {
            if !uri.is_empty() {
                config.mongo_uri = uri;
            }
        }

        config.validate()?;
        Ok(config)
    }

    /// Load config from a specific file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Default config location: `~/.docgate/config.toml`
    pub fn config_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".docgate").join("config.toml"))
    }

    /// Socket address string for the listener
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.http_port)
    }

    pub fn validate(&self) -> Result<()> {
        validate_prefix("action_prefix", &self.action_prefix)?;
        validate_prefix("rest_prefix", &self.rest_prefix)?;

        if self.action_prefix == self.rest_prefix {
            return Err(Error::Config(format!(
                "action_prefix and rest_prefix must differ (both are '{}')",
                self.action_prefix
            )));
        }

        let t = &self.timeouts;
        for (name, secs) in [
            ("connect", t.connect),
            ("insert", t.insert),
            ("find", t.find),
            ("update", t.update),
            ("delete", t.delete),
        ] {
            if secs == 0 {
                return Err(Error::Config(format!("timeouts.{} must be at least 1 second", name)));
            }
            if secs > MAX_TIMEOUT_SECS {
                return Err(Error::Config(format!(
                    "timeouts.{} must be at most {} seconds",
                    name, MAX_TIMEOUT_SECS
                )));
            }
        }

        Ok(())
    }
}

fn validate_prefix(name: &str, prefix: &str) -> Result<()> {
    if prefix.is_empty() {
        return Err(Error::Config(format!("{} must not be empty", name)));
    }
    if prefix.contains(['/', '{', '}', '*', '?']) {
        return Err(Error::Config(format!(
            "{} must be a single path segment, got '{}'",
            name, prefix
        )));
    }
    if prefix == "health" || prefix == "api" {
        return Err(Error::Config(format!("{} '{}' is reserved", name, prefix)));
    }
    Ok(())
}

// Default value functions

fn default_mongo_uri() -> String {
    "mongodb://localhost:27017".to_string()
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    32345
}

fn default_action_prefix() -> String {
    "ms-mongo".to_string()
}

fn default_rest_prefix() -> String {
    "rest".to_string()
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_write_timeout() -> u64 {
    10
}

fn default_find_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}
