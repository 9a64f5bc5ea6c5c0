//! Configuration management for qplay
//!
//! This module handles loading, validating, and managing configuration
//! for the playground core: history store limits, apply behavior,
//! evaluator selection, the share service and logging.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = ".qplay.json";

/// Default maximum number of history entries kept per category
pub const DEFAULT_MAX_ENTRIES: usize = 100;

/// Default maximum length of a single history entry, in characters
pub const DEFAULT_MAX_ENTRY_SIZE: usize = 50_000;

/// Default quiet period before an auto-apply fires
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

/// Default evaluation deadline
pub const DEFAULT_EVAL_TIMEOUT_MS: u64 = 30_000;

/// Default maximum combined size of a share payload, in characters
pub const DEFAULT_SHARE_MAX_PAYLOAD: usize = 500_000;

/// Default lifetime of a shared snapshot
pub const DEFAULT_SHARE_EXPIRATION_SECS: u64 = 7 * 24 * 60 * 60;

/// Main configuration structure for qplay
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// History store configuration
    pub store: StoreConfig,

    /// Apply coordinator configuration
    pub apply: ApplyConfig,

    /// Evaluator configuration
    pub evaluator: EvaluatorConfig,

    /// Share service configuration
    pub share: ShareConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Configuration for the history store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the SQLite database
    pub path: PathBuf,

    /// Maximum number of entries kept per history category
    pub max_entries: usize,

    /// Maximum length of an entry in characters; longer entries are not recorded
    pub max_entry_size: usize,
}

/// Configuration for applying queries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplyConfig {
    /// Apply automatically after edits
    pub auto_apply: bool,

    /// Quiet period in milliseconds before an auto-apply fires
    pub debounce_ms: u64,

    /// Indentation of rendered output (0 = compact)
    pub indent: usize,

    /// Evaluation deadline in milliseconds (0 = wait forever)
    pub eval_timeout_ms: u64,
}

/// Which engine backs the evaluator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Built-in path expression engine
    Builtin,
    /// External program such as `jq`
    Command,
}

/// Configuration for the evaluator
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Engine selection
    pub engine: EngineKind,

    /// Program run by the command engine
    pub program: String,

    /// Arguments passed before the query
    pub args: Vec<String>,
}

/// Configuration for the share service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShareConfig {
    /// Base URL of the share API
    pub base_url: String,

    /// Maximum combined characters of input data and query
    pub max_payload_chars: usize,

    /// Lifetime of a created snapshot
    pub expiration_secs: u64,

    /// Connection timeout
    pub connect_timeout_secs: u64,
}

/// Configuration for logging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            apply: ApplyConfig::default(),
            evaluator: EvaluatorConfig::default(),
            share: ShareConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: crate::default_store_path()
                .unwrap_or_else(|_| PathBuf::from("/tmp").join(crate::DEFAULT_STORE_FILE)),
            max_entries: DEFAULT_MAX_ENTRIES,
            max_entry_size: DEFAULT_MAX_ENTRY_SIZE,
        }
    }
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            auto_apply: true,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            indent: 2,
            eval_timeout_ms: DEFAULT_EVAL_TIMEOUT_MS,
        }
    }
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            engine: EngineKind::Builtin,
            program: "jq".to_string(),
            args: Vec::new(),
        }
    }
}

impl Default for ShareConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api".to_string(),
            max_payload_chars: DEFAULT_SHARE_MAX_PAYLOAD,
            expiration_secs: DEFAULT_SHARE_EXPIRATION_SECS,
            connect_timeout_secs: 5,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl ApplyConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn eval_timeout(&self) -> Option<Duration> {
        (self.eval_timeout_ms > 0).then(|| Duration::from_millis(self.eval_timeout_ms))
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to_path(&self, path: &PathBuf) -> Result<()> {
        self.validate()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;

        Ok(())
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> Result<PathBuf> {
        let home = home::home_dir().ok_or(Error::HomeDirectoryNotFound)?;
        Ok(home.join(DEFAULT_CONFIG_FILE))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.store.max_entries == 0 {
            return Err(Error::config_validation(
                "store.max_entries",
                "must be greater than 0",
            ));
        }

        if self.store.max_entry_size == 0 {
            return Err(Error::config_validation(
                "store.max_entry_size",
                "must be greater than 0",
            ));
        }

        if self.evaluator.engine == EngineKind::Command && self.evaluator.program.trim().is_empty()
        {
            return Err(Error::config_validation(
                "evaluator.program",
                "must be set when the command engine is selected",
            ));
        }

        if !(self.share.base_url.starts_with("http://") || self.share.base_url.starts_with("https://"))
        {
            return Err(Error::config_validation(
                "share.base_url",
                "must be an http or https URL",
            ));
        }

        if self.share.max_payload_chars == 0 {
            return Err(Error::config_validation(
                "share.max_payload_chars",
                "must be greater than 0",
            ));
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(Error::config_validation(
                    "logging.level",
                    "must be one of: trace, debug, info, warn, error",
                ));
            }
        }

        Ok(())
    }

    /// Merge with another configuration, taking values from the other config
    pub fn merge(&mut self, other: &Config) {
        self.store = other.store.clone();
        self.apply = other.apply.clone();
        self.evaluator = other.evaluator.clone();
        self.share = other.share.clone();
        self.logging = other.logging.clone();
    }
}
