// ABOUTME: Configuration loading for the intray binary from environment variables.
// ABOUTME: Resolves the state directory, lock timeouts, backend choice and default cleanup age.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use intray_store::StoreOptions;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("INTRAY_STORAGE_BACKEND must be one of: tsv, sqlite; got '{0}'")]
    InvalidBackend(String),

    #[error("cannot resolve a state directory: set INTRAY_STATE_DIR, XDG_STATE_HOME or HOME")]
    NoStateDir,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Backend {
    #[default]
    Tsv,
    Sqlite,
}

impl FromStr for Backend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "tsv" => Ok(Backend::Tsv),
            "sqlite" => Ok(Backend::Sqlite),
            _ => Err(ConfigError::InvalidBackend(s.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct IntrayConfig {
    pub state_dir: PathBuf,
    pub backend: Backend,
    pub lock_timeout: Duration,
    pub read_lock_timeout: Duration,
    pub auto_cleanup_days: u32,
}

impl IntrayConfig {
    /// Load configuration from environment variables with sensible defaults.
    ///
    /// Environment variables:
    /// - INTRAY_STATE_DIR: data directory (default: $XDG_STATE_HOME/tmux-intray,
    ///   else ~/.local/state/tmux-intray)
    /// - INTRAY_STORAGE_BACKEND: tsv or sqlite (default: tsv)
    /// - INTRAY_LOCK_TIMEOUT_MS: wait for exclusive access (default: 10000)
    /// - INTRAY_READ_LOCK_TIMEOUT_MS: wait for shared access before reading
    ///   without the lock (default: 1000)
    /// - INTRAY_AUTO_CLEANUP_DAYS: default cleanup age (default: 30)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let state_dir = match var("INTRAY_STATE_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => match (var("XDG_STATE_HOME"), var("HOME")) {
                (Some(xdg), _) => PathBuf::from(xdg).join("tmux-intray"),
                (None, Some(home)) => PathBuf::from(home)
                    .join(".local")
                    .join("state")
                    .join("tmux-intray"),
                (None, None) => return Err(ConfigError::NoStateDir),
            },
        };

        let backend = var("INTRAY_STORAGE_BACKEND")
            .map(|v| v.parse::<Backend>())
            .transpose()?
            .unwrap_or_default();

        let millis = |key: &'static str, default: u64| -> Result<Duration, ConfigError> {
            Ok(Duration::from_millis(parse_number(key, var(key), default)?))
        };
        let lock_timeout = millis("INTRAY_LOCK_TIMEOUT_MS", 10_000)?;
        let read_lock_timeout = millis("INTRAY_READ_LOCK_TIMEOUT_MS", 1_000)?;
        let auto_cleanup_days =
            parse_number("INTRAY_AUTO_CLEANUP_DAYS", var("INTRAY_AUTO_CLEANUP_DAYS"), 30)?;

        Ok(Self {
            state_dir,
            backend,
            lock_timeout,
            read_lock_timeout,
            auto_cleanup_days,
        })
    }

    pub fn tsv_path(&self) -> PathBuf {
        self.state_dir.join("notifications.tsv")
    }

    pub fn sqlite_path(&self) -> PathBuf {
        self.state_dir.join("notifications.db")
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions {
            lock_timeout: self.lock_timeout,
            read_lock_timeout: self.read_lock_timeout,
            ..StoreOptions::default()
        }
    }
}

fn parse_number<T: FromStr>(
    var: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
    }
}
