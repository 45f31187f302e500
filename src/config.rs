//! Service configuration, read from `~/.config/newscache/config.toml`.
//!
//! Every key is optional and an absent or blank file means "run with the
//! defaults". Keys the service does not know are ignored with a warning so a
//! typo does not silently change behavior.
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::feed::{Decoding, Source};
use crate::news::{DeltaEncoding, LockStrategy, RefreshFailurePolicy, RefreshSettings};

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// SEC-014: Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),

    /// Parsed fine but describes a service that cannot run.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level service configuration.
///
/// Keys left out of the file take their value from [`Config::default`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Seconds between the end of one refresh and the start of the next.
    pub refresh_interval_secs: u64,

    /// Maximum number of items kept in a snapshot.
    pub capacity: usize,

    /// What a failed refresh does: "retain-stale" or "fatal".
    pub on_refresh_failure: RefreshFailurePolicy,

    /// "swap-only" or "hold-during-refresh".
    pub lock_strategy: LockStrategy,

    /// Encoding of delta responses: "tagged" or "legacy".
    pub delta_encoding: DeltaEncoding,

    /// Per-request timeout for fetching one feed.
    pub request_timeout_secs: u64,

    /// Feeds in the order they are fetched.
    pub sources: Vec<Source>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_interval_secs: 300,
            capacity: 20,
            on_refresh_failure: RefreshFailurePolicy::default(),
            lock_strategy: LockStrategy::default(),
            delta_encoding: DeltaEncoding::default(),
            request_timeout_secs: 30,
            sources: vec![
                Source::new("NRK", "http://www.nrk.no/nyheiter/siste.rss"),
                Source::new(
                    "VG",
                    "http://www.vg.no/rss/create.php?categories=10,12&keywords=&limit=10",
                )
                .with_decoding(Decoding::Latin1),
            ],
        }
    }
}

impl Config {
    /// SEC-014: Largest config file we are willing to read.
    const MAX_FILE_SIZE: u64 = 1024 * 1024;

    const KNOWN_KEYS: [&'static str; 7] = [
        "refresh_interval_secs",
        "capacity",
        "on_refresh_failure",
        "lock_strategy",
        "delta_encoding",
        "request_timeout_secs",
        "sources",
    ];

    /// Reads `path`, falling back to defaults when it does not exist or
    /// holds only whitespace.
    ///
    /// The result is not validated; call [`Config::validate`] before use.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let Some(content) = Self::read_bounded(path)? else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        };
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Blank config file, using defaults");
            return Ok(Self::default());
        }

        let table: toml::Table = content.parse()?;
        table
            .keys()
            .filter(|key| !Self::KNOWN_KEYS.contains(&key.as_str()))
            .for_each(|key| tracing::warn!(key = %key, "Ignoring unknown config key"));

        let config: Config = toml::Value::Table(table).try_into()?;
        tracing::info!(
            path = %path.display(),
            sources = config.sources.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// File contents, or `None` if there is no file. The size is checked
    /// before anything is read.
    fn read_bounded(path: &Path) -> Result<Option<String>, ConfigError> {
        let not_found = |e: &std::io::Error| e.kind() == std::io::ErrorKind::NotFound;

        let size = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if not_found(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if size > Self::MAX_FILE_SIZE {
            return Err(ConfigError::TooLarge(format!(
                "{} is {size} bytes, the limit is {}",
                path.display(),
                Self::MAX_FILE_SIZE
            )));
        }

        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            // Removed after the metadata call
            Err(e) if not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Rejects configurations the service cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.refresh_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "refresh_interval_secs must be greater than 0".to_string(),
            ));
        }
        if self.capacity == 0 {
            return Err(ConfigError::Invalid(
                "capacity must be greater than 0".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        if self.sources.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one source is required".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for source in &self.sources {
            if source.name.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "source with url '{}' has an empty name",
                    source.url
                )));
            }
            if !names.insert(source.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate source name '{}'",
                    source.name
                )));
            }
            let url = url::Url::parse(&source.url).map_err(|e| {
                ConfigError::Invalid(format!("source '{}' has an invalid url: {e}", source.name))
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::Invalid(format!(
                    "source '{}' must use http or https, got '{}'",
                    source.name,
                    url.scheme()
                )));
            }
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Settings for the refresh loop derived from this config.
    pub fn refresh_settings(&self) -> RefreshSettings {
        RefreshSettings {
            sources: self.sources.clone(),
            capacity: self.capacity,
            interval: Duration::from_secs(self.refresh_interval_secs),
            on_failure: self.on_refresh_failure,
            lock_strategy: self.lock_strategy,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
