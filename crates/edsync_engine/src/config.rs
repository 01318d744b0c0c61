//! Configuration for the sync engine.

use std::time::Duration;

/// Configuration for a sync orchestrator.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the settings service.
    pub server_url: String,
    /// Interval between automatic sync cycles.
    pub sync_interval: Duration,
    /// Maximum number of concurrent package installs.
    pub install_concurrency: usize,
    /// How long fetched remote info/snapshots stay cached.
    pub cache_ttl: Duration,
    /// Retry configuration for gateway calls.
    pub retry: RetryConfig,
    /// What gets synced.
    pub preferences: SyncPreferences,
}

impl SyncConfig {
    /// Creates a configuration for the given server.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            sync_interval: Duration::from_secs(60),
            install_concurrency: 5,
            cache_ttl: Duration::from_secs(45),
            retry: RetryConfig::default(),
            preferences: SyncPreferences::default(),
        }
    }

    /// Sets the automatic sync interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the install concurrency bound.
    pub fn with_install_concurrency(mut self, limit: usize) -> Self {
        self.install_concurrency = limit;
        self
    }

    /// Sets the remote info cache TTL.
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the sync preferences.
    pub fn with_preferences(mut self, preferences: SyncPreferences) -> Self {
        self.preferences = preferences;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("")
    }
}

/// Configuration for gateway retry behavior.
///
/// Retries use a bounded attempt count with a fixed inter-retry delay;
/// backoff shaping is deliberately left to the server side.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first).
    pub max_attempts: u32,
    /// Delay between attempts.
    pub retry_delay: Duration,
}

impl RetryConfig {
    /// Creates a retry configuration.
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            max_attempts,
            retry_delay,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            retry_delay: Duration::ZERO,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(3))
    }
}

/// What parts of the local configuration participate in sync.
///
/// An immutable struct populated once per classification/apply pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPreferences {
    /// Sync the installed package list.
    pub sync_packages: bool,
    /// Sync settings, keymap, styles, init and snippets files.
    pub sync_settings: bool,
    /// Dot-separated settings paths excluded from the snapshot.
    pub blacklisted_keys: Vec<String>,
    /// Additional file names under the config directory to sync.
    pub extra_files: Vec<String>,
}

impl Default for SyncPreferences {
    fn default() -> Self {
        Self {
            sync_packages: true,
            sync_settings: true,
            blacklisted_keys: Vec::new(),
            extra_files: Vec::new(),
        }
    }
}
