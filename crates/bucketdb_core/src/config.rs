//! Database configuration.

use bucketdb_codec::DEFAULT_COMPRESSION_LEVEL;
use bucketdb_storage::EngineOptions;
use std::time::Duration;

/// Configuration for opening a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Whether to create the database file if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to sync the log on every commit (safer but slower).
    pub sync_on_commit: bool,

    /// zstd level used when encoding documents.
    pub compression_level: i32,

    /// Pairs a query stream may buffer ahead of its consumer.
    pub stream_buffer: usize,

    /// How long a query stream waits on a consumer that stopped reading
    /// before it closes its transaction.
    pub stream_idle_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_commit: true,
            compression_level: DEFAULT_COMPRESSION_LEVEL,
            stream_buffer: 64,
            stream_idle_timeout: Duration::from_secs(30),
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the database if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync the log on every commit.
    #[must_use]
    pub const fn sync_on_commit(mut self, value: bool) -> Self {
        self.sync_on_commit = value;
        self
    }

    /// Sets the document compression level.
    #[must_use]
    pub const fn compression_level(mut self, level: i32) -> Self {
        self.compression_level = level;
        self
    }

    /// Sets the query stream buffer size. Zero is treated as one.
    #[must_use]
    pub const fn stream_buffer(mut self, pairs: usize) -> Self {
        self.stream_buffer = pairs;
        self
    }

    /// Sets how long an unread query stream keeps its transaction open.
    #[must_use]
    pub const fn stream_idle_timeout(mut self, timeout: Duration) -> Self {
        self.stream_idle_timeout = timeout;
        self
    }

    pub(crate) fn engine_options(&self) -> EngineOptions {
        EngineOptions::new()
            .create_if_missing(self.create_if_missing)
            .sync_on_commit(self.sync_on_commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert!(config.sync_on_commit);
        assert_eq!(config.compression_level, 3);
        assert_eq!(config.stream_buffer, 64);
        assert_eq!(config.stream_idle_timeout, Duration::from_secs(30));
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .sync_on_commit(false)
            .stream_buffer(8)
            .stream_idle_timeout(Duration::from_millis(250));

        assert!(!config.create_if_missing);
        assert!(!config.sync_on_commit);
        assert_eq!(config.stream_buffer, 8);
        assert_eq!(config.stream_idle_timeout, Duration::from_millis(250));

        let options = config.engine_options();
        assert!(!options.create_if_missing);
        assert!(!options.sync_on_commit);
    }
}
