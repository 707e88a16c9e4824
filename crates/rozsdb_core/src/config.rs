//! Engine configuration.

use std::time::Duration;

/// How a collection keeps documents in memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStrategy {
    /// Every hydrated document stays cached until the collection is evicted.
    Unbounded,
    /// At most `capacity` documents are cached; misses fall back to the
    /// write-behind queue and then to disk.
    Lru {
        /// Maximum number of cached documents.
        capacity: usize,
    },
}

/// Configuration for opening an engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the data directory if it doesn't exist.
    pub create_if_missing: bool,

    /// Cache strategy used by every collection.
    pub cache_strategy: CacheStrategy,

    /// Inactivity window after which a collection is evicted.
    pub idle_timeout: Duration,

    /// How often the eviction ticker scans for expired collections.
    pub tick_interval: Duration,

    /// How often the write-behind queue is drained.
    pub flush_interval: Duration,

    /// Maximum number of queued writes persisted per flush cycle.
    pub flush_batch_size: usize,

    /// Documents larger than this are not hydrated into the cache.
    pub max_file_size_mb: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            cache_strategy: CacheStrategy::Unbounded,
            idle_timeout: Duration::from_secs(600),
            tick_interval: Duration::from_secs(1),
            flush_interval: Duration::from_secs(60),
            flush_batch_size: 100,
            max_file_size_mb: 1000,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the data directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets the cache strategy.
    #[must_use]
    pub const fn cache_strategy(mut self, strategy: CacheStrategy) -> Self {
        self.cache_strategy = strategy;
        self
    }

    /// Sets the idle eviction window.
    #[must_use]
    pub const fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = timeout;
        self
    }

    /// Sets the eviction ticker period.
    #[must_use]
    pub const fn tick_interval(mut self, interval: Duration) -> Self {
        self.tick_interval = interval;
        self
    }

    /// Sets the write-behind flush period.
    #[must_use]
    pub const fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Sets the write-behind batch size.
    #[must_use]
    pub const fn flush_batch_size(mut self, size: usize) -> Self {
        self.flush_batch_size = size;
        self
    }

    /// Sets the per-document hydration size cap in MiB.
    #[must_use]
    pub const fn max_file_size_mb(mut self, size: u64) -> Self {
        self.max_file_size_mb = size;
        self
    }

    /// Per-document hydration size cap in bytes.
    #[must_use]
    pub const fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(config.create_if_missing);
        assert_eq!(config.cache_strategy, CacheStrategy::Unbounded);
        assert_eq!(config.idle_timeout, Duration::from_secs(600));
        assert_eq!(config.flush_batch_size, 100);
        assert_eq!(config.max_file_size_bytes(), 1000 * 1024 * 1024);
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .create_if_missing(false)
            .cache_strategy(CacheStrategy::Lru { capacity: 10 })
            .idle_timeout(Duration::from_millis(50))
            .flush_batch_size(5);

        assert!(!config.create_if_missing);
        assert_eq!(config.cache_strategy, CacheStrategy::Lru { capacity: 10 });
        assert_eq!(config.idle_timeout, Duration::from_millis(50));
        assert_eq!(config.flush_batch_size, 5);
    }
}
