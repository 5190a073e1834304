//! Configuration for logcask
//!
//! Centralized configuration with sensible defaults.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{CaskError, Result};
use crate::fault::FaultInjector;

/// Record log file name (legacy on-disk layout)
pub const LOG_FILENAME: &str = "data";

/// Index file name
pub const INDEX_FILENAME: &str = "reference";

/// Scratch file the index is rewritten into before the rename
pub const INDEX_TEMP_FILENAME: &str = "reference.tmp";

/// Zero-byte marker whose advisory lock guards each write transaction
pub const LOCK_FILENAME: &str = "write.lock";

/// Default number of offsets kept in the recency cache
pub const DEFAULT_CACHE_CAPACITY: usize = 100;

/// Main configuration for a store instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all store files
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── data            (append-only record log)
    ///     ├── reference       (key → offset index)
    ///     └── write.lock      (write transaction lock)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // Cache Configuration
    // -------------------------------------------------------------------------
    /// Max number of key → offset entries held in memory
    pub cache_capacity: usize,

    /// Seed the cache with the most recently written keys during bootstrap
    pub warm_cache_on_open: bool,

    // -------------------------------------------------------------------------
    // Recovery Configuration
    // -------------------------------------------------------------------------
    /// Compare the persisted index against a log replay on open and log
    /// any disagreement before it is replaced
    pub verify_on_open: bool,

    // -------------------------------------------------------------------------
    // Testing
    // -------------------------------------------------------------------------
    /// Optional fault injector shared with the write path
    pub fault_injector: Option<Arc<FaultInjector>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./logcask_data"),
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            warm_cache_on_open: true,
            verify_on_open: false,
            fault_injector: None,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the store cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(CaskError::Config(
                "cache_capacity must be at least 1".to_string(),
            ));
        }
        if self.data_dir.as_os_str().is_empty() {
            return Err(CaskError::Config("data_dir must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(LOG_FILENAME)
    }

    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join(INDEX_FILENAME)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join(LOCK_FILENAME)
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl AsRef<Path>) -> Self {
        self.config.data_dir = path.as_ref().to_path_buf();
        self
    }

    /// Set the recency cache capacity (number of keys)
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    /// Enable or disable warming the cache during bootstrap
    pub fn warm_cache_on_open(mut self, enabled: bool) -> Self {
        self.config.warm_cache_on_open = enabled;
        self
    }

    /// Enable or disable index verification during bootstrap
    pub fn verify_on_open(mut self, enabled: bool) -> Self {
        self.config.verify_on_open = enabled;
        self
    }

    /// Install a fault injector
    pub fn fault_injector(mut self, injector: Arc<FaultInjector>) -> Self {
        self.config.fault_injector = Some(injector);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
