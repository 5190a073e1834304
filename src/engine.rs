//! Engine Module
//!
//! The `Store` ties the record log, key index, recency cache and write
//! coordinator together behind `get` and `put`.
//!
//! ## Responsibilities
//! - Explicit lifecycle: `open` runs bootstrap, `close` syncs
//! - Lock-free reads (cache → index → log)
//! - Serialized writes through the coordinator
//! - Operator tools: index rebuild and verification

use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::bootstrap::{BootstrapLoader, BootstrapReport, VerifyReport};
use crate::cache::{CacheStatsSnapshot, RecencyCache};
use crate::config::Config;
use crate::error::{CaskError, Result};
use crate::index::{mapping_from_log, KeyIndex};
use crate::log::record::validate_key;
use crate::log::{Record, RecordLog, ReplayStats};
use crate::write::{WriteCoordinator, WriteLock};

/// An embedded key-value store
///
/// ## Concurrency Model: Single Writer / Lock-free Readers
///
/// - **Writes** (`put`, `rebuild_index`): serialized by the coordinator's
///   write lock (in-process mutex + advisory lock file)
/// - **Reads** (`get`): never take the write lock. The index swaps its
///   in-memory map only after the durable rename, and a read-path cache fill
///   happens while the index entry is pinned, so the cache cannot end up
///   holding an offset older than the index. A read may still return the
///   previous value while exactly one write is in flight.
///
/// Share a store between threads with `Arc<Store>`.
pub struct Store {
    config: Config,
    log: Arc<RecordLog>,
    index: Arc<KeyIndex>,
    cache: Arc<RecencyCache>,
    writer: WriteCoordinator,
}

impl Store {
    /// Open or create a store with the given config
    ///
    /// On startup:
    /// 1. Create the data directory
    /// 2. Open (or create) the record log and lock file
    /// 3. Load the persisted index, discarding it if unreadable
    /// 4. Rebuild the index from the log and warm the cache
    pub fn open(config: Config) -> Result<Self> {
        Self::open_with_report(config).map(|(store, _)| store)
    }

    /// Like `open`, also returning what bootstrap found
    pub fn open_with_report(config: Config) -> Result<(Self, BootstrapReport)> {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let fresh = !config.log_path().exists();
        let log = Arc::new(RecordLog::open_with_faults(
            &config.log_path(),
            config.fault_injector.clone(),
        )?);
        let lock = WriteLock::open(&config.lock_path())?;
        let index = Arc::new(Self::open_index(&config)?);
        let cache = Arc::new(RecencyCache::new(config.cache_capacity));

        if fresh {
            tracing::info!(data_dir = %config.data_dir.display(), "Created new store");
        }

        let report = {
            let _guard = lock.acquire()?;
            let mut loader = BootstrapLoader::new(&log, &index).verify(config.verify_on_open);
            if config.warm_cache_on_open {
                loader = loader.warm_cache(&cache);
            }
            loader.run()?
        };

        let writer = WriteCoordinator::new(
            lock,
            Arc::clone(&log),
            Arc::clone(&index),
            Arc::clone(&cache),
        );

        tracing::info!(
            data_dir = %config.data_dir.display(),
            keys = report.keys,
            log_bytes = log.len(),
            cached = cache.len(),
            "Store opened"
        );

        Ok((
            Self {
                config,
                log,
                index,
                cache,
                writer,
            },
            report,
        ))
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    fn open_index(config: &Config) -> Result<KeyIndex> {
        let path = config.index_path();
        let faults = config.fault_injector.clone();
        match KeyIndex::open_with_faults(&path, faults.clone()) {
            Err(CaskError::MalformedIndex { line, reason }) => {
                // Bootstrap rebuilds it from the log anyway
                tracing::warn!(line, %reason, "Discarding unreadable index file");
                fs::remove_file(&path)?;
                KeyIndex::open_with_faults(&path, faults)
            }
            other => other,
        }
    }

    /// Get the value for `key`
    ///
    /// Search order:
    /// 1. Recency cache
    /// 2. Key index, filling the cache on a hit
    ///
    /// Either way the value is read from the log at the resolved offset.
    pub fn get(&self, key: &str) -> Result<String> {
        validate_key(key)?;

        if let Some(offset) = self.cache.get(key) {
            return self.read_value(key, offset);
        }

        let offset = self
            .index
            .lookup_with(key, |offset| self.cache.put(key, offset))
            .ok_or(CaskError::KeyNotFound)?;
        self.read_value(key, offset)
    }

    /// Store `value` under `key`
    ///
    /// Returns once the record is durable in the log and the index points at it.
    pub fn put(&self, key: &str, value: &str) -> Result<()> {
        validate_key(key)?;
        self.writer.put(key, value)?;
        Ok(())
    }

    /// Rebuild the index from the log, clearing a prior `Corruption` state
    pub fn rebuild_index(&self) -> Result<ReplayStats> {
        let stats = self.writer.rebuild(self.config.warm_cache_on_open)?;
        tracing::info!(records = stats.records, keys = self.index.len(), "Index rebuilt");
        Ok(stats)
    }

    /// Compare the live index against a fresh replay of the log
    pub fn verify(&self) -> Result<VerifyReport> {
        let (mapping, _) = mapping_from_log(&self.log, |_| {})?;
        Ok(VerifyReport::compare(&self.index.snapshot(), &mapping))
    }

    /// Close the store, syncing the log to disk
    pub fn close(self) -> Result<()> {
        self.log.sync()?;
        tracing::info!(data_dir = %self.config.data_dir.display(), "Store closed");
        Ok(())
    }

    fn read_value(&self, key: &str, offset: u64) -> Result<String> {
        let Record { key: stored, value } = self.log.read_at(offset)?;
        if stored != key {
            tracing::error!(key, offset, found = %stored, "Index points at another key's record");
            return Err(CaskError::Corruption(format!(
                "offset {} holds key {:?}, expected {:?}",
                offset, stored, key
            )));
        }
        Ok(value)
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// True after a failed rollback, until `rebuild_index` succeeds
    pub fn is_poisoned(&self) -> bool {
        self.writer.is_poisoned()
    }

    /// Number of distinct keys
    pub fn key_count(&self) -> usize {
        self.index.len()
    }

    /// Current log length in bytes
    pub fn log_len(&self) -> u64 {
        self.log.len()
    }

    pub fn cache_stats(&self) -> CacheStatsSnapshot {
        self.cache.stats().snapshot()
    }

    pub fn log(&self) -> &RecordLog {
        &self.log
    }

    pub fn index(&self) -> &KeyIndex {
        &self.index
    }

    pub fn cache(&self) -> &RecencyCache {
        &self.cache
    }

    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }
}
