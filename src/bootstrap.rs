//! Bootstrap Module
//!
//! Startup recovery: the key index is always rebuilt from the record log.
//!
//! On startup:
//! 1. Replay the log from offset 0 (an absent log was created empty on open)
//! 2. Cut off an unterminated final record left by a crash mid-append
//! 3. Optionally compare the persisted index against the replay
//! 4. Atomically replace the index with the replayed mapping
//! 5. Optionally warm the cache; replaying in log order leaves the most
//!    recently written keys in it

use std::collections::BTreeMap;

use crate::cache::RecencyCache;
use crate::error::Result;
use crate::index::{mapping_from_log, KeyIndex};
use crate::log::{RecordLog, ReplayStats};

/// What bootstrap found and did
#[derive(Debug, Clone, Default)]
pub struct BootstrapReport {
    /// Replay statistics
    pub replay: ReplayStats,

    /// Number of distinct keys in the rebuilt index
    pub keys: usize,

    /// Bytes of torn tail removed from the log
    pub truncated_bytes: u64,

    /// Comparison of the previous index with the log, when requested
    pub verification: Option<VerifyReport>,
}

/// Differences between a persisted index and the log replay
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyReport {
    /// Keys present in the log but absent from the index
    pub missing: Vec<String>,

    /// Keys whose index offset is not their latest record: (key, index, log)
    pub stale: Vec<(String, u64, u64)>,

    /// Keys in the index that no record in the log backs
    pub unknown: Vec<String>,
}

impl VerifyReport {
    /// Compare `index` against the replayed `log` mapping
    pub fn compare(index: &BTreeMap<String, u64>, log: &BTreeMap<String, u64>) -> Self {
        let mut report = Self::default();

        for (key, &log_offset) in log {
            match index.get(key) {
                None => report.missing.push(key.clone()),
                Some(&index_offset) if index_offset != log_offset => {
                    report.stale.push((key.clone(), index_offset, log_offset))
                }
                Some(_) => {}
            }
        }
        report.unknown = index
            .keys()
            .filter(|key| !log.contains_key(*key))
            .cloned()
            .collect();

        report
    }

    pub fn is_consistent(&self) -> bool {
        self.missing.is_empty() && self.stale.is_empty() && self.unknown.is_empty()
    }
}

/// Rebuilds the durable index (and optionally the cache) from the log
pub struct BootstrapLoader<'a> {
    log: &'a RecordLog,
    index: &'a KeyIndex,
    cache: Option<&'a RecencyCache>,
    verify: bool,
}

impl<'a> BootstrapLoader<'a> {
    pub fn new(log: &'a RecordLog, index: &'a KeyIndex) -> Self {
        Self {
            log,
            index,
            cache: None,
            verify: false,
        }
    }

    /// Warm `cache` during replay
    pub fn warm_cache(mut self, cache: &'a RecencyCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Compare the persisted index against the log before replacing it
    pub fn verify(mut self, enabled: bool) -> Self {
        self.verify = enabled;
        self
    }

    pub fn run(self) -> Result<BootstrapReport> {
        let cache = self.cache;
        let (mapping, replay) = mapping_from_log(self.log, |entry| {
            if let Some(cache) = cache {
                cache.put(&entry.record.key, entry.offset);
            }
        })?;

        let mut report = BootstrapReport {
            keys: mapping.len(),
            ..Default::default()
        };

        if let Some(torn_at) = replay.torn_tail {
            report.truncated_bytes = self.log.len().saturating_sub(torn_at);
            tracing::warn!(
                offset = torn_at,
                bytes = report.truncated_bytes,
                "Truncating torn record at end of log"
            );
            self.log.truncate_to(torn_at)?;
        }

        if self.verify {
            let verification = VerifyReport::compare(&self.index.snapshot(), &mapping);
            if !verification.is_consistent() {
                tracing::warn!(
                    missing = verification.missing.len(),
                    stale = verification.stale.len(),
                    unknown = verification.unknown.len(),
                    "Persisted index disagrees with the log; replacing it"
                );
            }
            report.verification = Some(verification);
        }

        self.index.replace_all(mapping)?;
        report.replay = replay;

        tracing::info!(
            records = report.replay.records,
            malformed = report.replay.malformed,
            keys = report.keys,
            "Rebuilt key index from record log"
        );
        Ok(report)
    }
}
