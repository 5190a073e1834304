//! Write Coordinator
//!
//! Runs every mutating transaction under the write lock.
//!
//! ## Transaction
//! ```text
//! Idle → LockAcquired → Appended ─┬─→ IndexUpdated ────────────→ LockReleased
//!                                  └─→ RollingBack → RolledBack → LockReleased
//! ```
//! The log is written first and the index second. If the index update fails
//! the append is truncated away, so the index never points at a record whose
//! transaction failed and the log never keeps one. If the truncation also
//! fails, or a failed append cannot be cut off, the coordinator is poisoned
//! and refuses writes until the index is rebuilt from the log.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::cache::RecencyCache;
use crate::error::{CaskError, Result};
use crate::index::KeyIndex;
use crate::log::{Record, RecordLog, ReplayStats};

use super::lock::WriteLock;

/// States of a single write transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    Idle,
    LockAcquired,
    Appended { offset: u64 },
    IndexUpdated { offset: u64 },
    RollingBack { offset: u64 },
    RolledBack,
    LockReleased,
}

/// Tracks one transaction's progress for logging
struct Transaction<'a> {
    key: &'a str,
    state: TxnState,
}

impl<'a> Transaction<'a> {
    fn new(key: &'a str) -> Self {
        Self {
            key,
            state: TxnState::Idle,
        }
    }

    fn advance(&mut self, next: TxnState) {
        tracing::trace!(key = %self.key, from = ?self.state, to = ?next, "Write transaction");
        self.state = next;
    }
}

/// Serializes writes and keeps log, index and cache in agreement
pub struct WriteCoordinator {
    lock: WriteLock,
    log: Arc<RecordLog>,
    index: Arc<KeyIndex>,
    cache: Arc<RecencyCache>,
    /// Set when a rollback failed; cleared by `rebuild`
    poisoned: AtomicBool,
}

impl WriteCoordinator {
    pub fn new(
        lock: WriteLock,
        log: Arc<RecordLog>,
        index: Arc<KeyIndex>,
        cache: Arc<RecencyCache>,
    ) -> Self {
        Self {
            lock,
            log,
            index,
            cache,
            poisoned: AtomicBool::new(false),
        }
    }

    /// Append `key`/`value`, publish it in the index and cache
    ///
    /// Returns the offset of the new record.
    pub fn put(&self, key: &str, value: &str) -> Result<u64> {
        let mut txn = Transaction::new(key);
        let result = {
            let _guard = self.lock.acquire()?;
            txn.advance(TxnState::LockAcquired);
            self.run(&mut txn, &Record::new(key, value))
        };
        txn.advance(TxnState::LockReleased);
        result
    }

    /// Steps 2–4, called with the write lock held
    fn run(&self, txn: &mut Transaction<'_>, record: &Record) -> Result<u64> {
        self.ensure_healthy()?;

        let offset = match self.log.append(record) {
            Ok(offset) => offset,
            Err(e) => {
                if e.is_corruption() {
                    self.poisoned.store(true, Ordering::SeqCst);
                    tracing::error!(key = %record.key, error = %e, "Failed append left bytes in the log");
                }
                return Err(e);
            }
        };
        txn.advance(TxnState::Appended { offset });

        if let Err(index_err) = self.index.upsert(&record.key, offset) {
            tracing::warn!(key = %record.key, offset, error = %index_err, "Index update failed, rolling back append");
            txn.advance(TxnState::RollingBack { offset });

            if let Err(rollback_err) = self.log.rollback_last() {
                self.poisoned.store(true, Ordering::SeqCst);
                tracing::error!(
                    key = %record.key,
                    offset,
                    index_error = %index_err,
                    rollback_error = %rollback_err,
                    "Rollback failed; log and index may disagree"
                );
                return Err(CaskError::Corruption(format!(
                    "rollback of record at offset {} failed ({}) after index update failed ({})",
                    offset, rollback_err, index_err
                )));
            }

            txn.advance(TxnState::RolledBack);
            return Err(match index_err {
                CaskError::Io(e) => CaskError::IndexUpdate(e),
                other => other,
            });
        }

        self.log.commit_last();
        txn.advance(TxnState::IndexUpdated { offset });
        self.cache.put(&record.key, offset);

        tracing::debug!(key = %record.key, offset, "Committed write");
        Ok(offset)
    }

    /// Replay the log into a fresh index under the write lock
    ///
    /// An unterminated final record is cut off, as bootstrap does.
    /// The cache is cleared once the new index is in place, then warmed with
    /// the most recently written keys. Clears the poisoned state on success.
    pub fn rebuild(&self, warm_cache: bool) -> Result<ReplayStats> {
        let _guard = self.lock.acquire()?;

        let stats = self.index.rebuild_from_log(&self.log)?;
        if let Some(torn_at) = stats.torn_tail {
            tracing::warn!(offset = torn_at, "Truncating torn record at end of log");
            self.log.truncate_to(torn_at)?;
        }

        // Readers fill the cache from the index, so clearing before the swap
        // could let an old offset back in
        self.cache.clear();
        if warm_cache {
            let mut latest: Vec<(String, u64)> = self.index.snapshot().into_iter().collect();
            latest.sort_unstable_by_key(|&(_, offset)| offset);
            let skip = latest.len().saturating_sub(self.cache.capacity());
            for (key, offset) in latest.into_iter().skip(skip) {
                self.cache.put(&key, offset);
            }
        }

        if self.poisoned.swap(false, Ordering::SeqCst) {
            tracing::info!("Store consistency restored by index rebuild");
        }
        Ok(stats)
    }

    fn ensure_healthy(&self) -> Result<()> {
        if self.is_poisoned() {
            return Err(CaskError::Corruption(
                "a previous rollback failed; rebuild the index from the log before writing"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// True after a failed rollback until the next successful rebuild
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::SeqCst)
    }
}
