//! Key Index
//!
//! Durable key → offset map. The file on disk is the durable copy; the
//! in-memory map mirrors it and is only swapped after the file has been
//! atomically replaced.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::config::INDEX_TEMP_FILENAME;
use crate::error::Result;
use crate::fault::FaultInjector;
use crate::log::{RecordLog, ReplayEntry, ReplayStats};

use super::snapshot;

/// Durable mapping from key to the offset of its latest committed record
///
/// ## Concurrency:
/// - `entries`: RwLock, readers never wait on file I/O
/// - `persist_lock`: serializes rewrites of the index file
pub struct KeyIndex {
    path: PathBuf,
    temp_path: PathBuf,
    entries: RwLock<BTreeMap<String, u64>>,
    persist_lock: Mutex<()>,
    faults: Option<Arc<FaultInjector>>,
}

impl KeyIndex {
    /// Open the index file at `path`, creating an empty index if absent
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_faults(path, None)
    }

    pub(crate) fn open_with_faults(
        path: &Path,
        faults: Option<Arc<FaultInjector>>,
    ) -> Result<Self> {
        let entries = snapshot::load(path)?;
        let temp_path = path
            .parent()
            .map(|dir| dir.join(INDEX_TEMP_FILENAME))
            .unwrap_or_else(|| PathBuf::from(INDEX_TEMP_FILENAME));

        tracing::debug!(path = %path.display(), entries = entries.len(), "Loaded key index");

        Ok(Self {
            path: path.to_path_buf(),
            temp_path,
            entries: RwLock::new(entries),
            persist_lock: Mutex::new(()),
            faults,
        })
    }

    /// Offset of the latest committed record for `key`
    pub fn lookup(&self, key: &str) -> Option<u64> {
        self.entries.read().get(key).copied()
    }

    /// Like `lookup`, but runs `on_hit` while the mapping is still pinned
    ///
    /// No upsert for `key` can become visible until `on_hit` returns, which
    /// lets the read path populate the cache without racing a newer write.
    pub fn lookup_with<F>(&self, key: &str, on_hit: F) -> Option<u64>
    where
        F: FnOnce(u64),
    {
        let entries = self.entries.read();
        let offset = entries.get(key).copied()?;
        on_hit(offset);
        Some(offset)
    }

    /// Durably map `key` to `offset`
    ///
    /// The whole index is rewritten to a temp file and renamed into place.
    /// On error neither the file nor the in-memory map has changed.
    pub fn upsert(&self, key: &str, offset: u64) -> Result<()> {
        let _persist = self.persist_lock.lock();
        {
            let entries = self.entries.read();
            snapshot::write_atomic(
                &self.path,
                &self.temp_path,
                &entries,
                Some((key, offset)),
                self.faults.as_ref(),
            )?;
        }
        self.entries.write().insert(key.to_string(), offset);
        Ok(())
    }

    /// Durably replace the whole mapping
    pub fn replace_all(&self, entries: BTreeMap<String, u64>) -> Result<()> {
        let _persist = self.persist_lock.lock();
        snapshot::write_atomic(
            &self.path,
            &self.temp_path,
            &entries,
            None,
            self.faults.as_ref(),
        )?;
        *self.entries.write() = entries;
        Ok(())
    }

    /// Replay `log` from the start and replace the index with the result
    pub fn rebuild_from_log(&self, log: &RecordLog) -> Result<ReplayStats> {
        let (entries, stats) = mapping_from_log(log, |_| {})?;
        self.replace_all(entries)?;
        Ok(stats)
    }

    /// Copy of the current mapping
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.entries.read().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Last-write-wins mapping obtained by replaying `log` in order
pub fn mapping_from_log<F>(
    log: &RecordLog,
    mut observe: F,
) -> Result<(BTreeMap<String, u64>, ReplayStats)>
where
    F: FnMut(&ReplayEntry),
{
    let mut replay = log.replay()?;
    let mut entries = BTreeMap::new();

    for entry in replay.by_ref() {
        let entry = entry?;
        observe(&entry);
        entries.insert(entry.record.key, entry.offset);
    }

    Ok((entries, replay.stats().clone()))
}
