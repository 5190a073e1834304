//! Record Log
//!
//! Append-only file of record lines; the single source of truth for values.

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::{CaskError, Result};
use crate::fault::{self, FaultInjector, FaultPoint};

use super::record::{Record, DELIMITER};
use super::replay::LogReplayer;

/// Append side of the log. Only the write coordinator drives it.
struct LogWriter {
    file: File,
    /// Length of the file including every completed append
    tail: u64,
    /// Tail captured right before the last append that has not been
    /// committed or rolled back yet
    pending: Option<u64>,
}

impl LogWriter {
    fn truncate(&mut self, len: u64) -> io::Result<()> {
        self.file.set_len(len)?;
        self.file.sync_data()?;
        self.tail = len;
        Ok(())
    }
}

/// Durable, append-only sequence of records
///
/// ## Concurrency:
/// - Appends and rollbacks go through `writer` (serialized by the caller's
///   write lock as well)
/// - Reads use a separate handle behind `reader`, because seeking needs
///   `&mut File`
/// - `len` is the published length readers bound their reads by
pub struct RecordLog {
    path: PathBuf,
    writer: Mutex<LogWriter>,
    reader: Mutex<BufReader<File>>,
    len: AtomicU64,
    faults: Option<Arc<FaultInjector>>,
}

impl RecordLog {
    /// Open or create the log at `path`
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_faults(path, None)
    }

    pub(crate) fn open_with_faults(
        path: &Path,
        faults: Option<Arc<FaultInjector>>,
    ) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(path)?;
        let tail = file.metadata()?.len();
        let reader = File::open(path)?;

        tracing::debug!(path = %path.display(), len = tail, "Opened record log");

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(LogWriter {
                file,
                tail,
                pending: None,
            }),
            reader: Mutex::new(BufReader::new(reader)),
            len: AtomicU64::new(tail),
            faults,
        })
    }

    /// Append a record and fsync it. Returns the offset of its first byte.
    ///
    /// The pre-append length is remembered so that `rollback_last` can cut
    /// the record off again. If the write itself fails, the partial bytes are
    /// truncated before the error is returned. When they cannot be removed
    /// the error is `Corruption` and the log length is resynced from disk.
    pub fn append(&self, record: &Record) -> Result<u64> {
        let line = record.encode();
        let mut writer = self.writer.lock();
        let offset = writer.tail;

        let written = writer
            .file
            .write_all(&line)
            .and_then(|_| fault::check(self.faults.as_ref(), FaultPoint::AppendSync))
            .and_then(|_| writer.file.sync_data());

        if let Err(e) = written {
            tracing::warn!(offset, error = %e, "Log append failed, discarding partial record");
            writer.pending = None;

            let discarded = fault::check(self.faults.as_ref(), FaultPoint::DiscardPartial)
                .and_then(|_| writer.truncate(offset));
            if let Err(trunc) = discarded {
                // The file is in append mode, so the next record lands after
                // whatever is on disk; offsets must follow the real length
                let actual = writer.file.metadata().map(|m| m.len()).unwrap_or(offset);
                writer.tail = actual;
                self.len.store(actual, Ordering::SeqCst);
                tracing::error!(offset, len = actual, error = %trunc, "Failed to discard partial record");
                return Err(CaskError::Corruption(format!(
                    "append at offset {} failed ({}) and its partial bytes could not be removed ({})",
                    offset, e, trunc
                )));
            }
            return Err(CaskError::Io(e));
        }

        writer.tail = offset + line.len() as u64;
        writer.pending = Some(offset);
        self.len.store(writer.tail, Ordering::SeqCst);

        tracing::trace!(key = %record.key, offset, "Appended record");
        Ok(offset)
    }

    /// Truncate the log back to its length before the last append
    ///
    /// Only valid as the next operation after an `append` whose transaction
    /// failed downstream.
    pub fn rollback_last(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        let pre_append = writer.pending.take().ok_or_else(|| {
            CaskError::Io(io::Error::new(
                io::ErrorKind::InvalidInput,
                "rollback requested without a pending append",
            ))
        })?;

        fault::check(self.faults.as_ref(), FaultPoint::Rollback)?;
        writer.truncate(pre_append)?;
        self.len.store(pre_append, Ordering::SeqCst);

        tracing::debug!(len = pre_append, "Rolled back last append");
        Ok(())
    }

    /// Mark the last append as committed; it can no longer be rolled back
    pub fn commit_last(&self) {
        self.writer.lock().pending = None;
    }

    /// Read the record starting at `offset`
    pub fn read_at(&self, offset: u64) -> Result<Record> {
        let len = self.len();
        if offset >= len {
            return Err(CaskError::RecordNotFound { offset });
        }

        let mut line = Vec::new();
        {
            let mut reader = self.reader.lock();
            reader.seek(SeekFrom::Start(offset))?;
            reader
                .by_ref()
                .take(len - offset)
                .read_until(DELIMITER, &mut line)?;
        }

        if line.last() != Some(&DELIMITER) {
            return Err(CaskError::RecordNotFound { offset });
        }

        Record::decode(&line).ok_or(CaskError::RecordNotFound { offset })
    }

    /// Sequentially replay the log from offset 0
    pub fn replay(&self) -> Result<LogReplayer> {
        LogReplayer::open(&self.path)
    }

    /// Cut away bytes past `len` (torn tail left by a crash mid-append)
    pub(crate) fn truncate_to(&self, len: u64) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.truncate(len)?;
        writer.pending = None;
        self.len.store(len, Ordering::SeqCst);
        Ok(())
    }

    /// Current committed length in bytes
    pub fn len(&self) -> u64 {
        self.len.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Force everything to stable storage
    pub fn sync(&self) -> Result<()> {
        self.writer.lock().file.sync_all()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
