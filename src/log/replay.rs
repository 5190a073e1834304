//! Log Replay
//!
//! Sequential scan of the record log from offset 0, used to rebuild the index
//! and to verify it.
//!
//! Each record's offset is the running byte position of the scan. A final
//! line without its delimiter is a torn append (crash between write and
//! fsync): the scan stops there and reports where the torn bytes begin.
//! Complete lines that do not parse are counted and skipped.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::Result;

use super::record::{Record, DELIMITER};

/// A record together with the offset it was found at
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayEntry {
    pub offset: u64,
    pub record: Record,
}

/// Summary of a replay pass
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReplayStats {
    /// Number of well-formed records seen
    pub records: u64,

    /// Number of complete lines that failed to parse
    pub malformed: u64,

    /// Offset where an unterminated final line starts, if any
    pub torn_tail: Option<u64>,

    /// Bytes covered by complete lines
    pub valid_len: u64,
}

/// Iterator over every well-formed record in the log
pub struct LogReplayer {
    reader: BufReader<File>,
    position: u64,
    stats: ReplayStats,
    done: bool,
}

impl LogReplayer {
    /// Open a replay over the log file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            reader: BufReader::new(file),
            position: 0,
            stats: ReplayStats::default(),
            done: false,
        })
    }

    /// Statistics gathered so far; final once the iterator is exhausted
    pub fn stats(&self) -> &ReplayStats {
        &self.stats
    }

    /// Drain the replay, returning every entry in log order
    pub fn collect_all(mut self) -> Result<(Vec<ReplayEntry>, ReplayStats)> {
        let mut entries = Vec::new();
        for entry in self.by_ref() {
            entries.push(entry?);
        }
        Ok((entries, self.stats))
    }

    fn read_line(&mut self) -> Result<Option<ReplayEntry>> {
        let mut line = Vec::new();
        loop {
            line.clear();
            let offset = self.position;
            let read = self.reader.read_until(DELIMITER, &mut line)?;
            if read == 0 {
                return Ok(None);
            }

            if line.last() != Some(&DELIMITER) {
                tracing::warn!(offset, bytes = read, "Unterminated record at end of log");
                self.stats.torn_tail = Some(offset);
                return Ok(None);
            }

            self.position += read as u64;
            self.stats.valid_len = self.position;

            match Record::decode(&line) {
                Some(record) => {
                    self.stats.records += 1;
                    return Ok(Some(ReplayEntry { offset, record }));
                }
                None => {
                    tracing::warn!(offset, "Skipping malformed record");
                    self.stats.malformed += 1;
                }
            }
        }
    }
}

impl Iterator for LogReplayer {
    type Item = Result<ReplayEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.read_line() {
            Ok(Some(entry)) => Some(Ok(entry)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
