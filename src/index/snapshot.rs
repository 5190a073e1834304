//! Index file persistence
//!
//! The index file holds one `<key>=<offset>\n` line per key. It is never
//! edited in place: a complete new file is written next to it, fsynced and
//! renamed over the old one, so a reader only ever sees the old or the new
//! index in full.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use crate::error::{CaskError, Result};
use crate::fault::{self, FaultInjector, FaultPoint};
use crate::log::record::{decode_line, encode_line};

/// Load the index file. A missing file is an empty index.
pub(crate) fn load(path: &Path) -> Result<BTreeMap<String, u64>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(BTreeMap::new()),
        Err(e) => return Err(e.into()),
    };

    let mut entries = BTreeMap::new();
    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    let mut line_no = 0;

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        line_no += 1;

        let (key, offset) = decode_line(&line).ok_or_else(|| CaskError::MalformedIndex {
            line: line_no,
            reason: "expected <key>=<offset>".to_string(),
        })?;
        let offset = offset.parse::<u64>().map_err(|e| CaskError::MalformedIndex {
            line: line_no,
            reason: format!("bad offset {:?}: {}", offset, e),
        })?;

        entries.insert(key, offset);
    }

    Ok(entries)
}

/// Write `entries` (plus an optional override) to `temp_path`, then rename
/// it over `path`
///
/// `changed` is merged in key order without copying the map, so an upsert
/// costs one pass over the existing entries. Returns `Err` only if the old
/// file is still in place.
pub(crate) fn write_atomic(
    path: &Path,
    temp_path: &Path,
    entries: &BTreeMap<String, u64>,
    changed: Option<(&str, u64)>,
    faults: Option<&Arc<FaultInjector>>,
) -> io::Result<()> {
    let result = write_temp(temp_path, entries, changed)
        .and_then(|_| fault::check(faults, FaultPoint::IndexRename))
        .and_then(|_| fs::rename(temp_path, path));

    if result.is_err() {
        if let Err(e) = fs::remove_file(temp_path) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(path = %temp_path.display(), error = %e, "Failed to remove index temp file");
            }
        }
        return result;
    }

    // The new index is already visible, so the update has happened and must
    // not be reported as failed
    if let Err(e) =
        fault::check(faults, FaultPoint::DirSync).and_then(|_| sync_parent_dir(path))
    {
        tracing::warn!(path = %path.display(), error = %e, "Index replaced but directory sync failed");
    }
    Ok(())
}

fn write_temp(
    temp_path: &Path,
    entries: &BTreeMap<String, u64>,
    changed: Option<(&str, u64)>,
) -> io::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(temp_path)?;
    let mut writer = BufWriter::new(file);
    let mut line = Vec::new();
    let mut pending = changed;

    for (key, &offset) in entries {
        if let Some((new_key, new_offset)) = pending {
            if new_key <= key.as_str() {
                write_entry(&mut writer, &mut line, new_key, new_offset)?;
                pending = None;
                if new_key == key {
                    continue;
                }
            }
        }
        write_entry(&mut writer, &mut line, key, offset)?;
    }
    if let Some((new_key, new_offset)) = pending {
        write_entry(&mut writer, &mut line, new_key, new_offset)?;
    }

    writer.flush()?;
    writer.get_ref().sync_all()
}

fn write_entry(
    writer: &mut BufWriter<File>,
    line: &mut Vec<u8>,
    key: &str,
    offset: u64,
) -> io::Result<()> {
    line.clear();
    encode_line(line, key, &offset.to_string());
    writer.write_all(line)
}

/// Make the rename itself durable
#[cfg(unix)]
fn sync_parent_dir(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => File::open(dir)?.sync_all(),
        _ => Ok(()),
    }
}

#[cfg(not(unix))]
fn sync_parent_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}
