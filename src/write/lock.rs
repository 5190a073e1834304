//! Write lock
//!
//! One write transaction at a time: an in-process mutex plus an exclusive
//! advisory lock on a zero-byte marker file, both held by a guard that
//! releases them on drop.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::{Mutex, MutexGuard};

use crate::error::Result;

/// Exclusive ownership of the mutation path
pub struct WriteLock {
    path: PathBuf,
    file: Mutex<File>,
}

impl WriteLock {
    /// Open (creating if needed) the lock file at `path`
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
        })
    }

    /// Block until this thread owns the write path
    ///
    /// The in-process mutex is taken first, then the file lock. If the file
    /// lock fails, the mutex is released before the error is returned.
    pub fn acquire(&self) -> Result<WriteGuard<'_>> {
        let file = self.file.lock();
        FileExt::lock_exclusive(&*file)?;
        tracing::trace!(path = %self.path.display(), "Write lock acquired");
        Ok(WriteGuard {
            file,
            path: &self.path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Held for the full duration of one write transaction
pub struct WriteGuard<'a> {
    file: MutexGuard<'a, File>,
    path: &'a Path,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&*self.file) {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to release write lock file");
        } else {
            tracing::trace!(path = %self.path.display(), "Write lock released");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    #[test]
    fn test_lock_file_is_created_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("write.lock");
        let lock = WriteLock::open(&path).unwrap();

        drop(lock.acquire().unwrap());
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[test]
    fn test_guard_release_allows_reacquire() {
        let temp = TempDir::new().unwrap();
        let lock = WriteLock::open(&temp.path().join("write.lock")).unwrap();

        for _ in 0..3 {
            let _guard = lock.acquire().unwrap();
        }
    }

    #[test]
    fn test_at_most_one_holder() {
        let temp = TempDir::new().unwrap();
        let lock = Arc::new(WriteLock::open(&temp.path().join("write.lock")).unwrap());
        let inside = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    for _ in 0..50 {
                        let _guard = lock.acquire().unwrap();
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
