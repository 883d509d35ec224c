//! Exclusive write lock for shared workbooks
//!
//! A [`WorkbookLock`] holds two things for as long as it lives: a
//! process-wide mutex, so threads of one process take turns, and a
//! `<workbook>.lock` sidecar file created with `create_new`, so separate
//! processes do too. Both are released when the guard drops.

use crate::error::{ReviewError, ReviewResult};
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, warn};

static WRITE_LOCK: Mutex<()> = Mutex::new(());

#[derive(Debug)]
pub struct WorkbookLock {
    lock_path: PathBuf,
    _guard: MutexGuard<'static, ()>,
}

impl WorkbookLock {
    /// Take the lock for `workbook`. A lock file left by another writer is
    /// an error; there is no waiting.
    pub fn acquire(workbook: &Path) -> ReviewResult<Self> {
        let guard = WRITE_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        let lock_path = lock_path_for(workbook);

        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&lock_path)
        {
            Ok(mut file) => {
                // Owner pid, for whoever finds a stale lock
                if let Err(e) = writeln!(file, "{}", std::process::id()) {
                    drop(file);
                    if let Err(cleanup) = std::fs::remove_file(&lock_path) {
                        warn!(lock = %lock_path.display(), "could not remove lock file: {}", cleanup);
                    }
                    return Err(e.into());
                }
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(ReviewError::Locked(workbook.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        debug!(lock = %lock_path.display(), "workbook lock taken");
        Ok(Self {
            lock_path,
            _guard: guard,
        })
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for WorkbookLock {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.lock_path) {
            warn!(lock = %self.lock_path.display(), "could not remove lock file: {}", e);
        } else {
            debug!(lock = %self.lock_path.display(), "workbook lock released");
        }
    }
}

/// `<workbook>.lock` next to the workbook
pub fn lock_path_for(workbook: &Path) -> PathBuf {
    let mut name = workbook.as_os_str().to_owned();
    name.push(".lock");
    PathBuf::from(name)
}
