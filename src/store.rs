//! Read-modify-write of shared workbooks
//!
//! Every change to the P&L ledger or the dump runs through [`update_table`]:
//! lock, read, apply, write to a sibling temp file, rename over the original,
//! open up permissions. If the change fails nothing is written.

use crate::error::ReviewResult;
use crate::excel::{ExcelExporter, ExcelImporter};
use crate::lock::WorkbookLock;
use crate::types::Table;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Shared workbooks stay writable by every user of the machine
#[cfg(unix)]
const SHARED_MODE: u32 = 0o666;

pub fn load_table(path: &Path) -> ReviewResult<Table> {
    ExcelImporter::new(path).read_table()
}

/// Replace the workbook at `path` with `table`
pub fn save_table(path: &Path, table: &Table) -> ReviewResult<()> {
    let temp = temp_path_for(path);
    if let Err(e) = ExcelExporter::new().write_table(table, &temp) {
        let _ = fs::remove_file(&temp);
        return Err(e);
    }
    if let Err(e) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(e.into());
    }
    set_shared_permissions(path)?;
    debug!(workbook = %path.display(), rows = table.row_count(), "workbook saved");
    Ok(())
}

/// Apply `change` to the table stored at `path` while holding its lock.
///
/// `change` returns the new table and a value handed back to the caller.
pub fn update_table<T, F>(path: &Path, change: F) -> ReviewResult<T>
where
    F: FnOnce(&Table) -> ReviewResult<(Table, T)>,
{
    let _lock = WorkbookLock::acquire(path)?;
    let current = load_table(path)?;
    let (updated, outcome) = change(&current)?;
    save_table(path, &updated)?;
    info!(workbook = %path.display(), "workbook updated");
    Ok(outcome)
}

/// `.<name>.tmp` next to the workbook, so the rename stays on one filesystem
fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook.xlsx".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

#[cfg(unix)]
fn set_shared_permissions(path: &Path) -> ReviewResult<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(SHARED_MODE))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_shared_permissions(_path: &Path) -> ReviewResult<()> {
    Ok(())
}
