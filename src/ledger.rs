//! P&L ledger reconciliation
//!
//! Rows of the ledger are keyed by `(cost centre, month)`. Punching writes
//! freshly aggregated metrics into the tracked columns of matching rows;
//! clearing blanks those columns again. Both check every key before touching
//! anything, so a bad key never leaves the ledger half updated.

use crate::core::Metrics;
use crate::error::{ReviewError, ReviewResult};
use crate::rules::LedgerMapping;
use crate::store;
use crate::types::{CellValue, LedgerKey, Table};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

pub const KEY_COLUMN: &str = "cost centre";
pub const MONTH_COLUMN: &str = "month";
pub const SITE_COLUMN: &str = "site name";

/// A ledger row whose tracked columns changed
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChangedRow {
    pub cost_centre: CellValue,
    pub month: CellValue,
    pub site_name: CellValue,
    /// Tracked column → value after the update
    pub updated: Vec<(String, CellValue)>,
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub merged: Table,
    pub changes: Vec<ChangedRow>,
}

/// Ledger rows by key; a key on more than one row maps to all of them
fn index_rows(ledger: &Table) -> ReviewResult<BTreeMap<LedgerKey, Vec<usize>>> {
    let key_col = ledger.require_column(KEY_COLUMN)?;
    let month_col = ledger.require_column(MONTH_COLUMN)?;

    let mut index: BTreeMap<LedgerKey, Vec<usize>> = BTreeMap::new();
    for row in 0..ledger.row_count() {
        let (id, month) = (ledger.cell(row, key_col), ledger.cell(row, month_col));
        if id.is_empty() || month.is_empty() {
            continue;
        }
        index
            .entry(LedgerKey::from_cells(id, month))
            .or_default()
            .push(row);
    }
    Ok(index)
}

/// Resolve every key to its single ledger row, or fail naming the culprits
fn locate<'a, I>(ledger: &Table, keys: I) -> ReviewResult<Vec<(&'a LedgerKey, usize)>>
where
    I: IntoIterator<Item = &'a LedgerKey>,
{
    let index = index_rows(ledger)?;
    let mut found = Vec::new();
    let mut unmatched = Vec::new();
    for key in keys {
        match index.get(key).map(Vec::as_slice) {
            None | Some([]) => unmatched.push(key.to_string()),
            Some([row]) => found.push((key, *row)),
            Some(_) => return Err(ReviewError::DuplicateLedgerKey(key.to_string())),
        }
    }
    if !unmatched.is_empty() {
        return Err(ReviewError::UnmatchedKeys(unmatched));
    }
    Ok(found)
}

/// Tracked column indices, in mapping order
fn tracked_columns(ledger: &Table, mapping: &LedgerMapping) -> ReviewResult<Vec<(String, usize)>> {
    mapping
        .entries
        .iter()
        .map(|(metric, column)| Ok((metric.clone(), ledger.require_column(column)?)))
        .collect()
}

/// Merge per-key metrics into the ledger.
///
/// A metric present for a key replaces the ledger value; an absent metric
/// keeps it. Running the same input twice changes nothing the second time.
pub fn reconcile(
    local: &BTreeMap<LedgerKey, Metrics>,
    ledger: &Table,
    mapping: &LedgerMapping,
) -> ReviewResult<Reconciliation> {
    let tracked = tracked_columns(ledger, mapping)?;
    let rows = locate(ledger, local.keys())?;

    let mut merged = ledger.clone();
    for (key, row) in &rows {
        let metrics = &local[*key];
        for (metric, col) in &tracked {
            if let Some(value) = metrics.get(metric) {
                merged.set_cell(*row, *col, CellValue::Number(*value));
            }
        }
    }

    let changes = changed_rows(ledger, &merged, rows.iter().map(|(_, r)| *r), &tracked);
    debug!(keys = rows.len(), changed = changes.len(), "ledger reconciled");
    Ok(Reconciliation { merged, changes })
}

/// Blank the tracked columns of every key's row
pub fn clear(keys: &[LedgerKey], ledger: &Table, mapping: &LedgerMapping) -> ReviewResult<Reconciliation> {
    let tracked = tracked_columns(ledger, mapping)?;
    let rows = locate(ledger, keys)?;

    let mut merged = ledger.clone();
    for (_, row) in &rows {
        for (_, col) in &tracked {
            merged.set_cell(*row, *col, CellValue::Empty);
        }
    }

    let changes = changed_rows(ledger, &merged, rows.iter().map(|(_, r)| *r), &tracked);
    Ok(Reconciliation { merged, changes })
}

fn changed_rows<I>(before: &Table, after: &Table, rows: I, tracked: &[(String, usize)]) -> Vec<ChangedRow>
where
    I: IntoIterator<Item = usize>,
{
    let site_col = after.column_index(SITE_COLUMN);
    let key_col = after.column_index(KEY_COLUMN);
    let month_col = after.column_index(MONTH_COLUMN);
    let pick = |row: usize, col: Option<usize>| {
        col.map(|c| after.cell(row, c).clone())
            .unwrap_or(CellValue::Empty)
    };

    let mut rows: Vec<usize> = rows.into_iter().collect();
    rows.sort_unstable();
    rows.into_iter()
        .filter(|&row| {
            tracked
                .iter()
                .any(|(_, col)| before.cell(row, *col) != after.cell(row, *col))
        })
        .map(|row| ChangedRow {
            cost_centre: pick(row, key_col),
            month: pick(row, month_col),
            site_name: pick(row, site_col),
            updated: tracked
                .iter()
                .map(|(_, col)| (after.columns[*col].clone(), after.cell(row, *col).clone()))
                .collect(),
        })
        .collect()
}

/// Punch metrics into the ledger workbook at `path`
pub fn punch(
    path: &Path,
    local: &BTreeMap<LedgerKey, Metrics>,
    mapping: &LedgerMapping,
) -> ReviewResult<Vec<ChangedRow>> {
    let changes = store::update_table(path, |ledger| {
        let result = reconcile(local, ledger, mapping)?;
        Ok((result.merged, result.changes))
    })?;
    info!(ledger = %path.display(), changed = changes.len(), "ledger punched");
    Ok(changes)
}

/// Clear the tracked columns of `keys` in the ledger workbook at `path`
pub fn clear_in(path: &Path, keys: &[LedgerKey], mapping: &LedgerMapping) -> ReviewResult<Vec<ChangedRow>> {
    let changes = store::update_table(path, |ledger| {
        let result = clear(keys, ledger, mapping)?;
        Ok((result.merged, result.changes))
    })?;
    info!(ledger = %path.display(), cleared = keys.len(), "ledger cleared");
    Ok(changes)
}
