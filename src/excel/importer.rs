//! Excel importer: billing sheets, the P&L ledger and the dump log

use crate::error::{ReviewError, ReviewResult};
use crate::types::{normalize_column_name, CellValue, Row, Sheet, Table};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use chrono::{Duration, NaiveDate};
use std::io::BufReader;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Header row of a billing sheet (0-based); row 0 carries the sheet title
pub const SHEET_HEADER_ROW: u32 = 1;

/// Column whose text is kept exactly as typed
const DATE_COLUMN: &str = "date";

/// Reads workbooks into [`Sheet`]s and [`Table`]s
pub struct ExcelImporter {
    path: PathBuf,
}

impl ExcelImporter {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn open(&self) -> ReviewResult<Xlsx<BufReader<File>>> {
        open_workbook(&self.path).map_err(|e| {
            ReviewError::Import(format!("Failed to open {}: {}", self.path.display(), e))
        })
    }

    fn range(&self, workbook: &mut Xlsx<BufReader<File>>, sheet: &str) -> ReviewResult<Range<Data>> {
        workbook.worksheet_range(sheet).map_err(|e| {
            ReviewError::Import(format!(
                "Failed to read sheet '{}' of {}: {}",
                sheet,
                self.path.display(),
                e
            ))
        })
    }

    pub fn sheet_names(&self) -> ReviewResult<Vec<String>> {
        Ok(self.open()?.sheet_names().to_vec())
    }

    /// Load one billing sheet.
    ///
    /// The header sits on the second sheet row. Column names are normalized
    /// and text cells are trimmed and lower-cased, except in `date`. Rows
    /// with no value at all are dropped but keep their physical index.
    pub fn read_sheet(&self, sheet_name: &str) -> ReviewResult<Sheet> {
        let mut workbook = self.open()?;
        if !workbook.sheet_names().iter().any(|s| s == sheet_name) {
            return Err(ReviewError::Import(format!(
                "Sheet '{}' not found in {}",
                sheet_name,
                self.path.display()
            )));
        }
        let range = self.range(&mut workbook, sheet_name)?;

        let (Some((_, first_col)), Some((last_row, last_col))) = (range.start(), range.end()) else {
            return Err(ReviewError::Import(format!("Sheet '{}' is empty", sheet_name)));
        };
        if last_row < SHEET_HEADER_ROW {
            return Err(ReviewError::Import(format!(
                "Sheet '{}' has no header row",
                sheet_name
            )));
        }

        let headers = read_headers(&range, SHEET_HEADER_ROW, first_col, last_col);
        let mut sheet = Sheet::new(sheet_name, headers.iter().map(|(_, n)| n.clone()).collect());

        for abs_row in (SHEET_HEADER_ROW + 1)..=last_row {
            let index = (abs_row - SHEET_HEADER_ROW - 1) as usize;
            let mut row = Row::new(index);
            let mut any = false;
            for (abs_col, name) in &headers {
                let value = range
                    .get_value((abs_row, *abs_col))
                    .map(cell_value)
                    .unwrap_or(CellValue::Empty);
                let value = if name == DATE_COLUMN {
                    value
                } else {
                    normalize_text(value)
                };
                any |= !value.is_empty();
                row.set(name, value);
            }
            if any {
                sheet.push_row(row);
            }
        }

        debug!(
            sheet = sheet_name,
            columns = sheet.columns.len(),
            rows = sheet.row_count(),
            "sheet loaded"
        );
        Ok(sheet)
    }

    /// Load the first worksheet as a [`Table`] with its header on the first
    /// used row. Values are kept as stored.
    pub fn read_table(&self) -> ReviewResult<Table> {
        let mut workbook = self.open()?;
        let name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ReviewError::Import(format!("{} has no sheets", self.path.display())))?;
        let range = self.range(&mut workbook, &name)?;

        let (Some((first_row, first_col)), Some((last_row, last_col))) = (range.start(), range.end()) else {
            return Ok(Table::new(name, Vec::new()));
        };

        let mut columns = Vec::new();
        let mut positions = Vec::new();
        for abs_col in first_col..=last_col {
            let header = range
                .get_value((first_row, abs_col))
                .map(cell_value)
                .unwrap_or(CellValue::Empty);
            if header.is_empty() {
                continue;
            }
            columns.push(header.display_text().trim().to_string());
            positions.push(abs_col);
        }

        let mut table = Table::new(name, columns);
        for abs_row in (first_row + 1)..=last_row {
            let row: Vec<CellValue> = positions
                .iter()
                .map(|c| {
                    range
                        .get_value((abs_row, *c))
                        .map(cell_value)
                        .unwrap_or(CellValue::Empty)
                })
                .collect();
            if row.iter().any(|v| !v.is_empty()) {
                table.rows.push(row);
            }
        }

        debug!(
            workbook = %self.path.display(),
            rows = table.row_count(),
            "table loaded"
        );
        Ok(table)
    }
}

/// Normalized header names with their absolute column, first of any
/// duplicate wins
fn read_headers(range: &Range<Data>, row: u32, first_col: u32, last_col: u32) -> Vec<(u32, String)> {
    let mut headers: Vec<(u32, String)> = Vec::new();
    for abs_col in first_col..=last_col {
        let Some(cell) = range.get_value((row, abs_col)) else {
            continue;
        };
        let name = normalize_column_name(&cell_value(cell).display_text());
        if name.is_empty() {
            continue;
        }
        if headers.iter().any(|(_, n)| *n == name) {
            warn!(column = %name, "duplicate column header, later copy ignored");
            continue;
        }
        headers.push((abs_col, name));
    }
    headers
}

fn normalize_text(value: CellValue) -> CellValue {
    match value {
        CellValue::Text(s) => CellValue::Text(s.trim().to_lowercase()),
        other => other,
    }
}

/// Convert a calamine cell
pub fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::DateTime(dt) if dt.is_duration() => CellValue::Number(dt.as_f64()),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(CellValue::Date)
            .unwrap_or(CellValue::Number(dt.as_f64())),
        Data::DateTimeIso(s) => s
            .get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Empty,
    }
}

fn excel_epoch() -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(1899, 12, 30)
}

/// Serial day number (1900 date system) to a calendar date
pub fn excel_serial_to_date(serial: f64) -> Option<NaiveDate> {
    if !serial.is_finite() || serial < 0.0 {
        return None;
    }
    excel_epoch()?.checked_add_signed(Duration::days(serial.floor() as i64))
}

/// Calendar date to its serial day number
pub fn date_to_excel_serial(date: NaiveDate) -> f64 {
    excel_epoch()
        .map(|epoch| (date - epoch).num_days() as f64)
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_dates() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(date_to_excel_serial(date), 45306.0);
        assert_eq!(excel_serial_to_date(45306.0), Some(date));
        assert_eq!(excel_serial_to_date(45306.75), Some(date));
        assert_eq!(excel_serial_to_date(-1.0), None);
    }

    #[test]
    fn test_cell_conversion() {
        assert_eq!(cell_value(&Data::Int(4)), CellValue::Number(4.0));
        assert_eq!(cell_value(&Data::Empty), CellValue::Empty);
        assert_eq!(
            cell_value(&Data::DateTimeIso("2024-01-15T00:00:00".into())),
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
        assert_eq!(
            normalize_text(CellValue::Text("  Regular ".into())),
            CellValue::Text("regular".into())
        );
    }
}
