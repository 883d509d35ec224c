//! Excel exporter: ledger/log tables and the review report workbook

use super::importer::date_to_excel_serial;
use crate::error::{ReviewError, ReviewResult};
use crate::review::Review;
use crate::types::{CellValue, Table};
use rust_xlsxwriter::{Format as CellFormat, Workbook, Worksheet};
use std::path::Path;

/// Excel caps worksheet names at 31 characters
const MAX_SHEET_NAME: usize = 31;

const DATE_FORMAT: &str = "yyyy-mm-dd";

pub const SUMMARY_SHEET: &str = "Summary";
pub const MISMATCHES_SHEET: &str = "Mismatches";
pub const PIVOT_SHEET: &str = "Pivot";

/// Sheets every review report may carry ahead of its listings
pub const REPORT_SHEETS: [&str; 3] = [SUMMARY_SHEET, MISMATCHES_SHEET, PIVOT_SHEET];

/// Writes tables and reports as .xlsx workbooks
pub struct ExcelExporter {
    header: CellFormat,
    date: CellFormat,
}

impl Default for ExcelExporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExcelExporter {
    pub fn new() -> Self {
        Self {
            header: CellFormat::new().set_bold(),
            date: CellFormat::new().set_num_format(DATE_FORMAT),
        }
    }

    /// Write `table` as the only worksheet of a new workbook at `path`.
    ///
    /// Headers are written exactly as held so a read/write cycle keeps them.
    pub fn write_table(&self, table: &Table, path: &Path) -> ReviewResult<()> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        let name = if table.name.is_empty() { "Sheet1" } else { table.name.as_str() };
        worksheet
            .set_name(sheet_name(name))
            .map_err(|e| ReviewError::Export(format!("Failed to set worksheet name: {}", e)))?;

        for (col, header) in table.columns.iter().enumerate() {
            worksheet
                .write_string(0, col as u16, header)
                .map_err(|e| ReviewError::Export(format!("Failed to write header: {}", e)))?;
        }
        for (i, row) in table.rows.iter().enumerate() {
            for (col, value) in row.iter().enumerate() {
                self.write_cell(worksheet, i as u32 + 1, col as u16, value)?;
            }
        }

        save(&mut workbook, path)
    }

    /// Write a review as a multi-sheet report workbook
    pub fn export_review(&self, review: &Review, path: &Path) -> ReviewResult<()> {
        let mut workbook = Workbook::new();

        self.export_summary(&mut workbook, review)?;
        self.export_mismatches(&mut workbook, review)?;
        if !review.pivot_columns.is_empty() {
            self.export_pivot(&mut workbook, review)?;
        }
        for listing in &review.listings {
            let ws = self.add_sheet(&mut workbook, &listing.name)?;
            let mut headers = vec!["row".to_string()];
            headers.extend(listing.columns.iter().cloned());
            self.write_headers(ws, &headers)?;
            for (i, row) in listing.rows.iter().enumerate() {
                let r = i as u32 + 1;
                self.write_cell(ws, r, 0, &CellValue::Number(row.row_number as f64))?;
                for (c, value) in row.values.iter().enumerate() {
                    self.write_cell(ws, r, c as u16 + 1, value)?;
                }
            }
        }

        save(&mut workbook, path)
    }

    fn export_summary(&self, workbook: &mut Workbook, review: &Review) -> ReviewResult<()> {
        let ws = self.add_sheet(workbook, SUMMARY_SHEET)?;
        self.write_headers(ws, &["item".to_string(), "value".to_string()])?;

        let mut lines: Vec<(String, CellValue)> = vec![
            ("format".into(), CellValue::Text(review.format.clone())),
            ("sheet".into(), CellValue::Text(review.sheet.clone())),
            ("month".into(), CellValue::Text(review.month.clone())),
            ("rows".into(), CellValue::Number(review.rows as f64)),
            (
                "mismatches".into(),
                CellValue::Number(review.evaluation.mismatches.len() as f64),
            ),
            (
                "row errors".into(),
                CellValue::Number(review.evaluation.row_errors.len() as f64),
            ),
        ];
        for line in &review.aggregates {
            lines.push((line.label.clone(), CellValue::Number(line.value)));
        }

        for (i, (item, value)) in lines.iter().enumerate() {
            let r = i as u32 + 1;
            self.write_cell(ws, r, 0, &CellValue::Text(item.clone()))?;
            self.write_cell(ws, r, 1, value)?;
        }
        Ok(())
    }

    fn export_mismatches(&self, workbook: &mut Workbook, review: &Review) -> ReviewResult<()> {
        let ws = self.add_sheet(workbook, MISMATCHES_SHEET)?;
        self.write_headers(
            ws,
            &[
                "row".to_string(),
                "date".to_string(),
                "column".to_string(),
                "expected".to_string(),
                "actual".to_string(),
            ],
        )?;
        let mut r = 1;
        for m in &review.evaluation.mismatches {
            self.write_cell(ws, r, 0, &CellValue::Number(m.row_number as f64))?;
            self.write_cell(ws, r, 1, &m.row_date)?;
            self.write_cell(ws, r, 2, &CellValue::Text(m.column.clone()))?;
            self.write_cell(ws, r, 3, &m.expected)?;
            self.write_cell(ws, r, 4, &m.actual)?;
            r += 1;
        }
        for e in &review.evaluation.row_errors {
            self.write_cell(ws, r, 0, &CellValue::Number(e.row_number as f64))?;
            self.write_cell(ws, r, 2, &CellValue::Text("error".into()))?;
            self.write_cell(ws, r, 4, &CellValue::Text(e.message.clone()))?;
            r += 1;
        }
        Ok(())
    }

    fn export_pivot(&self, workbook: &mut Workbook, review: &Review) -> ReviewResult<()> {
        let ws = self.add_sheet(workbook, PIVOT_SHEET)?;
        let mut headers = review.pivot_columns.clone();
        headers.push("days".into());
        self.write_headers(ws, &headers)?;
        for (i, row) in review.pivot.iter().enumerate() {
            let r = i as u32 + 1;
            for (c, value) in row.values.iter().enumerate() {
                self.write_cell(ws, r, c as u16, &CellValue::Text(value.clone()))?;
            }
            self.write_cell(
                ws,
                r,
                row.values.len() as u16,
                &CellValue::Number(row.days as f64),
            )?;
        }
        Ok(())
    }

    fn add_sheet<'a>(&self, workbook: &'a mut Workbook, name: &str) -> ReviewResult<&'a mut Worksheet> {
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(sheet_name(name))
            .map_err(|e| ReviewError::Export(format!("Failed to set worksheet name: {}", e)))?;
        Ok(worksheet)
    }

    fn write_headers(&self, worksheet: &mut Worksheet, headers: &[String]) -> ReviewResult<()> {
        for (col, header) in headers.iter().enumerate() {
            worksheet
                .write_string_with_format(0, col as u16, header, &self.header)
                .map_err(|e| ReviewError::Export(format!("Failed to write header: {}", e)))?;
        }
        Ok(())
    }

    fn write_cell(
        &self,
        worksheet: &mut Worksheet,
        row: u32,
        col: u16,
        value: &CellValue,
    ) -> ReviewResult<()> {
        let result = match value {
            CellValue::Empty => return Ok(()),
            CellValue::Number(n) if n.is_finite() => worksheet.write_number(row, col, *n),
            CellValue::Number(n) => worksheet.write_string(row, col, n.to_string()),
            CellValue::Text(s) => worksheet.write_string(row, col, s),
            CellValue::Bool(b) => worksheet.write_boolean(row, col, *b),
            CellValue::Date(d) => {
                worksheet.write_number_with_format(row, col, date_to_excel_serial(*d), &self.date)
            }
        };
        result
            .map(|_| ())
            .map_err(|e| ReviewError::Export(format!("Failed to write cell ({}, {}): {}", row, col, e)))
    }
}

fn save(workbook: &mut Workbook, path: &Path) -> ReviewResult<()> {
    workbook
        .save(path)
        .map_err(|e| ReviewError::Export(format!("Failed to save {}: {}", path.display(), e)))
}

/// Strip characters Excel rejects in sheet names and cap the length.
///
/// Excel compares the result case-insensitively against the other sheets.
pub fn sheet_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if "[]:*?/\\".contains(c) { '_' } else { c })
        .collect();
    let trimmed = cleaned.trim().trim_matches('\'');
    let capped: String = trimmed.chars().take(MAX_SHEET_NAME).collect();
    if capped.is_empty() {
        "Sheet".to_string()
    } else {
        capped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::excel::ExcelImporter;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    #[test]
    fn test_sheet_name_sanitized() {
        assert_eq!(sheet_name("Karbon Expenses"), "Karbon Expenses");
        assert_eq!(sheet_name("a/b:c"), "a_b_c");
        assert_eq!(sheet_name(&"x".repeat(40)).len(), 31);
    }

    #[test]
    fn test_table_survives_write_and_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Dump.xlsx");

        let mut table = Table::new("Dump", vec!["Date".into(), "site name".into(), "amount".into()]);
        table.rows.push(vec![
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()),
            CellValue::Text("Airtel Center".into()),
            CellValue::Number(1250.5),
        ]);
        table.rows.push(vec![CellValue::Empty, CellValue::Text("x".into()), CellValue::Number(2.0)]);

        ExcelExporter::new().write_table(&table, &path).unwrap();
        let read = ExcelImporter::new(&path).read_table().unwrap();

        assert_eq!(read.name, "Dump");
        assert_eq!(read.columns, table.columns);
        assert_eq!(read.rows[0][1], CellValue::Text("Airtel Center".into()));
        assert_eq!(read.rows[0][2], CellValue::Number(1250.5));
        assert_eq!(read.rows[1][0], CellValue::Empty);
        // date cells come back as dates
        assert_eq!(read.rows[0][0], CellValue::Date(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()));
    }
}
