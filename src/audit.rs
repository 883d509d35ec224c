//! Dump appender
//!
//! Copies a reviewed month into the shared dump workbook, one log row per
//! sheet row, projected through the format's column mapping. Log columns the
//! sheet cannot fill stay blank; sheet columns the log lacks are dropped.

use crate::error::ReviewResult;
use crate::rules::AuditMapping;
use crate::store;
use crate::types::{CellValue, Sheet, Table};
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

/// Order type of the synthetic management fee row
pub const MANAGEMENT_FEE_ORDER: &str = "management fee";

/// The log's last row before appending, as shown to the operator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LastRow {
    /// Spreadsheet row number (header is row 1)
    pub row_number: usize,
    pub values: Vec<(String, CellValue)>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppendOutcome {
    pub last_row: Option<LastRow>,
    pub appended: usize,
    /// Total of the management fee row, when one was added
    pub management_fee: Option<f64>,
}

/// Append `sheet` (already narrowed to `month`) to `log`.
///
/// When the sheet carries the management fee column, a fee row with its
/// total is written first.
pub fn append(sheet: &Sheet, mapping: &AuditMapping, log: &Table, month: &str) -> (Table, AppendOutcome) {
    let last_row = log.last_row().map(|(row_number, cells)| LastRow {
        row_number,
        values: log.columns.iter().cloned().zip(cells.iter().cloned()).collect(),
    });

    let mut out = log.clone();
    let mut appended = 0;

    let management_fee = if sheet.has_column(&mapping.management_fee_column) {
        let mut values: Vec<f64> = sheet
            .rows
            .iter()
            .map(|r| r.number(&mapping.management_fee_column))
            .collect();
        values.sort_by(f64::total_cmp);
        let total: f64 = values.into_iter().sum();
        let site = sheet
            .rows
            .first()
            .and_then(|r| r.get("site name").cloned())
            .unwrap_or(CellValue::Empty);
        out.push_pairs([
            ("month", CellValue::Text(month.to_string())),
            ("site name", site),
            ("order type", CellValue::Text(MANAGEMENT_FEE_ORDER.to_string())),
            ("selling amount", CellValue::Number(total)),
        ]);
        appended += 1;
        Some(total)
    } else {
        None
    };

    // Only pairs both sides know about
    let projection: Vec<(&str, &str)> = mapping
        .columns
        .iter()
        .filter(|(to, from)| log.has_column(to) && sheet.has_column(from))
        .map(|(to, from)| (to.as_str(), from.as_str()))
        .collect();
    debug!(
        mapped = projection.len(),
        configured = mapping.columns.len(),
        "dump projection"
    );

    for row in &sheet.rows {
        out.push_pairs(
            projection
                .iter()
                .map(|(to, from)| (*to, row.get(from).cloned().unwrap_or(CellValue::Empty))),
        );
        appended += 1;
    }

    (
        out,
        AppendOutcome {
            last_row,
            appended,
            management_fee,
        },
    )
}

/// Append to the dump workbook at `path`
pub fn append_to(path: &Path, sheet: &Sheet, mapping: &AuditMapping, month: &str) -> ReviewResult<AppendOutcome> {
    let outcome = store::update_table(path, |log| Ok(append(sheet, mapping, log, month)))?;
    info!(dump = %path.display(), appended = outcome.appended, "dump appended");
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellValue::{Empty, Number, Text};
    use crate::types::Row;
    use pretty_assertions::assert_eq;

    fn mapping() -> AuditMapping {
        AuditMapping {
            columns: vec![
                ("month".into(), "month".into()),
                ("site name".into(), "site name".into()),
                ("selling amount".into(), "btc".into()),
                ("not in log".into(), "month".into()),
                ("order type".into(), "not in sheet".into()),
            ],
            management_fee_column: "selling management".into(),
        }
    }

    fn log() -> Table {
        let mut t = Table::new(
            "Dump",
            vec!["Month".into(), "Site Name".into(), "Order Type".into(), "Selling Amount".into()],
        );
        t.rows.push(vec![Text("dec-23".into()), Text("old".into()), Empty, Number(1.0)]);
        t
    }

    fn sheet(with_fee: bool) -> Sheet {
        let mut columns = vec!["month".to_string(), "site name".to_string(), "btc".to_string()];
        if with_fee {
            columns.push("selling management".into());
        }
        let mut sheet = Sheet::new("Airtel Center", columns);
        for (i, (btc, fee)) in [(100.0, 2.5), (50.0, 1.25)].into_iter().enumerate() {
            let mut row = Row::from_pairs(
                i,
                [
                    ("month", Text("jan-24".into())),
                    ("site name", Text("airtel center".into())),
                    ("btc", Number(btc)),
                ],
            );
            if with_fee {
                row.set("selling management", Number(fee));
            }
            sheet.push_row(row);
        }
        sheet
    }

    #[test]
    fn test_projection_and_last_row() {
        let (table, outcome) = append(&sheet(false), &mapping(), &log(), "jan-24");

        assert_eq!(outcome.appended, 2);
        assert_eq!(outcome.management_fee, None);
        let last = outcome.last_row.unwrap();
        assert_eq!(last.row_number, 2);
        assert_eq!(last.values[1], ("Site Name".to_string(), Text("old".into())));

        assert_eq!(table.row_count(), 3);
        assert_eq!(
            table.rows[1],
            vec![Text("jan-24".into()), Text("airtel center".into()), Empty, Number(100.0)]
        );
        assert_eq!(table.columns, log().columns);
    }

    #[test]
    fn test_management_fee_row_comes_first() {
        let (table, outcome) = append(&sheet(true), &mapping(), &log(), "jan-24");

        assert_eq!(outcome.appended, 3);
        assert_eq!(outcome.management_fee, Some(3.75));
        assert_eq!(
            table.rows[1],
            vec![
                Text("jan-24".into()),
                Text("airtel center".into()),
                Text("management fee".into()),
                Number(3.75),
            ]
        );
        assert_eq!(table.rows[2][3], Number(100.0));
    }

    #[test]
    fn test_empty_log_has_no_last_row() {
        let empty = Table::new("Dump", log().columns);
        let (_, outcome) = append(&sheet(false), &mapping(), &empty, "jan-24");
        assert_eq!(outcome.last_row, None);
    }
}
