//! One month of one sheet, reviewed end to end
//!
//! Ties the engine together for the `check`, `punch` and `dump` commands:
//! pick the month, run the row checks, aggregate and summarize.

use crate::core::{
    aggregate, aggregate_by_key, evaluate, ledger_key, listings, pivot, Evaluation,
    ListingReport, Metrics, PivotRow,
};
use crate::error::{ReviewError, ReviewResult};
use crate::rules::Format;
use crate::types::{LedgerKey, Sheet};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::info;

/// One reported aggregate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateLine {
    pub bucket: String,
    pub metric: String,
    pub label: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Review {
    pub format: String,
    pub title: String,
    pub notes: Vec<String>,
    pub sheet: String,
    pub month: String,
    pub rows: usize,
    pub evaluation: Evaluation,
    pub aggregates: Vec<AggregateLine>,
    pub pivot_columns: Vec<String>,
    pub pivot: Vec<PivotRow>,
    pub listings: Vec<ListingReport>,
}

impl Review {
    pub fn is_clean(&self) -> bool {
        self.evaluation.is_clean()
    }
}

/// Narrow a sheet to one month; the first month found is the default
pub fn select_month(sheet: &Sheet, month: Option<&str>) -> ReviewResult<(Sheet, String)> {
    if !sheet.has_column("month") {
        return Err(ReviewError::MissingColumn("month".to_string()));
    }
    let month = match month {
        Some(m) => m.trim().to_lowercase(),
        None => sheet.months().into_iter().next().ok_or_else(|| {
            ReviewError::EmptySelection(format!("sheet '{}' has no month values", sheet.name))
        })?,
    };
    let selected = sheet.filter_month(&month)?;
    Ok((selected, month))
}

/// Run every read-only part of the review on an already month-filtered sheet
pub fn review(sheet: &Sheet, month: &str, format: &Format) -> Review {
    let evaluation = evaluate(&sheet.rows, &format.rules);
    let totals = aggregate(&sheet.rows, &format.buckets);

    let mut aggregates = Vec::new();
    for bucket in &format.buckets {
        for reduction in &bucket.reductions {
            let value = totals
                .get(&bucket.name)
                .and_then(|m| m.get(&reduction.metric))
                .copied()
                .unwrap_or(0.0);
            aggregates.push(AggregateLine {
                bucket: bucket.name.clone(),
                metric: reduction.metric.clone(),
                label: reduction.label.clone(),
                value,
            });
        }
    }

    info!(
        format = %format.name,
        sheet = %sheet.name,
        month,
        rows = sheet.row_count(),
        mismatches = evaluation.mismatches.len(),
        row_errors = evaluation.row_errors.len(),
        "sheet reviewed"
    );

    Review {
        format: format.name.clone(),
        title: format.title.clone(),
        notes: format.notes.clone(),
        sheet: sheet.name.clone(),
        month: month.to_string(),
        rows: sheet.row_count(),
        evaluation,
        aggregates,
        pivot_columns: format.pivot.clone(),
        pivot: pivot(&sheet.rows, &format.pivot),
        listings: listings(&sheet.rows, &format.listings),
    }
}

/// Per-key metrics to punch into the ledger
pub fn ledger_updates(sheet: &Sheet, format: &Format) -> BTreeMap<LedgerKey, Metrics> {
    aggregate_by_key(
        &sheet.rows,
        |row| ledger_key(row, &format.identifier_columns),
        &format.buckets,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::FormatRegistry;
    use crate::types::{CellValue, Row};

    fn sheet() -> Sheet {
        let mut sheet = Sheet::new(
            "Airtel Center",
            vec!["month".into(), "cost centre".into(), "pax".into()],
        );
        sheet.push_row(Row::from_pairs(0, [("month", CellValue::from("jan-24")), ("cost centre", "cc1".into())]));
        sheet.push_row(Row::from_pairs(1, [("month", CellValue::from("feb-24")), ("cost centre", "cc1".into())]));
        sheet.push_row(Row::from_pairs(2, [("month", CellValue::from("jan-24")), ("cost centre", "cc1".into())]));
        sheet
    }

    #[test]
    fn test_first_month_is_default() {
        let (selected, month) = select_month(&sheet(), None).unwrap();
        assert_eq!(month, "jan-24");
        assert_eq!(selected.row_count(), 2);

        let (selected, month) = select_month(&sheet(), Some(" FEB-24 ")).unwrap();
        assert_eq!(month, "feb-24");
        assert_eq!(selected.rows[0].row_number(), 4);
    }

    #[test]
    fn test_unknown_month_is_empty_selection() {
        assert!(matches!(
            select_month(&sheet(), Some("mar-24")),
            Err(ReviewError::EmptySelection(_))
        ));
    }

    #[test]
    fn test_review_reports_every_metric() {
        let registry = FormatRegistry::builtin().unwrap();
        let format = registry.resolve("Airtel Center").unwrap();
        let (selected, month) = select_month(&sheet(), None).unwrap();
        let review = review(&selected, &month, format);

        let metrics: usize = format.buckets.iter().map(|b| b.reductions.len()).sum();
        assert_eq!(review.aggregates.len(), metrics);
        assert_eq!(review.rows, 2);
        assert_eq!(review.format, format.name);
    }
}
