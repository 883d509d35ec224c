//! Review summaries: the price pivot and named row listings

use crate::formula::evaluate;
use crate::rules::{Listing, ListingSelector};
use crate::types::{CellValue, Row};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::warn;

/// Placeholder for a blank pivot value
pub const NOT_AVAILABLE: &str = "N/A";

/// One distinct combination of pivot values and how many rows carry it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PivotRow {
    pub values: Vec<String>,
    pub days: usize,
}

/// Count rows per distinct combination of `columns`, sorted by value
pub fn pivot(rows: &[Row], columns: &[String]) -> Vec<PivotRow> {
    if columns.is_empty() {
        return Vec::new();
    }
    let mut groups: BTreeMap<Vec<String>, usize> = BTreeMap::new();
    for row in rows {
        let values = columns
            .iter()
            .map(|c| match row.get(c) {
                Some(v) if !v.is_empty() => v.display_text(),
                _ => NOT_AVAILABLE.to_string(),
            })
            .collect();
        *groups.entry(values).or_insert(0) += 1;
    }
    groups
        .into_iter()
        .map(|(values, days)| PivotRow { values, days })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingRow {
    pub row_number: usize,
    pub values: Vec<CellValue>,
}

/// Rows picked out by one listing, projected onto its columns
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingReport {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<ListingRow>,
}

pub fn listings(rows: &[Row], listings: &[Listing]) -> Vec<ListingReport> {
    listings.iter().map(|l| run_listing(rows, l)).collect()
}

fn run_listing(rows: &[Row], listing: &Listing) -> ListingReport {
    let selected = rows
        .iter()
        .filter(|row| selects(listing, row))
        .map(|row| ListingRow {
            row_number: row.row_number(),
            values: listing
                .columns
                .iter()
                .map(|c| row.get(c).cloned().unwrap_or(CellValue::Empty))
                .collect(),
        })
        .collect();

    ListingReport {
        name: listing.name.clone(),
        columns: listing.columns.clone(),
        rows: selected,
    }
}

fn selects(listing: &Listing, row: &Row) -> bool {
    match &listing.selector {
        ListingSelector::AnyPresent(columns) => columns.iter().any(|c| {
            row.get(c)
                .is_some_and(|v| !v.is_empty() && v.as_number() != Some(0.0))
        }),
        ListingSelector::Condition(expr) => match evaluate(expr, row) {
            Ok(value) => value.is_truthy(),
            Err(e) => {
                warn!(row = row.row_number(), listing = %listing.name, "listing condition failed: {}", e.message);
                false
            }
        },
    }
}
