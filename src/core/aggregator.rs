//! Bucketed aggregation of sheet rows
//!
//! Groups are kept in `BTreeMap`s so output order is deterministic, and sums
//! run over the sorted values so the result does not depend on row order.

use crate::rules::{AggregationBucket, Reduction, ReductionOp};
use crate::types::{LedgerKey, Row};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Metric name → value
pub type Metrics = BTreeMap<String, f64>;

/// Aggregate all rows: bucket name → metrics.
///
/// Every metric is present; a bucket no row passes reduces to 0.
pub fn aggregate(rows: &[Row], buckets: &[AggregationBucket]) -> BTreeMap<String, Metrics> {
    let mut out = BTreeMap::new();
    for bucket in buckets {
        let members: Vec<&Row> = rows.iter().filter(|r| bucket.admits(r)).collect();
        let metrics: Metrics = bucket
            .reductions
            .iter()
            .map(|r| (r.metric.clone(), reduce(&members, r).unwrap_or(0.0)))
            .collect();
        out.insert(bucket.name.clone(), metrics);
    }
    out
}

/// Aggregate per ledger key: key → metrics of every bucket.
///
/// A metric is only present for a key when at least one of that key's rows
/// took part in the reduction. Rows without a key are skipped.
pub fn aggregate_by_key<F>(
    rows: &[Row],
    key_fn: F,
    buckets: &[AggregationBucket],
) -> BTreeMap<LedgerKey, Metrics>
where
    F: Fn(&Row) -> Option<LedgerKey>,
{
    let mut groups: BTreeMap<LedgerKey, Vec<&Row>> = BTreeMap::new();
    for row in rows {
        match key_fn(row) {
            Some(key) => groups.entry(key).or_default().push(row),
            None => warn!(row = row.row_number(), "row has no identifier or month, skipped"),
        }
    }

    let mut out = BTreeMap::new();
    for (key, members) in groups {
        let mut metrics = Metrics::new();
        for bucket in buckets {
            let admitted: Vec<&Row> = members
                .iter()
                .copied()
                .filter(|r| bucket.admits(r))
                .collect();
            for reduction in &bucket.reductions {
                if let Some(value) = reduce(&admitted, reduction) {
                    metrics.insert(reduction.metric.clone(), value);
                }
            }
        }
        debug!(key = %key, metrics = metrics.len(), "key aggregated");
        out.insert(key, metrics);
    }
    out
}

/// Ledger key of a row: first non-empty identifier column plus `month`
pub fn ledger_key(row: &Row, identifier_columns: &[String]) -> Option<LedgerKey> {
    let identifier = row.first_present(identifier_columns)?;
    let month = row.get("month").filter(|m| !m.is_empty())?;
    Some(LedgerKey::from_cells(identifier, month))
}

/// `None` when no row takes part
fn reduce(rows: &[&Row], reduction: &Reduction) -> Option<f64> {
    let admitted: Vec<&Row> = rows.iter().copied().filter(|r| reduction.admits(r)).collect();
    if admitted.is_empty() {
        return None;
    }

    let value = match reduction.op {
        ReductionOp::Sum => {
            let mut values: Vec<f64> = admitted.iter().map(|r| r.number(&reduction.column)).collect();
            values.sort_by(f64::total_cmp);
            values.into_iter().sum()
        }
        ReductionOp::CountDistinct => admitted
            .iter()
            .filter_map(|r| r.get(&reduction.column))
            .filter(|v| !v.is_empty())
            .map(|v| v.display_text())
            .collect::<BTreeSet<_>>()
            .len() as f64,
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::Membership;
    use crate::types::CellValue;
    use pretty_assertions::assert_eq;

    fn reduction(metric: &str, column: &str, op: ReductionOp, positive_any: &[&str]) -> Reduction {
        Reduction {
            metric: metric.to_string(),
            label: metric.to_string(),
            column: column.to_string(),
            op,
            positive_any: positive_any.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn buckets() -> Vec<AggregationBucket> {
        vec![
            AggregationBucket {
                name: "regular".into(),
                filter: vec![Membership {
                    column: "order type".into(),
                    any_of: vec!["regular".into(), "food trial".into()],
                }],
                reductions: vec![reduction("regular selling", "selling amount", ReductionOp::Sum, &[])],
            },
            AggregationBucket {
                name: "all".into(),
                filter: vec![],
                reductions: vec![
                    reduction("days", "date", ReductionOp::CountDistinct, &["pax"]),
                    reduction("sams", "amount", ReductionOp::Sum, &[]),
                ],
            },
        ]
    }

    fn row(i: usize, id: &str, order: &str, date: &str, pax: f64, selling: f64) -> Row {
        Row::from_pairs(
            i,
            [
                ("cost centre", CellValue::Text(id.into())),
                ("month", CellValue::Text("jan-24".into())),
                ("order type", CellValue::Text(order.into())),
                ("date", CellValue::Text(date.into())),
                ("pax", CellValue::Number(pax)),
                ("selling amount", CellValue::Number(selling)),
            ],
        )
    }

    fn sample() -> Vec<Row> {
        vec![
            row(0, "cc1", "regular", "2024-01-01", 10.0, 100.0),
            row(1, "cc1", "regular", "2024-01-01", 5.0, 0.5),
            row(2, "cc1", "event", "2024-01-02", 3.0, 900.0),
            row(3, "cc1", "regular", "2024-01-03", 0.0, 0.25),
            row(4, "cc2", "event", "2024-01-04", 0.0, 50.0),
        ]
    }

    fn key_fn(r: &Row) -> Option<LedgerKey> {
        ledger_key(r, &["review id".to_string(), "cost centre".to_string()])
    }

    #[test]
    fn test_aggregate_buckets() {
        let result = aggregate(&sample(), &buckets());
        assert_eq!(result["regular"]["regular selling"], 100.75);
        assert_eq!(result["all"]["days"], 2.0);
        assert_eq!(result["all"]["sams"], 0.0);
    }

    #[test]
    fn test_aggregate_is_permutation_invariant() {
        let rows = sample();
        let expected = aggregate(&rows, &buckets());
        let mut reversed = rows.clone();
        reversed.reverse();
        let mut rotated = rows.clone();
        rotated.rotate_left(2);
        assert_eq!(aggregate(&reversed, &buckets()), expected);
        assert_eq!(aggregate(&rotated, &buckets()), expected);

        let keyed = aggregate_by_key(&rows, key_fn, &buckets());
        assert_eq!(aggregate_by_key(&reversed, key_fn, &buckets()), keyed);
    }

    #[test]
    fn test_keyed_metric_absent_when_no_row_qualifies() {
        let result = aggregate_by_key(&sample(), key_fn, &buckets());
        let cc1 = &result[&LedgerKey::new("cc1", "jan-24")];
        let cc2 = &result[&LedgerKey::new("cc2", "jan-24")];

        assert_eq!(cc1["days"], 2.0);
        assert!(cc1.contains_key("regular selling"));
        // cc2 has only an event row with no pax
        assert!(!cc2.contains_key("regular selling"));
        assert!(!cc2.contains_key("days"));
        assert_eq!(cc2["sams"], 0.0);
    }

    #[test]
    fn test_review_id_wins_over_cost_centre() {
        let mut r = row(0, "cc1", "regular", "2024-01-01", 1.0, 1.0);
        r.set("review id", CellValue::Text("rv-9".into()));
        assert_eq!(key_fn(&r), Some(LedgerKey::new("rv-9", "jan-24")));

        r.set("review id", CellValue::Empty);
        assert_eq!(key_fn(&r), Some(LedgerKey::new("cc1", "jan-24")));
    }

    #[test]
    fn test_rows_without_key_are_skipped() {
        let rows = vec![Row::from_pairs(0, [("amount", 5.0)])];
        assert!(aggregate_by_key(&rows, key_fn, &buckets()).is_empty());
    }
}
