//! Review engine: row checks, aggregation and summaries

pub mod aggregator;
pub mod row_evaluator;
pub mod summary;

pub use aggregator::{aggregate, aggregate_by_key, ledger_key, Metrics};
pub use row_evaluator::{evaluate, Evaluation, ExpectedValues, Mismatch, RowError};
pub use summary::{listings, pivot, ListingReport, ListingRow, PivotRow};
