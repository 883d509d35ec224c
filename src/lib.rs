//! MIS Reviewer - monthly billing sheet checks and P&L reconciliation
//!
//! Each client sheet in the monthly MIS workbook follows a billing format: a
//! set of derived columns (amounts, commissions, tiered prices) computed from
//! the row's inputs. This library recomputes those columns, reports every
//! cell that disagrees, aggregates the month into ledger metrics, and writes
//! them to the shared P&L and dump workbooks.
//!
//! # Features
//!
//! - Formats as YAML rule tables, with a small Excel-like formula language
//! - Row checks that never abort the batch on a bad row
//! - Order-independent aggregation per format bucket and per ledger key
//! - All-or-nothing ledger updates under a workbook lock
//! - Excel import/export
//!
//! # Example
//!
//! ```no_run
//! use mis_reviewer::excel::ExcelImporter;
//! use mis_reviewer::review::{review, select_month};
//! use mis_reviewer::rules::FormatRegistry;
//!
//! let registry = FormatRegistry::builtin()?;
//! let format = registry.resolve("Airtel Center")?;
//! let sheet = ExcelImporter::new("MIS.xlsx").read_sheet("Airtel Center")?;
//! let (month_rows, month) = select_month(&sheet, None)?;
//!
//! let report = review(&month_rows, &month, format);
//! println!("{} mismatches", report.evaluation.mismatches.len());
//! # Ok::<(), mis_reviewer::error::ReviewError>(())
//! ```

pub mod audit;
pub mod cli;
pub mod core;
pub mod error;
pub mod excel;
pub mod formula;
pub mod ledger;
pub mod lock;
pub mod review;
pub mod rules;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use error::{ReviewError, ReviewResult};
pub use types::{CellValue, LedgerKey, Row, Sheet, Table};
