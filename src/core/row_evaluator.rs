//! Row evaluator
//!
//! Recomputes each derived column from a row's recorded values and compares
//! the result with what the sheet holds. Rules run in declared order, but
//! every rule reads *recorded* values, so a wrong upstream cell shows up as
//! its own mismatch instead of cascading.

use crate::formula::{evaluate as eval_expr, EvalError, Value};
use crate::rules::{DerivationRule, Formula};
use crate::types::{CellValue, Row};
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, error};

/// A derived column whose recorded value differs from the recomputed one
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Mismatch {
    pub row_number: usize,
    pub row_date: CellValue,
    pub column: String,
    pub expected: CellValue,
    pub actual: CellValue,
}

/// A row whose evaluation failed part-way
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowError {
    pub row_number: usize,
    pub message: String,
}

/// Recomputed values of one row, keyed by target column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpectedValues {
    pub row_number: usize,
    pub values: BTreeMap<String, CellValue>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Evaluation {
    pub expected: Vec<ExpectedValues>,
    pub mismatches: Vec<Mismatch>,
    pub row_errors: Vec<RowError>,
}

impl Evaluation {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty() && self.row_errors.is_empty()
    }
}

/// Evaluate every rule against every row.
///
/// Never fails as a whole: a row that errors is logged, recorded in
/// `row_errors`, and the batch moves on. Mismatches already found in that
/// row are kept.
pub fn evaluate(rows: &[Row], rules: &[DerivationRule]) -> Evaluation {
    let mut evaluation = Evaluation::default();

    for row in rows {
        let mut values = BTreeMap::new();

        for rule in rules {
            match check_rule(rule, row) {
                Ok(None) => {}
                Ok(Some((expected, mismatch))) => {
                    values.insert(rule.target.clone(), expected);
                    if let Some(mismatch) = mismatch {
                        evaluation.mismatches.push(mismatch);
                    }
                }
                Err(e) => {
                    error!(
                        row = row.row_number(),
                        column = %rule.target,
                        "Error processing row: {}",
                        e.message
                    );
                    evaluation.row_errors.push(RowError {
                        row_number: row.row_number(),
                        message: format!("{}: {}", rule.target, e.message),
                    });
                    break;
                }
            }
        }

        evaluation.expected.push(ExpectedValues {
            row_number: row.row_number(),
            values,
        });
    }

    debug!(
        rows = rows.len(),
        rules = rules.len(),
        mismatches = evaluation.mismatches.len(),
        row_errors = evaluation.row_errors.len(),
        "rows evaluated"
    );
    evaluation
}

/// `Ok(None)` when the rule's condition excludes the row
fn check_rule(
    rule: &DerivationRule,
    row: &Row,
) -> Result<Option<(CellValue, Option<Mismatch>)>, EvalError> {
    if let Some(condition) = &rule.condition {
        if !eval_expr(condition, row)?.is_truthy() {
            return Ok(None);
        }
    }

    let expected = match &rule.formula {
        Formula::Expression(expr) => eval_expr(expr, row)?,
        Formula::Tiered(tiered) => tiered.price(row).map_or(Value::Null, Value::Number),
    };

    let recorded = row.get(&rule.target).cloned().unwrap_or(CellValue::Empty);
    let actual = match &expected {
        Value::Number(_) | Value::Boolean(_) => CellValue::Number(recorded.number_or_zero()),
        Value::Text(_) | Value::Null => recorded.clone(),
    };

    let differs = match &expected {
        Value::Number(_) | Value::Boolean(_) => {
            let n = expected.as_number();
            recorded.number_or_zero() != n
        }
        Value::Text(s) => recorded.key_text() != s.trim().to_lowercase(),
        // Nothing expected: only a recorded number is wrong
        Value::Null => recorded.as_number().is_some_and(|n| !n.is_nan()),
    };

    let expected = CellValue::from(expected);
    let mismatch = differs.then(|| Mismatch {
        row_number: row.row_number(),
        row_date: row.date(),
        column: rule.target.clone(),
        expected: expected.clone(),
        actual,
    });

    Ok(Some((expected, mismatch)))
}
