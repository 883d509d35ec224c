//! Row formula language
//!
//! Formulas are small spreadsheet-style expressions evaluated against one
//! row at a time: `[selling amount] - [commission]`,
//! `IF([session] = "alacarte", [selling amount], [pax sold] * [rate])`.
//! Column names with spaces or punctuation go in brackets; bare identifiers
//! are columns too unless followed by `(`.

pub mod evaluator;
pub mod parser;
pub mod tokenizer;

pub use evaluator::{evaluate, EvalError, Value};
pub use parser::Expr;

/// Tokenize, parse and check a formula in one step
pub fn compile(source: &str) -> Result<Expr, String> {
    let tokens = tokenizer::tokenize(source).map_err(|e| e.to_string())?;
    let expr = parser::parse(tokens).map_err(|e| e.to_string())?;
    evaluator::check_functions(&expr).map_err(|e| e.message)?;
    Ok(expr)
}
