//! Formula evaluator for row expressions
//!
//! Evaluates an AST against one sheet row. Column reads are "safe": a
//! missing column or blank cell is `Null`, which arithmetic treats as 0.

use super::parser::Expr;
use crate::types::{CellValue, Row};

/// Value type that can be returned from evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
    /// Missing column or blank cell
    Null,
}

impl Value {
    /// Numeric coercion used by arithmetic: blanks and non-numeric text are 0
    pub fn as_number(&self) -> f64 {
        match self {
            Value::Number(n) => *n,
            Value::Boolean(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Text(s) => s.trim().parse().unwrap_or(0.0),
            Value::Null => 0.0,
        }
    }

    pub fn as_text(&self) -> String {
        match self {
            Value::Number(n) => CellValue::Number(*n).display_text(),
            Value::Text(s) => s.clone(),
            Value::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            Value::Null => String::new(),
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => s.eq_ignore_ascii_case("true"),
            Value::Null => false,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Value::Number(_) | Value::Boolean(_))
    }
}

impl From<&CellValue> for Value {
    fn from(cell: &CellValue) -> Self {
        match cell {
            CellValue::Empty => Value::Null,
            CellValue::Number(n) if n.is_nan() => Value::Null,
            CellValue::Number(n) => Value::Number(*n),
            CellValue::Text(s) if s.trim().is_empty() => Value::Null,
            CellValue::Text(s) => Value::Text(s.clone()),
            CellValue::Bool(b) => Value::Boolean(*b),
            CellValue::Date(_) => Value::Text(cell.display_text()),
        }
    }
}

impl From<Value> for CellValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Number(n) => CellValue::Number(n),
            Value::Text(s) => CellValue::Text(s),
            Value::Boolean(b) => CellValue::Bool(b),
            Value::Null => CellValue::Empty,
        }
    }
}

/// Error during evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct EvalError {
    pub message: String,
}

impl EvalError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for EvalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Eval error: {}", self.message)
    }
}

impl std::error::Error for EvalError {}

/// Functions the evaluator knows, with (min, max) argument counts
pub const FUNCTIONS: &[(&str, usize, Option<usize>)] = &[
    ("MAX", 1, None),
    ("MIN", 1, None),
    ("ABS", 1, Some(1)),
    ("ROUND", 1, Some(2)),
    ("IF", 2, Some(3)),
    ("AND", 1, None),
    ("OR", 1, None),
    ("NOT", 1, Some(1)),
    ("IN", 2, None),
    ("ISBLANK", 1, Some(1)),
];

/// Check function names and arities ahead of time
pub fn check_functions(expr: &Expr) -> Result<(), EvalError> {
    match expr {
        Expr::FunctionCall { name, args } => {
            let (_, min, max) = FUNCTIONS
                .iter()
                .find(|(n, _, _)| *n == name.as_str())
                .ok_or_else(|| EvalError::new(format!("Unknown function: {}", name)))?;
            if args.len() < *min || max.is_some_and(|m| args.len() > m) {
                return Err(EvalError::new(format!(
                    "{} called with {} argument(s)",
                    name,
                    args.len()
                )));
            }
            args.iter().try_for_each(check_functions)
        }
        Expr::BinaryOp { left, right, .. } => {
            check_functions(left)?;
            check_functions(right)
        }
        Expr::UnaryOp { operand, .. } => check_functions(operand),
        Expr::Number(_) | Expr::Text(_) | Expr::Column(_) => Ok(()),
    }
}

/// Evaluate an expression against a row
pub fn evaluate(expr: &Expr, row: &Row) -> Result<Value, EvalError> {
    match expr {
        Expr::Number(n) => Ok(Value::Number(*n)),

        Expr::Text(s) => Ok(Value::Text(s.clone())),

        Expr::Column(name) => Ok(row.get(name).map_or(Value::Null, Value::from)),

        Expr::FunctionCall { name, args } => evaluate_function(name, args, row),

        Expr::BinaryOp { op, left, right } => {
            let left_val = evaluate(left, row)?;
            let right_val = evaluate(right, row)?;
            evaluate_binary_op(op, &left_val, &right_val)
        }

        Expr::UnaryOp { op, operand } => {
            let val = evaluate(operand, row)?;
            match op.as_str() {
                "-" => Ok(Value::Number(-val.as_number())),
                _ => Err(EvalError::new(format!("Unknown unary operator: {}", op))),
            }
        }
    }
}

fn evaluate_binary_op(op: &str, left: &Value, right: &Value) -> Result<Value, EvalError> {
    match op {
        "+" => Ok(Value::Number(left.as_number() + right.as_number())),
        "-" => Ok(Value::Number(left.as_number() - right.as_number())),
        "*" => Ok(Value::Number(left.as_number() * right.as_number())),
        "/" => {
            let divisor = right.as_number();
            if divisor == 0.0 {
                return Err(EvalError::new("Division by zero"));
            }
            Ok(Value::Number(left.as_number() / divisor))
        }
        "^" => Ok(Value::Number(left.as_number().powf(right.as_number()))),
        "=" | "<>" | "<" | ">" | "<=" | ">=" => {
            let ordering = compare_values(left, right);
            let result = match op {
                "=" => ordering == std::cmp::Ordering::Equal,
                "<>" => ordering != std::cmp::Ordering::Equal,
                "<" => ordering == std::cmp::Ordering::Less,
                ">" => ordering == std::cmp::Ordering::Greater,
                "<=" => ordering != std::cmp::Ordering::Greater,
                _ => ordering != std::cmp::Ordering::Less,
            };
            Ok(Value::Boolean(result))
        }
        _ => Err(EvalError::new(format!("Unknown operator: {}", op))),
    }
}

/// Numeric when either side is a number, otherwise case-insensitive text
fn compare_values(left: &Value, right: &Value) -> std::cmp::Ordering {
    if left.is_numeric() || right.is_numeric() {
        left.as_number()
            .partial_cmp(&right.as_number())
            .unwrap_or(std::cmp::Ordering::Less)
    } else {
        left.as_text()
            .trim()
            .to_lowercase()
            .cmp(&right.as_text().trim().to_lowercase())
    }
}

fn evaluate_function(name: &str, args: &[Expr], row: &Row) -> Result<Value, EvalError> {
    match name {
        "MAX" | "MIN" => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(evaluate(arg, row)?.as_number());
            }
            let folded = if name == "MAX" {
                values.into_iter().fold(f64::NEG_INFINITY, f64::max)
            } else {
                values.into_iter().fold(f64::INFINITY, f64::min)
            };
            if folded.is_infinite() {
                return Err(EvalError::new(format!("{} requires at least one argument", name)));
            }
            Ok(Value::Number(folded))
        }
        "ABS" => {
            let v = evaluate(single_arg(name, args)?, row)?;
            Ok(Value::Number(v.as_number().abs()))
        }
        "ROUND" => {
            let v = evaluate(args.first().ok_or_else(|| arity(name))?, row)?.as_number();
            let digits = match args.get(1) {
                Some(d) => evaluate(d, row)?.as_number() as i32,
                None => 0,
            };
            let factor = 10f64.powi(digits);
            Ok(Value::Number((v * factor).round() / factor))
        }
        "IF" => {
            let condition = evaluate(args.first().ok_or_else(|| arity(name))?, row)?;
            if condition.is_truthy() {
                evaluate(args.get(1).ok_or_else(|| arity(name))?, row)
            } else {
                match args.get(2) {
                    Some(otherwise) => evaluate(otherwise, row),
                    None => Ok(Value::Boolean(false)),
                }
            }
        }
        "AND" => {
            for arg in args {
                if !evaluate(arg, row)?.is_truthy() {
                    return Ok(Value::Boolean(false));
                }
            }
            Ok(Value::Boolean(true))
        }
        "OR" => {
            for arg in args {
                if evaluate(arg, row)?.is_truthy() {
                    return Ok(Value::Boolean(true));
                }
            }
            Ok(Value::Boolean(false))
        }
        "NOT" => {
            let v = evaluate(single_arg(name, args)?, row)?;
            Ok(Value::Boolean(!v.is_truthy()))
        }
        "IN" => {
            let (needle, haystack) = args.split_first().ok_or_else(|| arity(name))?;
            let needle = evaluate(needle, row)?;
            for candidate in haystack {
                let candidate = evaluate(candidate, row)?;
                if compare_values(&needle, &candidate) == std::cmp::Ordering::Equal {
                    return Ok(Value::Boolean(true));
                }
            }
            Ok(Value::Boolean(false))
        }
        "ISBLANK" => {
            let v = evaluate(single_arg(name, args)?, row)?;
            Ok(Value::Boolean(v.is_null()))
        }
        _ => Err(EvalError::new(format!("Unknown function: {}", name))),
    }
}

fn single_arg<'a>(name: &str, args: &'a [Expr]) -> Result<&'a Expr, EvalError> {
    match args {
        [only] => Ok(only),
        _ => Err(arity(name)),
    }
}

fn arity(name: &str) -> EvalError {
    EvalError::new(format!("Wrong number of arguments for {}", name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::compile;

    fn eval(formula: &str, row: &Row) -> Result<Value, EvalError> {
        let expr = compile(formula).unwrap();
        evaluate(&expr, row)
    }

    fn sample_row() -> Row {
        Row::from_pairs(
            0,
            [
                ("rate", CellValue::Number(10.0)),
                ("quantity", CellValue::Number(5.0)),
                ("session", CellValue::Text("alacarte".into())),
                ("gst", CellValue::Number(0.0)),
                ("blank", CellValue::Empty),
            ],
        )
    }

    #[test]
    fn test_arithmetic_over_columns() {
        let row = sample_row();
        assert_eq!(eval("[rate] * [quantity]", &row).unwrap(), Value::Number(50.0));
        assert_eq!(eval("[rate] - -[quantity]", &row).unwrap(), Value::Number(15.0));
        assert_eq!(eval("2 ^ 3", &row).unwrap(), Value::Number(8.0));
    }

    #[test]
    fn test_missing_and_blank_read_as_zero() {
        let row = sample_row();
        assert_eq!(eval("[blank] + [nope] + 1", &row).unwrap(), Value::Number(1.0));
        assert_eq!(eval("[session] * 3", &row).unwrap(), Value::Number(0.0));
    }

    #[test]
    fn test_division_by_zero_is_an_error() {
        let row = sample_row();
        let err = eval("[rate] / [gst]", &row).unwrap_err();
        assert!(err.message.contains("Division by zero"));
    }

    #[test]
    fn test_text_comparison_is_case_insensitive() {
        let row = sample_row();
        assert_eq!(
            eval("[session] = \"Alacarte\"", &row).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(eval("[session] <> 'alacarte'", &row).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_blank_compares_equal_to_zero() {
        let row = sample_row();
        assert_eq!(eval("[blank] = 0", &row).unwrap(), Value::Boolean(true));
        assert_eq!(eval("[nope] > 0", &row).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_functions() {
        let row = sample_row();
        assert_eq!(eval("MAX([rate] - 20, [quantity], 0)", &row).unwrap(), Value::Number(5.0));
        assert_eq!(eval("MIN([rate], [quantity])", &row).unwrap(), Value::Number(5.0));
        assert_eq!(eval("ABS(-3)", &row).unwrap(), Value::Number(3.0));
        assert_eq!(eval("ROUND(2.346, 2)", &row).unwrap(), Value::Number(2.35));
        assert_eq!(
            eval("IF([session] = 'alacarte', 1, 2)", &row).unwrap(),
            Value::Number(1.0)
        );
        assert_eq!(
            eval("AND([rate] > 0, OR([gst] > 0, NOT([quantity] = 0)))", &row).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(
            eval("IN([session], 'regular', 'alacarte')", &row).unwrap(),
            Value::Boolean(true)
        );
        assert_eq!(eval("ISBLANK([blank])", &row).unwrap(), Value::Boolean(true));
        assert_eq!(eval("ISBLANK([rate])", &row).unwrap(), Value::Boolean(false));
    }

    #[test]
    fn test_check_functions_rejects_unknown_and_bad_arity() {
        assert!(compile("VLOOKUP([a], 1)").is_err());
        assert!(compile("ABS(1, 2)").is_err());
        assert!(compile("IF(1)").is_err());
        assert!(compile("MAX()").is_err());
    }
}
