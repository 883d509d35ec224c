use chrono::NaiveDate;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

//==============================================================================
// Cell values
//==============================================================================

/// A single spreadsheet cell as read from a workbook
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
    Date(NaiveDate),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric view of the cell, if it has one.
    ///
    /// Text that parses as a number counts as numeric; dates and other text
    /// do not.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            CellValue::Empty | CellValue::Date(_) => None,
        }
    }

    /// Safe numeric read: anything without a numeric view reads as 0
    pub fn number_or_zero(&self) -> f64 {
        self.as_number().filter(|n| !n.is_nan()).unwrap_or(0.0)
    }

    /// Text as it would be shown in a cell
    pub fn display_text(&self) -> String {
        match self {
            CellValue::Empty => String::new(),
            CellValue::Number(n) => format_plain_number(*n),
            CellValue::Text(s) => s.clone(),
            CellValue::Bool(b) => b.to_string(),
            CellValue::Date(d) => d.format("%Y-%m-%d").to_string(),
        }
    }

    /// Normalized text used for keys and category tests
    pub fn key_text(&self) -> String {
        self.display_text().trim().to_lowercase()
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_text())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::Text(s.to_string())
    }
}

/// Integers print without a trailing ".0"
fn format_plain_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// One decimal place, for display only
pub fn format_display(value: &CellValue) -> String {
    match value {
        CellValue::Number(n) => format!("{:.1}", n),
        other => other.display_text(),
    }
}

/// Lower-case and trim a column header so lookups are case/whitespace blind
pub fn normalize_column_name(name: &str) -> String {
    name.trim().to_lowercase()
}

//==============================================================================
// Rows and sheets
//==============================================================================

/// Physical row offset: header on sheet row 2 plus 1-based display
pub const ROW_NUMBER_OFFSET: usize = 3;

/// One data row of a sheet, keyed by normalized column name
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    /// Position among the data rows of the full sheet (before any filtering)
    pub index: usize,
    cells: HashMap<String, CellValue>,
}

impl Row {
    pub fn new(index: usize) -> Self {
        Self {
            index,
            cells: HashMap::new(),
        }
    }

    /// Build a row from (column, value) pairs; column names are normalized
    pub fn from_pairs<I, K, V>(index: usize, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<CellValue>,
    {
        let mut row = Row::new(index);
        for (k, v) in pairs {
            row.set(k.as_ref(), v.into());
        }
        row
    }

    pub fn set(&mut self, column: &str, value: CellValue) {
        self.cells.insert(normalize_column_name(column), value);
    }

    pub fn get(&self, column: &str) -> Option<&CellValue> {
        match self.cells.get(column) {
            Some(v) => Some(v),
            None => self.cells.get(&normalize_column_name(column)),
        }
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    /// Safe numeric read: missing column, empty cell or non-numeric text is 0
    pub fn number(&self, column: &str) -> f64 {
        self.get(column).map_or(0.0, CellValue::number_or_zero)
    }

    /// Category read: `None` when the column is missing or the cell is blank
    pub fn category(&self, column: &str) -> Option<String> {
        self.get(column)
            .filter(|v| !v.is_empty())
            .map(CellValue::key_text)
    }

    /// First non-empty value among `columns`
    pub fn first_present(&self, columns: &[String]) -> Option<&CellValue> {
        columns
            .iter()
            .filter_map(|c| self.get(c))
            .find(|v| !v.is_empty())
    }

    /// Row number as shown in mismatch reports
    pub fn row_number(&self) -> usize {
        self.index + ROW_NUMBER_OFFSET
    }

    /// The row's `date` cell, or empty
    pub fn date(&self) -> CellValue {
        self.get("date").cloned().unwrap_or(CellValue::Empty)
    }
}

/// A worksheet loaded into memory with normalized column names
#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    /// Column names in sheet order
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Sheet {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| normalize_column_name(c)).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn has_column(&self, column: &str) -> bool {
        let column = normalize_column_name(column);
        self.columns.iter().any(|c| *c == column)
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct values of the `month` column, in order of first appearance
    pub fn months(&self) -> Vec<String> {
        let mut months: Vec<String> = Vec::new();
        for row in &self.rows {
            if let Some(month) = row.category("month") {
                if !months.contains(&month) {
                    months.push(month);
                }
            }
        }
        months
    }

    /// Rows whose `month` equals `month` (case/whitespace blind).
    ///
    /// Row indices are kept so reported row numbers still point at the
    /// physical sheet row.
    pub fn filter_month(&self, month: &str) -> Result<Sheet, crate::ReviewError> {
        if !self.has_column("month") {
            return Err(crate::ReviewError::MissingColumn("month".to_string()));
        }
        let wanted = month.trim().to_lowercase();
        let rows: Vec<Row> = self
            .rows
            .iter()
            .filter(|r| r.category("month").as_deref() == Some(wanted.as_str()))
            .cloned()
            .collect();
        if rows.is_empty() {
            return Err(crate::ReviewError::EmptySelection(format!(
                "no rows for month '{}' in sheet '{}'",
                month, self.name
            )));
        }
        Ok(Sheet {
            name: self.name.clone(),
            columns: self.columns.clone(),
            rows,
        })
    }
}

//==============================================================================
// Tables (ledger and audit log workbooks)
//==============================================================================

/// A whole worksheet read with its header on the first row.
///
/// Header text is kept as found so the sheet can be written back unchanged;
/// lookups are case/whitespace blind.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    /// Worksheet name
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn column_index(&self, column: &str) -> Option<usize> {
        let wanted = normalize_column_name(column);
        self.columns
            .iter()
            .position(|c| normalize_column_name(c) == wanted)
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.column_index(column).is_some()
    }

    /// Index of a column that must exist
    pub fn require_column(&self, column: &str) -> Result<usize, crate::ReviewError> {
        self.column_index(column)
            .ok_or_else(|| crate::ReviewError::MissingColumn(column.to_string()))
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at (row, column index); short rows read as empty
    pub fn cell(&self, row: usize, column: usize) -> &CellValue {
        static EMPTY: CellValue = CellValue::Empty;
        self.rows
            .get(row)
            .and_then(|r| r.get(column))
            .unwrap_or(&EMPTY)
    }

    pub fn set_cell(&mut self, row: usize, column: usize, value: CellValue) {
        if let Some(r) = self.rows.get_mut(row) {
            if r.len() <= column {
                r.resize(column + 1, CellValue::Empty);
            }
            r[column] = value;
        }
    }

    /// Append a row given as (column, value) pairs; unknown columns are dropped
    pub fn push_pairs<'a, I>(&mut self, pairs: I)
    where
        I: IntoIterator<Item = (&'a str, CellValue)>,
    {
        let mut row = vec![CellValue::Empty; self.columns.len()];
        for (column, value) in pairs {
            if let Some(i) = self.column_index(column) {
                row[i] = value;
            }
        }
        self.rows.push(row);
    }

    /// Last row with its spreadsheet row number (header is row 1)
    pub fn last_row(&self) -> Option<(usize, &[CellValue])> {
        self.rows
            .last()
            .map(|r| (self.rows.len() + 1, r.as_slice()))
    }
}

//==============================================================================
// Ledger keys
//==============================================================================

/// `(identifier, month)` key of a ledger row, stored normalized
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct LedgerKey {
    pub identifier: String,
    pub month: String,
}

impl LedgerKey {
    pub fn new(identifier: &str, month: &str) -> Self {
        Self {
            identifier: identifier.trim().to_lowercase(),
            month: month.trim().to_lowercase(),
        }
    }

    pub fn from_cells(identifier: &CellValue, month: &CellValue) -> Self {
        Self::new(&identifier.display_text(), &month.display_text())
    }
}

impl fmt::Display for LedgerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} / {}", self.identifier, self.month)
    }
}
