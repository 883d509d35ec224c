use thiserror::Error;

pub type ReviewResult<T> = Result<T, ReviewError>;

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Formula error in '{location}': {message}")]
    Formula { location: String, message: String },

    #[error("Format configuration error: {0}")]
    Config(String),

    #[error("No format is registered for sheet '{0}'")]
    UnknownFormat(String),

    #[error("Column '{0}' is not present in the sheet")]
    MissingColumn(String),

    #[error("No data available: {0}")]
    EmptySelection(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Could not find a match for cost centre & month: {}", .0.join(", "))]
    UnmatchedKeys(Vec<String>),

    #[error("Ledger has more than one row for {0}")]
    DuplicateLedgerKey(String),

    #[error("{0} is locked by another writer (remove {0}.lock if it is stale)")]
    Locked(String),
}

impl ReviewError {
    /// Build a formula error tied to a format/column location
    pub fn formula(location: impl Into<String>, message: impl Into<String>) -> Self {
        ReviewError::Formula {
            location: location.into(),
            message: message.into(),
        }
    }
}
