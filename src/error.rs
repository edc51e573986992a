use thiserror::Error;

/// Raised when a deduplication config cannot be applied to a dataset.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("keys are empty")]
    EmptyKeys,

    #[error("dataset has no flag columns: {0:?}")]
    MissingFlagColumns(Vec<String>),

    #[error("dataset has no key columns: {0:?}")]
    MissingKeyColumns(Vec<String>),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DatasetError {
    #[error("row {row} has {found} values, expected {expected}")]
    RowWidth {
        row: usize,
        expected: usize,
        found: usize,
    },
}

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP request failed with status: {0}")]
    Status(reqwest::StatusCode),

    #[error("invalid table selector: {0}")]
    Selector(String),

    #[error("no table matching '{0}' found")]
    TableNotFound(String),

    #[error("unsupported input format: {0}")]
    UnsupportedFormat(String),

    #[error(transparent)]
    Dataset(#[from] DatasetError),
}
