use std::path::PathBuf;

use thiserror::Error;

pub type ReportResult<T> = Result<T, ReportError>;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("Input file not found: {0}")]
    MissingFile(PathBuf),

    #[error("Missing required columns: {0:?}")]
    MissingColumns(Vec<String>),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Unknown report type: {0}")]
    UnknownVariant(String),

    #[error("Unknown week selector '{selector}' for report type {variant}")]
    UnknownWeek { variant: String, selector: String },

    #[error("Unmatched spreadsheet structure: {0}")]
    UnmatchedStructure(String),

    #[error("Workbook error: {0}")]
    Workbook(String),

    #[error("CSV error: {0}")]
    Csv(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for ReportError {
    fn from(e: config::ConfigError) -> Self {
        ReportError::Config(e.to_string())
    }
}
