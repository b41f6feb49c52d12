use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum KiraError {
    #[error("dataset file not found: {0}")]
    #[diagnostic(help("set `data_path` in kira-sightings.json or pass --data"))]
    DatasetNotFound(PathBuf),

    #[error("failed to read dataset {path}: {message}")]
    DatasetRead { path: PathBuf, message: String },

    #[error("failed to parse dataset at line {line}: {message}")]
    DatasetParse { line: u64, message: String },

    #[error("dataset is missing required column `{0}`")]
    MissingColumn(String),

    #[error("dataset has no usable observations")]
    #[diagnostic(help("every row lacked coordinates or a parseable eventDate"))]
    EmptyDataset,

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid config value: {0}")]
    InvalidConfig(String),

    #[error("invalid period (expected YYYY-MM): {0}")]
    InvalidPeriod(String),

    #[error("invalid date range: {start} is after {end}")]
    InvalidDateRange { start: String, end: String },

    #[error("unknown species: {0}")]
    UnknownCategory(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),
}
