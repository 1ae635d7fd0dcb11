//! Error types for panel-align

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for panel-align
#[derive(Error, Debug)]
pub enum AlignError {
    #[error("Data unavailable: {} does not exist or cannot be opened", .path.display())]
    DataUnavailable { path: PathBuf },

    #[error("Unsupported table format: {0}")]
    UnsupportedFormat(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Duplicate key ({entity}, {date}) in {source_name}")]
    DuplicateKey {
        entity: String,
        date: chrono::NaiveDate,
        source_name: String,
    },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Result type alias for panel-align operations
pub type Result<T> = std::result::Result<T, AlignError>;
