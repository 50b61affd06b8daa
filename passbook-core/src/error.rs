//! Error taxonomy shared by the parser crates.
//!
//! Malformed individual lines are not errors: they are skipped where they are found.
//! Everything here is surfaced to the caller.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StatementError {
    #[error("failed to extract text from {path}: {reason}")]
    Extraction { path: PathBuf, reason: String },

    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("no transaction lines found")]
    EmptyDocument,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl StatementError {
    pub fn extraction(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        StatementError::Extraction {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn schema(msg: impl Into<String>) -> Self {
        StatementError::SchemaMismatch(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, StatementError>;
