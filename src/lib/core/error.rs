//! Error types for the featcount library

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeatCountError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Alignment source error: {0}")]
    Htslib(#[from] rust_htslib::errors::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Parse error in {path} at line {line}: {message}", path = .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Reference sequence '{0}' not found in alignment source")]
    ReferenceNotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{failed} of {total} regions failed; first failure: {first}")]
    RegionsFailed {
        failed: usize,
        total: usize,
        first: String,
    },

    #[error("Run cancelled before all regions were processed")]
    Cancelled,
}

impl FeatCountError {
    pub(crate) fn parse<P: Into<PathBuf>, M: Into<String>>(path: P, line: usize, message: M) -> Self {
        FeatCountError::Parse {
            path: path.into(),
            line,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FeatCountError>;
