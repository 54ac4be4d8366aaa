//! Error types for berclean.
//!
//! Library crates use [`BerCleanError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all berclean operations.
#[derive(Debug, thiserror::Error)]
pub enum BerCleanError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Input batch is missing one or more required columns.
    #[error("schema error: missing required column(s): {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    /// A cell could not be parsed into the type its column requires.
    #[error("parse error at row {row}, column `{column}`: {message}")]
    Parse {
        row: usize,
        column: String,
        message: String,
    },

    /// A reference table has no entry for a key the pipeline relies on.
    #[error("lookup error: {message}")]
    Lookup { message: String },

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// CSV reader/writer error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Data validation error (bad table file, invalid option, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BerCleanError>;

impl BerCleanError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error for a given row and column.
    pub fn parse(row: usize, column: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Parse {
            row,
            column: column.into(),
            message: msg.into(),
        }
    }

    /// Create a lookup error from any displayable message.
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::Lookup {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Shift the row of a parse error by `offset`, e.g. the first row of a chunk.
    pub fn with_row_offset(self, offset: usize) -> Self {
        match self {
            Self::Parse {
                row,
                column,
                message,
            } => Self::Parse {
                row: row + offset,
                column,
                message,
            },
            other => other,
        }
    }
}
