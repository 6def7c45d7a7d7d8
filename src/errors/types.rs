//! Error type definitions for the ETL pipeline
//!
//! A resolution miss is not represented here: failing to match a play event
//! against the song catalog is an expected outcome and yields null foreign
//! keys, not an error.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level pipeline error type
#[derive(Error, Debug)]
pub enum EtlError {
    /// A raw record is missing required fields, carries the wrong types, or
    /// has an undecodable timestamp. Aborts the current file in row-wise mode.
    #[error("Malformed record{}: {}", path_suffix(.path), .message)]
    MalformedRecord {
        path: Option<PathBuf>,
        message: String,
    },

    /// DDL or DML rejected by the engine. Fatal to the current file
    /// (row-wise) or the current table transform (set-wise).
    #[error("Statement failed: {0}")]
    Statement(#[from] sqlx::Error),

    /// Bulk copy into a staging table failed. Fatal to the run, since the
    /// transforms depend on staging contents.
    #[error("Bulk copy into {table} failed: {source}")]
    BulkCopy {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Filesystem errors while discovering or reading input files
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn path_suffix(path: &Option<PathBuf>) -> String {
    match path {
        Some(p) => format!(" in {}", p.display()),
        None => String::new(),
    }
}

impl EtlError {
    /// Create a malformed-record error with no file context
    pub fn malformed<S: Into<String>>(message: S) -> Self {
        Self::MalformedRecord {
            path: None,
            message: message.into(),
        }
    }

    /// Attach file context to a malformed-record error, pass others through
    pub fn in_file(self, path: &std::path::Path) -> Self {
        match self {
            Self::MalformedRecord { message, .. } => Self::MalformedRecord {
                path: Some(path.to_path_buf()),
                message,
            },
            other => other,
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create a bulk copy error for a staging table
    pub fn bulk_copy<T: Into<String>>(table: T, source: sqlx::Error) -> Self {
        Self::BulkCopy {
            table: table.into(),
            source,
        }
    }

    /// Create an I/O error with path context
    pub fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}
