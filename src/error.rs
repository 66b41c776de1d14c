use std::path::PathBuf;

use thiserror::Error;

/// Convenience result type used across the crate.
pub type EtlResult<T> = Result<T, EtlError>;

/// Error type returned by parsing, inference, materialization and the run orchestrator.
///
/// Per-table kinds ([`EtlError::Parse`], [`EtlError::Schema`], [`EtlError::DuplicateTable`],
/// [`EtlError::Insert`]) are caught by the orchestrator, which skips the table and keeps going.
/// Everything else ends the run.
#[derive(Debug, Error)]
pub enum EtlError {
    /// The input folder is missing or unreadable.
    #[error("discovery error: cannot read folder '{}': {message}", folder.display())]
    Discovery { folder: PathBuf, message: String },

    /// A file could not be parsed into rows.
    #[error("parse error in '{}': {message}", path.display())]
    Parse { path: PathBuf, message: String },

    /// A schema could not be inferred for a table.
    #[error("schema error for table '{table}': {message}")]
    Schema { table: String, message: String },

    /// Two input files map to the same table name (SQLite compares names case-insensitively).
    #[error("duplicate table '{table}': '{}' already loads into it", first.display())]
    DuplicateTable { table: String, first: PathBuf },

    /// An insert failed (arity mismatch, constraint violation, ...).
    #[error("insert error in table '{table}': {source}")]
    Insert {
        table: String,
        #[source]
        source: rusqlite::Error,
    },

    /// The store file could not be opened or written.
    #[error("store io error for '{}': {source}", path.display())]
    StoreIo {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Invalid configuration (e.g. an empty table name).
    #[error("config error: {message}")]
    Config { message: String },

    /// An auxiliary query failed.
    #[error("query '{description}' failed: {source}")]
    Query {
        description: String,
        #[source]
        source: rusqlite::Error,
    },

    /// Underlying I/O error (history file, queries file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed queries file.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl EtlError {
    /// Returns `true` for errors that abort the whole run rather than a single table.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            EtlError::Parse { .. }
                | EtlError::Schema { .. }
                | EtlError::DuplicateTable { .. }
                | EtlError::Insert { .. }
        )
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        EtlError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        EtlError::Config {
            message: message.into(),
        }
    }
}
