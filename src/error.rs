//! Error type shared by the ETL session core.
//!
//! Cell-level mapping failures are not errors: they are recorded on the cell
//! itself (see [`crate::model::EtlCell`]). Everything here aborts the current
//! operation and leaves the store unchanged.

use thiserror::Error;

use crate::model::EtlColumnType;

pub type EtlResult<T> = std::result::Result<T, EtlError>;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EtlError {
    // === Precondition violations ===
    /// An operation needs a loaded table but the store is empty.
    #[error("no table is loaded")]
    NoActiveTable,

    #[error("column index {index} is out of range (table has {count} column(s))")]
    ColumnIndex { index: usize, count: usize },

    #[error("row index {index} is out of range (column has {count} row(s))")]
    RowIndex { index: usize, count: usize },

    #[error("column '{header}' has {found} row(s) but the table has {expected}")]
    RowCountMismatch {
        header: String,
        expected: usize,
        found: usize,
    },

    #[error("invalid metadata for column '{header}': {message}")]
    InvalidMetadata { header: String, message: String },

    #[error("transform '{transform}' is not allowed on {column_type} columns")]
    NotAllowed {
        transform: String,
        column_type: EtlColumnType,
    },

    #[error("unknown transform '{0}'")]
    UnknownTransform(String),

    #[error("dialog returned an unexpected response: expected {expected}")]
    UnexpectedDialogResponse { expected: &'static str },

    #[error("{0}")]
    Precondition(String),

    // === Concurrency ===
    /// The table changed between the start of an operation and its commit.
    #[error(
        "table changed while the operation was in progress \
         (expected version {expected}, found {found})"
    )]
    StaleSnapshot { expected: u64, found: u64 },

    // === Reconciliation ===
    #[error(
        "conflicting annotations for term {term_id}: \
         existing({existing_onset}, {existing_observed}), new({new_onset}, {new_observed})"
    )]
    Conflict {
        term_id: String,
        existing_onset: String,
        existing_observed: bool,
        new_onset: String,
        new_observed: bool,
    },

    #[error("invalid onset string '{0}'")]
    InvalidOnset(String),

    #[error("invalid span {start}..{end} for text length {length}")]
    InvalidSpan {
        start: usize,
        end: usize,
        length: usize,
    },

    #[error("projection failed: {0}")]
    Projection(String),

    // === External calls ===
    #[error("backend call '{command}' failed: {message}")]
    External { command: String, message: String },
}

impl EtlError {
    pub fn external(command: &str, message: impl Into<String>) -> Self {
        EtlError::External {
            command: command.to_string(),
            message: message.into(),
        }
    }
}
