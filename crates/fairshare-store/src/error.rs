//! Error type for the accounting-store reader/writer boundary.

use thiserror::Error;

/// Errors raised while loading or persisting an account-node hierarchy.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No bank row had an empty `parent_bank` (spec.md §4.1 step 1).
    #[error("no root bank found: exactly one bank must have an empty parent")]
    RootMissing,

    /// More than one bank row had an empty `parent_bank`.
    #[error("multiple root banks found: {0:?}")]
    MultipleRoots(Vec<String>),

    /// A bank referenced as a parent has no row of its own.
    #[error("bank {0:?} has no row in bank_table")]
    BankNotFound(String),

    /// A `shares` or `usage` column did not parse as a non-negative integer.
    #[error("{table}.{column} for {row:?} is not a valid non-negative integer: {source}")]
    InvalidInteger {
        table: &'static str,
        column: &'static str,
        row: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// A `fairshare` column did not parse as a floating-point number, or was
    /// read as an empty string. Per spec.md §9 this is a hard error, never a
    /// silent coercion to `0.0`.
    #[error("{table}.fairshare for {row:?} is not a valid number: {detail}")]
    InvalidFairshare { table: &'static str, row: String, detail: String },

    /// The in-memory walk rejected the tree it was handed.
    #[error(transparent)]
    Core(#[from] fairshare_core::CoreError),

    /// The SQLite backend reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result alias used throughout `fairshare-store`.
pub type StoreResult<T> = Result<T, StoreError>;
