//! Error types for the circulation store

use std::path::PathBuf;

use thiserror::Error;

/// Failure to open the store or provision its tables. Fatal to the caller.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to open store at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("failed to configure connection: {0}")]
    Pragma(#[source] rusqlite::Error),

    #[error("failed to create table {table}: {source}")]
    Create {
        table: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

/// Errors returned by [`crate::lending::borrow`]
#[derive(Debug, Error)]
pub enum BorrowError {
    /// An identifier was empty after trimming
    #[error("{0} must not be empty")]
    EmptyIdentifier(&'static str),

    #[error("book {0} not found")]
    BookNotFound(String),

    #[error("book {0} has no copies in stock")]
    InsufficientStock(String),

    #[error("reader {0} not found")]
    ReaderNotFound(String),

    /// The transaction could not be opened, executed or committed
    #[error("borrow transaction failed: {0}")]
    TransactionFailure(#[from] rusqlite::Error),
}

impl BorrowError {
    /// Expected rejection; the store is healthy.
    pub fn is_business_rule(&self) -> bool {
        matches!(
            self,
            BorrowError::BookNotFound(_)
                | BorrowError::InsufficientStock(_)
                | BorrowError::ReaderNotFound(_)
        )
    }

    pub fn is_infrastructure(&self) -> bool {
        matches!(self, BorrowError::TransactionFailure(_))
    }
}

/// Errors returned by [`crate::lending::return_book`]
#[derive(Debug, Error)]
pub enum ReturnError {
    #[error("borrow record {0} does not exist or was already returned")]
    RecordNotFoundOrAlreadyReturned(i64),

    #[error("return transaction failed: {0}")]
    TransactionFailure(#[from] rusqlite::Error),
}

impl ReturnError {
    pub fn is_business_rule(&self) -> bool {
        matches!(self, ReturnError::RecordNotFoundOrAlreadyReturned(_))
    }

    pub fn is_infrastructure(&self) -> bool {
        matches!(self, ReturnError::TransactionFailure(_))
    }
}

/// Errors from creating or deleting books and readers
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0} must not be empty")]
    EmptyField(&'static str),

    #[error("stock must not be negative (got {0})")]
    NegativeStock(i64),

    #[error("{entity} {id} already exists")]
    DuplicateId { entity: &'static str, id: String },

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("store error: {0}")]
    Store(#[from] rusqlite::Error),
}

/// Read-side failure (queries and export)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("query failed: {0}")]
    Query(#[from] rusqlite::Error),

    #[error("failed to write export: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}
