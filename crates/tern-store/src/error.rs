//! Error types for the migration store.

use thiserror::Error;

/// Migration store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The store table could not be created (S001).
    #[error("[S001] Migration store initialization failed: {0}")]
    InitError(String),

    /// Applied records could not be read (S002).
    #[error("[S002] Migration store read failed: {0}")]
    ReadError(String),

    /// An applied record could not be written or removed (S003).
    #[error("[S003] Migration store write failed: {0}")]
    WriteError(String),

    /// A stored row does not describe a valid record (S004).
    #[error("[S004] Migration store holds a malformed record: {0}")]
    CorruptRecord(String),
}

/// Result type alias for [`StoreError`].
pub type StoreResult<T> = Result<T, StoreError>;
