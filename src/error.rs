use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Buffer pool exhausted: {0}")]
    BufferExhausted(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Verification aborted")]
    VerifyAborted,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Not supported: {0}")]
    NotSupported(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Lock timeout")]
    LockTimeout,

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Null data is not assignable")]
    NullNotAssignable,

    #[error("Recovery error: {0}")]
    Recovery(String),

    #[error("Corruption detected: {0}")]
    Corruption(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Page not found: {0}")]
    PageNotFound(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

// Error conversions for common error types

impl From<bincode::error::EncodeError> for DbError {
    fn from(e: bincode::error::EncodeError) -> Self {
        DbError::Serialization(e.to_string())
    }
}

impl From<bincode::error::DecodeError> for DbError {
    fn from(e: bincode::error::DecodeError) -> Self {
        DbError::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for DbError {
    fn from(e: serde_json::Error) -> Self {
        DbError::Serialization(e.to_string())
    }
}
