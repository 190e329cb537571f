//! Error types for the bundle module.

use thiserror::Error;

/// Errors that can occur while reading, writing or caching bundles.
#[derive(Debug, Error)]
pub enum BundleError {
    /// The ZIP container could not be read or written.
    #[error("zip error: {0}")]
    Zip(String),

    /// The archive has no `car.json` at its root.
    #[error("bundle has no car.json at its root")]
    MissingReceipt,

    /// An extraction limit was exceeded.
    #[error("bundle exceeds {what} limit of {limit}")]
    LimitExceeded { what: &'static str, limit: u64 },

    /// An entry name is not acceptable inside a bundle.
    #[error("invalid bundle entry name `{0}`")]
    InvalidEntryName(String),

    /// Cache lock was poisoned by a panicking holder.
    #[error("bundle cache lock poisoned")]
    LockPoisoned,

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for BundleError {
    fn from(e: zip::result::ZipError) -> Self {
        BundleError::Zip(e.to_string())
    }
}

/// Result type for bundle operations.
pub type Result<T> = std::result::Result<T, BundleError>;
