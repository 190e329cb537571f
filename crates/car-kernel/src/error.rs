//! Error types for the Kernel.

use car_kernel_bundle::BundleError;
use car_kernel_core::CoreError;
use thiserror::Error;

/// Errors that can occur during emitter operations.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Chain building, assembly or signing failed.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// Bundle writing or caching failed.
    #[error("bundle error: {0}")]
    Bundle(#[from] BundleError),

    /// No open run with this id.
    #[error("run not found: {0}")]
    RunNotFound(String),

    /// A run with this id is already open.
    #[error("run already open: {0}")]
    RunExists(String),

    /// The operation does not fit the run it targets.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// The emitter was built without a bundle cache.
    #[error("no bundle cache configured")]
    NoCache,
}

/// Result type for Kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;
