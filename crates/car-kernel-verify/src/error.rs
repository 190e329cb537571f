//! Error types for the verification pipeline.
//!
//! Only structural failures are errors. Integrity failures (a broken link, a
//! bad signature) are recorded in the report and never surface here.

use thiserror::Error;

use car_kernel_bundle::BundleError;
use car_kernel_core::SchemaViolation;

/// Failures that stop the pipeline before any integrity check runs.
#[derive(Debug, Error)]
pub enum VerifyError {
    /// The container or its JSON could not be read.
    #[error("parse error: {0}")]
    Parse(String),

    /// A required structural field is missing or malformed.
    #[error("schema error: {0}")]
    Schema(#[from] SchemaViolation),

    /// The worker pool could not be started.
    #[error("verifier initialization failed: {0}")]
    Init(String),
}

impl From<BundleError> for VerifyError {
    fn from(e: BundleError) -> Self {
        VerifyError::Parse(e.to_string())
    }
}

impl From<serde_json::Error> for VerifyError {
    fn from(e: serde_json::Error) -> Self {
        VerifyError::Parse(e.to_string())
    }
}

/// Result type for verification setup.
pub type Result<T> = std::result::Result<T, VerifyError>;
