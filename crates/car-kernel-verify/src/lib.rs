//! # CAR Kernel Verify
//!
//! Offline verification of Content-Addressable Receipts.
//!
//! Verification is a pure function of the input bytes: no shared mutable
//! state, no I/O beyond reading the supplied buffer, no retries.
//!
//! ## Key Types
//!
//! - [`Verifier`] - The capability contract: `init_verifier`, `verify_car_bytes`, `verify_car_json`
//! - [`NativeVerifier`] - Native implementation with a rayon pool for content hashing
//! - [`SandboxedVerifier`] - Single-threaded implementation for isolated hosts
//! - [`Report`] - Sanitized, typed outcome of every check
//! - [`VerifierConfig`] - Limits, parallelism and provenance policy
//!
//! ## Usage
//!
//! ```rust,no_run
//! use car_kernel_verify::{NativeVerifier, Verifier, VerifierConfig};
//!
//! let mut verifier = NativeVerifier::new(VerifierConfig::default());
//! verifier.init_verifier().unwrap();
//!
//! let bytes = std::fs::read("receipt.zip").unwrap();
//! let report = verifier.verify_car_bytes(&bytes);
//! println!("{report}");
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod sanitize;
pub mod schema;
pub mod verifier;

pub use config::VerifierConfig;
pub use error::{Result, VerifyError};
pub use report::{
    AttachmentReport, AttachmentStatus, CheckpointReport, ClaimReport, ClaimStatus, Container,
    Coverage, Issue, IssueCode, Report, SchemaGeneration, SemanticReport, Severity,
    SignatureOutcome, SignatureReport, Status,
};
pub use sanitize::Sanitizer;
pub use schema::{normalize, NormalizedReceipt};
pub use verifier::{Capabilities, NativeVerifier, SandboxedVerifier, Verifier};
