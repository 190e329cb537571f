//! # CAR Kernel
//!
//! The unified API for Content-Addressable Receipts: tamper-evident records
//! of automated workflow runs.
//!
//! ## Overview
//!
//! - **Emit**: record checkpoints as a run progresses, each hash-linked to the
//!   one before it, then assemble, address and sign the receipt
//! - **Bundle**: pack a receipt with the content its provenance claims point at
//! - **Verify**: recompute every hash and check every signature, offline
//!
//! ## Usage
//!
//! ```rust,no_run
//! use car_kernel::{Emitter, EmitterConfig};
//! use car_kernel::core::{CheckpointId, CheckpointPayload, Keypair, RunMetadata};
//! use car_kernel::verify::{NativeVerifier, Verifier, VerifierConfig};
//!
//! async fn example() -> car_kernel::Result<()> {
//!     let emitter = Emitter::new(Some(Keypair::generate()), EmitterConfig::default());
//!
//!     emitter.start_run("run-1").await?;
//!     let id = CheckpointId::new("ckpt:1").unwrap();
//!     let payload = CheckpointPayload::new(id, "run-1", "step", "2026-01-01T00:00:00Z");
//!     emitter.record_checkpoint("run-1", payload).await?;
//!
//!     let assembler = emitter.assembler("run-1", RunMetadata::new("workflow"));
//!     let receipt = emitter.finalize("run-1", assembler).await?;
//!
//!     let verifier = NativeVerifier::new(VerifierConfig::default());
//!     let report = verifier.verify_car_json(&receipt.to_json_pretty()?);
//!     assert!(report.is_verified());
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `car_kernel::core` - canonical form, hashing, signing, receipt model
//! - `car_kernel::bundle` - ZIP bundles and the pending-bundle cache
//! - `car_kernel::verify` - the verification pipeline and report

pub mod emitter;
pub mod error;

// Re-export component crates
pub use car_kernel_bundle as bundle;
pub use car_kernel_core as core;
pub use car_kernel_verify as verify;

pub use emitter::{now_millis, now_rfc3339, Emitter, EmitterConfig};
pub use error::{KernelError, Result};

// Re-export commonly used types
pub use car_kernel_core::{CarId, CheckpointId, Keypair, Receipt, ReceiptAssembler, Signer};
pub use car_kernel_verify::{NativeVerifier, Report, SandboxedVerifier, Verifier, VerifierConfig};
