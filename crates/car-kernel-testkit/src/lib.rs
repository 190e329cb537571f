//! # CAR Kernel Testkit
//!
//! Testing utilities for the CAR Kernel.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: fixed inputs with expected canonical bytes, chain
//!   links and a complete signed receipt, for cross-implementation checks
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: Helper structs for building chains, receipts and bundles
//!
//! ## Golden Vectors
//!
//! ```rust
//! use car_kernel_testkit::vectors::verify_all_vectors;
//!
//! for (name, matches, canonical) in verify_all_vectors() {
//!     assert!(matches, "{name}: {canonical}");
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use car_kernel_testkit::generators::{ReceiptParams, receipt_from_params};
//!
//! proptest! {
//!     #[test]
//!     fn receipt_id_is_deterministic(params: ReceiptParams) {
//!         let r1 = receipt_from_params(&params);
//!         let r2 = receipt_from_params(&params);
//!         prop_assert_eq!(r1.id, r2.id);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use car_kernel_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new();
//! let receipt = fixture.receipt(3, &[&b"prompt"[..]]);
//! assert_eq!(receipt.checkpoints.len(), 3);
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_party_fixtures, TestFixture};
