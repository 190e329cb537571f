//! # CAR Kernel Bundle
//!
//! Container formats for Content-Addressable Receipts.
//!
//! A receipt travels either as plain JSON or as a ZIP bundle holding
//! `car.json` plus content-addressed attachments. This crate reads and writes
//! that layout and provides an injected cache for bundles awaiting pickup.
//!
//! ## Key Types
//!
//! - [`Bundle`] - A parsed bundle: receipt bytes plus attachments
//! - [`Attachment`] - A blob named by the SHA-256 of its content
//! - [`BundleLimits`] - Bounds on entry count and expanded size
//! - [`BundleCache`] - The async trait for pending-bundle storage
//! - [`MemoryBundleCache`] - In-memory cache with an [`ExpiryPolicy`]
//!
//! ## Usage
//!
//! ```rust,no_run
//! use car_kernel_bundle::{read_bundle, write_bundle, Attachment, BundleLimits};
//!
//! let note = Attachment::from_content(&b"input text"[..], Some("txt"));
//! let zip = write_bundle(br#"{"id":"car:..."}"#, &[note]).unwrap();
//! let bundle = read_bundle(&zip, &BundleLimits::default()).unwrap();
//! assert_eq!(bundle.attachments.len(), 1);
//! ```

pub mod bundle;
pub mod error;
pub mod memory;
pub mod traits;

pub use bundle::{
    is_zip, read_bundle, write_bundle, Attachment, Bundle, BundleLimits, ATTACHMENTS_DIR,
    RECEIPT_ENTRY,
};
pub use error::{BundleError, Result};
pub use memory::MemoryBundleCache;
pub use traits::{BundleCache, ExpiryPolicy};
