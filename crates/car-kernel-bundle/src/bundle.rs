//! ZIP bundle layout.
//!
//! ```text
//! car.json
//! attachments/<sha256>
//! attachments/<sha256>.txt
//! ```
//!
//! Attachment names encode the hash of their content. Everything else in the
//! archive is ignored. Bundles are read fully in memory and never extracted to
//! disk.

use std::io::{Cursor, Read, Write};

use bytes::Bytes;
use tracing::{debug, trace};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use car_kernel_core::{is_sha256_hex, sha256_hex};

use crate::error::{BundleError, Result};

/// Name of the receipt entry at the archive root.
pub const RECEIPT_ENTRY: &str = "car.json";

/// Directory holding content-addressed attachments.
pub const ATTACHMENTS_DIR: &str = "attachments/";

/// Local file header magic of a ZIP archive.
pub const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// Bounds on what a bundle may expand to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleLimits {
    /// Maximum number of archive entries.
    pub max_entries: usize,
    /// Maximum uncompressed size of one entry.
    pub max_entry_bytes: u64,
    /// Maximum uncompressed size of all entries together.
    pub max_total_bytes: u64,
}

impl Default for BundleLimits {
    fn default() -> Self {
        Self {
            max_entries: 10_000,
            max_entry_bytes: 64 * 1024 * 1024,
            max_total_bytes: 256 * 1024 * 1024,
        }
    }
}

/// A named blob inside a bundle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    /// Full entry path, e.g. `attachments/<sha256>.txt`.
    pub name: String,
    pub content: Bytes,
}

impl Attachment {
    /// Create an attachment named after the hash of its content.
    pub fn from_content(content: impl Into<Bytes>, extension: Option<&str>) -> Self {
        let content = content.into();
        let sha = sha256_hex(&content);
        let name = match extension {
            Some(ext) => format!("{ATTACHMENTS_DIR}{sha}.{ext}"),
            None => format!("{ATTACHMENTS_DIR}{sha}"),
        };
        Self { name, content }
    }

    /// The hash encoded in the file name, if the name carries one.
    ///
    /// The extension, if any, is not part of the hash.
    pub fn expected_sha256(&self) -> Option<&str> {
        let file = self.name.rsplit('/').next().unwrap_or(&self.name);
        let stem = file.split_once('.').map_or(file, |(stem, _)| stem);
        is_sha256_hex(stem).then_some(stem)
    }

    /// SHA-256 of the content.
    pub fn actual_sha256(&self) -> String {
        sha256_hex(&self.content)
    }
}

/// A parsed bundle.
#[derive(Debug, Clone, Default)]
pub struct Bundle {
    /// Raw bytes of `car.json`.
    pub receipt: Bytes,
    pub attachments: Vec<Attachment>,
}

/// Whether the bytes start like a ZIP archive.
pub fn is_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(ZIP_MAGIC)
}

/// Read a bundle from memory, enforcing `limits`.
pub fn read_bundle(bytes: &[u8], limits: &BundleLimits) -> Result<Bundle> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    if archive.len() > limits.max_entries {
        return Err(BundleError::LimitExceeded {
            what: "entry count",
            limit: limits.max_entries as u64,
        });
    }

    let mut receipt = None;
    let mut attachments = Vec::new();
    let mut total: u64 = 0;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if name.starts_with('/') || name.split('/').any(|part| part == "..") {
            return Err(BundleError::InvalidEntryName(name));
        }

        let is_receipt = name == RECEIPT_ENTRY;
        let is_attachment = name.starts_with(ATTACHMENTS_DIR) && name.len() > ATTACHMENTS_DIR.len();
        if !is_receipt && !is_attachment {
            trace!(entry = %name, "ignoring bundle entry");
            continue;
        }

        if entry.size() > limits.max_entry_bytes {
            return Err(BundleError::LimitExceeded {
                what: "entry size",
                limit: limits.max_entry_bytes,
            });
        }
        let content = read_limited(&mut entry, limits.max_entry_bytes)?;
        total += content.len() as u64;
        if total > limits.max_total_bytes {
            return Err(BundleError::LimitExceeded {
                what: "total size",
                limit: limits.max_total_bytes,
            });
        }

        if is_receipt {
            receipt = Some(Bytes::from(content));
        } else {
            attachments.push(Attachment {
                name,
                content: Bytes::from(content),
            });
        }
    }

    let receipt = receipt.ok_or(BundleError::MissingReceipt)?;
    debug!(
        attachments = attachments.len(),
        bytes = total,
        "read bundle"
    );
    Ok(Bundle {
        receipt,
        attachments,
    })
}

/// Read at most `limit` bytes. Declared sizes are not trusted.
fn read_limited(reader: &mut impl Read, limit: u64) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    reader.take(limit + 1).read_to_end(&mut out)?;
    if out.len() as u64 > limit {
        return Err(BundleError::LimitExceeded {
            what: "entry size",
            limit,
        });
    }
    Ok(out)
}

/// Write a bundle with `car.json` at the root and the given attachments.
pub fn write_bundle(receipt_json: &[u8], attachments: &[Attachment]) -> Result<Vec<u8>> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    writer.start_file(RECEIPT_ENTRY, options)?;
    writer.write_all(receipt_json)?;

    for attachment in attachments {
        if !attachment.name.starts_with(ATTACHMENTS_DIR) {
            return Err(BundleError::InvalidEntryName(attachment.name.clone()));
        }
        writer.start_file(attachment.name.as_str(), options)?;
        writer.write_all(&attachment.content)?;
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}
