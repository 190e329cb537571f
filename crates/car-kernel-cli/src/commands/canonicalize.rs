//! `car canonicalize`: print the bytes every hash is computed over.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use serde_json::Value;

use car_kernel_bundle::BundleLimits;
use car_kernel_core::{canonical_string, receipt_id_from_object};

use super::{load_document, read_input, Exit};

#[derive(Args, Debug)]
pub struct CanonicalizeCmd {
    /// JSON document or ZIP bundle.
    pub file: PathBuf,

    /// Print only the canonical text.
    #[arg(long)]
    pub quiet: bool,
}

/// Run the canonicalize command.
pub fn run(cmd: &CanonicalizeCmd, out: &mut impl Write) -> Result<Exit> {
    let bytes = read_input(&cmd.file)?;
    let (value, _) = load_document(&bytes, &BundleLimits::default())?;
    let canonical = canonical_string(&value).context("document cannot be canonicalized")?;

    writeln!(out, "{canonical}")?;
    if !cmd.quiet {
        if let Value::Object(object) = &value {
            let id = receipt_id_from_object(object).context("failed to compute receipt id")?;
            writeln!(out, "id: {id}")?;
        }
    }
    Ok(Exit::Ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use car_kernel_testkit::vectors::{canonical_vectors, GOLDEN_RECEIPT, GOLDEN_RECEIPT_ID};
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn canonicalize(bytes: &[u8], quiet: bool) -> String {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(bytes).unwrap();
        let mut out = Vec::new();
        run(
            &CanonicalizeCmd {
                file: file.path().to_path_buf(),
                quiet,
            },
            &mut out,
        )
        .unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_vectors_through_cli() {
        for vector in canonical_vectors() {
            let text = canonicalize(vector.input.as_bytes(), true);
            assert_eq!(text.trim_end_matches('\n'), vector.canonical, "{}", vector.name);
        }
    }

    #[test]
    fn test_golden_id() {
        let text = canonicalize(GOLDEN_RECEIPT.as_bytes(), false);
        let last = text.lines().last().unwrap();
        assert_eq!(last, format!("id: {GOLDEN_RECEIPT_ID}"));
    }

    #[test]
    fn test_non_object_has_no_id() {
        let text = canonicalize(b"[3, 1, 2]", false);
        assert_eq!(text, "[3,1,2]\n");
    }
}
