//! Subcommands of the `car` CLI.

pub mod canonicalize;
pub mod inspect;
pub mod keygen;
pub mod verify;

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use anyhow::{Context, Result};
use serde_json::Value;

use car_kernel_bundle::{is_zip, read_bundle, Bundle, BundleLimits};

/// Process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
    /// The command succeeded; for `verify`, the receipt verified.
    Ok = 0,
    /// The receipt failed an integrity check.
    Failed = 1,
    /// The input could not be read, parsed or understood.
    Structural = 2,
}

impl From<Exit> for ExitCode {
    fn from(exit: Exit) -> Self {
        ExitCode::from(exit as u8)
    }
}

/// Read an input file.
pub fn read_input(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("failed to read {}", path.display()))
}

/// Parse the receipt JSON out of a file's bytes, unpacking a bundle if needed.
///
/// Returns the parsed document and the bundle it came from, if any.
pub fn load_document(bytes: &[u8], limits: &BundleLimits) -> Result<(Value, Option<Bundle>)> {
    if is_zip(bytes) {
        let bundle = read_bundle(bytes, limits).context("failed to open bundle")?;
        let value = serde_json::from_slice(&bundle.receipt)
            .context("car.json in bundle is not valid JSON")?;
        Ok((value, Some(bundle)))
    } else {
        let value = serde_json::from_slice(bytes).context("input is not valid JSON")?;
        Ok((value, None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Exit::Ok as u8, 0);
        assert_eq!(Exit::Failed as u8, 1);
        assert_eq!(Exit::Structural as u8, 2);
    }

    #[test]
    fn test_load_document_plain_json() {
        let (value, bundle) = load_document(br#"{"a":1}"#, &BundleLimits::default()).unwrap();
        assert_eq!(value["a"], 1);
        assert!(bundle.is_none());
    }

    #[test]
    fn test_load_document_rejects_garbage() {
        let err = load_document(b"not json", &BundleLimits::default()).unwrap_err();
        assert!(format!("{err:#}").contains("not valid JSON"));
    }

    #[test]
    fn test_missing_file() {
        let err = read_input(Path::new("/nonexistent/receipt.json")).unwrap_err();
        assert!(err.to_string().contains("failed to read"));
    }
}
