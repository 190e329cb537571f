//! `car inspect`: show what a receipt claims, without checking any of it.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use car_kernel_bundle::BundleLimits;
use car_kernel_verify::{normalize, SchemaGeneration};

use super::{load_document, read_input, Exit};

#[derive(Args, Debug)]
pub struct InspectCmd {
    /// Receipt JSON or ZIP bundle.
    pub file: PathBuf,
}

/// Run the inspect command.
pub fn run(cmd: &InspectCmd, out: &mut impl Write) -> Result<Exit> {
    let bytes = read_input(&cmd.file)?;
    let (value, bundle) = load_document(&bytes, &BundleLimits::default())?;
    let normalized = normalize(value).context("receipt does not match the schema")?;
    let receipt = &normalized.receipt;

    let generation = match normalized.generation {
        SchemaGeneration::Legacy => "legacy",
        SchemaGeneration::Current => "current",
    };
    let signer = if receipt.is_unsigned() {
        "(unsigned)"
    } else {
        receipt.signer_public_key.as_str()
    };

    writeln!(out, "receipt:     {}", normalized.stored_id)?;
    writeln!(out, "run:         {}", receipt.run_id)?;
    writeln!(out, "workflow:    {}", receipt.run.workflow_id)?;
    writeln!(out, "created:     {}", receipt.created_at)?;
    writeln!(out, "match kind:  {}", receipt.proof.match_kind())?;
    writeln!(out, "schema:      {generation}")?;
    writeln!(out, "signer:      {signer}")?;
    writeln!(out, "grade:       {}", receipt.sgrade.score)?;
    writeln!(
        out,
        "checkpoints: {}",
        receipt.proof.process().map_or(0, |p| p.len())
    )?;
    if let Some(process) = receipt.proof.process() {
        for checkpoint in process.checkpoints() {
            writeln!(
                out,
                "  {} {} {}",
                checkpoint.id(),
                checkpoint.payload.kind,
                checkpoint.payload.timestamp
            )?;
        }
    }
    writeln!(out, "claims:      {}", receipt.provenance.len())?;
    for claim in &receipt.provenance {
        writeln!(out, "  {:?} {}", claim.claim_type, claim.sha256)?;
    }
    if let Some(bundle) = bundle {
        writeln!(out, "attachments: {}", bundle.attachments.len())?;
        for attachment in &bundle.attachments {
            writeln!(out, "  {} ({} bytes)", attachment.name, attachment.content.len())?;
        }
    }
    Ok(Exit::Ok)
}

#[cfg(test)]
mod tests {
    use super::*;
    use car_kernel_testkit::fixtures::TestFixture;
    use car_kernel_testkit::vectors::{GOLDEN_RECEIPT, GOLDEN_RECEIPT_ID};
    use std::io::Write as _;
    use tempfile::NamedTempFile;

    fn inspect(bytes: &[u8]) -> Result<String> {
        let mut file = NamedTempFile::new()?;
        file.write_all(bytes)?;
        let mut out = Vec::new();
        run(
            &InspectCmd {
                file: file.path().to_path_buf(),
            },
            &mut out,
        )?;
        Ok(String::from_utf8(out)?)
    }

    #[test]
    fn test_inspect_golden() {
        let text = inspect(GOLDEN_RECEIPT.as_bytes()).unwrap();
        assert!(text.contains(GOLDEN_RECEIPT_ID));
        assert!(text.contains("match kind:  exact"));
        assert!(text.contains("schema:      current"));
        assert!(text.contains("checkpoints: 2"));
        assert!(text.contains("ckpt:2 llm_call"));
        assert!(text.contains("claims:      1"));
    }

    #[test]
    fn test_inspect_does_not_verify() {
        // Forged content still inspects; only verify would reject it.
        let forged = GOLDEN_RECEIPT.replace("wf-golden", "wf-forged");
        let text = inspect(forged.as_bytes()).unwrap();
        assert!(text.contains("workflow:    wf-forged"));
    }

    #[test]
    fn test_inspect_bundle_lists_attachments() {
        let fixture = TestFixture::unsigned();
        let content: &[u8] = b"tool output";
        let bundle = fixture.bundle(&fixture.receipt(1, &[content]), &[content]);
        let text = inspect(&bundle).unwrap();
        assert!(text.contains("signer:      (unsigned)"));
        assert!(text.contains("attachments: 1"));
        assert!(text.contains("(11 bytes)"));
    }

    #[test]
    fn test_inspect_schema_error() {
        let err = inspect(br#"{"id":"car:x"}"#).unwrap_err();
        assert!(format!("{err:#}").contains("does not match the schema"));
    }
}
