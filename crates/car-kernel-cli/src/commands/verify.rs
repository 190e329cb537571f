//! `car verify`: run the full verification pipeline.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use clap::Args;
use tracing::info;

use car_kernel_verify::{NativeVerifier, Verifier, VerifierConfig};

use super::{read_input, Exit};

#[derive(Args, Debug)]
pub struct VerifyCmd {
    /// Receipt JSON or ZIP bundle.
    pub file: PathBuf,

    /// Print the report as JSON.
    #[arg(long)]
    pub json: bool,

    /// Fail when a provenance claim has no bundled attachment.
    #[arg(long)]
    pub strict_provenance: bool,

    /// Hashing worker threads (default: one per core).
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,
}

impl VerifyCmd {
    fn config(&self) -> VerifierConfig {
        VerifierConfig {
            strict_provenance: self.strict_provenance,
            worker_threads: self.threads,
            ..VerifierConfig::default()
        }
    }
}

/// Run the verify command.
pub fn run(cmd: &VerifyCmd, out: &mut impl Write) -> Result<Exit> {
    let bytes = read_input(&cmd.file)?;

    let mut verifier = NativeVerifier::new(cmd.config());
    verifier
        .init_verifier()
        .map_err(|e| anyhow!("failed to start verifier: {e}"))?;
    let report = verifier.verify_car_bytes(&bytes);
    info!(file = %cmd.file.display(), status = ?report.status, "verified");

    if cmd.json {
        writeln!(out, "{}", report.to_json_pretty()?)?;
    } else {
        write!(out, "{report}")?;
    }

    Ok(if report.is_verified() {
        Exit::Ok
    } else if report.is_structural_failure() {
        Exit::Structural
    } else {
        Exit::Failed
    })
}
