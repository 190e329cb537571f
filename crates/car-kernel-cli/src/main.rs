//! `car`: verify, inspect and canonicalize Content-Addressable Receipts.
//!
//! Reports go to stdout. Logs go to stderr, filtered by `RUST_LOG`
//! (default `warn`), so `--json` output can be piped as is.

mod commands;

use std::io;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use commands::canonicalize::CanonicalizeCmd;
use commands::inspect::InspectCmd;
use commands::keygen::KeygenCmd;
use commands::verify::VerifyCmd;
use commands::Exit;

/// Offline verifier for Content-Addressable Receipts.
#[derive(Parser, Debug)]
#[command(name = "car", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Verify a receipt (`.json`) or bundle (`.zip`).
    ///
    /// Exits 0 when verified, 1 when an integrity check fails, 2 when the
    /// input cannot be read or parsed.
    Verify(VerifyCmd),

    /// Print what a receipt claims, without verifying it.
    Inspect(InspectCmd),

    /// Generate an Ed25519 signing key.
    Keygen(KeygenCmd),

    /// Print the canonical form of a JSON document and its receipt id.
    Canonicalize(CanonicalizeCmd),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let mut out = io::stdout().lock();
    let result = match &cli.command {
        Commands::Verify(cmd) => commands::verify::run(cmd, &mut out),
        Commands::Inspect(cmd) => commands::inspect::run(cmd, &mut out),
        Commands::Keygen(cmd) => commands::keygen::run(cmd, &mut out),
        Commands::Canonicalize(cmd) => commands::canonicalize::run(cmd, &mut out),
    };

    match result {
        Ok(exit) => exit.into(),
        Err(e) => {
            eprintln!("error: {e:#}");
            Exit::Structural.into()
        }
    }
}
