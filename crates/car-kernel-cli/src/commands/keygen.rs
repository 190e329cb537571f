//! `car keygen`: create a signing key.

use std::io::Write;

use anyhow::{bail, Context, Result};
use clap::Args;

use car_kernel_core::Keypair;

use super::Exit;

#[derive(Args, Debug)]
pub struct KeygenCmd {
    /// Derive the key from a 32-byte hex seed instead of the OS RNG.
    #[arg(long, value_name = "HEX")]
    pub seed_hex: Option<String>,

    /// Print the key pair as JSON.
    #[arg(long)]
    pub json: bool,
}

fn parse_seed(hex_seed: &str) -> Result<[u8; 32]> {
    let bytes = hex::decode(hex_seed.trim()).context("seed is not valid hex")?;
    match <[u8; 32]>::try_from(bytes.as_slice()) {
        Ok(seed) => Ok(seed),
        Err(_) => bail!("seed must be 32 bytes, got {}", bytes.len()),
    }
}

/// Run the keygen command.
pub fn run(cmd: &KeygenCmd, out: &mut impl Write) -> Result<Exit> {
    let keypair = match &cmd.seed_hex {
        Some(seed) => Keypair::from_seed(&parse_seed(seed)?),
        None => Keypair::generate(),
    };
    let public_key = keypair.public_key().to_base64();
    let secret_key = keypair.secret_base64();

    if cmd.json {
        let value = serde_json::json!({
            "public_key": public_key,
            "secret_key": secret_key,
        });
        writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
    } else {
        writeln!(out, "public_key: {public_key}")?;
        writeln!(out, "secret_key: {secret_key}")?;
    }
    Ok(Exit::Ok)
}
