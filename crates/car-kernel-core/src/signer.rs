//! Signing receipts and chain links, and parsing algorithm-tagged signatures.
//!
//! Signatures travel as `"<algorithm>:<base64>"`. Three tags are produced:
//!
//! | Tag | Covers |
//! |-----|--------|
//! | `ed25519-body` | canonical receipt with `id`, without `signatures` |
//! | `ed25519-checkpoint` | UTF-8 bytes of the terminal `curr_chain` |
//! | `ed25519` | UTF-8 bytes of one checkpoint's `curr_chain` |
//!
//! Unsigned mode writes the sentinel `unsigned:` and an empty public key. The
//! sentinel is a statement that no key was available. It never verifies.

use std::fmt;

use crate::crypto::{Keypair, PublicKey, Signature};
use crate::error::{CoreError, Result};

pub const BODY_ALGORITHM: &str = "ed25519-body";
pub const CHECKPOINT_ALGORITHM: &str = "ed25519-checkpoint";
pub const LINK_ALGORITHM: &str = "ed25519";
pub const UNSIGNED_SENTINEL: &str = "unsigned:";

/// A parsed, algorithm-tagged signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureTag {
    /// Signature over the canonical receipt body.
    Body(Signature),
    /// Signature over the terminal chain hash.
    Checkpoint(Signature),
    /// Signature over one checkpoint's chain link.
    Link(Signature),
    /// The explicit unsigned sentinel.
    Unsigned,
}

impl SignatureTag {
    /// Parse `"<algorithm>:<base64>"`.
    ///
    /// The unsigned sentinel must be exactly `unsigned:`; anything after the
    /// colon is rejected rather than ignored.
    pub fn parse(s: &str) -> Result<Self> {
        if s == UNSIGNED_SENTINEL {
            return Ok(Self::Unsigned);
        }
        let (algorithm, encoded) = s
            .split_once(':')
            .ok_or_else(|| CoreError::MalformedSignature("missing algorithm tag".into()))?;
        match algorithm {
            BODY_ALGORITHM => Ok(Self::Body(Signature::from_base64(encoded)?)),
            CHECKPOINT_ALGORITHM => Ok(Self::Checkpoint(Signature::from_base64(encoded)?)),
            LINK_ALGORITHM => Ok(Self::Link(Signature::from_base64(encoded)?)),
            "unsigned" => Err(CoreError::MalformedSignature(
                "unsigned sentinel carries a payload".into(),
            )),
            other => Err(CoreError::MalformedSignature(format!(
                "unsupported algorithm `{other}`"
            ))),
        }
    }

    /// The algorithm tag.
    pub fn algorithm(&self) -> &'static str {
        match self {
            Self::Body(_) => BODY_ALGORITHM,
            Self::Checkpoint(_) => CHECKPOINT_ALGORITHM,
            Self::Link(_) => LINK_ALGORITHM,
            Self::Unsigned => "unsigned",
        }
    }
}

impl fmt::Display for SignatureTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Body(sig) | Self::Checkpoint(sig) | Self::Link(sig) => {
                write!(f, "{}:{}", self.algorithm(), sig.to_base64())
            }
            Self::Unsigned => f.write_str(UNSIGNED_SENTINEL),
        }
    }
}

/// The active signing identity for one receipt.
#[derive(Clone)]
pub enum Signer {
    /// Sign with an Ed25519 key.
    Ed25519(Keypair),
    /// Development mode: no key available.
    Unsigned,
}

impl Signer {
    /// Whether this signer produces the unsigned sentinel.
    pub fn is_unsigned(&self) -> bool {
        matches!(self, Self::Unsigned)
    }

    /// The public key as base64, or `""` in unsigned mode.
    pub fn public_key_base64(&self) -> String {
        match self {
            Self::Ed25519(keypair) => keypair.public_key().to_base64(),
            Self::Unsigned => String::new(),
        }
    }

    /// The public key, if any.
    pub fn public_key(&self) -> Option<PublicKey> {
        match self {
            Self::Ed25519(keypair) => Some(keypair.public_key()),
            Self::Unsigned => None,
        }
    }

    /// Sign one checkpoint's chain link.
    pub fn sign_link(&self, curr_chain: &str) -> String {
        match self {
            Self::Ed25519(keypair) => SignatureTag::Link(keypair.sign(curr_chain.as_bytes())),
            Self::Unsigned => SignatureTag::Unsigned,
        }
        .to_string()
    }

    /// Produce the receipt's detached signatures.
    ///
    /// `body` is the canonical receipt with `id` and without `signatures`.
    /// `terminal_chain` is the last checkpoint's `curr_chain`, if a chain exists.
    pub fn sign_receipt(&self, body: &[u8], terminal_chain: Option<&str>) -> Vec<String> {
        match self {
            Self::Ed25519(keypair) => {
                let mut signatures = vec![SignatureTag::Body(keypair.sign(body)).to_string()];
                if let Some(chain) = terminal_chain {
                    signatures
                        .push(SignatureTag::Checkpoint(keypair.sign(chain.as_bytes())).to_string());
                }
                signatures
            }
            Self::Unsigned => vec![UNSIGNED_SENTINEL.to_string()],
        }
    }
}

impl fmt::Debug for Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ed25519(keypair) => write!(f, "Signer::Ed25519({:?})", keypair.public_key()),
            Self::Unsigned => f.write_str("Signer::Unsigned"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_roundtrip() {
        let kp = Keypair::from_seed(&[1; 32]);
        let body = SignatureTag::Body(kp.sign(b"body")).to_string();
        assert!(body.starts_with("ed25519-body:"));
        assert!(matches!(SignatureTag::parse(&body), Ok(SignatureTag::Body(_))));

        let ckpt = SignatureTag::Checkpoint(kp.sign(b"c")).to_string();
        assert!(matches!(SignatureTag::parse(&ckpt), Ok(SignatureTag::Checkpoint(_))));
    }

    #[test]
    fn test_unsigned_sentinel_is_exact() {
        assert_eq!(SignatureTag::parse("unsigned:").unwrap(), SignatureTag::Unsigned);
        assert!(SignatureTag::parse("unsigned:AAAA").is_err());
        assert!(SignatureTag::parse("unsigned").is_err());
    }

    #[test]
    fn test_empty_and_unknown_tags_rejected() {
        assert!(SignatureTag::parse("ed25519-body:").is_err());
        assert!(SignatureTag::parse("rsa:AAAA").is_err());
        assert!(SignatureTag::parse("").is_err());
    }

    #[test]
    fn test_unsigned_signer() {
        let signer = Signer::Unsigned;
        assert_eq!(signer.public_key_base64(), "");
        assert_eq!(signer.sign_receipt(b"x", Some("abc")), vec!["unsigned:".to_string()]);
        assert_eq!(signer.sign_link("abc"), "unsigned:");
    }

    #[test]
    fn test_signed_receipt_has_two_signatures() {
        let signer = Signer::Ed25519(Keypair::from_seed(&[2; 32]));
        let sigs = signer.sign_receipt(b"body", Some("chain"));
        assert_eq!(sigs.len(), 2);
        assert!(sigs[0].starts_with("ed25519-body:"));
        assert!(sigs[1].starts_with("ed25519-checkpoint:"));
    }
}
