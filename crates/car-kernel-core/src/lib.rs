//! # CAR Kernel Core
//!
//! Pure primitives for Content-Addressable Receipts: canonical JSON, hash
//! chains, signing, and receipt assembly.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over cryptographic data structures.
//!
//! ## Key Types
//!
//! - [`Receipt`] - The signed record of one workflow run
//! - [`CarId`] - Content-addressed identifier (`car:` + SHA-256)
//! - [`ChainBuilder`] - Single writer of a run's checkpoint hash chain
//! - [`Proof`] - Tagged union over `exact`, `semantic` and `process` match kinds
//! - [`ReceiptAssembler`] - Composes, addresses and signs a receipt
//!
//! ## Canonicalization
//!
//! Everything hashed or signed is first encoded as canonical JSON (RFC 8785).
//! See the [`canonical`] module.

pub mod assembler;
pub mod canonical;
pub mod checkpoint;
pub mod crypto;
pub mod error;
pub mod proof;
pub mod receipt;
pub mod signer;
pub mod types;

pub use assembler::ReceiptAssembler;
pub use canonical::{canonical_hash, canonical_string, canonicalize, canonicalize_object};
pub use checkpoint::{chain_link, checkpoint_body, ChainBuilder, Checkpoint, CheckpointPayload, TokenUsage};
pub use crypto::{is_sha256_hex, sha256_hex, Keypair, PublicKey, Sha256Hash, Signature};
pub use error::{CoreError, Result, SchemaViolation};
pub use proof::{DistanceMetric, MatchKind, ProcessProof, Proof, SemanticProof};
pub use receipt::{
    body_signing_bytes, receipt_id_from_object, Budgets, ClaimType, PolicyRef, ProofMode,
    ProvenanceClaim, Receipt, RunMetadata, StepSummary, StewardshipGrade,
};
pub use signer::{SignatureTag, Signer};
pub use types::{CarId, CheckpointId};
