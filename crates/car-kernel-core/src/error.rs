//! Error types for the CAR Kernel Core.

use thiserror::Error;

/// Structural violations of the receipt schema.
///
/// These are raised by the deserialization adapter before any verification
/// logic runs, so a malformed receipt never reaches the hashing code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaViolation {
    #[error("missing required field `{0}`")]
    MissingField(String),

    #[error("field `{field}` has the wrong type: expected {expected}")]
    WrongType { field: String, expected: &'static str },

    #[error("unknown proof.match_kind `{0}` (expected exact, semantic or process)")]
    UnknownMatchKind(String),

    #[error(
        "proof.match_kind requires a process chain but proof.process is absent; \
         the receipt was likely exported with an older format"
    )]
    MissingProcessProof,

    #[error("checkpoints are listed but proof.process is absent; the receipt was likely exported with an older format")]
    CheckpointsWithoutProcess,

    #[error("proof.process.sequential_checkpoints must contain at least one checkpoint")]
    EmptyProcessChain,

    #[error("semantic proof is missing `{0}`")]
    MissingSemanticField(&'static str),

    #[error("invalid checkpoint id `{0}`")]
    InvalidCheckpointId(String),

    #[error("invalid receipt id `{0}` (expected car:<64 hex chars>)")]
    InvalidReceiptId(String),

    #[error("invalid sha256 digest in `{field}`")]
    InvalidDigest { field: String },

    #[error("stewardship grade {0} is outside 0..=100")]
    GradeOutOfRange(u64),

    #[error("{0}")]
    Other(String),
}

/// Core errors that can occur while building or interpreting receipts.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("canonicalization failed: {0}")]
    Canonicalization(String),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaViolation),

    #[error("a process chain needs at least one checkpoint")]
    EmptyChain,

    #[error("duplicate checkpoint id `{0}` in chain")]
    DuplicateCheckpoint(String),

    #[error("duplicate chain link {0}")]
    DuplicateChainLink(String),

    #[error("semantic match requested but no semantic proof was supplied")]
    MissingSemanticProof,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("malformed signature tag: {0}")]
    MalformedSignature(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::EncodingError(e.to_string())
    }
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
