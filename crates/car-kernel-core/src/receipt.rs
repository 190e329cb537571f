//! Receipt: the signed, content-addressed record of one workflow run.
//!
//! The receipt id is the SHA-256 of the canonical object without `id` and
//! `signatures`. The body signature then covers the canonical object with
//! `id` present and `signatures` absent. Mutating any field without
//! re-assembling invalidates both.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::canonical::{canonical_hash, canonicalize_object};
use crate::crypto::is_sha256_hex;
use crate::error::{CoreError, Result, SchemaViolation};
use crate::proof::Proof;
use crate::types::CarId;

/// The schema version written by this crate.
pub const RECEIPT_SCHEMA_VERSION: &str = "2";

/// Fields excluded from the hashed identity body.
pub const IDENTITY_EXCLUDED_FIELDS: [&str; 2] = ["id", "signatures"];

/// Highest stewardship grade.
pub const MAX_GRADE: u64 = 100;

/// How a step's output is matched on replay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProofMode {
    Exact,
    /// Tolerance-based matching.
    Concordant,
}

/// One step of the workflow, as configured.
///
/// Step fields are camelCase on the wire. Older exports used snake_case, which
/// is accepted on read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSummary {
    pub id: String,
    #[serde(alias = "run_id")]
    pub run_id: String,
    #[serde(alias = "order_index")]
    pub order_index: u32,
    #[serde(default, alias = "token_budget", skip_serializing_if = "Option::is_none")]
    pub token_budget: Option<u64>,
    #[serde(alias = "proof_mode")]
    pub proof_mode: ProofMode,
}

/// Run-level metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub workflow_id: String,
    #[serde(default)]
    pub interactive: bool,
    #[serde(default)]
    pub steps: Vec<StepSummary>,
}

impl RunMetadata {
    pub fn new(workflow_id: impl Into<String>) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            interactive: false,
            steps: Vec::new(),
        }
    }

    /// Whether any step used tolerance-based matching.
    pub fn has_concordant_step(&self) -> bool {
        self.steps
            .iter()
            .any(|s| s.proof_mode == ProofMode::Concordant)
    }
}

/// Reference to the policy the run executed under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRef {
    pub hash: String,
    pub egress: String,
    pub estimator: String,
}

/// Resource budgets consumed by the run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Budgets {
    pub usd: f64,
    pub tokens: u64,
    #[serde(default)]
    pub nature_cost: f64,
}

/// What a provenance claim asserts existed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClaimType {
    Input,
    Output,
    Config,
}

/// An assertion that content with this hash existed at issuance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProvenanceClaim {
    pub claim_type: ClaimType,
    pub sha256: String,
}

impl ProvenanceClaim {
    pub fn new(claim_type: ClaimType, sha256: impl Into<String>) -> Self {
        Self {
            claim_type,
            sha256: sha256.into(),
        }
    }
}

/// Composite 0-100 score. Carried, never computed here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StewardshipGrade {
    pub score: u64,
    #[serde(default)]
    pub components: BTreeMap<String, f64>,
}

/// A Content-Addressable Receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receipt {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_version: Option<String>,
    pub id: CarId,
    pub run_id: String,
    pub created_at: String,
    pub run: RunMetadata,
    pub proof: Proof,
    pub policy_ref: PolicyRef,
    pub budgets: Budgets,
    #[serde(default)]
    pub provenance: Vec<ProvenanceClaim>,
    #[serde(default)]
    pub checkpoints: Vec<String>,
    pub sgrade: StewardshipGrade,
    pub signer_public_key: String,
    pub signatures: Vec<String>,
}

impl Receipt {
    /// The receipt as a JSON object.
    pub fn to_object(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(CoreError::EncodingError("receipt did not encode as an object".into())),
        }
    }

    /// Recompute the content-addressed id.
    pub fn compute_id(&self) -> Result<CarId> {
        receipt_id_from_object(&self.to_object()?)
    }

    /// Whether the receipt was issued without a key.
    pub fn is_unsigned(&self) -> bool {
        self.signer_public_key.is_empty()
    }

    /// Structural checks that serde cannot express.
    pub fn validate(&self) -> std::result::Result<(), SchemaViolation> {
        if self.sgrade.score > MAX_GRADE {
            return Err(SchemaViolation::GradeOutOfRange(self.sgrade.score));
        }
        for (i, claim) in self.provenance.iter().enumerate() {
            if !is_sha256_hex(&claim.sha256) {
                return Err(SchemaViolation::InvalidDigest {
                    field: format!("provenance[{i}].sha256"),
                });
            }
        }
        if self.proof.process().is_none() && !self.checkpoints.is_empty() {
            return Err(SchemaViolation::CheckpointsWithoutProcess);
        }
        Ok(())
    }

    /// Encode as pretty JSON.
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Compute `car:<sha256>` over a receipt object without `id` and `signatures`.
pub fn receipt_id_from_object(object: &Map<String, Value>) -> Result<CarId> {
    let mut body = object.clone();
    for field in IDENTITY_EXCLUDED_FIELDS {
        body.remove(field);
    }
    Ok(CarId::from_hash(canonical_hash(&body)?))
}

/// The bytes covered by the body signature: canonical object with `id`,
/// without `signatures`.
pub fn body_signing_bytes(object: &Map<String, Value>) -> Result<Vec<u8>> {
    let mut body = object.clone();
    body.remove("signatures");
    canonicalize_object(&body)
}
