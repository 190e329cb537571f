//! Receipt assembly: compose, address, sign.

use tracing::debug;

use crate::error::{CoreError, Result};
use crate::proof::{ProcessProof, Proof, SemanticProof};
use crate::receipt::{
    body_signing_bytes, receipt_id_from_object, Budgets, ClaimType, PolicyRef, ProvenanceClaim,
    Receipt, RunMetadata, StewardshipGrade, RECEIPT_SCHEMA_VERSION,
};
use crate::signer::Signer;
use crate::types::CarId;

/// Builder for receipts.
///
/// ```ignore
/// let receipt = ReceiptAssembler::new("run-1", "2026-01-01T00:00:00Z", run)
///     .policy(policy)
///     .claim(ClaimType::Input, input_sha)
///     .assemble(chain, &signer)?;
/// ```
#[derive(Debug, Clone)]
pub struct ReceiptAssembler {
    schema_version: Option<String>,
    run_id: String,
    created_at: String,
    run: RunMetadata,
    policy_ref: PolicyRef,
    budgets: Budgets,
    provenance: Vec<ProvenanceClaim>,
    sgrade: StewardshipGrade,
    semantic: Option<SemanticProof>,
}

impl ReceiptAssembler {
    /// Start assembling a receipt for one run.
    pub fn new(run_id: impl Into<String>, created_at: impl Into<String>, run: RunMetadata) -> Self {
        Self {
            schema_version: Some(RECEIPT_SCHEMA_VERSION.to_string()),
            run_id: run_id.into(),
            created_at: created_at.into(),
            run,
            policy_ref: PolicyRef {
                hash: String::new(),
                egress: "none".to_string(),
                estimator: "none".to_string(),
            },
            budgets: Budgets::default(),
            provenance: Vec::new(),
            sgrade: StewardshipGrade::default(),
            semantic: None,
        }
    }

    /// Override the schema version. `None` omits the field.
    pub fn schema_version(mut self, version: Option<String>) -> Self {
        self.schema_version = version;
        self
    }

    pub fn policy(mut self, policy_ref: PolicyRef) -> Self {
        self.policy_ref = policy_ref;
        self
    }

    pub fn budgets(mut self, budgets: Budgets) -> Self {
        self.budgets = budgets;
        self
    }

    /// Add a provenance claim.
    pub fn claim(mut self, claim_type: ClaimType, sha256: impl Into<String>) -> Self {
        self.provenance.push(ProvenanceClaim::new(claim_type, sha256));
        self
    }

    pub fn grade(mut self, sgrade: StewardshipGrade) -> Self {
        self.sgrade = sgrade;
        self
    }

    /// Semantic comparison fields, required when any step is concordant.
    pub fn semantic(mut self, semantic: SemanticProof) -> Self {
        self.semantic = Some(semantic);
        self
    }

    fn select_proof(&mut self, chain: ProcessProof) -> Result<Proof> {
        if self.run.interactive || chain.is_interactive() {
            return Ok(Proof::Process { chain });
        }
        if self.run.has_concordant_step() {
            let semantic = self.semantic.take().ok_or(CoreError::MissingSemanticProof)?;
            return Ok(Proof::Semantic {
                semantic,
                process: Some(chain),
            });
        }
        Ok(Proof::Exact {
            process: Some(chain),
        })
    }

    /// Compose the receipt, compute its id, then sign it.
    pub fn assemble(mut self, chain: ProcessProof, signer: &Signer) -> Result<Receipt> {
        let checkpoints = chain.ids();
        let terminal_chain = chain.terminal_chain().to_string();
        let proof = self.select_proof(chain)?;

        let mut receipt = Receipt {
            schema_version: self.schema_version,
            id: CarId::ZERO,
            run_id: self.run_id,
            created_at: self.created_at,
            run: self.run,
            proof,
            policy_ref: self.policy_ref,
            budgets: self.budgets,
            provenance: self.provenance,
            checkpoints,
            sgrade: self.sgrade,
            signer_public_key: signer.public_key_base64(),
            signatures: Vec::new(),
        };
        receipt.validate()?;

        receipt.id = receipt_id_from_object(&receipt.to_object()?)?;
        let body = body_signing_bytes(&receipt.to_object()?)?;
        receipt.signatures = signer.sign_receipt(&body, Some(&terminal_chain));

        debug!(
            id = %receipt.id,
            match_kind = %receipt.proof.match_kind(),
            checkpoints = receipt.checkpoints.len(),
            unsigned = signer.is_unsigned(),
            "assembled receipt"
        );
        Ok(receipt)
    }
}
