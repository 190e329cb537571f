//! Test fixtures and helpers.
//!
//! Common setup code for integration tests and benches.

use car_kernel_bundle::{write_bundle, Attachment};
use car_kernel_core::{
    body_signing_bytes, receipt_id_from_object, sha256_hex, Budgets, CarId, ChainBuilder,
    CheckpointId, CheckpointPayload, ClaimType, DistanceMetric, Keypair, PolicyRef, ProcessProof,
    Proof, ProofMode, Receipt, ReceiptAssembler, RunMetadata, SemanticProof, Signer, StepSummary,
    StewardshipGrade,
};

/// Run id used by every fixture.
pub const RUN_ID: &str = "run-fixture";

/// A test fixture with one signing identity.
pub struct TestFixture {
    pub signer: Signer,
}

impl TestFixture {
    /// Create a new test fixture with a random keypair.
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }

    /// Create with a deterministic keypair from seed.
    pub fn with_seed(seed: [u8; 32]) -> Self {
        Self {
            signer: Signer::Ed25519(Keypair::from_seed(&seed)),
        }
    }

    /// A fixture that emits the `unsigned:` sentinel.
    pub fn unsigned() -> Self {
        Self {
            signer: Signer::Unsigned,
        }
    }

    /// Base64 public key, empty when unsigned.
    pub fn public_key(&self) -> String {
        self.signer.public_key_base64()
    }

    /// The `n`th step payload (1-based), with input and output digests.
    pub fn payload(&self, n: usize) -> CheckpointPayload {
        CheckpointPayload::new(checkpoint_id(n), RUN_ID, "llm_call", timestamp(n))
            .inputs(sha256_hex(format!("input-{n}").as_bytes()))
            .outputs(sha256_hex(format!("output-{n}").as_bytes()))
            .usage(64 * n as u64, 16)
    }

    /// A chain of `len` step checkpoints.
    pub fn chain(&self, len: usize) -> ProcessProof {
        let mut chain = ChainBuilder::new(self.signer.clone());
        for n in 1..=len {
            chain.push(self.payload(n)).expect("fixture checkpoint");
        }
        chain.finish().expect("fixture chain")
    }

    /// A chain of `len` interactive turns, each pointing at its predecessor.
    pub fn interactive_chain(&self, len: usize) -> ProcessProof {
        let mut chain = ChainBuilder::new(self.signer.clone());
        for n in 1..=len {
            let parent = (n > 1).then(|| checkpoint_id(n - 1));
            let payload = self.payload(n).turn(parent, (n - 1) as u32);
            chain.push(payload).expect("fixture turn");
        }
        chain.finish().expect("fixture chain")
    }

    /// An assembler with a policy, budgets and a grade filled in.
    pub fn assembler(&self, run: RunMetadata) -> ReceiptAssembler {
        ReceiptAssembler::new(RUN_ID, timestamp(0), run)
            .policy(PolicyRef {
                hash: sha256_hex(b"fixture-policy"),
                egress: "none".into(),
                estimator: "tokens".into(),
            })
            .budgets(Budgets {
                usd: 0.42,
                tokens: 4096,
                nature_cost: 0.0,
            })
            .grade(StewardshipGrade {
                score: 90,
                ..StewardshipGrade::default()
            })
    }

    /// A signed receipt over `len` checkpoints with one input claim per entry
    /// in `claims`.
    pub fn receipt(&self, len: usize, claims: &[&[u8]]) -> Receipt {
        let mut assembler = self.assembler(RunMetadata::new("wf-fixture"));
        for content in claims {
            assembler = assembler.claim(ClaimType::Input, sha256_hex(content));
        }
        assembler
            .assemble(self.chain(len), &self.signer)
            .expect("fixture receipt")
    }

    /// A receipt for an interactive workflow.
    pub fn interactive_receipt(&self, turns: usize) -> Receipt {
        let mut run = RunMetadata::new("wf-chat");
        run.interactive = true;
        self.assembler(run)
            .assemble(self.interactive_chain(turns), &self.signer)
            .expect("fixture receipt")
    }

    /// A receipt whose only step uses tolerance-based matching.
    pub fn semantic_receipt(&self, distance: Option<f64>) -> Receipt {
        let mut run = RunMetadata::new("wf-semantic");
        run.steps.push(StepSummary {
            id: "step-1".into(),
            run_id: RUN_ID.into(),
            order_index: 0,
            token_budget: Some(2048),
            proof_mode: ProofMode::Concordant,
        });
        self.assembler(run)
            .semantic(SemanticProof {
                epsilon: 0.1,
                distance_metric: DistanceMetric::Cosine,
                original_semantic_digest: sha256_hex(b"original"),
                replay_semantic_digest: sha256_hex(b"replay"),
                semantic_distance: distance,
            })
            .assemble(self.chain(1), &self.signer)
            .expect("fixture receipt")
    }

    /// A receipt in the older format: exact match, no process chain, body
    /// signature only.
    pub fn legacy_receipt(&self) -> Receipt {
        let mut receipt = Receipt {
            schema_version: None,
            id: CarId::ZERO,
            run_id: RUN_ID.into(),
            created_at: timestamp(0),
            run: RunMetadata::new("wf-legacy"),
            proof: Proof::Exact { process: None },
            policy_ref: PolicyRef {
                hash: sha256_hex(b"fixture-policy"),
                egress: "none".into(),
                estimator: "none".into(),
            },
            budgets: Budgets::default(),
            provenance: Vec::new(),
            checkpoints: Vec::new(),
            sgrade: StewardshipGrade::default(),
            signer_public_key: self.signer.public_key_base64(),
            signatures: Vec::new(),
        };
        let object = receipt.to_object().expect("legacy fixture encodes");
        receipt.id = receipt_id_from_object(&object).expect("legacy fixture id");
        let object = receipt.to_object().expect("legacy fixture encodes");
        let body = body_signing_bytes(&object).expect("legacy fixture body");
        receipt.signatures = self.signer.sign_receipt(&body, None);
        receipt
    }

    /// Pack a receipt and the given contents into a ZIP bundle.
    pub fn bundle(&self, receipt: &Receipt, contents: &[&[u8]]) -> Vec<u8> {
        let json = receipt.to_json_pretty().expect("fixture receipt encodes");
        let attachments: Vec<Attachment> = contents
            .iter()
            .map(|c| Attachment::from_content(c.to_vec(), Some("txt")))
            .collect();
        write_bundle(json.as_bytes(), &attachments).expect("fixture bundle")
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Create fixtures with distinct deterministic keys.
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            TestFixture::with_seed(seed)
        })
        .collect()
}

/// `ckpt:<n>`.
pub fn checkpoint_id(n: usize) -> CheckpointId {
    CheckpointId::new(format!("ckpt:{n}")).expect("fixture checkpoint id")
}

/// A fixed timestamp `n` seconds after the fixture epoch.
pub fn timestamp(n: usize) -> String {
    format!("2026-02-01T09:{:02}:{:02}Z", (n / 60) % 60, n % 60)
}
