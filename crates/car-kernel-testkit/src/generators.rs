//! Proptest generators for property-based testing.

use proptest::prelude::*;
use serde_json::{Map, Number, Value};

use car_kernel_core::{
    sha256_hex, Budgets, ChainBuilder, CheckpointId, CheckpointPayload, ClaimType,
    DistanceMetric, Keypair, ProofMode, Receipt, ReceiptAssembler, RunMetadata, SemanticProof,
    Signer, StepSummary,
};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a lowercase hex SHA-256 digest.
pub fn sha256_digest() -> impl Strategy<Value = String> {
    prop::collection::vec(any::<u8>(), 0..64).prop_map(|bytes| sha256_hex(&bytes))
}

/// Generate a checkpoint id, with or without the `ckpt:` prefix.
pub fn checkpoint_id() -> impl Strategy<Value = String> {
    ("[A-Za-z0-9._-]{1,24}", any::<bool>()).prop_map(|(bare, prefixed)| {
        if prefixed {
            format!("ckpt:{bare}")
        } else {
            bare
        }
    })
}

/// Generate an RFC 3339 UTC timestamp.
pub fn timestamp() -> impl Strategy<Value = String> {
    (2020u32..2040, 1u32..=12, 1u32..=28, 0u32..24, 0u32..60, 0u32..60).prop_map(
        |(y, mo, d, h, mi, s)| format!("{y:04}-{mo:02}-{d:02}T{h:02}:{mi:02}:{s:02}Z"),
    )
}

/// Generate a step kind.
pub fn step_kind() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("llm_call".to_string()),
        Just("tool_call".to_string()),
        Just("retrieval".to_string()),
        "[a-z_]{1,16}",
    ]
}

/// Generate any finite `f64`, subnormals and negative zero included.
pub fn finite_f64() -> impl Strategy<Value = f64> {
    prop::num::f64::POSITIVE
        | prop::num::f64::NEGATIVE
        | prop::num::f64::NORMAL
        | prop::num::f64::SUBNORMAL
        | prop::num::f64::ZERO
}

/// Generate budgets with arbitrary finite amounts.
pub fn budgets() -> impl Strategy<Value = Budgets> {
    (finite_f64(), any::<u64>(), finite_f64()).prop_map(|(usd, tokens, nature_cost)| Budgets {
        usd,
        tokens,
        nature_cost,
    })
}

/// Generate semantic comparison fields.
pub fn semantic_proof() -> impl Strategy<Value = SemanticProof> {
    (
        finite_f64(),
        prop_oneof![
            Just(DistanceMetric::Cosine),
            Just(DistanceMetric::Jaccard),
            Just(DistanceMetric::Levenshtein),
        ],
        sha256_digest(),
        sha256_digest(),
        prop::option::of(finite_f64()),
    )
        .prop_map(|(epsilon, distance_metric, original, replay, distance)| SemanticProof {
            epsilon,
            distance_metric,
            original_semantic_digest: original,
            replay_semantic_digest: replay,
            semantic_distance: distance,
        })
}

/// Generate claim content of specified max length.
pub fn content(max_len: usize) -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..=max_len)
}

/// Generate an arbitrary JSON value without floats.
///
/// Floats are left out so that generated documents survive a text round trip
/// bit for bit.
pub fn json_value() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(|n| Value::Number(Number::from(n))),
        ".{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map(".{0,8}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect::<Map<String, Value>>())),
        ]
    })
}

/// Parameters for one step checkpoint.
#[derive(Debug, Clone)]
pub struct StepParams {
    pub kind: String,
    pub timestamp: String,
    pub inputs_sha256: Option<String>,
    pub outputs_sha256: Option<String>,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl Arbitrary for StepParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            step_kind(),
            timestamp(),
            prop::option::of(sha256_digest()),
            prop::option::of(sha256_digest()),
            0u64..100_000,
            0u64..100_000,
        )
            .prop_map(|(kind, timestamp, inputs, outputs, prompt, completion)| StepParams {
                kind,
                timestamp,
                inputs_sha256: inputs,
                outputs_sha256: outputs,
                prompt_tokens: prompt,
                completion_tokens: completion,
            })
            .boxed()
    }
}

/// Parameters for generating a receipt.
#[derive(Debug, Clone)]
pub struct ReceiptParams {
    pub keypair: Keypair,
    pub run_id: String,
    pub workflow_id: String,
    pub created_at: String,
    /// At least one step.
    pub steps: Vec<StepParams>,
    pub claims: Vec<Vec<u8>>,
    pub budgets: Budgets,
    /// When set, the run has a concordant step and a semantic proof.
    pub semantic: Option<SemanticProof>,
}

impl Arbitrary for ReceiptParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            keypair(),
            "[a-z0-9-]{1,24}",
            "[a-z0-9-]{1,24}",
            timestamp(),
            prop::collection::vec(any::<StepParams>(), 1..12),
            prop::collection::vec(content(256), 0..4),
            budgets(),
            prop::option::of(semantic_proof()),
        )
            .prop_map(
                |(keypair, run_id, workflow_id, created_at, steps, claims, budgets, semantic)| {
                    ReceiptParams {
                        keypair,
                        run_id,
                        workflow_id,
                        created_at,
                        steps,
                        claims,
                        budgets,
                        semantic,
                    }
                },
            )
            .boxed()
    }
}

/// Build the checkpoint payloads described by `params`, ids `ckpt:1..`.
pub fn payloads_from_params(params: &ReceiptParams) -> Vec<CheckpointPayload> {
    params
        .steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let id = CheckpointId::new(format!("ckpt:{}", i + 1)).expect("generated id");
            let mut payload = CheckpointPayload::new(
                id,
                params.run_id.clone(),
                step.kind.clone(),
                step.timestamp.clone(),
            )
            .usage(step.prompt_tokens, step.completion_tokens);
            if let Some(sha) = &step.inputs_sha256 {
                payload = payload.inputs(sha.clone());
            }
            if let Some(sha) = &step.outputs_sha256 {
                payload = payload.outputs(sha.clone());
            }
            payload
        })
        .collect()
}

/// Generate a signed receipt from parameters.
pub fn receipt_from_params(params: &ReceiptParams) -> Receipt {
    let signer = Signer::Ed25519(params.keypair.clone());
    let mut chain = ChainBuilder::new(signer.clone());
    for payload in payloads_from_params(params) {
        chain.push(payload).expect("generated checkpoint");
    }
    let proof = chain.finish().expect("generated chain");

    let mut run = RunMetadata::new(params.workflow_id.clone());
    if params.semantic.is_some() {
        run.steps.push(StepSummary {
            id: "step-1".into(),
            run_id: params.run_id.clone(),
            order_index: 0,
            token_budget: None,
            proof_mode: ProofMode::Concordant,
        });
    }
    let mut assembler =
        ReceiptAssembler::new(params.run_id.clone(), params.created_at.clone(), run)
            .budgets(params.budgets);
    if let Some(semantic) = &params.semantic {
        assembler = assembler.semantic(semantic.clone());
    }
    for content in &params.claims {
        assembler = assembler.claim(ClaimType::Input, sha256_hex(content));
    }
    assembler.assemble(proof, &signer).expect("generated receipt")
}

#[cfg(test)]
mod tests {
    use super::*;
    use car_kernel_core::canonicalize;

    proptest! {
        #[test]
        fn test_receipt_id_deterministic(params: ReceiptParams) {
            let r1 = receipt_from_params(&params);
            let r2 = receipt_from_params(&params);

            prop_assert_eq!(&r1.id, &r2.id);
            prop_assert_eq!(r1.compute_id().unwrap(), r1.id);
        }

        #[test]
        fn test_canonical_bytes_deterministic(value in json_value()) {
            let text = serde_json::to_string_pretty(&value).unwrap();
            let reparsed: Value = serde_json::from_str(&text).unwrap();

            prop_assert_eq!(canonicalize(&value).unwrap(), canonicalize(&reparsed).unwrap());
        }

        #[test]
        fn test_canonical_form_is_a_fixed_point(value in json_value()) {
            let once = canonicalize(&value).unwrap();
            let reparsed: Value = serde_json::from_slice(&once).unwrap();
            prop_assert_eq!(canonicalize(&reparsed).unwrap(), once);
        }

        #[test]
        fn test_float_fields_survive_text(params: ReceiptParams) {
            let receipt = receipt_from_params(&params);
            let text = receipt.to_json_pretty().unwrap();
            let reparsed: Receipt = serde_json::from_str(&text).unwrap();

            prop_assert_eq!(reparsed.budgets.usd, params.budgets.usd);
            prop_assert_eq!(reparsed.budgets.nature_cost, params.budgets.nature_cost);
            prop_assert_eq!(reparsed.proof.semantic(), params.semantic.as_ref());
            prop_assert_eq!(reparsed.compute_id().unwrap(), receipt.id);
        }

        #[test]
        fn test_generated_ids_are_valid(id in checkpoint_id()) {
            prop_assert!(CheckpointId::new(id).is_ok());
        }

        #[test]
        fn test_receipt_id_changes_with_claims(
            params: ReceiptParams,
            extra in content(64),
        ) {
            let mut other = params.clone();
            other.claims.push(extra);

            prop_assert_ne!(receipt_from_params(&params).id, receipt_from_params(&other).id);
        }
    }
}
