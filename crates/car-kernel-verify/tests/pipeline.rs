//! End-to-end verification tests: assemble with the core, verify here.

use bytes::Bytes;
use serde_json::{json, Value};

use car_kernel_bundle::{write_bundle, Attachment};
use car_kernel_core::{
    body_signing_bytes, receipt_id_from_object, sha256_hex, ChainBuilder, CheckpointId,
    CheckpointPayload, ClaimType, Keypair, Receipt, ReceiptAssembler, RunMetadata, SignatureTag,
    Signer,
};
use car_kernel_verify::{
    AttachmentStatus, ClaimStatus, IssueCode, NativeVerifier, SandboxedVerifier,
    SchemaGeneration, Severity, SignatureOutcome, Status, Verifier, VerifierConfig,
};

fn signer() -> Signer {
    Signer::Ed25519(Keypair::from_seed(&[0x11; 32]))
}

fn receipt_with(signer: &Signer, checkpoints: usize, claims: &[&[u8]]) -> Receipt {
    let mut chain = ChainBuilder::new(signer.clone());
    for i in 1..=checkpoints {
        let payload = CheckpointPayload::new(
            CheckpointId::new(format!("ckpt:{i}")).unwrap(),
            "run-1",
            "llm_call",
            format!("2026-03-01T10:00:0{}Z", i % 10),
        )
        .inputs(sha256_hex(format!("in-{i}").as_bytes()))
        .outputs(sha256_hex(format!("out-{i}").as_bytes()))
        .usage(100 * i as u64, 20);
        chain.push(payload).unwrap();
    }

    let mut assembler = ReceiptAssembler::new("run-1", "2026-03-01T10:00:00Z", RunMetadata::new("wf-1"));
    for content in claims {
        assembler = assembler.claim(ClaimType::Input, sha256_hex(content));
    }
    assembler.assemble(chain.finish().unwrap(), signer).unwrap()
}

fn to_value(receipt: &Receipt) -> Value {
    serde_json::to_value(receipt).unwrap()
}

fn verifier() -> SandboxedVerifier {
    SandboxedVerifier::default()
}

#[test]
fn signed_receipt_round_trips() {
    for n in [1, 2, 7] {
        let receipt = receipt_with(&signer(), n, &[]);
        let report = verifier().verify_car_json(&receipt.to_json_pretty().unwrap());
        assert_eq!(report.status, Status::Verified, "{report}");
        assert!(report.identity_valid);
        assert!(report.hash_chain_valid);
        assert!(report.signatures_valid);
        assert_eq!(report.checkpoints.len(), n);
        assert!(report
            .checkpoints
            .iter()
            .all(|c| c.signature == SignatureOutcome::Valid));
        assert_eq!(report.schema_generation, Some(SchemaGeneration::Current));
    }
}

#[test]
fn reformatted_document_still_verifies() {
    let receipt = receipt_with(&signer(), 3, &[]);
    let compact = serde_json::to_string(&receipt).unwrap();
    let pretty = receipt.to_json_pretty().unwrap();
    assert_ne!(compact, pretty);
    assert!(verifier().verify_car_bytes(compact.as_bytes()).is_verified());
    assert!(verifier().verify_car_bytes(pretty.as_bytes()).is_verified());
}

#[test]
fn tampered_checkpoint_reports_only_its_index() {
    let receipt = receipt_with(&signer(), 4, &[]);
    let mut value = to_value(&receipt);
    let field = &mut value["proof"]["process"]["sequential_checkpoints"][2]["inputs_sha256"];
    let flipped = field.as_str().unwrap().replacen('a', "b", 1).replacen('0', "1", 1);
    *field = json!(flipped);

    let report = verifier().verify_car_json(&value.to_string());
    assert_eq!(report.status, Status::Failed);
    assert!(!report.hash_chain_valid);

    let mismatches: Vec<_> = report.issues_with(IssueCode::ChainMismatch).collect();
    assert_eq!(mismatches.len(), 1);
    assert_eq!(mismatches[0].index, Some(2));
    assert_eq!(mismatches[0].checkpoint_id.as_deref(), Some("ckpt:3"));

    let valid: Vec<bool> = report.checkpoints.iter().map(|c| c.link_valid).collect();
    assert_eq!(valid, vec![true, true, false, true]);
}

#[test]
fn tampered_timestamp_breaks_link() {
    let receipt = receipt_with(&signer(), 2, &[]);
    let mut value = to_value(&receipt);
    value["proof"]["process"]["sequential_checkpoints"][0]["timestamp"] = json!("2030-01-01T00:00:00Z");

    let report = verifier().verify_car_json(&value.to_string());
    assert!(!report.hash_chain_valid);
    assert!(!report.checkpoints[0].link_valid);
    assert!(report.checkpoints[1].link_valid);
}

#[test]
fn wrong_public_key_is_distinct_from_chain_failure() {
    let receipt = receipt_with(&signer(), 3, &[]);
    let mut value = to_value(&receipt);
    value["signer_public_key"] = json!(Keypair::from_seed(&[0x22; 32]).public_key().to_base64());

    let report = verifier().verify_car_json(&value.to_string());
    assert_eq!(report.status, Status::Failed);
    assert!(report.hash_chain_valid);
    assert!(!report.signatures_valid);
    assert!(report.has_issue(IssueCode::SignatureInvalid));
    assert!(!report.has_issue(IssueCode::ChainMismatch));
}

#[test]
fn process_kind_without_process_block_is_schema_error() {
    let receipt = receipt_with(&signer(), 1, &[]);
    let mut value = to_value(&receipt);
    value["proof"] = json!({"match_kind": "process"});

    let report = verifier().verify_car_json(&value.to_string());
    assert_eq!(report.status, Status::Failed);
    assert!(report.is_structural_failure());
    let issue = report.issues_with(IssueCode::SchemaError).next().unwrap();
    assert!(issue.message.contains("older format"), "{}", issue.message);
}

#[test]
fn unmatched_claim_is_listed_but_not_fatal() {
    let bundled: &[u8] = b"bundled input";
    let external: &[u8] = b"stored elsewhere";
    let receipt = receipt_with(&signer(), 2, &[bundled, external]);
    let zip = write_bundle(
        receipt.to_json_pretty().unwrap().as_bytes(),
        &[Attachment::from_content(Bytes::from_static(bundled), Some("txt"))],
    )
    .unwrap();

    let report = verifier().verify_car_bytes(&zip);
    assert_eq!(report.status, Status::Verified, "{report}");
    assert_eq!(report.coverage.claims_total, 2);
    assert_eq!(report.coverage.claims_verified, 1);

    let unmatched: Vec<_> = report.unmatched_claims().collect();
    assert_eq!(unmatched.len(), 1);
    assert_eq!(unmatched[0].sha256, sha256_hex(external));

    let gap = report.issues_with(IssueCode::ProvenanceGap).next().unwrap();
    assert_eq!(gap.severity, Severity::Info);
}

#[test]
fn strict_provenance_fails_on_gap() {
    let receipt = receipt_with(&signer(), 1, &[&b"missing"[..]]);
    let verifier = SandboxedVerifier::new(VerifierConfig {
        strict_provenance: true,
        ..VerifierConfig::default()
    });
    let report = verifier.verify_car_json(&receipt.to_json_pretty().unwrap());
    assert_eq!(report.status, Status::Failed);
    assert!(report.hash_chain_valid && report.signatures_valid);
}

#[test]
fn swapped_attachment_content_is_reported() {
    let claimed: &[u8] = b"original";
    let receipt = receipt_with(&signer(), 1, &[claimed]);
    let forged = Attachment {
        name: format!("attachments/{}.txt", sha256_hex(claimed)),
        content: Bytes::from_static(b"forged"),
    };
    let zip = write_bundle(receipt.to_json_pretty().unwrap().as_bytes(), &[forged]).unwrap();

    let report = verifier().verify_car_bytes(&zip);
    assert_eq!(report.provenance[0].status, ClaimStatus::Mismatch);
    assert_eq!(report.attachments[0].status, AttachmentStatus::Mismatch);
    assert!(report.has_issue(IssueCode::AttachmentMismatch));
    // Attachment checks inform, they do not gate.
    assert_eq!(report.status, Status::Verified);
}

#[test]
fn two_checkpoint_prev_chain_alteration() {
    let receipt = receipt_with(&signer(), 2, &[]);
    let value = to_value(&receipt);
    let chain = &value["proof"]["process"]["sequential_checkpoints"];
    let curr_1 = chain[0]["curr_chain"].as_str().unwrap().to_string();
    assert_eq!(chain[0]["prev_chain"], "");
    assert_eq!(chain[1]["prev_chain"], curr_1.as_str());

    let report = verifier().verify_car_json(&value.to_string());
    assert!(report.hash_chain_valid);

    let mut altered = value.clone();
    altered["proof"]["process"]["sequential_checkpoints"][1]["prev_chain"] = json!("not-curr-1");
    let report = verifier().verify_car_json(&altered.to_string());
    assert!(!report.hash_chain_valid);
    let issue = report.issues_with(IssueCode::ChainMismatch).next().unwrap();
    assert_eq!(issue.checkpoint_id.as_deref(), Some("ckpt:2"));
    assert!(report.checkpoints[0].link_valid);
}

#[test]
fn unsigned_receipt_is_never_verified() {
    let receipt = receipt_with(&Signer::Unsigned, 2, &[]);
    let report = verifier().verify_car_json(&receipt.to_json_pretty().unwrap());
    assert_eq!(report.status, Status::Failed);
    assert!(report.unsigned);
    assert!(report.identity_valid);
    assert!(report.hash_chain_valid);
    assert!(!report.signatures_valid);
    assert!(report.has_issue(IssueCode::Unsigned));
    assert!(!report.has_issue(IssueCode::SignatureInvalid));
    assert!(report
        .checkpoints
        .iter()
        .all(|c| c.signature == SignatureOutcome::Unsigned));
}

#[test]
fn sentinel_with_payload_is_invalid_not_unsigned() {
    let receipt = receipt_with(&Signer::Unsigned, 1, &[]);
    let mut value = to_value(&receipt);
    value["signatures"] = json!(["unsigned:AAAA"]);

    let report = verifier().verify_car_json(&value.to_string());
    assert!(!report.unsigned);
    assert!(report.has_issue(IssueCode::SignatureInvalid));
}

#[test]
fn sentinel_beside_a_key_is_invalid() {
    let receipt = receipt_with(&signer(), 1, &[]);
    let mut value = to_value(&receipt);
    value["signatures"] = json!(["unsigned:"]);

    let report = verifier().verify_car_json(&value.to_string());
    assert!(!report.signatures_valid);
    assert!(!report.unsigned);
}

#[test]
fn legacy_receipt_without_chain_verifies() {
    let keypair = Keypair::from_seed(&[0x11; 32]);
    let receipt = receipt_with(&Signer::Ed25519(keypair.clone()), 1, &[]);
    let mut object = to_value(&receipt).as_object().unwrap().clone();
    object.insert("proof".into(), json!({"match_kind": "exact"}));
    object.remove("checkpoints");
    object.remove("schema_version");
    object.insert(
        "id".into(),
        json!(receipt_id_from_object(&object).unwrap().to_string()),
    );
    let body = body_signing_bytes(&object).unwrap();
    object.insert(
        "signatures".into(),
        json!([SignatureTag::Body(keypair.sign(&body)).to_string()]),
    );

    let report = verifier().verify_car_json(&Value::Object(object).to_string());
    assert_eq!(report.status, Status::Verified, "{report}");
    assert_eq!(report.schema_generation, Some(SchemaGeneration::Legacy));
    assert!(report.checkpoints.is_empty());
}

#[test]
fn checkpoint_list_must_match_chain() {
    let receipt = receipt_with(&signer(), 2, &[]);
    let mut value = to_value(&receipt);
    value["checkpoints"] = json!(["ckpt:2", "ckpt:1"]);

    let report = verifier().verify_car_json(&value.to_string());
    assert!(!report.hash_chain_valid);
    assert!(!report.identity_valid);
}

#[test]
fn checkpoint_list_accepts_either_id_spelling() {
    let signer = signer();
    let receipt = receipt_with(&signer, 2, &[]);
    let terminal = receipt.proof.process().unwrap().terminal_chain().to_string();
    let mut object = to_value(&receipt).as_object().unwrap().clone();
    object.insert("checkpoints".into(), json!(["1", "ckpt:2"]));
    object.remove("signatures");
    object.insert(
        "id".into(),
        json!(receipt_id_from_object(&object).unwrap().to_string()),
    );
    let body = body_signing_bytes(&object).unwrap();
    object.insert(
        "signatures".into(),
        json!(signer.sign_receipt(&body, Some(&terminal))),
    );

    let report = verifier().verify_car_json(&Value::Object(object).to_string());
    assert_eq!(report.status, Status::Verified, "{report}");
    assert!(!report.has_issue(IssueCode::ChainMismatch));
}

#[test]
fn edited_field_breaks_identity() {
    let receipt = receipt_with(&signer(), 1, &[]);
    let mut value = to_value(&receipt);
    value["budgets"]["usd"] = json!(999.5);

    let report = verifier().verify_car_json(&value.to_string());
    assert!(!report.identity_valid);
    assert!(report.hash_chain_valid);
    assert!(report.has_issue(IssueCode::IdentityMismatch));
    assert_eq!(report.status, Status::Failed);
}

#[test]
fn malformed_stored_id_is_an_identity_failure() {
    let receipt = receipt_with(&signer(), 2, &[]);
    let upper = receipt.id.to_string().to_uppercase().replacen("CAR:", "car:", 1);
    for bad in [upper.as_str(), "car:1234", "receipt-7"] {
        let mut value = to_value(&receipt);
        value["id"] = json!(bad);

        let report = verifier().verify_car_json(&value.to_string());
        assert!(!report.is_structural_failure(), "{report}");
        assert!(!report.identity_valid);
        assert!(report.hash_chain_valid);
        assert!(report.has_issue(IssueCode::IdentityMismatch));
        assert_eq!(report.receipt_id.as_deref(), Some(bad));
        assert_eq!(report.status, Status::Failed);
    }
}

#[test]
fn malformed_inputs_are_parse_errors() {
    let v = verifier();
    assert!(v.verify_car_bytes(b"").has_issue(IssueCode::ParseError));
    assert!(v.verify_car_bytes(b"{\"id\":").has_issue(IssueCode::ParseError));
    assert!(v.verify_car_bytes(b"PK\x03\x04junk").has_issue(IssueCode::ParseError));

    let no_receipt = write_bundle(b"{}", &[]).unwrap();
    let report = v.verify_car_bytes(&no_receipt);
    assert!(report.has_issue(IssueCode::SchemaError));
}

#[test]
fn report_strings_are_sanitized() {
    let mut chain = ChainBuilder::new(signer());
    chain
        .push(CheckpointPayload::new(CheckpointId::new("a").unwrap(), "r", "k", "t"))
        .unwrap();
    let receipt = ReceiptAssembler::new("run\u{1b}[31m\nx", "t", RunMetadata::new("wf"))
        .assemble(chain.finish().unwrap(), &signer())
        .unwrap();

    let report = verifier().verify_car_json(&receipt.to_json_pretty().unwrap());
    assert!(report.is_verified());
    assert_eq!(report.run_id.as_deref(), Some("run[31mx"));
}

#[test]
fn native_pool_hashes_many_attachments() {
    let contents: Vec<Vec<u8>> = (0..32u8).map(|i| vec![i; 512]).collect();
    let claims: Vec<&[u8]> = contents.iter().map(Vec::as_slice).collect();
    let receipt = receipt_with(&signer(), 2, &claims);
    let attachments: Vec<_> = contents
        .iter()
        .map(|c| Attachment::from_content(c.clone(), None))
        .collect();
    let zip = write_bundle(receipt.to_json_pretty().unwrap().as_bytes(), &attachments).unwrap();

    let mut native = NativeVerifier::new(VerifierConfig {
        parallel_hash_threshold: 4,
        worker_threads: Some(4),
        ..VerifierConfig::default()
    });
    native.init_verifier().unwrap();

    let parallel = native.verify_car_bytes(&zip);
    let sequential = verifier().verify_car_bytes(&zip);
    assert!(parallel.is_verified());
    assert_eq!(parallel.coverage.claims_verified, 32);
    assert_eq!(parallel.coverage.attachments_valid, 32);
    assert_eq!(parallel, sequential);
}
