//! The verification state machine.
//!
//! ```text
//! parse -> schema -> identity -> chain -> signatures -> provenance -> attachments -> report
//! ```
//!
//! Parse and schema failures return immediately. Every later stage runs to
//! completion and records its findings, so one bad checkpoint never hides
//! another problem. The verdict is `verified` only if identity, chain and
//! signatures all pass.

use std::collections::HashSet;

use rayon::prelude::*;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use car_kernel_bundle::{is_zip, read_bundle, Attachment};
use car_kernel_core::signer::{BODY_ALGORITHM, CHECKPOINT_ALGORITHM};
use car_kernel_core::{
    body_signing_bytes, chain_link, receipt_id_from_object, CheckpointId, PublicKey,
    SignatureTag,
};

use crate::config::VerifierConfig;
use crate::error::VerifyError;
use crate::report::{
    AttachmentReport, AttachmentStatus, CheckpointReport, ClaimReport, ClaimStatus, Container,
    Coverage, Issue, IssueCode, Report, SemanticReport, SignatureOutcome, SignatureReport,
    Severity, Status,
};
use crate::sanitize::Sanitizer;
use crate::schema::{normalize, NormalizedReceipt};

/// Whether content hashing may fan out across the current rayon pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hashing {
    Sequential,
    Parallel,
}

/// What the parse stage extracted.
struct Parsed {
    container: Container,
    document: Value,
    attachments: Vec<Attachment>,
}

/// Verify raw bytes: a ZIP bundle or a JSON document.
pub fn verify_bytes(bytes: &[u8], config: &VerifierConfig, hashing: Hashing) -> Report {
    let container = if is_zip(bytes) {
        Container::Zip
    } else {
        Container::Json
    };
    match parse(bytes, container, config) {
        Ok(parsed) => verify_parsed(parsed, config, hashing),
        Err(e) => structural(container, e, config),
    }
}

/// Verify a JSON document given as text.
pub fn verify_json(text: &str, config: &VerifierConfig, hashing: Hashing) -> Report {
    match parse(text.as_bytes(), Container::Json, config) {
        Ok(parsed) => verify_parsed(parsed, config, hashing),
        Err(e) => structural(Container::Json, e, config),
    }
}

fn structural(container: Container, error: VerifyError, config: &VerifierConfig) -> Report {
    let sanitizer = Sanitizer::new(config.sanitize_max_len);
    let code = match error {
        VerifyError::Schema(_) => IssueCode::SchemaError,
        _ => IssueCode::ParseError,
    };
    let message = sanitizer.clean(&error.to_string());
    warn!(%code, %message, "verification stopped");
    Report::structural_failure(container, Issue::error(code, message))
}

// ─────────────────────────────────────────────────────────────────────────────
// Stage 1: parse
// ─────────────────────────────────────────────────────────────────────────────

fn parse(bytes: &[u8], container: Container, config: &VerifierConfig) -> Result<Parsed, VerifyError> {
    if bytes.is_empty() {
        return Err(VerifyError::Parse("input is empty".into()));
    }
    let (json, attachments) = match container {
        Container::Zip => {
            let bundle = read_bundle(bytes, &config.limits)?;
            (bundle.receipt.to_vec(), bundle.attachments)
        }
        _ => (bytes.to_vec(), Vec::new()),
    };
    let document: Value = serde_json::from_slice(&json)?;
    debug!(?container, attachments = attachments.len(), "parsed input");
    Ok(Parsed {
        container,
        document,
        attachments,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Stages 2-8
// ─────────────────────────────────────────────────────────────────────────────

struct Run<'a> {
    config: &'a VerifierConfig,
    sanitizer: Sanitizer,
    issues: Vec<Issue>,
}

impl Run<'_> {
    fn record(&mut self, issue: Issue) {
        if issue.severity == Severity::Error {
            warn!(code = %issue.code, index = ?issue.index, message = %issue.message, "integrity failure");
        } else {
            debug!(code = %issue.code, message = %issue.message, "note");
        }
        self.issues.push(issue);
    }

    fn clean(&self, s: &str) -> String {
        self.sanitizer.clean(s)
    }
}

fn verify_parsed(parsed: Parsed, config: &VerifierConfig, hashing: Hashing) -> Report {
    let normalized = match normalize(parsed.document) {
        Ok(n) => n,
        Err(violation) => return structural(parsed.container, violation.into(), config),
    };

    let mut run = Run {
        config,
        sanitizer: Sanitizer::new(config.sanitize_max_len),
        issues: Vec::new(),
    };

    let identity_valid = check_identity(&mut run, &normalized);
    let checkpoints = check_chain(&mut run, &normalized);
    let hash_chain_valid = checkpoints.iter().all(|c| c.link_valid)
        && !run.issues.iter().any(|i| i.code == IssueCode::ChainMismatch);
    let (signatures, checkpoints, unsigned) =
        check_signatures(&mut run, &normalized, checkpoints);
    let signatures_valid = !unsigned
        && !run
            .issues
            .iter()
            .any(|i| i.code == IssueCode::SignatureInvalid);

    let digests = hash_attachments(&parsed.attachments, config, hashing);
    let provenance = check_provenance(&mut run, &normalized, &parsed.attachments, &digests);
    let attachments = check_attachments(&mut run, &parsed.attachments, &digests);

    let coverage = Coverage {
        claims_total: provenance.len(),
        claims_verified: provenance
            .iter()
            .filter(|c| c.status == ClaimStatus::Verified)
            .count(),
        claims_unmatched: provenance
            .iter()
            .filter(|c| c.status == ClaimStatus::TrackedByHashOnly)
            .count(),
        attachments_total: attachments.len(),
        attachments_valid: attachments
            .iter()
            .filter(|a| a.status == AttachmentStatus::Valid)
            .count(),
    };

    let provenance_ok = !config.strict_provenance
        || !run.issues.iter().any(|i| {
            matches!(
                i.code,
                IssueCode::ProvenanceGap | IssueCode::AttachmentMismatch
            )
        });
    let verified = identity_valid && hash_chain_valid && signatures_valid && provenance_ok;
    let status = if verified {
        Status::Verified
    } else {
        Status::Failed
    };

    let receipt = &normalized.receipt;
    let receipt_id = run.clean(&normalized.stored_id);
    let semantic = receipt.proof.semantic().map(|s| SemanticReport {
        epsilon: s.epsilon,
        distance_metric: format!("{:?}", s.distance_metric).to_lowercase(),
        semantic_distance: s.semantic_distance,
        within_tolerance: s.within_tolerance(),
    });

    info!(
        id = %receipt_id,
        ?status,
        identity_valid,
        hash_chain_valid,
        signatures_valid,
        "verification finished"
    );

    Report {
        status,
        container: parsed.container,
        schema_generation: Some(normalized.generation),
        receipt_id: Some(receipt_id),
        run_id: Some(run.clean(&receipt.run_id)),
        match_kind: Some(receipt.proof.match_kind().to_string()),
        identity_valid,
        hash_chain_valid,
        signatures_valid,
        unsigned,
        checkpoints,
        signatures,
        provenance,
        attachments,
        coverage,
        semantic,
        issues: run.issues,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stage 3: identity
// ─────────────────────────────────────────────────────────────────────────────

fn check_identity(run: &mut Run<'_>, normalized: &NormalizedReceipt) -> bool {
    let stored = normalized.stored_id.as_str();
    match receipt_id_from_object(&normalized.raw) {
        Ok(computed) if computed.to_string() == stored => {
            debug!(id = %stored, "identity matches");
            true
        }
        Ok(computed) => {
            let stored = run.clean(stored);
            run.record(Issue::error(
                IssueCode::IdentityMismatch,
                format!("stored id {stored} does not match recomputed {computed}"),
            ));
            false
        }
        Err(e) => {
            let message = run.clean(&e.to_string());
            run.record(Issue::error(IssueCode::IdentityMismatch, message));
            false
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stage 4: chain
// ─────────────────────────────────────────────────────────────────────────────

fn str_field<'v>(object: &'v Map<String, Value>, field: &str) -> &'v str {
    object.get(field).and_then(Value::as_str).unwrap_or_default()
}

fn check_chain(run: &mut Run<'_>, normalized: &NormalizedReceipt) -> Vec<CheckpointReport> {
    let mut reports = Vec::new();
    let mut prev_stored = "";
    let mut seen = HashSet::new();

    for (index, value) in normalized.raw_checkpoints().iter().enumerate() {
        // The adapter has already checked each element deserializes as a checkpoint.
        let Some(object) = value.as_object() else {
            continue;
        };
        let id = run.clean(str_field(object, "id"));
        let stored_prev = str_field(object, "prev_chain");
        let stored_curr = str_field(object, "curr_chain");
        let mut link_valid = true;

        if stored_prev != prev_stored {
            link_valid = false;
            run.record(
                Issue::error(
                    IssueCode::ChainMismatch,
                    "prev_chain does not equal the previous checkpoint's curr_chain",
                )
                .at(index, id.clone()),
            );
        }

        match chain_link(prev_stored, object) {
            Ok(computed) if computed == stored_curr => {}
            Ok(_) => {
                link_valid = false;
                run.record(
                    Issue::error(
                        IssueCode::ChainMismatch,
                        "curr_chain does not match the recomputed link",
                    )
                    .at(index, id.clone()),
                );
            }
            Err(e) => {
                link_valid = false;
                let message = run.clean(&e.to_string());
                run.record(Issue::error(IssueCode::ChainMismatch, message).at(index, id.clone()));
            }
        }

        if !seen.insert(stored_curr) {
            link_valid = false;
            run.record(
                Issue::error(IssueCode::ChainMismatch, "curr_chain repeats an earlier link")
                    .at(index, id.clone()),
            );
        }

        debug!(index, id = %id, link_valid, "checked chain link");
        reports.push(CheckpointReport {
            index,
            id,
            link_valid,
            signature: SignatureOutcome::Invalid,
        });
        prev_stored = stored_curr;
    }

    check_checkpoint_list(run, normalized);
    reports
}

/// The top-level `checkpoints` list, when present, must name the chain in order.
fn check_checkpoint_list(run: &mut Run<'_>, normalized: &NormalizedReceipt) {
    let receipt = &normalized.receipt;
    let Some(process) = receipt.proof.process() else {
        return;
    };
    if receipt.checkpoints.is_empty() {
        return;
    }
    let chain = process.checkpoints();
    let matches = receipt.checkpoints.len() == chain.len()
        && receipt
            .checkpoints
            .iter()
            .zip(chain)
            .all(|(listed, checkpoint)| {
                CheckpointId::new(listed.as_str()).is_ok_and(|id| id.same_as(checkpoint.id()))
            });
    if !matches {
        run.record(Issue::error(
            IssueCode::ChainMismatch,
            format!(
                "checkpoints list ({} ids) does not match the process chain ({} checkpoints)",
                receipt.checkpoints.len(),
                chain.len()
            ),
        ));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Stage 5: signatures
// ─────────────────────────────────────────────────────────────────────────────

fn check_signatures(
    run: &mut Run<'_>,
    normalized: &NormalizedReceipt,
    mut checkpoints: Vec<CheckpointReport>,
) -> (Vec<SignatureReport>, Vec<CheckpointReport>, bool) {
    let receipt = &normalized.receipt;
    let raw_checkpoints = normalized.raw_checkpoints();

    if receipt.signer_public_key.is_empty() {
        let unsigned = check_unsigned(run, normalized, &mut checkpoints);
        return (
            receipt
                .signatures
                .iter()
                .map(|s| SignatureReport {
                    algorithm: run.clean(s.split(':').next().unwrap_or_default()),
                    outcome: if unsigned {
                        SignatureOutcome::Unsigned
                    } else {
                        SignatureOutcome::Invalid
                    },
                })
                .collect(),
            checkpoints,
            unsigned,
        );
    }

    let key = match PublicKey::from_base64(&receipt.signer_public_key) {
        Ok(key) => Some(key),
        Err(_) => {
            run.record(Issue::error(
                IssueCode::SignatureInvalid,
                "signer_public_key is not a valid Ed25519 public key",
            ));
            None
        }
    };

    let body = match body_signing_bytes(&normalized.raw) {
        Ok(body) => Some(body),
        Err(e) => {
            let message = run.clean(&e.to_string());
            run.record(Issue::error(IssueCode::SignatureInvalid, message));
            None
        }
    };
    let terminal_chain = raw_checkpoints
        .last()
        .and_then(Value::as_object)
        .map(|c| str_field(c, "curr_chain"));

    let mut reports = Vec::with_capacity(receipt.signatures.len());
    let mut body_valid = false;
    let mut checkpoint_valid = false;

    for (i, text) in receipt.signatures.iter().enumerate() {
        let (algorithm, verified) = match SignatureTag::parse(text) {
            Ok(SignatureTag::Body(sig)) => (
                BODY_ALGORITHM,
                match (&key, &body) {
                    (Some(key), Some(body)) => Some(key.verify(body, &sig).is_ok()),
                    _ => None,
                },
            ),
            Ok(SignatureTag::Checkpoint(sig)) => (
                CHECKPOINT_ALGORITHM,
                match (&key, terminal_chain) {
                    (Some(key), Some(chain)) => Some(key.verify(chain.as_bytes(), &sig).is_ok()),
                    (Some(_), None) => Some(false),
                    _ => None,
                },
            ),
            Ok(tag) => {
                run.record(Issue::error(
                    IssueCode::SignatureInvalid,
                    format!(
                        "signatures[{i}] uses `{}`, which is not allowed at receipt level",
                        tag.algorithm()
                    ),
                ));
                (tag.algorithm(), None)
            }
            Err(e) => {
                let message = run.clean(&format!("signatures[{i}]: {e}"));
                run.record(Issue::error(IssueCode::SignatureInvalid, message));
                ("malformed", None)
            }
        };

        let valid = verified == Some(true);
        if verified == Some(false) {
            run.record(Issue::error(
                IssueCode::SignatureInvalid,
                format!("signatures[{i}] ({algorithm}) does not verify against signer_public_key"),
            ));
        }
        match algorithm {
            BODY_ALGORITHM => body_valid |= valid,
            CHECKPOINT_ALGORITHM => checkpoint_valid |= valid,
            _ => {}
        }
        reports.push(SignatureReport {
            algorithm: algorithm.to_string(),
            outcome: if valid {
                SignatureOutcome::Valid
            } else {
                SignatureOutcome::Invalid
            },
        });
    }

    if !body_valid && !reports.iter().any(|r| r.algorithm == BODY_ALGORITHM) {
        run.record(Issue::error(
            IssueCode::SignatureInvalid,
            "no ed25519-body signature present",
        ));
    }
    if terminal_chain.is_some()
        && !checkpoint_valid
        && !reports.iter().any(|r| r.algorithm == CHECKPOINT_ALGORITHM)
    {
        run.record(Issue::error(
            IssueCode::SignatureInvalid,
            "no ed25519-checkpoint signature present for the process chain",
        ));
    }

    for (report, value) in checkpoints.iter_mut().zip(raw_checkpoints) {
        let Some(object) = value.as_object() else {
            continue;
        };
        let curr_chain = str_field(object, "curr_chain");
        let valid = match (SignatureTag::parse(str_field(object, "signature")), &key) {
            (Ok(SignatureTag::Link(sig)), Some(key)) => key.verify(curr_chain.as_bytes(), &sig).is_ok(),
            _ => false,
        };
        report.signature = if valid {
            SignatureOutcome::Valid
        } else {
            SignatureOutcome::Invalid
        };
        if !valid && key.is_some() {
            run.record(
                Issue::error(IssueCode::SignatureInvalid, "checkpoint signature does not verify")
                    .at(report.index, report.id.clone()),
            );
        }
    }

    (reports, checkpoints, false)
}

/// An unsigned receipt must say so consistently: exactly the sentinel at the
/// top level and on every checkpoint. Returns whether it does.
fn check_unsigned(
    run: &mut Run<'_>,
    normalized: &NormalizedReceipt,
    checkpoints: &mut [CheckpointReport],
) -> bool {
    let receipt = &normalized.receipt;
    let sentinel_only = receipt.signatures.len() == 1
        && matches!(SignatureTag::parse(&receipt.signatures[0]), Ok(SignatureTag::Unsigned));
    let mut consistent = sentinel_only;
    if !sentinel_only {
        run.record(Issue::error(
            IssueCode::SignatureInvalid,
            "empty signer_public_key requires signatures to be exactly [\"unsigned:\"]",
        ));
    }

    for (report, value) in checkpoints.iter_mut().zip(normalized.raw_checkpoints()) {
        let tag = value
            .as_object()
            .map(|o| SignatureTag::parse(str_field(o, "signature")));
        if matches!(tag, Some(Ok(SignatureTag::Unsigned))) {
            report.signature = SignatureOutcome::Unsigned;
        } else {
            consistent = false;
            run.record(
                Issue::error(
                    IssueCode::SignatureInvalid,
                    "checkpoint of an unsigned receipt carries something other than the unsigned sentinel",
                )
                .at(report.index, report.id.clone()),
            );
        }
    }

    if consistent {
        run.record(Issue::error(
            IssueCode::Unsigned,
            "receipt is explicitly unsigned; integrity holds but authorship is not proven",
        ));
    }
    consistent
}

// ─────────────────────────────────────────────────────────────────────────────
// Stages 6-7: provenance and attachments
// ─────────────────────────────────────────────────────────────────────────────

/// SHA-256 of every attachment, fanned out above the configured threshold.
fn hash_attachments(
    attachments: &[Attachment],
    config: &VerifierConfig,
    hashing: Hashing,
) -> Vec<String> {
    if hashing == Hashing::Parallel && attachments.len() > config.parallel_hash_threshold {
        debug!(count = attachments.len(), "hashing attachments in parallel");
        attachments.par_iter().map(Attachment::actual_sha256).collect()
    } else {
        attachments.iter().map(Attachment::actual_sha256).collect()
    }
}

fn gap_severity(config: &VerifierConfig) -> Severity {
    if config.strict_provenance {
        Severity::Error
    } else {
        Severity::Info
    }
}

fn check_provenance(
    run: &mut Run<'_>,
    normalized: &NormalizedReceipt,
    attachments: &[Attachment],
    digests: &[String],
) -> Vec<ClaimReport> {
    let severity = gap_severity(run.config);
    let mut reports = Vec::new();

    for claim in &normalized.receipt.provenance {
        let matching: Vec<&String> = attachments
            .iter()
            .zip(digests)
            .filter(|(a, _)| a.expected_sha256() == Some(claim.sha256.as_str()))
            .map(|(_, d)| d)
            .collect();

        let status = if matching.is_empty() {
            ClaimStatus::TrackedByHashOnly
        } else if matching.iter().any(|d| **d == claim.sha256) {
            ClaimStatus::Verified
        } else {
            ClaimStatus::Mismatch
        };

        let claim_type = format!("{:?}", claim.claim_type).to_lowercase();
        match status {
            ClaimStatus::TrackedByHashOnly => run.record(Issue {
                severity,
                ..Issue::info(
                    IssueCode::ProvenanceGap,
                    format!("{claim_type} claim {} has no bundled attachment; tracked by hash only", claim.sha256),
                )
            }),
            ClaimStatus::Mismatch => run.record(Issue {
                severity,
                ..Issue::info(
                    IssueCode::AttachmentMismatch,
                    format!("attachment for {claim_type} claim {} has different content", claim.sha256),
                )
            }),
            ClaimStatus::Verified => {}
        }

        reports.push(ClaimReport {
            claim_type,
            sha256: claim.sha256.clone(),
            status,
        });
    }
    reports
}

fn check_attachments(
    run: &mut Run<'_>,
    attachments: &[Attachment],
    digests: &[String],
) -> Vec<AttachmentReport> {
    let severity = gap_severity(run.config);
    attachments
        .iter()
        .zip(digests)
        .map(|(attachment, digest)| {
            let name = run.clean(&attachment.name);
            let status = match attachment.expected_sha256() {
                None => AttachmentStatus::Unaddressed,
                Some(expected) if expected == digest => AttachmentStatus::Valid,
                Some(_) => AttachmentStatus::Mismatch,
            };
            if status == AttachmentStatus::Mismatch {
                run.record(Issue {
                    severity,
                    ..Issue::info(
                        IssueCode::AttachmentMismatch,
                        format!("{name} content hashes to {digest}"),
                    )
                });
            }
            AttachmentReport {
                name,
                sha256: digest.clone(),
                status,
            }
        })
        .collect()
}
