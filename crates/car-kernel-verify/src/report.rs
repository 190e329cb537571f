//! The verification report.
//!
//! Every field is typed and every string in it has been sanitized, so the
//! report can be rendered as plain text or serialized to JSON without further
//! escaping.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Overall verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Verified,
    Failed,
}

/// How the receipt arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    Json,
    Zip,
}

/// Which on-disk schema generation the receipt uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaGeneration {
    /// Exported before `proof.process` was required.
    Legacy,
    /// Carries `proof.process`.
    Current,
}

/// Issue taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IssueCode {
    ParseError,
    SchemaError,
    IdentityMismatch,
    ChainMismatch,
    SignatureInvalid,
    /// The receipt carries the explicit unsigned sentinel.
    Unsigned,
    ProvenanceGap,
    AttachmentMismatch,
}

impl IssueCode {
    /// Whether the code describes a structural failure.
    pub fn is_structural(self) -> bool {
        matches!(self, Self::ParseError | Self::SchemaError)
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Affects the verdict.
    Error,
    /// Recorded, does not affect the verdict.
    Info,
}

/// One finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub code: IssueCode,
    pub severity: Severity,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checkpoint_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
}

impl Issue {
    pub fn error(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            code,
            severity: Severity::Error,
            message: message.into(),
            checkpoint_id: None,
            index: None,
        }
    }

    pub fn info(code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            ..Self::error(code, message)
        }
    }

    /// Attribute the issue to one checkpoint.
    pub fn at(mut self, index: usize, checkpoint_id: impl Into<String>) -> Self {
        self.index = Some(index);
        self.checkpoint_id = Some(checkpoint_id.into());
        self
    }
}

/// Result of checking one signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureOutcome {
    Valid,
    Invalid,
    /// The `unsigned:` sentinel. Never counts as valid.
    Unsigned,
}

/// Per-checkpoint chain and signature result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointReport {
    pub index: usize,
    pub id: String,
    pub link_valid: bool,
    pub signature: SignatureOutcome,
}

/// One top-level detached signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureReport {
    pub algorithm: String,
    pub outcome: SignatureOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    /// A bundled attachment re-hashes to the claimed value.
    Verified,
    /// A bundled attachment carries the claimed name but different content.
    Mismatch,
    /// No attachment present; the claim stands on its hash alone.
    TrackedByHashOnly,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClaimReport {
    pub claim_type: String,
    pub sha256: String,
    pub status: ClaimStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentStatus {
    Valid,
    Mismatch,
    /// The file name carries no hash to compare against.
    Unaddressed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentReport {
    pub name: String,
    pub sha256: String,
    pub status: AttachmentStatus,
}

/// Informational counts from the provenance and attachment checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub claims_total: usize,
    pub claims_verified: usize,
    pub claims_unmatched: usize,
    pub attachments_total: usize,
    pub attachments_valid: usize,
}

/// Semantic tolerance fields, reported as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticReport {
    pub epsilon: f64,
    pub distance_metric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_distance: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub within_tolerance: Option<bool>,
}

/// The full verification report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub status: Status,
    pub container: Container,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema_generation: Option<SchemaGeneration>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_kind: Option<String>,
    pub identity_valid: bool,
    pub hash_chain_valid: bool,
    pub signatures_valid: bool,
    pub unsigned: bool,
    pub checkpoints: Vec<CheckpointReport>,
    pub signatures: Vec<SignatureReport>,
    pub provenance: Vec<ClaimReport>,
    pub attachments: Vec<AttachmentReport>,
    pub coverage: Coverage,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic: Option<SemanticReport>,
    pub issues: Vec<Issue>,
}

impl Report {
    /// A report for input that never reached the integrity checks.
    pub fn structural_failure(container: Container, issue: Issue) -> Self {
        Self {
            status: Status::Failed,
            container,
            schema_generation: None,
            receipt_id: None,
            run_id: None,
            match_kind: None,
            identity_valid: false,
            hash_chain_valid: false,
            signatures_valid: false,
            unsigned: false,
            checkpoints: Vec::new(),
            signatures: Vec::new(),
            provenance: Vec::new(),
            attachments: Vec::new(),
            coverage: Coverage::default(),
            semantic: None,
            issues: vec![issue],
        }
    }

    pub fn is_verified(&self) -> bool {
        self.status == Status::Verified
    }

    /// Whether verification stopped at parse or schema stage.
    pub fn is_structural_failure(&self) -> bool {
        self.issues.iter().any(|i| i.code.is_structural())
    }

    /// Issues with the given code.
    pub fn issues_with(&self, code: IssueCode) -> impl Iterator<Item = &Issue> {
        self.issues.iter().filter(move |i| i.code == code)
    }

    pub fn has_issue(&self, code: IssueCode) -> bool {
        self.issues_with(code).next().is_some()
    }

    /// Claims with no bundled attachment.
    pub fn unmatched_claims(&self) -> impl Iterator<Item = &ClaimReport> {
        self.provenance
            .iter()
            .filter(|c| c.status == ClaimStatus::TrackedByHashOnly)
    }

    /// Encode as JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn mark(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "FAILED"
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let verdict = match self.status {
            Status::Verified => "VERIFIED",
            Status::Failed => "FAILED",
        };
        writeln!(f, "status:     {verdict}")?;
        if let Some(id) = &self.receipt_id {
            writeln!(f, "receipt:    {id}")?;
        }
        if let Some(run) = &self.run_id {
            writeln!(f, "run:        {run}")?;
        }
        if let Some(kind) = &self.match_kind {
            writeln!(f, "match kind: {kind}")?;
        }

        if !self.is_structural_failure() {
            writeln!(f, "identity:   {}", mark(self.identity_valid))?;
            writeln!(
                f,
                "chain:      {} ({} checkpoints)",
                mark(self.hash_chain_valid),
                self.checkpoints.len()
            )?;
            if self.unsigned {
                writeln!(f, "signatures: UNSIGNED")?;
            } else {
                writeln!(f, "signatures: {}", mark(self.signatures_valid))?;
            }
            writeln!(
                f,
                "provenance: {}/{} claims verified, {} tracked by hash only",
                self.coverage.claims_verified,
                self.coverage.claims_total,
                self.coverage.claims_unmatched
            )?;
            if self.coverage.attachments_total > 0 {
                writeln!(
                    f,
                    "bundle:     {}/{} attachments intact",
                    self.coverage.attachments_valid, self.coverage.attachments_total
                )?;
            }
        }

        for issue in &self.issues {
            let level = match issue.severity {
                Severity::Error => "error",
                Severity::Info => "info",
            };
            match (&issue.checkpoint_id, issue.index) {
                (Some(id), Some(i)) => {
                    writeln!(f, "  [{level}] {} at #{i} ({id}): {}", issue.code, issue.message)?
                }
                _ => writeln!(f, "  [{level}] {}: {}", issue.code, issue.message)?,
            }
        }
        Ok(())
    }
}
