//! Checkpoints and the hash chain that binds them.
//!
//! Each checkpoint's link is
//!
//! ```text
//! curr_chain = sha256(canonical({ "prev_chain": prev, ...body }))
//! ```
//!
//! where `body` is the checkpoint object without `prev_chain`, `curr_chain`
//! and `signature`. The first checkpoint has `prev_chain = ""`.
//!
//! Links are computed over JSON objects rather than typed structs so that the
//! verifier hashes exactly what it received, including fields it does not know.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::canonical::canonical_hash;
use crate::crypto::is_sha256_hex;
use crate::error::{CoreError, Result, SchemaViolation};
use crate::proof::ProcessProof;
use crate::signer::Signer;
use crate::types::CheckpointId;

/// Fields excluded from a checkpoint's hashed body.
pub const CHAIN_FIELDS: [&str; 3] = ["prev_chain", "curr_chain", "signature"];

/// Token usage counters for one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default)]
    pub prompt_tokens: u64,
    #[serde(default)]
    pub completion_tokens: u64,
}

/// What a checkpoint records before it is chained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointPayload {
    pub id: CheckpointId,
    pub run_id: String,
    pub kind: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_checkpoint_id: Option<CheckpointId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turn_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outputs_sha256: Option<String>,
    #[serde(default)]
    pub usage: TokenUsage,
}

impl CheckpointPayload {
    /// Start a payload with the required fields.
    pub fn new(
        id: CheckpointId,
        run_id: impl Into<String>,
        kind: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            id,
            run_id: run_id.into(),
            kind: kind.into(),
            timestamp: timestamp.into(),
            parent_checkpoint_id: None,
            turn_index: None,
            inputs_sha256: None,
            outputs_sha256: None,
            usage: TokenUsage::default(),
        }
    }

    /// Mark this checkpoint as a turn in an interactive workflow.
    pub fn turn(mut self, parent: Option<CheckpointId>, turn_index: u32) -> Self {
        self.parent_checkpoint_id = parent;
        self.turn_index = Some(turn_index);
        self
    }

    pub fn inputs(mut self, sha256: impl Into<String>) -> Self {
        self.inputs_sha256 = Some(sha256.into());
        self
    }

    pub fn outputs(mut self, sha256: impl Into<String>) -> Self {
        self.outputs_sha256 = Some(sha256.into());
        self
    }

    pub fn usage(mut self, prompt_tokens: u64, completion_tokens: u64) -> Self {
        self.usage = TokenUsage {
            prompt_tokens,
            completion_tokens,
        };
        self
    }

    /// Whether this payload belongs to an interactive workflow.
    pub fn is_interactive(&self) -> bool {
        self.turn_index.is_some() || self.parent_checkpoint_id.is_some()
    }

    fn validate(&self) -> Result<()> {
        for (field, digest) in [
            ("inputs_sha256", &self.inputs_sha256),
            ("outputs_sha256", &self.outputs_sha256),
        ] {
            if let Some(d) = digest {
                if !is_sha256_hex(d) {
                    return Err(SchemaViolation::InvalidDigest {
                        field: field.to_string(),
                    }
                    .into());
                }
            }
        }
        Ok(())
    }

    fn body(&self) -> Result<Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => Err(CoreError::EncodingError("checkpoint did not encode as an object".into())),
        }
    }
}

/// One chained, signed checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    #[serde(flatten)]
    pub payload: CheckpointPayload,
    pub prev_chain: String,
    pub curr_chain: String,
    pub signature: String,
}

impl Checkpoint {
    pub fn id(&self) -> &CheckpointId {
        &self.payload.id
    }
}

/// Strip the chain fields from a checkpoint object.
pub fn checkpoint_body(object: &Map<String, Value>) -> Map<String, Value> {
    let mut body = object.clone();
    for field in CHAIN_FIELDS {
        body.remove(field);
    }
    body
}

/// Compute `curr_chain` for a body following `prev_chain`.
pub fn chain_link(prev_chain: &str, body: &Map<String, Value>) -> Result<String> {
    let mut linked = checkpoint_body(body);
    linked.insert("prev_chain".to_string(), Value::String(prev_chain.to_string()));
    Ok(canonical_hash(&linked)?.to_hex())
}

/// Builds one run's hash chain, strictly in order.
///
/// A builder is the chain's single writer: each `push` depends on the link
/// produced by the previous one.
#[derive(Debug)]
pub struct ChainBuilder {
    signer: Signer,
    prev_chain: String,
    checkpoints: Vec<Checkpoint>,
    seen_ids: HashSet<String>,
    seen_links: HashSet<String>,
}

impl ChainBuilder {
    /// Start an empty chain.
    pub fn new(signer: Signer) -> Self {
        Self {
            signer,
            prev_chain: String::new(),
            checkpoints: Vec::new(),
            seen_ids: HashSet::new(),
            seen_links: HashSet::new(),
        }
    }

    /// Append a checkpoint, computing its link and signature.
    pub fn push(&mut self, payload: CheckpointPayload) -> Result<&Checkpoint> {
        payload.validate()?;
        if !self.seen_ids.insert(payload.id.bare().to_string()) {
            return Err(CoreError::DuplicateCheckpoint(payload.id.to_string()));
        }

        let body = payload.body()?;
        let curr_chain = chain_link(&self.prev_chain, &body)?;
        if !self.seen_links.insert(curr_chain.clone()) {
            return Err(CoreError::DuplicateChainLink(curr_chain));
        }
        let signature = self.signer.sign_link(&curr_chain);

        let checkpoint = Checkpoint {
            payload,
            prev_chain: std::mem::replace(&mut self.prev_chain, curr_chain.clone()),
            curr_chain,
            signature,
        };
        self.checkpoints.push(checkpoint);
        Ok(&self.checkpoints[self.checkpoints.len() - 1])
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    /// Close the chain. An empty chain is rejected.
    pub fn finish(self) -> Result<ProcessProof> {
        ProcessProof::new(self.checkpoints)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::{sha256_hex, Keypair};
    use crate::signer::SignatureTag;

    fn payload(id: &str) -> CheckpointPayload {
        CheckpointPayload::new(
            CheckpointId::new(id).unwrap(),
            "run-1",
            "step",
            "2026-01-01T00:00:00Z",
        )
        .inputs(sha256_hex(id.as_bytes()))
        .usage(10, 5)
    }

    #[test]
    fn test_first_link_has_empty_prev() {
        let mut chain = ChainBuilder::new(Signer::Unsigned);
        let first = chain.push(payload("ckpt:1")).unwrap();
        assert_eq!(first.prev_chain, "");
        assert_eq!(first.curr_chain.len(), 64);
    }

    #[test]
    fn test_links_follow_each_other() {
        let mut chain = ChainBuilder::new(Signer::Unsigned);
        chain.push(payload("ckpt:1")).unwrap();
        chain.push(payload("ckpt:2")).unwrap();
        chain.push(payload("ckpt:3")).unwrap();
        let proof = chain.finish().unwrap();
        let cps = proof.checkpoints();
        assert_eq!(cps[1].prev_chain, cps[0].curr_chain);
        assert_eq!(cps[2].prev_chain, cps[1].curr_chain);
    }

    #[test]
    fn test_link_recomputes_from_object() {
        let mut chain = ChainBuilder::new(Signer::Unsigned);
        let cp = chain.push(payload("a")).unwrap().clone();
        let object = match serde_json::to_value(&cp).unwrap() {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        assert_eq!(chain_link("", &object).unwrap(), cp.curr_chain);
    }

    #[test]
    fn test_link_depends_on_prev() {
        let body = payload("a").body().unwrap();
        assert_ne!(chain_link("", &body).unwrap(), chain_link("x", &body).unwrap());
    }

    #[test]
    fn test_signed_links_verify() {
        let kp = Keypair::from_seed(&[3; 32]);
        let mut chain = ChainBuilder::new(Signer::Ed25519(kp.clone()));
        let cp = chain.push(payload("a")).unwrap();
        match SignatureTag::parse(&cp.signature).unwrap() {
            SignatureTag::Link(sig) => kp
                .public_key()
                .verify(cp.curr_chain.as_bytes(), &sig)
                .unwrap(),
            other => panic!("unexpected tag {other:?}"),
        }
    }

    #[test]
    fn test_empty_chain_rejected() {
        let chain = ChainBuilder::new(Signer::Unsigned);
        assert!(matches!(chain.finish(), Err(CoreError::EmptyChain)));
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut chain = ChainBuilder::new(Signer::Unsigned);
        chain.push(payload("ckpt:1")).unwrap();
        assert!(matches!(
            chain.push(payload("1")),
            Err(CoreError::DuplicateCheckpoint(_))
        ));
    }

    #[test]
    fn test_bad_digest_rejected() {
        let mut chain = ChainBuilder::new(Signer::Unsigned);
        let bad = payload("a").outputs("NOT-HEX");
        assert!(matches!(chain.push(bad), Err(CoreError::Schema(_))));
    }
}
