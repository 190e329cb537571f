//! The proof block and its `match_kind` discriminator.
//!
//! On the wire the proof is a flat object whose fields depend on
//! `match_kind`. Internally it is an enum, so a process proof without a chain
//! or a semantic proof without its digests cannot be constructed.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::checkpoint::Checkpoint;
use crate::error::{CoreError, Result, SchemaViolation};

/// How a replay is compared with the original run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    /// Byte-identical outputs.
    Exact,
    /// Outputs within a distance tolerance.
    Semantic,
    /// The checkpoint chain itself is the proof.
    Process,
}

impl MatchKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Semantic => "semantic",
            Self::Process => "process",
        }
    }
}

impl fmt::Display for MatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MatchKind {
    type Err = SchemaViolation;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "exact" => Ok(Self::Exact),
            "semantic" => Ok(Self::Semantic),
            "process" => Ok(Self::Process),
            other => Err(SchemaViolation::UnknownMatchKind(other.to_string())),
        }
    }
}

/// Distance function used by a semantic proof.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Cosine,
    Jaccard,
    Levenshtein,
}

/// The tolerance-based comparison fields of a semantic proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticProof {
    pub epsilon: f64,
    pub distance_metric: DistanceMetric,
    pub original_semantic_digest: String,
    pub replay_semantic_digest: String,
    /// Measured distance, when a replay has been performed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub semantic_distance: Option<f64>,
}

impl SemanticProof {
    /// Whether the measured distance falls within `epsilon`.
    ///
    /// `None` until a replay distance is recorded.
    pub fn within_tolerance(&self) -> Option<bool> {
        self.semantic_distance.map(|d| d <= self.epsilon)
    }
}

/// An ordered, non-empty hash chain of checkpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawProcessProof")]
pub struct ProcessProof {
    sequential_checkpoints: Vec<Checkpoint>,
}

#[derive(Deserialize)]
struct RawProcessProof {
    sequential_checkpoints: Vec<Checkpoint>,
}

impl TryFrom<RawProcessProof> for ProcessProof {
    type Error = SchemaViolation;

    fn try_from(raw: RawProcessProof) -> std::result::Result<Self, Self::Error> {
        if raw.sequential_checkpoints.is_empty() {
            return Err(SchemaViolation::EmptyProcessChain);
        }
        Ok(Self {
            sequential_checkpoints: raw.sequential_checkpoints,
        })
    }
}

impl ProcessProof {
    /// Wrap a chain. An empty chain is rejected.
    pub fn new(checkpoints: Vec<Checkpoint>) -> Result<Self> {
        if checkpoints.is_empty() {
            return Err(CoreError::EmptyChain);
        }
        Ok(Self {
            sequential_checkpoints: checkpoints,
        })
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.sequential_checkpoints
    }

    pub fn len(&self) -> usize {
        self.sequential_checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequential_checkpoints.is_empty()
    }

    /// The last checkpoint's `curr_chain`.
    pub fn terminal_chain(&self) -> &str {
        self.sequential_checkpoints
            .last()
            .map(|c| c.curr_chain.as_str())
            .unwrap_or_default()
    }

    /// Checkpoint ids in chain order, as written.
    pub fn ids(&self) -> Vec<String> {
        self.sequential_checkpoints
            .iter()
            .map(|c| c.id().to_string())
            .collect()
    }

    /// Whether any checkpoint carries a turn index or parent.
    pub fn is_interactive(&self) -> bool {
        self.sequential_checkpoints
            .iter()
            .any(|c| c.payload.is_interactive())
    }
}

/// A receipt's proof.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ProofWire", into = "ProofWire")]
pub enum Proof {
    Exact {
        process: Option<ProcessProof>,
    },
    Semantic {
        semantic: SemanticProof,
        process: Option<ProcessProof>,
    },
    Process {
        chain: ProcessProof,
    },
}

impl Proof {
    pub fn match_kind(&self) -> MatchKind {
        match self {
            Self::Exact { .. } => MatchKind::Exact,
            Self::Semantic { .. } => MatchKind::Semantic,
            Self::Process { .. } => MatchKind::Process,
        }
    }

    /// The process chain, if the proof carries one.
    pub fn process(&self) -> Option<&ProcessProof> {
        match self {
            Self::Exact { process } | Self::Semantic { process, .. } => process.as_ref(),
            Self::Process { chain } => Some(chain),
        }
    }

    pub fn semantic(&self) -> Option<&SemanticProof> {
        match self {
            Self::Semantic { semantic, .. } => Some(semantic),
            _ => None,
        }
    }
}

/// Flat wire form of [`Proof`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProofWire {
    match_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    process: Option<ProcessProof>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    epsilon: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    distance_metric: Option<DistanceMetric>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    original_semantic_digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    replay_semantic_digest: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    semantic_distance: Option<f64>,
}

impl TryFrom<ProofWire> for Proof {
    type Error = SchemaViolation;

    fn try_from(wire: ProofWire) -> std::result::Result<Self, Self::Error> {
        match wire.match_kind.parse::<MatchKind>()? {
            MatchKind::Exact => Ok(Self::Exact {
                process: wire.process,
            }),
            MatchKind::Process => Ok(Self::Process {
                chain: wire.process.ok_or(SchemaViolation::MissingProcessProof)?,
            }),
            MatchKind::Semantic => {
                let semantic = SemanticProof {
                    epsilon: wire
                        .epsilon
                        .ok_or(SchemaViolation::MissingSemanticField("epsilon"))?,
                    distance_metric: wire
                        .distance_metric
                        .ok_or(SchemaViolation::MissingSemanticField("distance_metric"))?,
                    original_semantic_digest: wire
                        .original_semantic_digest
                        .ok_or(SchemaViolation::MissingSemanticField("original_semantic_digest"))?,
                    replay_semantic_digest: wire
                        .replay_semantic_digest
                        .ok_or(SchemaViolation::MissingSemanticField("replay_semantic_digest"))?,
                    semantic_distance: wire.semantic_distance,
                };
                if !semantic.epsilon.is_finite() || semantic.epsilon < 0.0 {
                    return Err(SchemaViolation::Other(format!(
                        "semantic epsilon {} must be a non-negative number",
                        semantic.epsilon
                    )));
                }
                Ok(Self::Semantic {
                    semantic,
                    process: wire.process,
                })
            }
        }
    }
}

impl From<Proof> for ProofWire {
    fn from(proof: Proof) -> Self {
        let mut wire = ProofWire {
            match_kind: proof.match_kind().as_str().to_string(),
            process: None,
            epsilon: None,
            distance_metric: None,
            original_semantic_digest: None,
            replay_semantic_digest: None,
            semantic_distance: None,
        };
        match proof {
            Proof::Exact { process } => wire.process = process,
            Proof::Process { chain } => wire.process = Some(chain),
            Proof::Semantic { semantic, process } => {
                wire.process = process;
                wire.epsilon = Some(semantic.epsilon);
                wire.distance_metric = Some(semantic.distance_metric);
                wire.original_semantic_digest = Some(semantic.original_semantic_digest);
                wire.replay_semantic_digest = Some(semantic.replay_semantic_digest);
                wire.semantic_distance = semantic.semantic_distance;
            }
        }
        wire
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_process_without_chain_is_schema_violation() {
        let err = serde_json::from_value::<Proof>(json!({"match_kind": "process"})).unwrap_err();
        assert!(err.to_string().contains("older format"), "{err}");
    }

    #[test]
    fn test_unknown_match_kind() {
        let err = serde_json::from_value::<Proof>(json!({"match_kind": "fuzzy"})).unwrap_err();
        assert!(err.to_string().contains("fuzzy"));
    }

    #[test]
    fn test_exact_without_process() {
        let proof: Proof = serde_json::from_value(json!({"match_kind": "exact"})).unwrap();
        assert_eq!(proof.match_kind(), MatchKind::Exact);
        assert!(proof.process().is_none());
    }

    #[test]
    fn test_semantic_requires_digests() {
        let err = serde_json::from_value::<Proof>(json!({
            "match_kind": "semantic",
            "epsilon": 0.1,
            "distance_metric": "cosine",
        }))
        .unwrap_err();
        assert!(err.to_string().contains("original_semantic_digest"));
    }

    #[test]
    fn test_semantic_wire_shape() {
        let value = json!({
            "match_kind": "semantic",
            "epsilon": 0.2,
            "distance_metric": "jaccard",
            "original_semantic_digest": "a",
            "replay_semantic_digest": "b",
            "semantic_distance": 0.1,
        });
        let proof: Proof = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(proof.semantic().unwrap().within_tolerance(), Some(true));
        assert_eq!(serde_json::to_value(&proof).unwrap(), value);
    }

    #[test]
    fn test_empty_process_chain_rejected() {
        let err = serde_json::from_value::<Proof>(json!({
            "match_kind": "process",
            "process": {"sequential_checkpoints": []},
        }))
        .unwrap_err();
        assert!(err.to_string().contains("at least one"));
        assert!(matches!(ProcessProof::new(Vec::new()), Err(CoreError::EmptyChain)));
    }
}
