//! Deserialization adapter for both receipt schema generations.
//!
//! Legacy receipts predate `proof.process`; current ones always carry it when a
//! chain exists. Both are normalized into one [`NormalizedReceipt`] before any
//! verification logic runs. The raw object is kept alongside the typed view,
//! because hashes are recomputed over exactly what was received.

use serde_json::{Map, Value};

use car_kernel_core::{CarId, MatchKind, Receipt, SchemaViolation};

use crate::report::SchemaGeneration;

/// Top-level fields every receipt must carry.
pub const REQUIRED_FIELDS: [&str; 10] = [
    "id",
    "run_id",
    "created_at",
    "run",
    "proof",
    "policy_ref",
    "budgets",
    "sgrade",
    "signer_public_key",
    "signatures",
];

/// A receipt in both its raw and interpreted forms.
#[derive(Debug, Clone)]
pub struct NormalizedReceipt {
    pub receipt: Receipt,
    pub raw: Map<String, Value>,
    /// The `id` text exactly as received. A malformed id is left for the
    /// identity check to report, so `receipt.id` is then zero.
    pub stored_id: String,
    pub generation: SchemaGeneration,
}

impl NormalizedReceipt {
    /// Raw checkpoint objects of the process chain, in array order.
    pub fn raw_checkpoints(&self) -> &[Value] {
        self.raw
            .get("proof")
            .and_then(|p| p.get("process"))
            .and_then(|p| p.get("sequential_checkpoints"))
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// Normalize a parsed JSON document.
pub fn normalize(value: Value) -> Result<NormalizedReceipt, SchemaViolation> {
    let raw = match value {
        Value::Object(map) => map,
        _ => {
            return Err(SchemaViolation::WrongType {
                field: "<root>".into(),
                expected: "object",
            })
        }
    };

    for field in REQUIRED_FIELDS {
        if !raw.contains_key(field) {
            return Err(SchemaViolation::MissingField(field.to_string()));
        }
    }

    let proof = raw
        .get("proof")
        .and_then(Value::as_object)
        .ok_or_else(|| SchemaViolation::WrongType {
            field: "proof".into(),
            expected: "object",
        })?;
    let match_kind: MatchKind = proof
        .get("match_kind")
        .ok_or_else(|| SchemaViolation::MissingField("proof.match_kind".into()))?
        .as_str()
        .ok_or_else(|| SchemaViolation::WrongType {
            field: "proof.match_kind".into(),
            expected: "string",
        })?
        .parse()?;

    let has_process = proof.get("process").is_some_and(|p| !p.is_null());
    if !has_process {
        if match_kind == MatchKind::Process {
            return Err(SchemaViolation::MissingProcessProof);
        }
        let lists_checkpoints = raw
            .get("checkpoints")
            .and_then(Value::as_array)
            .is_some_and(|c| !c.is_empty());
        if lists_checkpoints {
            return Err(SchemaViolation::CheckpointsWithoutProcess);
        }
    }

    let generation = if has_process {
        SchemaGeneration::Current
    } else {
        SchemaGeneration::Legacy
    };

    let stored_id = raw
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| SchemaViolation::WrongType {
            field: "id".into(),
            expected: "string",
        })?
        .to_string();
    let mut typed = raw.clone();
    if stored_id.parse::<CarId>().is_err() {
        typed.insert("id".into(), Value::String(CarId::ZERO.to_string()));
    }

    let receipt: Receipt = serde_json::from_value(Value::Object(typed))
        .map_err(|e| SchemaViolation::Other(e.to_string()))?;
    receipt.validate()?;

    Ok(NormalizedReceipt {
        receipt,
        raw,
        stored_id,
        generation,
    })
}
