//! Strong type definitions for the CAR Kernel.
//!
//! Identifiers are newtypes so a checkpoint id can never be passed where a
//! receipt id is expected.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::crypto::Sha256Hash;
use crate::error::{CoreError, SchemaViolation};

/// Prefix of every receipt id.
pub const CAR_ID_PREFIX: &str = "car:";

/// Optional prefix of checkpoint ids.
pub const CHECKPOINT_ID_PREFIX: &str = "ckpt:";

/// Maximum length of the bare part of a checkpoint id.
pub const MAX_CHECKPOINT_ID_LEN: usize = 128;

/// A receipt identifier: `car:` followed by the SHA-256 of the canonical body.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CarId(pub Sha256Hash);

impl CarId {
    /// Wrap a digest.
    pub const fn from_hash(hash: Sha256Hash) -> Self {
        Self(hash)
    }

    /// The underlying digest.
    pub const fn hash(&self) -> &Sha256Hash {
        &self.0
    }

    /// Placeholder used while the real id is being computed.
    pub const ZERO: Self = Self(Sha256Hash::ZERO);
}

impl fmt::Display for CarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", CAR_ID_PREFIX, self.0.to_hex())
    }
}

impl fmt::Debug for CarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CarId({}...)", &self.0.to_hex()[..8])
    }
}

impl FromStr for CarId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s
            .strip_prefix(CAR_ID_PREFIX)
            .ok_or_else(|| SchemaViolation::InvalidReceiptId(s.to_string()))?;
        let hash = Sha256Hash::from_hex(hex)
            .map_err(|_| SchemaViolation::InvalidReceiptId(s.to_string()))?;
        Ok(Self(hash))
    }
}

impl Serialize for CarId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CarId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A checkpoint identifier, either bare (`a1b2`) or prefixed (`ckpt:a1b2`).
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CheckpointId(String);

impl CheckpointId {
    /// Validate and wrap an id.
    pub fn new(id: impl Into<String>) -> Result<Self, SchemaViolation> {
        let id = id.into();
        if is_valid_checkpoint_id(&id) {
            Ok(Self(id))
        } else {
            Err(SchemaViolation::InvalidCheckpointId(id))
        }
    }

    /// The id as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id without its optional `ckpt:` prefix.
    ///
    /// `ckpt:abc` and `abc` name the same checkpoint.
    pub fn bare(&self) -> &str {
        self.0.strip_prefix(CHECKPOINT_ID_PREFIX).unwrap_or(&self.0)
    }

    /// Whether two ids name the same checkpoint.
    pub fn same_as(&self, other: &CheckpointId) -> bool {
        self.bare() == other.bare()
    }
}

impl TryFrom<String> for CheckpointId {
    type Error = SchemaViolation;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<CheckpointId> for String {
    fn from(id: CheckpointId) -> Self {
        id.0
    }
}

impl fmt::Display for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for CheckpointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CheckpointId({})", self.0)
    }
}

/// Check the checkpoint id pattern: `^(ckpt:)?[A-Za-z0-9._-]{1,128}$`.
pub fn is_valid_checkpoint_id(id: &str) -> bool {
    let bare = id.strip_prefix(CHECKPOINT_ID_PREFIX).unwrap_or(id);
    !bare.is_empty()
        && bare.len() <= MAX_CHECKPOINT_ID_LEN
        && bare
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}
