//! Golden test vectors for deterministic verification.
//!
//! These pin the canonical encoding, the chain link derivation and a complete
//! signed receipt. The expected values were produced by an independent
//! implementation; any change here means every issued receipt stops verifying.

use serde_json::Value;

use car_kernel_core::{canonical_string, sha256_hex};

/// A canonicalization test vector.
#[derive(Debug, Clone)]
pub struct CanonicalVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Input JSON text, deliberately not in canonical form.
    pub input: &'static str,
    /// Expected canonical text.
    pub canonical: &'static str,
    /// Expected SHA-256 of the canonical UTF-8 bytes (hex).
    pub sha256: &'static str,
}

/// Get all canonicalization vectors.
pub fn canonical_vectors() -> Vec<CanonicalVector> {
    vec![
        CanonicalVector {
            name: "nested keys sorted, arrays kept",
            input: r#"{ "b": 1, "a": { "z": true, "m": null }, "c": [3, 1, 2] }"#,
            canonical: r#"{"a":{"m":null,"z":true},"b":1,"c":[3,1,2]}"#,
            sha256: "2c0ddeae6f884f489d804d96cbe48af536c4b03dca22325809ad9b2900d29015",
        },
        CanonicalVector {
            name: "floats in shortest form",
            input: r#"{"half":0.5,"one":1.0,"neg":-0.0,"pi":3.14159,"big":1e21,"tiny":1e-7}"#,
            canonical: r#"{"big":1e+21,"half":0.5,"neg":0,"one":1,"pi":3.14159,"tiny":1e-7}"#,
            sha256: "a6533d877e97a1ada1c08b15f71232c9b49ef37516fbd9caaea44642a131d13a",
        },
        CanonicalVector {
            name: "minimal string escaping",
            input: r#"{"s":"line\nbreak\t\"quoted\" \\ \u001F \/"}"#,
            canonical: r#"{"s":"line\nbreak\t\"quoted\" \\ \u001f /"}"#,
            sha256: "4c815cb8a56fd3f56b9cf94fea72619661357b4442e63b661e6312d7ac2790da",
        },
        CanonicalVector {
            name: "keys ordered by UTF-16 code units",
            input: r#"{"\ue000":1,"\ud83d\ude00":2,"a":3}"#,
            canonical: "{\"a\":3,\"\u{1f600}\":2,\"\u{e000}\":1}",
            sha256: "84495633024b0992798250783e7ccb01ab2875649ab22f353f14c0d6a8389fc2",
        },
        CanonicalVector {
            name: "non-ASCII emitted raw",
            input: r#"{"name":"café 日本"}"#,
            canonical: "{\"name\":\"café 日本\"}",
            sha256: "2a00fa96cf2a2ba0aaaa67a50a574aefa2de4758255149693bd376bd51fbfb21",
        },
    ]
}

/// Seed of the key that signed [`GOLDEN_RECEIPT`].
pub const GOLDEN_SEED: [u8; 32] = [0x42; 32];

/// Base64 public key derived from [`GOLDEN_SEED`].
pub const GOLDEN_PUBLIC_KEY: &str = "IVL40Zt5HSRFMkLhXy6rbLfP+ntqXtMAl5YOBpiB2xI=";

/// A complete signed receipt with a two-checkpoint chain and one claim.
pub const GOLDEN_RECEIPT: &str = include_str!("../vectors/golden_receipt.json");

/// Content of the golden receipt's single input claim.
pub const GOLDEN_CLAIM_CONTENT: &[u8] = b"hello";

pub const GOLDEN_RECEIPT_ID: &str =
    "car:1652b69ca16946924a7f8b322376cf2dcef919acec088e64781db68256539c39";

/// `curr_chain` of `ckpt:1` and `ckpt:2` in [`GOLDEN_RECEIPT`].
pub const GOLDEN_CHAIN: [&str; 2] = [
    "4ba87c3770600964f10d306a63f29dc453e17959f4520aa709d66743a811f8c2",
    "f799bc7b3d2b281c553a3dc6e934a4913245b60b26f4b81b870cb16140a81081",
];

/// Parse the golden receipt.
pub fn golden_receipt_value() -> Value {
    serde_json::from_str(GOLDEN_RECEIPT).expect("golden receipt")
}

/// Check every canonical vector against this implementation.
///
/// Returns `(name, matches, actual canonical text)` per vector.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    canonical_vectors()
        .iter()
        .map(|v| {
            let actual = serde_json::from_str::<Value>(v.input)
                .map_err(|e| e.to_string())
                .and_then(|value| canonical_string(&value).map_err(|e| e.to_string()))
                .unwrap_or_else(|e| format!("<error: {e}>"));
            let matches = actual == v.canonical && sha256_hex(actual.as_bytes()) == v.sha256;
            (v.name.to_string(), matches, actual)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use car_kernel_core::{chain_link, checkpoint_body, receipt_id_from_object, Keypair};

    #[test]
    fn test_canonical_vectors_match() {
        for (name, matches, actual) in verify_all_vectors() {
            assert!(matches, "vector '{name}' produced {actual}");
        }
    }

    #[test]
    fn test_golden_key_derivation() {
        let keypair = Keypair::from_seed(&GOLDEN_SEED);
        assert_eq!(keypair.public_key().to_base64(), GOLDEN_PUBLIC_KEY);
    }

    #[test]
    fn test_golden_chain_links() {
        let value = golden_receipt_value();
        let checkpoints = value["proof"]["process"]["sequential_checkpoints"]
            .as_array()
            .unwrap();
        let mut prev = String::new();
        for (checkpoint, expected) in checkpoints.iter().zip(GOLDEN_CHAIN) {
            let body = checkpoint_body(checkpoint.as_object().unwrap());
            let link = chain_link(&prev, &body).unwrap();
            assert_eq!(link, expected);
            prev = link;
        }
    }

    #[test]
    fn test_golden_receipt_id() {
        let value = golden_receipt_value();
        let id = receipt_id_from_object(value.as_object().unwrap()).unwrap();
        assert_eq!(id.to_string(), GOLDEN_RECEIPT_ID);
        assert_eq!(value["id"], GOLDEN_RECEIPT_ID);
    }

    #[test]
    fn test_golden_link_signature_is_deterministic() {
        let keypair = Keypair::from_seed(&GOLDEN_SEED);
        let value = golden_receipt_value();
        let expected = value["proof"]["process"]["sequential_checkpoints"][0]["signature"]
            .as_str()
            .unwrap();
        let signature = keypair.sign(GOLDEN_CHAIN[0].as_bytes());
        assert_eq!(format!("ed25519:{}", signature.to_base64()), expected);
    }
}
