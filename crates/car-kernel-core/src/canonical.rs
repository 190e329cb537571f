//! Canonical JSON encoding for deterministic hashing and signing.
//!
//! The encoding follows RFC 8785 (JCS):
//! - Object keys sorted by UTF-16 code units, recursively
//! - Array order preserved
//! - No insignificant whitespace
//! - Numbers in the ECMAScript shortest round-trip form
//! - Strings escaped minimally, everything else emitted as raw UTF-8
//!
//! **CRITICAL**: This encoding is FROZEN. Changes invalidate every receipt id,
//! chain link and signature ever issued.

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::crypto::Sha256Hash;
use crate::error::{CoreError, Result};

/// Encode a JSON value to canonical bytes.
pub fn canonicalize(value: &Value) -> Result<Vec<u8>> {
    canonical_string(value).map(String::into_bytes)
}

/// Encode a JSON value to its canonical text form.
pub fn canonical_string(value: &Value) -> Result<String> {
    let mut buf = String::new();
    write_value(&mut buf, value)?;
    Ok(buf)
}

/// Canonicalize any serializable value.
pub fn canonicalize_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let value =
        serde_json::to_value(value).map_err(|e| CoreError::Canonicalization(e.to_string()))?;
    canonicalize(&value)
}

/// Canonicalize a JSON object.
pub fn canonicalize_object(object: &Map<String, Value>) -> Result<Vec<u8>> {
    let mut buf = String::new();
    write_object(&mut buf, object)?;
    Ok(buf.into_bytes())
}

/// SHA-256 over the canonical encoding of an object.
pub fn canonical_hash(object: &Map<String, Value>) -> Result<Sha256Hash> {
    Ok(Sha256Hash::hash(&canonicalize_object(object)?))
}

fn write_value(buf: &mut String, value: &Value) -> Result<()> {
    match value {
        Value::Null => buf.push_str("null"),
        Value::Bool(true) => buf.push_str("true"),
        Value::Bool(false) => buf.push_str("false"),
        Value::Number(n) => write_number(buf, n)?,
        Value::String(s) => write_string(buf, s),
        Value::Array(items) => {
            buf.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    buf.push(',');
                }
                write_value(buf, item)?;
            }
            buf.push(']');
        }
        Value::Object(object) => write_object(buf, object)?,
    }
    Ok(())
}

fn write_object(buf: &mut String, object: &Map<String, Value>) -> Result<()> {
    let mut entries: Vec<(&String, &Value)> = object.iter().collect();
    entries.sort_by(|a, b| a.0.encode_utf16().cmp(b.0.encode_utf16()));

    buf.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            buf.push(',');
        }
        write_string(buf, key);
        buf.push(':');
        write_value(buf, value)?;
    }
    buf.push('}');
    Ok(())
}

fn write_number(buf: &mut String, n: &Number) -> Result<()> {
    if let Some(i) = n.as_i64() {
        buf.push_str(&i.to_string());
    } else if let Some(u) = n.as_u64() {
        buf.push_str(&u.to_string());
    } else {
        let f = n
            .as_f64()
            .ok_or_else(|| CoreError::Canonicalization(format!("unrepresentable number {n}")))?;
        buf.push_str(&format_f64(f)?);
    }
    Ok(())
}

/// Format a float the way ECMAScript `Number.prototype.toString` does.
pub(crate) fn format_f64(value: f64) -> Result<String> {
    if !value.is_finite() {
        return Err(CoreError::Canonicalization(format!(
            "non-finite number {value} cannot be canonicalized"
        )));
    }
    if value == 0.0 {
        // Covers -0.0 as well.
        return Ok("0".to_string());
    }

    // `{:e}` yields the shortest round-trip digits, e.g. "1.2345e-7".
    let sci = format!("{value:e}");
    let (mantissa, exponent) = sci
        .split_once('e')
        .ok_or_else(|| CoreError::Canonicalization(format!("unexpected float form {sci}")))?;
    let exponent: i32 = exponent
        .parse()
        .map_err(|_| CoreError::Canonicalization(format!("unexpected float form {sci}")))?;

    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let k = digits.len() as i32;
    let n = exponent + 1;

    let mut out = String::with_capacity(digits.len() + 8);
    if value < 0.0 {
        out.push('-');
    }

    if k <= n && n <= 21 {
        out.push_str(&digits);
        out.extend(std::iter::repeat('0').take((n - k) as usize));
    } else if 0 < n && n <= 21 {
        out.push_str(&digits[..n as usize]);
        out.push('.');
        out.push_str(&digits[n as usize..]);
    } else if -6 < n && n <= 0 {
        out.push_str("0.");
        out.extend(std::iter::repeat('0').take((-n) as usize));
        out.push_str(&digits);
    } else {
        out.push_str(&digits[..1]);
        if k > 1 {
            out.push('.');
            out.push_str(&digits[1..]);
        }
        out.push('e');
        let e = n - 1;
        if e >= 0 {
            out.push('+');
        }
        out.push_str(&e.to_string());
    }
    Ok(out)
}

fn write_string(buf: &mut String, s: &str) {
    buf.push('"');
    for c in s.chars() {
        match c {
            '"' => buf.push_str("\\\""),
            '\\' => buf.push_str("\\\\"),
            '\u{08}' => buf.push_str("\\b"),
            '\t' => buf.push_str("\\t"),
            '\n' => buf.push_str("\\n"),
            '\u{0c}' => buf.push_str("\\f"),
            '\r' => buf.push_str("\\r"),
            c if (c as u32) < 0x20 => buf.push_str(&format!("\\u{:04x}", c as u32)),
            c => buf.push(c),
        }
    }
    buf.push('"');
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn canon(v: Value) -> String {
        canonical_string(&v).unwrap()
    }

    #[test]
    fn test_keys_sorted_recursively() {
        let v = json!({"b": 1, "a": {"z": true, "m": null}, "c": [3, 1, 2]});
        assert_eq!(canon(v), r#"{"a":{"m":null,"z":true},"b":1,"c":[3,1,2]}"#);
    }

    #[test]
    fn test_key_order_independent() {
        let a: Value = serde_json::from_str(r#"{"x":1,"y":{"q":2,"p":3}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{ "y" : {"p":3, "q":2}, "x" : 1 }"#).unwrap();
        assert_eq!(canonicalize(&a).unwrap(), canonicalize(&b).unwrap());
    }

    #[test]
    fn test_float_formatting() {
        assert_eq!(format_f64(1.0).unwrap(), "1");
        assert_eq!(format_f64(-0.0).unwrap(), "0");
        assert_eq!(format_f64(0.5).unwrap(), "0.5");
        assert_eq!(format_f64(123.456).unwrap(), "123.456");
        assert_eq!(format_f64(1e20).unwrap(), "100000000000000000000");
        assert_eq!(format_f64(1e21).unwrap(), "1e+21");
        assert_eq!(format_f64(0.000001).unwrap(), "0.000001");
        assert_eq!(format_f64(1e-7).unwrap(), "1e-7");
        assert_eq!(format_f64(-2.5e-8).unwrap(), "-2.5e-8");
    }

    #[test]
    fn test_alternate_numeric_spellings_converge() {
        let a: Value = serde_json::from_str(r#"{"n":1.0,"m":1e2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"n":1,"m":100.0}"#).unwrap();
        assert_eq!(canon(a.clone()), r#"{"m":100,"n":1}"#);
        assert_eq!(canonicalize(&a).unwrap(), canonicalize(&b).unwrap());
    }

    #[test]
    fn test_parsed_floats_keep_their_value() {
        let v: Value = serde_json::from_str(
            r#"{"a":7.038531e-26,"b":9007199254740993.0,"c":0.30000000000000004,"d":5e-324,"e":1.7976931348623157e308}"#,
        )
        .unwrap();
        assert_eq!(
            canon(v),
            r#"{"a":7.038531e-26,"b":9007199254740992,"c":0.30000000000000004,"d":5e-324,"e":1.7976931348623157e+308}"#
        );
    }

    #[test]
    fn test_non_finite_rejected() {
        assert!(matches!(
            format_f64(f64::NAN),
            Err(CoreError::Canonicalization(_))
        ));
        assert!(format_f64(f64::INFINITY).is_err());
    }

    #[test]
    fn test_string_escaping() {
        let v = json!({"s": "a\"b\\c\n\u{1}é/"});
        assert_eq!(canon(v), "{\"s\":\"a\\\"b\\\\c\\n\\u0001é/\"}");
    }

    #[test]
    fn test_utf16_key_order() {
        // U+E000 sorts after a surrogate pair in UTF-16, before it in UTF-8.
        let v = json!({"\u{e000}": 1, "\u{1f600}": 2});
        assert_eq!(canon(v), "{\"\u{1f600}\":2,\"\u{e000}\":1}");
    }

    #[test]
    fn test_no_whitespace() {
        let v = json!({"a": [1, {"b": "c"}]});
        assert!(!canon(v).contains(' '));
    }

    proptest::proptest! {
        #[test]
        fn prop_float_text_round_trips(
            f in proptest::num::f64::POSITIVE
                | proptest::num::f64::NEGATIVE
                | proptest::num::f64::NORMAL
                | proptest::num::f64::SUBNORMAL
                | proptest::num::f64::ZERO
        ) {
            let text = format_f64(f).unwrap();
            let parsed: f64 = serde_json::from_str(&text).unwrap();
            proptest::prop_assert_eq!(parsed, f);
            let reparsed: Value = serde_json::from_str(&text).unwrap();
            proptest::prop_assert_eq!(canon(reparsed), text);
        }

        #[test]
        fn prop_object_insertion_order_irrelevant(
            entries in proptest::collection::btree_map("[a-z]{1,6}", -1000i64..1000, 0..12)
        ) {
            let forward: Map<String, Value> =
                entries.iter().map(|(k, v)| (k.clone(), json!(v))).collect();
            let reverse: Map<String, Value> =
                entries.iter().rev().map(|(k, v)| (k.clone(), json!(v))).collect();
            proptest::prop_assert_eq!(
                canonicalize_object(&forward).unwrap(),
                canonicalize_object(&reverse).unwrap()
            );
        }
    }
}
