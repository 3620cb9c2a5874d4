//! Deterministic JSON serialization for body hashing.
//!
//! Two JSON documents with the same members must hash identically no matter
//! which order their keys were inserted in. [`stable_stringify`] writes object
//! members sorted by key at every nesting level and keeps array order, with no
//! insignificant whitespace.
//!
//! Numbers are written the way ECMAScript `JSON.stringify` writes them, since
//! most signers are JavaScript clients: an integral float such as `1.0`
//! becomes `1`, and `-0` becomes `0`.

use serde_json::{Number, Value};

/// Magnitude from which ECMAScript switches to exponent notation.
const EXPONENT_THRESHOLD: f64 = 1e21;

/// Serialize `value` with object keys sorted recursively.
///
/// # Examples
///
/// ```
/// use medscribe_auth::stable_json::stable_stringify;
/// use serde_json::json;
///
/// assert_eq!(
///     stable_stringify(&json!({"b": [2, 1], "a": {"d": null, "c": true}})),
///     r#"{"a":{"c":true,"d":null},"b":[2,1]}"#
/// );
/// ```
#[must_use]
pub fn stable_stringify(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => write_number(out, n),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            // Sort explicitly: serde_json's map order depends on the
            // `preserve_order` feature, which another crate may switch on.
            // Keys compare as UTF-16 code units, like `Array.prototype.sort`.
            let mut members: Vec<(&String, &Value)> = map.iter().collect();
            members.sort_unstable_by(|a, b| a.0.encode_utf16().cmp(b.0.encode_utf16()));

            out.push('{');
            for (i, (key, member)) in members.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, member);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    match serde_json::to_string(s) {
        Ok(escaped) => out.push_str(&escaped),
        // Serializing a `str` cannot fail.
        Err(_) => out.push_str("\"\""),
    }
}

fn write_number(out: &mut String, n: &Number) {
    if n.is_i64() || n.is_u64() {
        out.push_str(&n.to_string());
        return;
    }
    match n.as_f64() {
        Some(f) if f.fract() == 0.0 && f.abs() < EXPONENT_THRESHOLD => {
            if f == 0.0 {
                out.push('0');
            } else {
                out.push_str(&format!("{f:.0}"));
            }
        }
        _ => out.push_str(&n.to_string()),
    }
}
