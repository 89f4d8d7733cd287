//! Best-effort rendering of HTTP bodies into log fields.
//!
//! # Design Decisions
//! - Classification never fails: whatever cannot be decoded is recorded inline
//! - A strict whole-document parse decides whether the raw text is kept
//! - A second, streaming pass preserves integers that do not fit in 64 bits,
//!   including those nested in objects and arrays

use std::collections::BTreeMap;

use serde::de::Error as _;
use serde_json::value::RawValue;
use serde_json::{Map, Value};

/// Field holding the payload as text when it is not a JSON object.
pub const TEXT_FIELD: &str = "_text";

/// Field holding the decoder error when the streaming pass fails.
pub const ERROR_FIELD: &str = "_error";

/// Render `raw` into a structured record suitable for a log field.
///
/// Empty input yields an empty record.
pub fn classify(raw: &[u8]) -> Map<String, Value> {
    let mut record = Map::new();
    if raw.is_empty() {
        return record;
    }

    match serde_json::from_slice::<Map<String, Value>>(raw) {
        Ok(fields) => record = fields,
        Err(_) => {
            record.insert(
                TEXT_FIELD.to_string(),
                Value::String(String::from_utf8_lossy(raw).into_owned()),
            );
        }
    }

    match decode_precise(raw) {
        Ok(fields) => record.extend(fields),
        Err(err) => {
            record.insert(ERROR_FIELD.to_string(), Value::String(err.to_string()));
        }
    }

    record
}

/// Decode the first JSON object in `raw`, ignoring anything after it.
fn decode_precise(raw: &[u8]) -> Result<Map<String, Value>, serde_json::Error> {
    let mut stream = serde_json::Deserializer::from_slice(raw)
        .into_iter::<BTreeMap<String, Box<RawValue>>>();

    let fields = match stream.next() {
        Some(result) => result?,
        None => return Err(serde_json::Error::custom("EOF")),
    };

    fields
        .into_iter()
        .map(|(key, raw)| Ok((key, precise_value(&raw)?)))
        .collect()
}

/// Decode `raw` keeping every integer literal exact, at any depth.
fn precise_value(raw: &RawValue) -> Result<Value, serde_json::Error> {
    let text = raw.get().trim();
    match text.as_bytes().first() {
        Some(b'{') => {
            let fields: BTreeMap<String, Box<RawValue>> = serde_json::from_str(text)?;
            fields
                .into_iter()
                .map(|(key, raw)| Ok((key, precise_value(&raw)?)))
                .collect::<Result<Map<_, _>, _>>()
                .map(Value::Object)
        }
        Some(b'[') => {
            let items: Vec<Box<RawValue>> = serde_json::from_str(text)?;
            items
                .iter()
                .map(|raw| precise_value(raw))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        _ if is_integer_literal(text) => {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Value::from(n));
            }
            if let Ok(n) = text.parse::<u64>() {
                return Ok(Value::from(n));
            }
            // Wider than any native integer: keep the digits rather than an f64.
            Ok(Value::String(text.to_owned()))
        }
        _ => serde_json::from_str(text),
    }
}

fn is_integer_literal(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_is_decoded() {
        let record = classify(br#"{"a":1}"#);
        assert_eq!(record.get("a").and_then(Value::as_i64), Some(1));
        assert!(record.get("a").map(Value::is_f64) == Some(false));
        assert!(!record.contains_key(TEXT_FIELD));
        assert!(!record.contains_key(ERROR_FIELD));
    }

    #[test]
    fn test_plain_text_is_kept_verbatim() {
        let record = classify(b"not json");
        assert_eq!(record.get(TEXT_FIELD), Some(&json!("not json")));
        assert!(record.contains_key(ERROR_FIELD));
    }

    #[test]
    fn test_empty_body_is_empty_record() {
        assert!(classify(b"").is_empty());
    }

    #[test]
    fn test_oversized_integer_is_not_rounded() {
        let record = classify(br#"{"id":123456789012345678901234567890,"n":-7}"#);
        assert_eq!(record.get("id"), Some(&json!("123456789012345678901234567890")));
        assert_eq!(record.get("n"), Some(&json!(-7)));
    }

    #[test]
    fn test_nested_oversized_integers_are_not_rounded() {
        let record = classify(br#"{"outer":{"id":123456789012345678901234567890}}"#);
        assert_eq!(
            record.get("outer"),
            Some(&json!({"id": "123456789012345678901234567890"}))
        );

        let record = classify(br#"{"ids":[1,98765432109876543210987654321,{"n":2}]}"#);
        assert_eq!(
            record.get("ids"),
            Some(&json!([1, "98765432109876543210987654321", {"n": 2}]))
        );
    }

    #[test]
    fn test_nested_values_survive() {
        let record = classify(br#"{"user":{"name":"ada","tags":["x","y"]},"ratio":0.1}"#);
        assert_eq!(record.get("user"), Some(&json!({"name": "ada", "tags": ["x", "y"]})));
        assert_eq!(record.get("ratio"), Some(&json!(0.1)));
    }

    #[test]
    fn test_trailing_data_keeps_text_and_first_object() {
        let record = classify(br#"{"a":1} trailing"#);
        assert_eq!(record.get(TEXT_FIELD), Some(&json!(r#"{"a":1} trailing"#)));
        assert_eq!(record.get("a"), Some(&json!(1)));
        assert!(!record.contains_key(ERROR_FIELD));
    }

    #[test]
    fn test_non_object_json_is_text() {
        let record = classify(b"[1,2,3]");
        assert_eq!(record.get(TEXT_FIELD), Some(&json!("[1,2,3]")));
        assert!(record.contains_key(ERROR_FIELD));
    }
}
