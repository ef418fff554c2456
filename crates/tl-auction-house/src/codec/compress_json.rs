//! compress-json blobs: a `[values, root_key]` pair where every distinct
//! value is stored once and referenced by a base-62 key.
//!
//! Scalars are tagged strings (`b|T`, `n|1A`, `s|...`); containers list the
//! keys of their children (`a|1|2`, `o|<keys>|1|2`). Children are always
//! stored before their parent, so the root key is usually the last one.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::base62::{int_to_s, num_to_s, s_to_int, s_to_num, MAX_SAFE_INTEGER};
use crate::types::{FetchError, FetchResult};

/// Nesting bound while decoding, shallow enough for a 2 MiB thread stack.
const MAX_DEPTH: usize = 128;

/// Prefixes that mark a tagged value. Literal strings starting with one of
/// them are escaped with `s|`.
const TAGGED_PREFIXES: [&str; 6] = ["b|", "o|", "n|", "N|", "a|", "s|"];

/// Decompress a compress-json blob into the value it encodes.
pub fn decompress(blob: &Value) -> FetchResult<Value> {
    let (values, root) = match blob {
        Value::Array(pair) if pair.len() == 2 => {
            let values = pair[0].as_array().ok_or_else(|| {
                FetchError::Decode("compressed blob: values is not an array".to_string())
            })?;
            let root = pair[1].as_str().ok_or_else(|| {
                FetchError::Decode("compressed blob: root key is not a string".to_string())
            })?;
            (values, root)
        }
        _ => {
            return Err(FetchError::Decode(
                "compressed blob must be a [values, root] pair".to_string(),
            ))
        }
    };

    let mut decoder = Decoder {
        values,
        in_progress: vec![false; values.len()],
    };
    let decoded = decoder.decode_key(root, 0)?;
    Ok(decoded.unwrap_or(Value::Null))
}

/// Compress a value into a compress-json blob.
///
/// Integral floats come back as integers after a round-trip (`2.0` -> `2`),
/// the same way the format behaves in JavaScript.
pub fn compress(value: &Value) -> Value {
    let mut encoder = Encoder::default();
    let root = encoder.add_value(value);
    Value::Array(vec![Value::Array(encoder.values), Value::String(root)])
}

struct Decoder<'a> {
    values: &'a [Value],
    /// Keys currently being decoded; seeing one again means a cycle.
    in_progress: Vec<bool>,
}

impl Decoder<'_> {
    /// Resolve a key. `None` stands for `undefined`.
    fn decode_key(&mut self, key: &str, depth: usize) -> FetchResult<Option<Value>> {
        match key {
            "" => return Ok(Some(Value::Null)),
            "_" => return Ok(None),
            _ => {}
        }
        if depth > MAX_DEPTH {
            return Err(FetchError::Decode(format!(
                "compressed blob nests deeper than {MAX_DEPTH} levels"
            )));
        }

        let values = self.values;
        let index = s_to_int(key)
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| FetchError::Decode(format!("invalid key {key:?}")))?;
        let value = values.get(index).ok_or_else(|| {
            FetchError::Decode(format!("key {key:?} out of range ({} values)", values.len()))
        })?;

        match value {
            Value::Null | Value::Bool(_) | Value::Number(_) => Ok(Some(value.clone())),
            Value::String(s) => {
                if self.in_progress[index] {
                    return Err(FetchError::Decode(format!("key {key:?} references itself")));
                }
                self.in_progress[index] = true;
                let decoded = self.decode_str(s, depth);
                self.in_progress[index] = false;
                decoded.map(Some)
            }
            other => Err(FetchError::Decode(format!(
                "unknown data type at key {key:?}: {other}"
            ))),
        }
    }

    fn decode_str(&mut self, s: &str, depth: usize) -> FetchResult<Value> {
        let (prefix, rest) = match (s.get(..2), s.get(2..)) {
            (Some(prefix), Some(rest)) => (prefix, rest),
            _ => return Ok(Value::String(s.to_string())),
        };

        match prefix {
            // compress-json reads anything but `b|F` as true
            "b|" => Ok(Value::Bool(rest != "F")),
            "n|" => s_to_num(rest)
                .map(number_value)
                .ok_or_else(|| FetchError::Decode(format!("invalid number {s:?}"))),
            // Infinity and NaN have no JSON form
            "N|" => Ok(Value::Null),
            "a|" => self.decode_array(rest, depth),
            "o|" => self.decode_object(rest, depth),
            "s|" => Ok(Value::String(rest.to_string())),
            _ => Ok(Value::String(s.to_string())),
        }
    }

    fn decode_array(&mut self, body: &str, depth: usize) -> FetchResult<Value> {
        if body.is_empty() {
            return Ok(Value::Array(Vec::new()));
        }
        let items = body
            .split('|')
            .map(|key| Ok(self.decode_key(key, depth + 1)?.unwrap_or(Value::Null)))
            .collect::<FetchResult<Vec<_>>>()?;
        Ok(Value::Array(items))
    }

    fn decode_object(&mut self, body: &str, depth: usize) -> FetchResult<Value> {
        if body.is_empty() {
            return Ok(Value::Object(Map::new()));
        }

        let mut parts = body.split('|');
        let keys_key = parts.next().unwrap_or_default();
        let value_keys: Vec<&str> = parts.collect();

        let keys: Vec<String> = match self.decode_key(keys_key, depth + 1)? {
            Some(Value::String(single)) if value_keys.len() == 1 => vec![single],
            Some(Value::Array(names)) => names
                .iter()
                .map(property_name)
                .collect::<FetchResult<_>>()?,
            other => {
                return Err(FetchError::Decode(format!(
                    "object keys must be a string or an array, got {}",
                    other.unwrap_or(Value::Null)
                )))
            }
        };

        if keys.len() != value_keys.len() {
            return Err(FetchError::Decode(format!(
                "object has {} keys but {} values",
                keys.len(),
                value_keys.len()
            )));
        }

        let mut object = Map::new();
        for (name, key) in keys.into_iter().zip(value_keys) {
            // undefined properties are dropped, as JSON.stringify does
            if let Some(value) = self.decode_key(key, depth + 1)? {
                object.insert(name, value);
            }
        }
        Ok(Value::Object(object))
    }
}

fn property_name(name: &Value) -> FetchResult<String> {
    match name {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(FetchError::Decode(format!("invalid object key {other}"))),
    }
}

/// JSON form of a decoded number: integers stay integers, non-finite
/// numbers become null.
pub(crate) fn number_value(n: f64) -> Value {
    if !n.is_finite() {
        return Value::Null;
    }
    if n.fract() == 0.0 && n.abs() <= MAX_SAFE_INTEGER as f64 {
        return Value::from(n as i64);
    }
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

#[derive(Default)]
struct Encoder {
    values: Vec<Value>,
    keys: HashMap<String, String>,
}

impl Encoder {
    fn add_value(&mut self, value: &Value) -> String {
        match value {
            Value::Null => String::new(),
            Value::Bool(true) => self.intern("b|T".to_string()),
            Value::Bool(false) => self.intern("b|F".to_string()),
            Value::Number(n) => {
                let encoded = format!("n|{}", num_to_s(n.as_f64().unwrap_or_default()));
                self.intern(encoded)
            }
            Value::String(s) => self.intern(escape_str(s)),
            Value::Array(items) => {
                if items.is_empty() {
                    return self.intern("a|".to_string());
                }
                let mut acc = "a".to_string();
                for item in items {
                    acc.push('|');
                    acc.push_str(&self.add_value(item));
                }
                self.intern(acc)
            }
            Value::Object(map) => {
                if map.is_empty() {
                    return self.intern("o|".to_string());
                }
                let names: Vec<Value> = map.keys().cloned().map(Value::String).collect();
                let keys_key = match names.as_slice() {
                    [single] => self.add_value(single),
                    _ => self.add_value(&Value::Array(names)),
                };
                let mut acc = format!("o|{keys_key}");
                for item in map.values() {
                    acc.push('|');
                    acc.push_str(&self.add_value(item));
                }
                self.intern(acc)
            }
        }
    }

    fn intern(&mut self, encoded: String) -> String {
        if let Some(key) = self.keys.get(&encoded) {
            return key.clone();
        }
        let key = int_to_s(self.values.len() as u64);
        self.values.push(Value::String(encoded.clone()));
        self.keys.insert(encoded, key.clone());
        key
    }
}

fn escape_str(s: &str) -> String {
    if TAGGED_PREFIXES.iter().any(|p| s.starts_with(p)) {
        format!("s|{s}")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decompress_reference_blob() {
        // compress({ name: "Sword", traits: [1, 2], ok: true, price: 1.5 })
        let blob = json!([
            ["name", "traits", "ok", "price", "a|0|1|2|3", "Sword", "n|1", "n|2", "a|6|7", "b|T", "n|1.5", "o|4|5|8|9|A"],
            "B"
        ]);
        let value = decompress(&blob).unwrap();
        assert_eq!(
            value,
            json!({ "name": "Sword", "traits": [1, 2], "ok": true, "price": 1.5 })
        );
    }

    #[test]
    fn test_single_key_object() {
        let blob = json!([["id", "n|g", "o|0|1"], "2"]);
        assert_eq!(decompress(&blob).unwrap(), json!({ "id": 42 }));
    }

    #[test]
    fn test_null_and_undefined_keys() {
        let blob = json!([["a", "b", "a|0|1", "a|_|", "o|2|_|"], "4"]);
        // "a" is undefined and dropped, "b" is null
        assert_eq!(decompress(&blob).unwrap(), json!({ "b": null }));
        let array = json!([["a|_|"], "0"]);
        assert_eq!(decompress(&array).unwrap(), json!([null, null]));
    }

    #[test]
    fn test_escaped_and_short_strings() {
        let blob = json!([["s|n|5", "x", "", "a|0|1|2"], "3"]);
        assert_eq!(decompress(&blob).unwrap(), json!(["n|5", "x", ""]));
    }

    #[test]
    fn test_non_finite_numbers_become_null() {
        let blob = json!([["N|+", "a|0"], "1"]);
        assert_eq!(decompress(&blob).unwrap(), json!([null]));
    }

    #[test]
    fn test_raw_values_pass_through() {
        let blob = json!([[7, false, null, "a|0|1|2"], "3"]);
        assert_eq!(decompress(&blob).unwrap(), json!([7, false, null]));
    }

    #[test]
    fn test_rejects_malformed_blobs() {
        assert!(matches!(decompress(&json!({})), Err(FetchError::Decode(_))));
        assert!(matches!(decompress(&json!([[], 0])), Err(FetchError::Decode(_))));
        assert!(matches!(decompress(&json!([["x"], "9"])), Err(FetchError::Decode(_))));
        assert!(matches!(decompress(&json!([["x"], "#"])), Err(FetchError::Decode(_))));
        assert!(matches!(decompress(&json!([["n|$"], "0"])), Err(FetchError::Decode(_))));
        let minus = format!("n|{}1", "-".repeat(1_000_000));
        assert!(matches!(decompress(&json!([[minus], "0"])), Err(FetchError::Decode(_))));
        assert!(matches!(decompress(&json!([[{}], "0"])), Err(FetchError::Decode(_))));
    }

    #[test]
    fn test_key_count_mismatch() {
        let blob = json!([["a", "b", "a|0|1", "n|1", "o|2|3"], "4"]);
        assert!(matches!(decompress(&blob), Err(FetchError::Decode(_))));
    }

    #[test]
    fn test_self_reference_is_rejected() {
        let blob = json!([["a|0"], "0"]);
        assert!(matches!(decompress(&blob), Err(FetchError::Decode(_))));

        // indirect: 0 -> 1 -> 0 through an object value
        let blob = json!([["o|2|1", "a|0", "k"], "0"]);
        assert!(matches!(decompress(&blob), Err(FetchError::Decode(ref m)) if m.contains("itself")));
    }

    fn nested(depth: usize) -> Value {
        let mut value = json!(1);
        for _ in 0..depth {
            value = json!([value]);
        }
        value
    }

    #[test]
    fn test_nesting_limit() {
        let near = nested(MAX_DEPTH - 8);
        assert_eq!(decompress(&compress(&near)).unwrap(), near);

        let err = decompress(&compress(&nested(MAX_DEPTH * 2))).unwrap_err();
        assert!(matches!(err, FetchError::Decode(ref m) if m.contains("deeper")));
    }

    #[test]
    fn test_shared_keys_are_not_cycles() {
        let blob = json!([["x", "a|0|0", "a|1|1"], "2"]);
        assert_eq!(decompress(&blob).unwrap(), json!([["x", "x"], ["x", "x"]]));
    }

    #[test]
    fn test_loose_booleans() {
        assert_eq!(decompress(&json!([["b|X", "b|F", "a|0|1"], "2"])).unwrap(), json!([true, false]));
    }

    #[test]
    fn test_roundtrip_nested_value() {
        let value = json!({
            "101": { "quantity": 3, "sales": [{ "p": 1250, "c": 2, "t": 7 }, { "p": 99.5, "c": 1 }] },
            "102": { "quantity": 0, "sales": [] },
            "notes": ["o|not an object", "", "日本語", null, true, -3, 0.001],
            "empty": {}
        });
        let blob = compress(&value);
        assert_eq!(decompress(&blob).unwrap(), value);
    }

    #[test]
    fn test_object_keys_keep_blob_order() {
        let blob = json!([["z", "a", "a|0|1", "n|1", "n|2", "o|2|3|4"], "5"]);
        let text = serde_json::to_string(&decompress(&blob).unwrap()).unwrap();
        assert_eq!(text, r#"{"z":1,"a":2}"#);
    }

    #[test]
    fn test_compress_deduplicates_values() {
        let blob = compress(&json!(["x", "x", "x"]));
        assert_eq!(blob, json!([["x", "a|0|0|0"], "1"]));
    }

    #[test]
    fn test_number_value() {
        assert_eq!(number_value(3.0), json!(3));
        assert_eq!(number_value(-0.0), json!(0));
        assert_eq!(number_value(2.25), json!(2.25));
        assert_eq!(number_value(f64::NAN), Value::Null);
    }
}
