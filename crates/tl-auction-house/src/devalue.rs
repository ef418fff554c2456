//! Reconstruction of devalue-flattened payloads (the format SvelteKit uses
//! for `__data.json`).
//!
//! A flattened payload is an array of slots. Slot 0 is the root, and every
//! container stores the slot indices of its children instead of the children
//! themselves, so shared values are written once. Small negative indices are
//! sentinels for values JSON cannot carry. Tagged arrays (`["Date", ...]`,
//! `["Map", ...]`) revive non-plain objects.
//!
//! The result is the JSON projection of the revived value, following
//! `JSON.stringify`: undefined properties are dropped, undefined array
//! entries and non-finite numbers become `null`, dates become their ISO
//! string. Shared slots are cloned. A payload that references itself has no
//! JSON form and is rejected.

use base64::Engine;
use serde_json::{Map, Value};

use crate::codec::compress_json::number_value;
use crate::types::{FetchError, FetchResult};

const UNDEFINED: i64 = -1;
const HOLE: i64 = -2;
const NAN: i64 = -3;
const POSITIVE_INFINITY: i64 = -4;
const NEGATIVE_INFINITY: i64 = -5;
const NEGATIVE_ZERO: i64 = -6;

/// Nesting bound, shallow enough for a 2 MiB thread stack.
const MAX_DEPTH: usize = 128;

/// Rebuild the value a devalue payload was flattened from.
pub fn unflatten(parsed: &Value) -> FetchResult<Value> {
    if let Some(index) = parsed.as_i64() {
        return match sentinel(index) {
            Some(value) => Ok(value.unwrap_or(Value::Null)),
            None => Err(invalid("a bare index must be a sentinel")),
        };
    }

    let slots = match parsed {
        Value::Array(slots) if !slots.is_empty() => slots,
        _ => return Err(invalid("expected a non-empty array")),
    };

    let mut hydrator = Hydrator {
        slots,
        hydrated: vec![None; slots.len()],
        in_progress: vec![false; slots.len()],
    };
    Ok(hydrator.hydrate(0, 0)?.unwrap_or(Value::Null))
}

/// Flatten a JSON value into devalue form. Objects and arrays get one slot
/// each; primitives are stored inline in their own slot.
pub fn flatten(value: &Value) -> Value {
    let mut slots = Vec::new();
    flatten_into(value, &mut slots);
    Value::Array(slots)
}

fn flatten_into(value: &Value, slots: &mut Vec<Value>) -> usize {
    let index = slots.len();
    slots.push(Value::Null);
    let slot = match value {
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| Value::from(flatten_into(item, slots)))
                .collect(),
        ),
        Value::Object(fields) => Value::Object(
            fields
                .iter()
                .map(|(name, field)| (name.clone(), Value::from(flatten_into(field, slots))))
                .collect(),
        ),
        primitive => primitive.clone(),
    };
    slots[index] = slot;
    index
}

fn invalid(reason: &str) -> FetchError {
    FetchError::Decode(format!("invalid devalue payload: {reason}"))
}

/// Value of a sentinel index; `Some(None)` is undefined.
fn sentinel(index: i64) -> Option<Option<Value>> {
    match index {
        UNDEFINED | HOLE => Some(None),
        NAN | POSITIVE_INFINITY | NEGATIVE_INFINITY => Some(Some(Value::Null)),
        NEGATIVE_ZERO => Some(Some(Value::from(0))),
        _ => None,
    }
}

struct Hydrator<'a> {
    slots: &'a [Value],
    hydrated: Vec<Option<Value>>,
    in_progress: Vec<bool>,
}

impl Hydrator<'_> {
    fn hydrate_ref(&mut self, reference: &Value, depth: usize) -> FetchResult<Option<Value>> {
        let index = reference
            .as_i64()
            .ok_or_else(|| invalid(&format!("reference {reference} is not an index")))?;
        self.hydrate(index, depth)
    }

    /// Hydrate one slot. `None` stands for `undefined`.
    fn hydrate(&mut self, index: i64, depth: usize) -> FetchResult<Option<Value>> {
        if let Some(value) = sentinel(index) {
            return Ok(value);
        }
        let slot = usize::try_from(index)
            .ok()
            .filter(|i| *i < self.slots.len())
            .ok_or_else(|| invalid(&format!("index {index} out of range")))?;

        if let Some(done) = &self.hydrated[slot] {
            return Ok(Some(done.clone()));
        }
        if self.in_progress[slot] {
            return Err(invalid(&format!("slot {slot} references itself")));
        }
        if depth > MAX_DEPTH {
            return Err(invalid(&format!("nests deeper than {MAX_DEPTH} levels")));
        }

        self.in_progress[slot] = true;
        let slots = self.slots;
        let value = match &slots[slot] {
            Value::Array(items) => match items.first() {
                Some(Value::String(tag)) => self.revive(tag, &items[1..], depth)?,
                _ => {
                    let mut array = Vec::with_capacity(items.len());
                    for item in items {
                        let element = self.hydrate_ref(item, depth + 1)?;
                        array.push(element.unwrap_or(Value::Null));
                    }
                    Value::Array(array)
                }
            },
            Value::Object(fields) => {
                let mut object = Map::new();
                for (name, reference) in fields {
                    if let Some(field) = self.hydrate_ref(reference, depth + 1)? {
                        object.insert(name.clone(), field);
                    }
                }
                Value::Object(object)
            }
            primitive => primitive.clone(),
        };
        self.in_progress[slot] = false;

        self.hydrated[slot] = Some(value.clone());
        Ok(Some(value))
    }

    fn revive(&mut self, tag: &str, args: &[Value], depth: usize) -> FetchResult<Value> {
        match tag {
            "Date" | "URL" => args
                .first()
                .and_then(Value::as_str)
                .map(|s| Value::String(s.to_string()))
                .ok_or_else(|| invalid(&format!("{tag} without a string"))),
            "Object" => args
                .first()
                .cloned()
                .ok_or_else(|| invalid("boxed Object without a value")),
            "BigInt" => {
                let digits = args
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| invalid("BigInt without digits"))?;
                Ok(big_int_value(digits))
            }
            "RegExp" => {
                let source = args.first().and_then(Value::as_str).unwrap_or_default();
                let flags = args.get(1).and_then(Value::as_str).unwrap_or_default();
                Ok(Value::String(format!("/{source}/{flags}")))
            }
            "Set" => {
                let mut members = Vec::with_capacity(args.len());
                for reference in args {
                    let member = self.hydrate_ref(reference, depth + 1)?;
                    members.push(member.unwrap_or(Value::Null));
                }
                Ok(Value::Array(members))
            }
            "Map" => {
                let mut object = Map::new();
                for pair in args.chunks(2) {
                    let [key_ref, value_ref] = pair else {
                        return Err(invalid("Map with an odd number of entries"));
                    };
                    let key = match self.hydrate_ref(key_ref, depth + 1)? {
                        Some(Value::String(s)) => s,
                        Some(other) => other.to_string(),
                        None => "undefined".to_string(),
                    };
                    let value = self.hydrate_ref(value_ref, depth + 1)?;
                    object.insert(key, value.unwrap_or(Value::Null));
                }
                Ok(Value::Object(object))
            }
            "null" => {
                let mut object = Map::new();
                for pair in args.chunks(2) {
                    let [Value::String(key), value_ref] = pair else {
                        return Err(invalid("prototype-less object with a bad entry"));
                    };
                    if let Some(value) = self.hydrate_ref(value_ref, depth + 1)? {
                        object.insert(key.clone(), value);
                    }
                }
                Ok(Value::Object(object))
            }
            "ArrayBuffer" => {
                let bytes = self.buffer_bytes(args.first())?;
                Ok(Value::Array(bytes.into_iter().map(Value::from).collect()))
            }
            _ => match element_width(tag) {
                Some(width) => {
                    let bytes = self.buffer_bytes(args.first())?;
                    let elements = typed_elements(tag, width, &bytes)?;
                    let start = args.get(1).and_then(Value::as_u64).map(|n| n as usize);
                    let end = args.get(2).and_then(Value::as_u64).map(|n| n as usize);
                    Ok(Value::Array(subarray(elements, start, end)))
                }
                None => Err(invalid(&format!("unknown type {tag}"))),
            },
        }
    }

    /// Raw bytes behind a typed array: either inline base64, or a reference
    /// to an `["ArrayBuffer", base64]` slot.
    fn buffer_bytes(&self, arg: Option<&Value>) -> FetchResult<Vec<u8>> {
        let encoded = match arg {
            Some(Value::String(encoded)) => encoded.as_str(),
            Some(reference) => {
                let slot = reference
                    .as_u64()
                    .and_then(|i| self.slots.get(i as usize))
                    .and_then(Value::as_array);
                match slot.map(Vec::as_slice) {
                    Some([Value::String(tag), Value::String(encoded)]) if tag == "ArrayBuffer" => {
                        encoded.as_str()
                    }
                    _ => return Err(invalid("typed array without a buffer")),
                }
            }
            None => return Err(invalid("typed array without a buffer")),
        };
        base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| invalid(&format!("bad base64 buffer: {e}")))
    }
}

fn big_int_value(digits: &str) -> Value {
    if let Ok(n) = digits.parse::<i64>() {
        return Value::from(n);
    }
    if let Ok(n) = digits.parse::<u64>() {
        return Value::from(n);
    }
    Value::String(digits.to_string())
}

fn element_width(tag: &str) -> Option<usize> {
    match tag {
        "Int8Array" | "Uint8Array" | "Uint8ClampedArray" => Some(1),
        "Int16Array" | "Uint16Array" => Some(2),
        "Int32Array" | "Uint32Array" | "Float32Array" => Some(4),
        "Float64Array" | "BigInt64Array" | "BigUint64Array" => Some(8),
        _ => None,
    }
}

fn typed_elements(tag: &str, width: usize, bytes: &[u8]) -> FetchResult<Vec<Value>> {
    if bytes.len() % width != 0 {
        return Err(invalid(&format!(
            "{tag} buffer of {} bytes is not a multiple of {width}",
            bytes.len()
        )));
    }

    let elements = bytes
        .chunks_exact(width)
        .map(|c| {
            let mut le = [0u8; 8];
            le[..width].copy_from_slice(c);
            match tag {
                "Int8Array" => Value::from(c[0] as i8),
                "Int16Array" => Value::from(i16::from_le_bytes([le[0], le[1]])),
                "Uint16Array" => Value::from(u16::from_le_bytes([le[0], le[1]])),
                "Int32Array" => Value::from(i32::from_le_bytes([le[0], le[1], le[2], le[3]])),
                "Uint32Array" => Value::from(u32::from_le_bytes([le[0], le[1], le[2], le[3]])),
                "Float32Array" => {
                    number_value(f32::from_le_bytes([le[0], le[1], le[2], le[3]]) as f64)
                }
                "Float64Array" => number_value(f64::from_le_bytes(le)),
                "BigInt64Array" => Value::from(i64::from_le_bytes(le)),
                "BigUint64Array" => Value::from(u64::from_le_bytes(le)),
                _ => Value::from(c[0]),
            }
        })
        .collect();
    Ok(elements)
}

fn subarray(elements: Vec<Value>, start: Option<usize>, end: Option<usize>) -> Vec<Value> {
    let len = elements.len();
    let start = start.unwrap_or(0).min(len);
    let end = end.unwrap_or(len).clamp(start, len);
    elements[start..end].to_vec()
}
