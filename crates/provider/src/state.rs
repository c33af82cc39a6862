//! Terraform State Management
//!
//! Handles encoding and decoding of Terraform `DynamicValue`s. Terraform
//! sends configuration, plans and state as msgpack-encoded cty values;
//! unknown values travel as msgpack extension type 0. Raw state read back
//! from disk during upgrades is JSON.

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// A cty value as seen by the provider.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DynamicValue {
    #[default]
    Null,
    /// Known only after apply.
    Unknown,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    List(Vec<DynamicValue>),
    Map(HashMap<String, DynamicValue>),
}

impl DynamicValue {
    pub fn as_string(&self) -> Option<&str> {
        match self {
            DynamicValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            DynamicValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DynamicValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, DynamicValue>> {
        match self {
            DynamicValue::Map(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[DynamicValue]> {
        match self {
            DynamicValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&DynamicValue> {
        self.as_map()?.get(key)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, DynamicValue::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, DynamicValue::Unknown)
    }

    /// True when neither this value nor anything nested in it is unknown.
    pub fn is_wholly_known(&self) -> bool {
        match self {
            DynamicValue::Unknown => false,
            DynamicValue::List(items) => items.iter().all(DynamicValue::is_wholly_known),
            DynamicValue::Map(m) => m.values().all(DynamicValue::is_wholly_known),
            _ => true,
        }
    }

    /// Inserts `value` under `key` when this is a map.
    pub fn set(&mut self, key: &str, value: DynamicValue) {
        if let DynamicValue::Map(m) = self {
            m.insert(key.to_string(), value);
        }
    }

    /// JSON rendering. Unknown values render as `null`.
    pub fn to_json(&self) -> JsonValue {
        match self {
            DynamicValue::Null | DynamicValue::Unknown => JsonValue::Null,
            DynamicValue::Bool(b) => JsonValue::Bool(*b),
            DynamicValue::Number(n) => JsonValue::Number(n.clone()),
            DynamicValue::String(s) => JsonValue::String(s.clone()),
            DynamicValue::List(items) => {
                JsonValue::Array(items.iter().map(|v| v.to_json()).collect())
            }
            DynamicValue::Map(m) => JsonValue::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => DynamicValue::Null,
            JsonValue::Bool(b) => DynamicValue::Bool(b),
            JsonValue::Number(n) => DynamicValue::Number(n),
            JsonValue::String(s) => DynamicValue::String(s),
            JsonValue::Array(items) => {
                DynamicValue::List(items.into_iter().map(DynamicValue::from_json).collect())
            }
            JsonValue::Object(m) => DynamicValue::Map(
                m.into_iter()
                    .map(|(k, v)| (k, DynamicValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Converts any serializable API struct into a value.
    pub fn from_serialize<T: Serialize>(value: &T) -> Result<Self> {
        Ok(DynamicValue::from_json(serde_json::to_value(value)?))
    }

    /// Deserializes configuration into a typed struct.
    ///
    /// Null and unknown map entries are dropped first so that `Option`
    /// fields read as `None` and `#[serde(default)]` collections as empty.
    pub fn to_typed<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(pruned_json(self)).context("failed to decode configuration")
    }
}

fn pruned_json(value: &DynamicValue) -> JsonValue {
    match value {
        DynamicValue::List(items) => JsonValue::Array(items.iter().map(pruned_json).collect()),
        DynamicValue::Map(m) => JsonValue::Object(
            m.iter()
                .filter(|(_, v)| !v.is_null() && !v.is_unknown())
                .map(|(k, v)| (k.clone(), pruned_json(v)))
                .collect(),
        ),
        other => other.to_json(),
    }
}

/// msgpack extension type cty uses for unknown values.
const UNKNOWN_EXT_TYPE: i8 = 0;

/// Decode a Terraform DynamicValue from msgpack bytes
pub fn decode_dynamic_value(data: &[u8]) -> Result<DynamicValue> {
    if data.is_empty() {
        return Ok(DynamicValue::Null);
    }

    let value = rmpv::decode::read_value(&mut &data[..]).context("invalid msgpack value")?;
    Ok(from_msgpack(value))
}

/// Decode a JSON-encoded value (raw state, `DynamicValue.json`).
pub fn decode_json_value(data: &[u8]) -> Result<DynamicValue> {
    if data.is_empty() {
        return Ok(DynamicValue::Null);
    }
    let value: JsonValue = serde_json::from_slice(data).context("invalid JSON value")?;
    Ok(DynamicValue::from_json(value))
}

/// Encode a value to Terraform DynamicValue msgpack bytes
pub fn encode_dynamic_value(value: &DynamicValue) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    rmpv::encode::write_value(&mut buf, &to_msgpack(value)).context("failed to encode msgpack")?;
    Ok(buf)
}

fn from_msgpack(value: rmpv::Value) -> DynamicValue {
    match value {
        rmpv::Value::Nil => DynamicValue::Null,
        rmpv::Value::Boolean(b) => DynamicValue::Bool(b),
        rmpv::Value::Integer(i) => match (i.as_i64(), i.as_u64()) {
            (Some(n), _) => DynamicValue::Number(n.into()),
            (None, Some(n)) => DynamicValue::Number(n.into()),
            _ => DynamicValue::Null,
        },
        rmpv::Value::F32(f) => float_value(f as f64),
        rmpv::Value::F64(f) => float_value(f),
        rmpv::Value::String(s) => DynamicValue::String(s.into_str().unwrap_or_default()),
        rmpv::Value::Binary(b) => DynamicValue::String(String::from_utf8_lossy(&b).into_owned()),
        rmpv::Value::Array(items) => {
            DynamicValue::List(items.into_iter().map(from_msgpack).collect())
        }
        rmpv::Value::Map(entries) => DynamicValue::Map(
            entries
                .into_iter()
                .filter_map(|(k, v)| {
                    let key = match k {
                        rmpv::Value::String(s) => s.into_str()?,
                        other => other.to_string(),
                    };
                    Some((key, from_msgpack(v)))
                })
                .collect(),
        ),
        // Refined unknowns use other extension codes; all of them are unknown to us.
        rmpv::Value::Ext(_, _) => DynamicValue::Unknown,
    }
}

fn to_msgpack(value: &DynamicValue) -> rmpv::Value {
    match value {
        DynamicValue::Null => rmpv::Value::Nil,
        DynamicValue::Unknown => rmpv::Value::Ext(UNKNOWN_EXT_TYPE, vec![0]),
        DynamicValue::Bool(b) => rmpv::Value::Boolean(*b),
        DynamicValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                rmpv::Value::from(i)
            } else if let Some(u) = n.as_u64() {
                rmpv::Value::from(u)
            } else {
                rmpv::Value::F64(n.as_f64().unwrap_or_default())
            }
        }
        DynamicValue::String(s) => rmpv::Value::from(s.as_str()),
        DynamicValue::List(items) => rmpv::Value::Array(items.iter().map(to_msgpack).collect()),
        DynamicValue::Map(m) => rmpv::Value::Map(
            m.iter()
                .map(|(k, v)| (rmpv::Value::from(k.as_str()), to_msgpack(v)))
                .collect(),
        ),
    }
}

/// Create a DynamicValue map with the given attributes
pub fn make_state(attrs: Vec<(&str, DynamicValue)>) -> DynamicValue {
    let mut map = HashMap::new();
    for (key, value) in attrs {
        map.insert(key.to_string(), value);
    }
    DynamicValue::Map(map)
}

/// Create a string DynamicValue
pub fn string_value(s: impl Into<String>) -> DynamicValue {
    DynamicValue::String(s.into())
}

/// String or null.
pub fn opt_string(s: Option<&str>) -> DynamicValue {
    s.map(string_value).unwrap_or(DynamicValue::Null)
}

/// Create a number DynamicValue from i64
pub fn int_value(n: i64) -> DynamicValue {
    DynamicValue::Number(serde_json::Number::from(n))
}

/// Number or null.
pub fn opt_int(n: Option<i64>) -> DynamicValue {
    n.map(int_value).unwrap_or(DynamicValue::Null)
}

/// Create a number DynamicValue from f64
pub fn float_value(n: f64) -> DynamicValue {
    serde_json::Number::from_f64(n)
        .map(DynamicValue::Number)
        .unwrap_or(DynamicValue::Null)
}

/// Create a bool DynamicValue
pub fn bool_value(b: bool) -> DynamicValue {
    DynamicValue::Bool(b)
}

/// Bool or null.
pub fn opt_bool(b: Option<bool>) -> DynamicValue {
    b.map(bool_value).unwrap_or(DynamicValue::Null)
}

pub fn list_value(items: Vec<DynamicValue>) -> DynamicValue {
    DynamicValue::List(items)
}

pub fn string_list<S: AsRef<str>>(items: &[S]) -> DynamicValue {
    DynamicValue::List(items.iter().map(|s| string_value(s.as_ref())).collect())
}

/// String list, or null when the API omitted it.
pub fn opt_string_list<S: AsRef<str>>(items: Option<&[S]>) -> DynamicValue {
    items.map(string_list).unwrap_or(DynamicValue::Null)
}

/// `map(string)` attribute.
pub fn string_map<'a>(entries: impl IntoIterator<Item = (&'a String, &'a String)>) -> DynamicValue {
    DynamicValue::Map(
        entries
            .into_iter()
            .map(|(k, v)| (k.clone(), string_value(v.as_str())))
            .collect(),
    )
}

/// Create a null DynamicValue
pub fn null_value() -> DynamicValue {
    DynamicValue::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn decodes_msgpack_map() {
        // {"id": "x", "n": 3}
        let bytes = [0x82, 0xa2, b'i', b'd', 0xa1, b'x', 0xa1, b'n', 0x03];

        let value = decode_dynamic_value(&bytes).unwrap();

        assert_eq!(value.get("id").and_then(DynamicValue::as_string), Some("x"));
        assert_eq!(value.get("n").and_then(DynamicValue::as_i64), Some(3));
    }

    #[test]
    fn unknown_uses_extension_zero() {
        let encoded = encode_dynamic_value(&DynamicValue::Unknown).unwrap();

        assert_eq!(encoded, vec![0xd4, 0x00, 0x00]);
        assert!(decode_dynamic_value(&encoded).unwrap().is_unknown());
    }

    #[test]
    fn nested_values_survive_encoding() {
        let state = make_state(vec![
            ("id", string_value("vm-1")),
            ("memory_size_mib", int_value(4096)),
            ("metadata", make_state(vec![("uuid", DynamicValue::Unknown)])),
            ("disk_list", list_value(vec![make_state(vec![("disk_size_mib", int_value(1024))])])),
        ]);

        let decoded = decode_dynamic_value(&encode_dynamic_value(&state).unwrap()).unwrap();

        assert_eq!(decoded, state);
        assert!(!decoded.is_wholly_known());
    }

    #[test]
    fn empty_payload_is_null() {
        assert!(decode_dynamic_value(&[]).unwrap().is_null());
        assert!(decode_json_value(&[]).unwrap().is_null());
    }

    #[test]
    fn to_typed_drops_nulls_and_unknowns() {
        #[derive(Deserialize)]
        struct Config {
            name: String,
            description: Option<String>,
            #[serde(default)]
            disks: Vec<String>,
        }
        let value = make_state(vec![
            ("name", string_value("vg1")),
            ("description", DynamicValue::Unknown),
            ("disks", null_value()),
        ]);

        let config: Config = value.to_typed().unwrap();

        assert_eq!(config.name, "vg1");
        assert!(config.description.is_none());
        assert!(config.disks.is_empty());
    }

    #[test]
    fn json_state_decodes() {
        let raw = serde_json::to_vec(&json!({"id": "abc", "tags": ["a"], "ok": true})).unwrap();

        let value = decode_json_value(&raw).unwrap();

        assert_eq!(value.get("id"), Some(&string_value("abc")));
        assert_eq!(value.get("ok").and_then(DynamicValue::as_bool), Some(true));
        assert_eq!(value.get("tags"), Some(&string_list(&["a"])));
    }
}
