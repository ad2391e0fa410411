//! Conversions between store values and serde types.

use base64::Engine as _;
use pathstate_core::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{Error, Result};

/// Convert a store value to a Rust type via serde.
pub fn from_value<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value_to_json(value)).map_err(|e| Error::decode(e.to_string()))
}

/// Convert a Rust type to a store value via serde.
pub fn to_value<T: Serialize + ?Sized>(data: &T) -> Result<Value> {
    let json = serde_json::to_value(data).map_err(|e| Error::encode(e.to_string()))?;
    Ok(json_to_value(json))
}

/// Convert a store value to a JSON value.
///
/// Bytes become standard base64 strings. Non-finite floats become `null`.
pub fn value_to_json(value: Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(b),
        Value::Integer(i) => serde_json::Value::Number(i.into()),
        Value::Float(f) => serde_json::Number::from_f64(f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s),
        Value::Bytes(b) => {
            serde_json::Value::String(base64::engine::general_purpose::STANDARD.encode(&b))
        }
        Value::Array(items) => {
            serde_json::Value::Array(items.into_iter().map(value_to_json).collect())
        }
        Value::Map(map) => serde_json::Value::Object(
            map.into_iter()
                .map(|(key, value)| (key, value_to_json(value)))
                .collect(),
        ),
    }
}

/// Convert a JSON value to a store value.
///
/// Object keys are kept as-is; a key containing the path separator stays in
/// the tree but cannot be addressed through a view.
pub fn json_to_value(json: serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Integer(i)
            } else if let Some(f) = n.as_f64() {
                Value::Float(f)
            } else {
                Value::String(n.to_string())
            }
        }
        serde_json::Value::String(s) => Value::String(s),
        serde_json::Value::Array(items) => {
            Value::Array(items.into_iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(map) => Value::Map(
            map.into_iter()
                .map(|(key, value)| (key, json_to_value(value)))
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use collection_literals::btree;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Todo {
        title: String,
        done: bool,
        tags: Vec<String>,
    }

    #[test]
    fn struct_becomes_map() {
        let todo = Todo {
            title: "write".to_string(),
            done: false,
            tags: vec!["home".to_string()],
        };

        let value = to_value(&todo).unwrap();
        assert_eq!(
            value,
            Value::Map(btree! {
                "title".to_string() => Value::from("write"),
                "done".to_string() => Value::from(false),
                "tags".to_string() => Value::from(vec!["home"]),
            })
        );
        assert_eq!(from_value::<Todo>(value).unwrap(), todo);
    }

    #[test]
    fn numbers_keep_their_kind() {
        let value = json_to_value(json!({"int": 42, "float": 2.5, "neg": -7}));
        assert_eq!(value.child("int"), Some(&Value::Integer(42)));
        assert_eq!(value.child("neg"), Some(&Value::Integer(-7)));
        assert_eq!(value.child("float"), Some(&Value::Float(2.5)));
    }

    #[test]
    fn nan_becomes_null() {
        assert_eq!(value_to_json(Value::Float(f64::NAN)), serde_json::Value::Null);
    }

    #[test]
    fn bytes_are_base64() {
        let json = value_to_json(Value::Bytes(vec![1, 2, 3, 4]));
        let encoded = json.as_str().unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .unwrap();
        assert_eq!(decoded, vec![1, 2, 3, 4]);
    }

    #[test]
    fn nested_containers() {
        let json = json!({"items": [1, "two", null], "meta": {"ok": true}});
        let value = json_to_value(json.clone());
        assert_eq!(value.child("items").map(Value::kind), Some("array"));
        assert_eq!(value_to_json(value), json);
    }

    #[test]
    fn type_mismatch_is_decode_error() {
        let err = from_value::<Todo>(Value::from("not a todo")).unwrap_err();
        assert!(matches!(err, Error::Decode { .. }));
    }

    #[test]
    fn options_map_to_null() {
        assert_eq!(to_value(&None::<i32>).unwrap(), Value::Null);
        assert_eq!(from_value::<Option<i32>>(Value::Null).unwrap(), None);
        assert_eq!(from_value::<Option<i32>>(Value::from(3)).unwrap(), Some(3));
    }
}
