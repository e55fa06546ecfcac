//! Conversion between plain JSON documents and Firestore typed values.

use serde_json::{Map, Number, Value, json};

use crate::dao::document::Fields;

/// Encode a plain field map as Firestore `fields`.
pub fn encode_fields(fields: &Fields) -> Value {
    Value::Object(
        fields
            .iter()
            .map(|(key, value)| (key.clone(), encode_value(value)))
            .collect(),
    )
}

/// Encode a single JSON value as a Firestore typed value.
pub fn encode_value(value: &Value) -> Value {
    match value {
        Value::Null => json!({ "nullValue": null }),
        Value::Bool(flag) => json!({ "booleanValue": flag }),
        Value::Number(number) if number.is_i64() || number.is_u64() => {
            json!({ "integerValue": number.to_string() })
        }
        Value::Number(number) => json!({ "doubleValue": number.as_f64() }),
        Value::String(text) => json!({ "stringValue": text }),
        Value::Array(items) => {
            let values: Vec<Value> = items.iter().map(encode_value).collect();
            json!({ "arrayValue": { "values": values } })
        }
        Value::Object(map) => {
            let fields: Map<String, Value> = map
                .iter()
                .map(|(key, value)| (key.clone(), encode_value(value)))
                .collect();
            json!({ "mapValue": { "fields": fields } })
        }
    }
}

/// Decode the `fields` member of a Firestore document; absent fields give an empty map.
pub fn decode_fields(document: &Value) -> Fields {
    document
        .get("fields")
        .and_then(Value::as_object)
        .map(|fields| {
            fields
                .iter()
                .map(|(key, value)| (key.clone(), decode_value(value)))
                .collect()
        })
        .unwrap_or_default()
}

/// Decode a Firestore typed value.
pub fn decode_value(value: &Value) -> Value {
    let Some((kind, inner)) = value.as_object().and_then(|map| map.iter().next()) else {
        return Value::Null;
    };

    match kind.as_str() {
        "booleanValue" => inner.as_bool().map(Value::Bool).unwrap_or(Value::Null),
        "integerValue" => inner
            .as_str()
            .and_then(|raw| raw.parse::<i64>().ok())
            .map(|n| Value::Number(n.into()))
            .or_else(|| inner.as_i64().map(|n| Value::Number(n.into())))
            .unwrap_or(Value::Null),
        "doubleValue" => inner
            .as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner.clone(),
        "arrayValue" => Value::Array(
            inner
                .get("values")
                .and_then(Value::as_array)
                .map(|values| values.iter().map(decode_value).collect())
                .unwrap_or_default(),
        ),
        "mapValue" => Value::Object(decode_fields(inner)),
        "geoPointValue" => inner.clone(),
        _ => Value::Null,
    }
}

/// Last segment of a Firestore resource name.
pub fn document_id(name: &str) -> Option<&str> {
    name.rsplit('/').next().filter(|id| !id.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_travel_as_strings() {
        let encoded = encode_value(&json!(42));
        assert_eq!(encoded, json!({ "integerValue": "42" }));
        assert_eq!(decode_value(&encoded), json!(42));
    }

    #[test]
    fn nested_documents_decode_to_plain_json() {
        let document = json!({
            "name": "projects/p/databases/(default)/documents/gameStatistics/abc",
            "fields": {
                "gameId": { "stringValue": "g1" },
                "averageDuration": { "doubleValue": 12.5 },
                "winRate": { "mapValue": { "fields": {
                    "player": { "doubleValue": 0.5 },
                    "ai": { "integerValue": "0" },
                    "draw": { "doubleValue": 0.5 }
                }}},
                "tags": { "arrayValue": {} },
                "endedAt": { "nullValue": null },
                "createdAt": { "timestampValue": "2025-01-01T00:00:00Z" }
            }
        });

        let fields = decode_fields(&document);
        assert_eq!(
            Value::Object(fields),
            json!({
                "gameId": "g1",
                "averageDuration": 12.5,
                "winRate": { "player": 0.5, "ai": 0, "draw": 0.5 },
                "tags": [],
                "endedAt": null,
                "createdAt": "2025-01-01T00:00:00Z"
            })
        );
    }

    #[test]
    fn document_without_fields_is_empty() {
        assert!(decode_fields(&json!({ "name": "x" })).is_empty());
    }

    #[test]
    fn extracts_trailing_document_id() {
        assert_eq!(
            document_id("projects/p/databases/(default)/documents/games/abc"),
            Some("abc")
        );
        assert_eq!(document_id("games/"), None);
    }
}
