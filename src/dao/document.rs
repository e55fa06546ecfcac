//! Schemaless document shapes exchanged with the storage backends.

use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

use crate::dao::storage::{StorageError, StorageResult};

/// Field name the document identifier is exposed under once decoded.
pub const UID_FIELD: &str = "uid";

/// Untyped payload of a stored document.
pub type Fields = Map<String, Value>;

/// Document as returned by a backend: its key plus the stored fields.
#[derive(Debug, Clone, PartialEq)]
pub struct RawDocument {
    /// Document key.
    pub id: String,
    /// Stored payload, without the key.
    pub fields: Fields,
}

/// Reference to a document, returned by create operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    /// Collection holding the document.
    pub collection: String,
    /// Document key.
    pub id: String,
}

impl DocumentRef {
    /// Reference to `collection/id`.
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

/// Partial write: fields merged onto the document plus atomic numeric increments.
///
/// With a precondition the write is applied only while the stored field still holds
/// the expected value; otherwise the backend answers
/// [`StorageError::PreconditionFailed`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldUpdate {
    /// Fields merged onto the document.
    pub set: Fields,
    /// Atomic `(field, delta)` additions.
    pub increments: Vec<(String, i64)>,
    /// `(field, value)` the stored document must hold for the write to apply.
    pub precondition: Option<(String, Value)>,
}

impl FieldUpdate {
    /// Update that only merges `set`.
    pub fn merge(set: Fields) -> Self {
        Self {
            set,
            ..Self::default()
        }
    }

    /// Apply the write only while `field` is stored with `value`.
    pub fn when_equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.precondition = Some((field.into(), value.into()));
        self
    }

    /// Whether `fields` satisfy the precondition, if any.
    pub fn precondition_holds(&self, fields: &Fields) -> bool {
        self.precondition
            .as_ref()
            .is_none_or(|(field, expected)| fields.get(field) == Some(expected))
    }

    /// Set a single field, replacing any previous value for it.
    pub fn with_field(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set.insert(field.into(), value.into());
        self
    }

    /// Add an atomic increment of `delta` on `field`.
    pub fn with_increment(mut self, field: impl Into<String>, delta: i64) -> Self {
        self.increments.push((field.into(), delta));
        self
    }
}

/// Encode a typed payload into document fields.
///
/// Fields skipped during serialization never reach storage; a field serialized as
/// `null` is kept and stored as null.
pub fn to_fields<T: Serialize>(collection: &str, value: &T) -> StorageResult<Fields> {
    match serde_json::to_value(value) {
        Ok(Value::Object(fields)) => Ok(fields),
        Ok(other) => Err(StorageError::Encode {
            collection: collection.to_owned(),
            source: serde::ser::Error::custom(format!(
                "expected an object payload, got {}",
                kind_of(&other)
            )),
        }),
        Err(source) => Err(StorageError::Encode {
            collection: collection.to_owned(),
            source,
        }),
    }
}

/// Decode a stored document into its typed shape, injecting the key as `uid`.
pub fn decode<T: DeserializeOwned>(collection: &str, document: RawDocument) -> StorageResult<T> {
    let RawDocument { id, mut fields } = document;
    fields.insert(UID_FIELD.to_owned(), Value::String(id.clone()));
    serde_json::from_value(Value::Object(fields)).map_err(|source| StorageError::Decode {
        collection: collection.to_owned(),
        id,
        source,
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    use super::*;

    #[derive(Serialize)]
    struct Payload {
        name: &'static str,
        #[serde(skip_serializing_if = "Option::is_none")]
        absent: Option<u32>,
        nullable: Option<u32>,
    }

    #[derive(Debug, Deserialize)]
    struct Decoded {
        uid: String,
        count: u32,
    }

    #[test]
    fn skipped_fields_do_not_reach_storage() {
        let fields = to_fields(
            "things",
            &Payload {
                name: "a",
                absent: None,
                nullable: None,
            },
        )
        .unwrap();

        assert!(!fields.contains_key("absent"));
        assert_eq!(fields.get("nullable"), Some(&Value::Null));
        assert_eq!(fields.get("name"), Some(&json!("a")));
    }

    #[test]
    fn precondition_compares_stored_value() {
        let stored = json!({ "status": "STARTED" }).as_object().cloned().unwrap();
        assert!(FieldUpdate::default().precondition_holds(&stored));
        assert!(FieldUpdate::default()
            .when_equals("status", "STARTED")
            .precondition_holds(&stored));
        assert!(!FieldUpdate::default()
            .when_equals("status", "COMPLETED")
            .precondition_holds(&stored));
        assert!(!FieldUpdate::default()
            .when_equals("missing", "x")
            .precondition_holds(&stored));
    }

    #[test]
    fn non_object_payload_is_an_encode_error() {
        let err = to_fields("things", &42).unwrap_err();
        assert!(matches!(err, StorageError::Encode { .. }));
    }

    #[test]
    fn decode_injects_document_id() {
        let document = RawDocument {
            id: "abc".into(),
            fields: json!({ "count": 3 }).as_object().cloned().unwrap(),
        };
        let decoded: Decoded = decode("things", document).unwrap();
        assert_eq!(decoded.uid, "abc");
        assert_eq!(decoded.count, 3);
    }

    #[test]
    fn decode_reports_shape_mismatch_separately_from_absence() {
        let document = RawDocument {
            id: "abc".into(),
            fields: json!({ "count": "three" }).as_object().cloned().unwrap(),
        };
        let err = decode::<Decoded>("things", document).unwrap_err();
        match err {
            StorageError::Decode { collection, id, .. } => {
                assert_eq!(collection, "things");
                assert_eq!(id, "abc");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
