use std::error::Error;
use thiserror::Error;

/// Result alias for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Error raised by storage backends regardless of the underlying database.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend failure (network, driver, authentication).
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Short description of the failed operation.
        message: String,
        /// Underlying backend error.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// Update targeted a document that does not exist.
    #[error("document `{id}` not found in `{collection}`")]
    NotFound {
        /// Collection that was targeted.
        collection: String,
        /// Key that was targeted.
        id: String,
    },
    /// Conditional update whose expected field value no longer holds.
    #[error("document `{id}` in `{collection}` no longer has the expected `{field}`")]
    PreconditionFailed {
        /// Collection that was targeted.
        collection: String,
        /// Key that was targeted.
        id: String,
        /// Field the update was conditioned on.
        field: String,
    },
    /// Key the backend cannot address, e.g. one containing `/`.
    #[error("`{id}` is not a valid key in `{collection}`")]
    InvalidKey {
        /// Collection that was targeted.
        collection: String,
        /// Rejected key.
        id: String,
    },
    /// Stored document does not match the expected shape.
    #[error("failed to decode document `{id}` from `{collection}`")]
    Decode {
        /// Collection the document was read from.
        collection: String,
        /// Key of the offending document.
        id: String,
        /// Shape mismatch reported by serde.
        #[source]
        source: serde_json::Error,
    },
    /// Typed payload could not be turned into a document.
    #[error("failed to encode payload for `{collection}`")]
    Encode {
        /// Collection the payload was meant for.
        collection: String,
        /// Serialization failure.
        #[source]
        source: serde_json::Error,
    },
}

impl StorageError {
    /// Construct an unavailable error from any backend failure.
    pub fn unavailable(message: String, source: impl Error + Send + Sync + 'static) -> Self {
        StorageError::Unavailable {
            message,
            source: Box::new(source),
        }
    }

    /// Construct a not-found error for `collection/id`.
    pub fn not_found(collection: &str, id: &str) -> Self {
        StorageError::NotFound {
            collection: collection.to_owned(),
            id: id.to_owned(),
        }
    }

    /// Construct a failed-precondition error for `collection/id` guarded on `field`.
    pub fn precondition_failed(collection: &str, id: &str, field: &str) -> Self {
        StorageError::PreconditionFailed {
            collection: collection.to_owned(),
            id: id.to_owned(),
            field: field.to_owned(),
        }
    }

    /// Construct an invalid-key error for `collection/id`.
    pub fn invalid_key(collection: &str, id: &str) -> Self {
        StorageError::InvalidKey {
            collection: collection.to_owned(),
            id: id.to_owned(),
        }
    }
}
