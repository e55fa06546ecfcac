/// Firestore REST backend.
pub mod firestore;
/// In-process backend.
pub mod memory;

use futures::future::BoxFuture;
use rand::{Rng, distr::Alphanumeric};
use serde_json::Value;

use crate::dao::{
    document::{DocumentRef, FieldUpdate, Fields, RawDocument},
    storage::StorageResult,
};

/// Length of generated document keys.
const AUTO_ID_LENGTH: usize = 20;

/// Abstraction over a schemaless document database organised in flat collections.
pub trait DocumentStore: Send + Sync {
    /// Create a document under a generated key.
    fn add(&self, collection: &str, fields: Fields) -> BoxFuture<'static, StorageResult<DocumentRef>>;
    /// Create or overwrite the document stored under `id`.
    fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> BoxFuture<'static, StorageResult<DocumentRef>>;
    /// Create the document under `id` only when no document has that key.
    ///
    /// Returns `false`, leaving the stored document untouched, when the key is taken.
    fn create(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    /// Read a document; `None` when it does not exist.
    fn get(&self, collection: &str, id: &str) -> BoxFuture<'static, StorageResult<Option<RawDocument>>>;
    /// Merge fields and apply increments atomically; fails when the document is missing
    /// or when the update's precondition does not hold.
    fn update(
        &self,
        collection: &str,
        id: &str,
        update: FieldUpdate,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Every document of a collection.
    fn list(&self, collection: &str) -> BoxFuture<'static, StorageResult<Vec<RawDocument>>>;
    /// Documents whose `field` equals `value`.
    fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: Value,
    ) -> BoxFuture<'static, StorageResult<Vec<RawDocument>>>;
    /// Verify the backend answers.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Re-establish the connection after a failed health check.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}

/// Whether `id` can be used as a single document key: non-empty, no `/`, not a
/// relative path segment.
pub fn is_addressable_key(id: &str) -> bool {
    !id.is_empty() && !id.contains('/') && id != "." && id != ".."
}

/// Generate a random alphanumeric document key.
pub fn auto_id() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(AUTO_ID_LENGTH)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_must_be_single_segments() {
        assert!(is_addressable_key("anon-1"));
        assert!(is_addressable_key("victim?x=1"));
        assert!(!is_addressable_key(""));
        assert!(!is_addressable_key("games/tic-tac-toe"));
        assert!(!is_addressable_key(".."));
    }

    #[test]
    fn auto_ids_are_alphanumeric() {
        let id = auto_id();
        assert_eq!(id.len(), AUTO_ID_LENGTH);
        assert!(id.chars().all(|c| c.is_ascii_alphanumeric()));
    }
}
