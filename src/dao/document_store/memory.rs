//! In-process document store used for development and tests.

use std::{collections::BTreeMap, sync::Arc};

use dashmap::DashMap;
use futures::future::BoxFuture;
use serde_json::{Number, Value};
use tracing::debug;

use super::{DocumentStore, auto_id, is_addressable_key};
use crate::dao::{
    document::{DocumentRef, FieldUpdate, Fields, RawDocument},
    storage::{StorageError, StorageResult},
};

type Collection = BTreeMap<String, Fields>;

/// Document store keeping every collection in memory.
///
/// Writes to one collection are serialised by the map's entry lock, which is what
/// makes increments atomic.
#[derive(Clone, Default)]
pub struct MemoryDocumentStore {
    collections: Arc<DashMap<String, Collection>>,
}

impl MemoryDocumentStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&self, collection: &str, id: String, fields: Fields) -> DocumentRef {
        self.collections
            .entry(collection.to_owned())
            .or_default()
            .insert(id.clone(), fields);
        DocumentRef::new(collection, id)
    }

    fn insert_new(&self, collection: &str, id: &str, fields: Fields) -> bool {
        let mut docs = self.collections.entry(collection.to_owned()).or_default();
        if docs.contains_key(id) {
            return false;
        }
        docs.insert(id.to_owned(), fields);
        true
    }

    fn read(&self, collection: &str, id: &str) -> Option<RawDocument> {
        let docs = self.collections.get(collection)?;
        docs.get(id).map(|fields| RawDocument {
            id: id.to_owned(),
            fields: fields.clone(),
        })
    }

    fn apply(&self, collection: &str, id: &str, update: FieldUpdate) -> StorageResult<()> {
        let mut docs = self
            .collections
            .get_mut(collection)
            .ok_or_else(|| StorageError::not_found(collection, id))?;
        let fields = docs
            .get_mut(id)
            .ok_or_else(|| StorageError::not_found(collection, id))?;

        if let Some((field, _)) = &update.precondition
            && !update.precondition_holds(fields)
        {
            return Err(StorageError::precondition_failed(collection, id, field));
        }
        fields.extend(update.set);
        for (field, delta) in update.increments {
            let next = fields
                .get(&field)
                .and_then(Value::as_i64)
                .unwrap_or(0)
                .saturating_add(delta);
            fields.insert(field, Value::Number(Number::from(next)));
        }
        Ok(())
    }

    fn filter(&self, collection: &str, predicate: impl Fn(&Fields) -> bool) -> Vec<RawDocument> {
        self.collections
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter(|(_, fields)| predicate(fields))
                    .map(|(id, fields)| RawDocument {
                        id: id.clone(),
                        fields: fields.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn add(&self, collection: &str, fields: Fields) -> BoxFuture<'static, StorageResult<DocumentRef>> {
        let reference = self.insert(collection, auto_id(), fields);
        debug!(collection = %reference.collection, id = %reference.id, "document added");
        Box::pin(async move { Ok(reference) })
    }

    fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> BoxFuture<'static, StorageResult<DocumentRef>> {
        if !is_addressable_key(id) {
            let err = StorageError::invalid_key(collection, id);
            return Box::pin(async move { Err(err) });
        }
        let reference = self.insert(collection, id.to_owned(), fields);
        Box::pin(async move { Ok(reference) })
    }

    fn create(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        if !is_addressable_key(id) {
            let err = StorageError::invalid_key(collection, id);
            return Box::pin(async move { Err(err) });
        }
        let created = self.insert_new(collection, id, fields);
        Box::pin(async move { Ok(created) })
    }

    fn get(&self, collection: &str, id: &str) -> BoxFuture<'static, StorageResult<Option<RawDocument>>> {
        let document = self.read(collection, id);
        Box::pin(async move { Ok(document) })
    }

    fn update(
        &self,
        collection: &str,
        id: &str,
        update: FieldUpdate,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let result = self.apply(collection, id, update);
        Box::pin(async move { result })
    }

    fn list(&self, collection: &str) -> BoxFuture<'static, StorageResult<Vec<RawDocument>>> {
        let documents = self.filter(collection, |_| true);
        Box::pin(async move { Ok(documents) })
    }

    fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: Value,
    ) -> BoxFuture<'static, StorageResult<Vec<RawDocument>>> {
        let documents = self.filter(collection, |fields| fields.get(field) == Some(&value));
        Box::pin(async move { Ok(documents) })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(value: Value) -> Fields {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn add_generates_distinct_keys() {
        let store = MemoryDocumentStore::new();
        let first = store.add("games", fields(json!({"name": "a"}))).await.unwrap();
        let second = store.add("games", fields(json!({"name": "b"}))).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(first.id.len(), 20);
        assert_eq!(store.list("games").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn keyed_writes_reject_path_like_ids() {
        let store = MemoryDocumentStore::new();
        for id in ["a/b", "", ".."] {
            let err = store.set("users", id, Fields::new()).await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidKey { .. }));
            let err = store.create("users", id, Fields::new()).await.unwrap_err();
            assert!(matches!(err, StorageError::InvalidKey { .. }));
        }
        assert!(store.list("users").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn get_missing_document_is_none() {
        let store = MemoryDocumentStore::new();
        assert!(store.get("games", "ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn update_merges_and_increments() {
        let store = MemoryDocumentStore::new();
        store
            .set("users", "u1", fields(json!({"gamesPlayed": 2, "name": "x"})))
            .await
            .unwrap();

        store
            .update(
                "users",
                "u1",
                FieldUpdate::default()
                    .with_field("name", "y")
                    .with_increment("gamesPlayed", 3)
                    .with_increment("fresh", 1),
            )
            .await
            .unwrap();

        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.fields["name"], json!("y"));
        assert_eq!(doc.fields["gamesPlayed"], json!(5));
        assert_eq!(doc.fields["fresh"], json!(1));
    }

    #[tokio::test]
    async fn update_missing_document_fails() {
        let store = MemoryDocumentStore::new();
        let err = store
            .update("users", "ghost", FieldUpdate::default().with_increment("n", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }

    #[tokio::test]
    async fn create_keeps_existing_document() {
        let store = MemoryDocumentStore::new();
        assert!(store.create("users", "u1", fields(json!({"gamesPlayed": 4}))).await.unwrap());
        assert!(!store.create("users", "u1", fields(json!({"gamesPlayed": 0}))).await.unwrap());

        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.fields["gamesPlayed"], json!(4));
    }

    #[tokio::test]
    async fn conditional_update_applies_once() {
        let store = MemoryDocumentStore::new();
        store.set("sessions", "s1", fields(json!({"status": "STARTED"}))).await.unwrap();
        let finish = |status: &str| {
            FieldUpdate::default()
                .with_field("status", status)
                .when_equals("status", "STARTED")
        };

        store.update("sessions", "s1", finish("COMPLETED")).await.unwrap();
        let err = store
            .update("sessions", "s1", finish("ABANDONED"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::PreconditionFailed { ref field, .. } if field == "status"));

        let doc = store.get("sessions", "s1").await.unwrap().unwrap();
        assert_eq!(doc.fields["status"], json!("COMPLETED"));
    }

    #[tokio::test]
    async fn query_eq_matches_exact_values() {
        let store = MemoryDocumentStore::new();
        store.set("games", "a", fields(json!({"isActive": true}))).await.unwrap();
        store.set("games", "b", fields(json!({"isActive": false}))).await.unwrap();
        store.set("games", "c", fields(json!({}))).await.unwrap();

        let active = store.query_eq("games", "isActive", json!(true)).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "a");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_increments_are_not_lost() {
        let store = MemoryDocumentStore::new();
        store.set("users", "u1", fields(json!({"gamesPlayed": 0}))).await.unwrap();

        let tasks = (0..64)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .update("users", "u1", FieldUpdate::default().with_increment("gamesPlayed", 1))
                        .await
                })
            })
            .collect::<Vec<_>>();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let doc = store.get("users", "u1").await.unwrap().unwrap();
        assert_eq!(doc.fields["gamesPlayed"], json!(64));
    }
}
