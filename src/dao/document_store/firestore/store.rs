use std::sync::Arc;

use futures::future::BoxFuture;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::dao::{
    document::{DocumentRef, FieldUpdate, Fields, RawDocument},
    document_store::{DocumentStore, is_addressable_key},
    models::GAMES,
    storage::{StorageError, StorageResult},
};

use super::{
    codec::{decode_fields, document_id, encode_fields, encode_value},
    config::FirestoreConfig,
    error::{FirestoreError, FirestoreResult},
    token::TokenSource,
};

const PAGE_SIZE: &str = "300";
/// Read-check-commit rounds before a conditional update gives up.
const CONDITIONAL_ATTEMPTS: usize = 3;

#[derive(Deserialize)]
struct ListResponse {
    #[serde(default)]
    documents: Vec<Value>,
    #[serde(rename = "nextPageToken")]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct QueryRow {
    document: Option<Value>,
}

/// Result of a single commit request.
enum Commit {
    Applied,
    Missing,
    Stale,
}

/// Document store backed by the Firestore REST API.
#[derive(Clone)]
pub struct FirestoreDocumentStore {
    client: Client,
    documents_url: Arc<Url>,
    commit_url: Arc<Url>,
    run_query_url: Arc<Url>,
    documents_path: Arc<str>,
    tokens: Arc<TokenSource>,
}

impl FirestoreDocumentStore {
    /// Build the client and verify the endpoint answers.
    pub async fn connect(config: FirestoreConfig) -> FirestoreResult<Self> {
        let store = Self::new(config)?;
        store.ping().await?;
        Ok(store)
    }

    fn new(config: FirestoreConfig) -> FirestoreResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| FirestoreError::ClientBuilder { source })?;

        let documents_path = config.documents_path();
        let root = format!("{}/{}", config.api_root(), documents_path);
        let invalid = || FirestoreError::InvalidEndpoint { url: root.clone() };
        let documents_url = Url::parse(&root).map_err(|_| invalid())?;
        if documents_url.cannot_be_a_base() {
            return Err(invalid());
        }
        let commit_url = Url::parse(&format!("{root}:commit")).map_err(|_| invalid())?;
        let run_query_url = Url::parse(&format!("{root}:runQuery")).map_err(|_| invalid())?;

        Ok(Self {
            documents_url: Arc::new(documents_url),
            commit_url: Arc::new(commit_url),
            run_query_url: Arc::new(run_query_url),
            documents_path: Arc::from(documents_path),
            tokens: Arc::new(TokenSource::new(client.clone(), config.credentials)),
            client,
        })
    }

    /// URL of a collection or document; every segment is percent-encoded on its own.
    fn resource_url(&self, segments: &[&str]) -> FirestoreResult<Url> {
        let mut url = Url::clone(&self.documents_url);
        url.path_segments_mut()
            .map_err(|()| FirestoreError::InvalidEndpoint {
                url: self.documents_url.to_string(),
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn document_name(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.documents_path, collection, id)
    }

    async fn request(&self, method: Method, url: Url) -> FirestoreResult<RequestBuilder> {
        let token = self.tokens.bearer().await?;
        Ok(self.client.request(method, url).bearer_auth(token))
    }

    async fn send(&self, builder: RequestBuilder, path: &str) -> FirestoreResult<Response> {
        builder
            .send()
            .await
            .map_err(|source| FirestoreError::RequestSend {
                path: path.to_string(),
                source,
            })
    }

    async fn json<T: serde::de::DeserializeOwned>(
        response: Response,
        path: &str,
    ) -> FirestoreResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!(%status, path, body = %body, "Firestore request failed");
            return Err(FirestoreError::RequestStatus {
                path: path.to_string(),
                status,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|source| FirestoreError::DecodeResponse {
                path: path.to_string(),
                source,
            })
    }

    fn raw_document(document: &Value, path: &str) -> FirestoreResult<RawDocument> {
        let id = document
            .get("name")
            .and_then(Value::as_str)
            .and_then(document_id)
            .ok_or_else(|| FirestoreError::MalformedResponse {
                path: path.to_string(),
                reason: "document without a name",
            })?;
        Ok(RawDocument {
            id: id.to_owned(),
            fields: decode_fields(document),
        })
    }

    async fn ping(&self) -> FirestoreResult<()> {
        let url = self.resource_url(&[GAMES])?;
        let path = url.path().to_owned();
        let builder = self
            .request(Method::GET, url)
            .await?
            .query(&[("pageSize", "1")]);
        let response = self.send(builder, &path).await?;
        Self::json::<Value>(response, &path).await.map(|_| ())
    }

    /// Create a document, under `id` when given or a server-generated key otherwise.
    ///
    /// Returns `Ok(None)` when `id` is already taken.
    async fn insert(
        &self,
        collection: &str,
        id: Option<&str>,
        fields: &Fields,
    ) -> FirestoreResult<Option<DocumentRef>> {
        let url = self.resource_url(&[collection])?;
        let path = url.path().to_owned();
        let mut builder = self
            .request(Method::POST, url)
            .await?
            .json(&json!({ "fields": encode_fields(fields) }));
        if let Some(id) = id {
            builder = builder.query(&[("documentId", id)]);
        }
        let response = self.send(builder, &path).await?;
        if response.status() == StatusCode::CONFLICT {
            return Ok(None);
        }
        let document = Self::json::<Value>(response, &path).await?;
        let raw = Self::raw_document(&document, &path)?;
        Ok(Some(DocumentRef::new(collection, raw.id)))
    }

    async fn replace(&self, collection: &str, id: &str, fields: &Fields) -> FirestoreResult<()> {
        let url = self.resource_url(&[collection, id])?;
        let path = url.path().to_owned();
        let builder = self
            .request(Method::PATCH, url)
            .await?
            .json(&json!({ "fields": encode_fields(fields) }));
        let response = self.send(builder, &path).await?;
        Self::json::<Value>(response, &path).await.map(|_| ())
    }

    /// Raw Firestore document, including `updateTime`.
    async fn fetch_document(&self, collection: &str, id: &str) -> FirestoreResult<Option<Value>> {
        let url = self.resource_url(&[collection, id])?;
        let path = url.path().to_owned();
        let builder = self.request(Method::GET, url).await?;
        let response = self.send(builder, &path).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::json::<Value>(response, &path).await.map(Some)
    }

    async fn fetch(&self, collection: &str, id: &str) -> FirestoreResult<Option<RawDocument>> {
        let Some(document) = self.fetch_document(collection, id).await? else {
            return Ok(None);
        };
        let path = format!("{collection}/{id}");
        Self::raw_document(&document, &path).map(Some)
    }

    /// Apply a merge plus server-side increments in a single commit.
    ///
    /// With `update_time` set, the write only lands if the document still carries that
    /// version.
    async fn commit_update(
        &self,
        collection: &str,
        id: &str,
        update: &FieldUpdate,
        update_time: Option<&str>,
    ) -> FirestoreResult<Commit> {
        let transforms: Vec<Value> = update
            .increments
            .iter()
            .map(|(field, delta)| {
                json!({
                    "fieldPath": field,
                    "increment": { "integerValue": delta.to_string() }
                })
            })
            .collect();
        let mask: Vec<&String> = update.set.keys().collect();
        let current = match update_time {
            Some(time) => json!({ "updateTime": time }),
            None => json!({ "exists": true }),
        };
        let write = json!({
            "update": {
                "name": self.document_name(collection, id),
                "fields": encode_fields(&update.set),
            },
            "updateMask": { "fieldPaths": mask },
            "updateTransforms": transforms,
            "currentDocument": current,
        });

        let url = Url::clone(&self.commit_url);
        let path = url.path().to_owned();
        let builder = self
            .request(Method::POST, url)
            .await?
            .json(&json!({ "writes": [write] }));
        let response = self.send(builder, &path).await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(Commit::Missing),
            StatusCode::BAD_REQUEST | StatusCode::CONFLICT if update_time.is_some() => {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                if body.contains("FAILED_PRECONDITION") || body.contains("ABORTED") {
                    Ok(Commit::Stale)
                } else {
                    debug!(%status, path = %path, body = %body, "Firestore commit rejected");
                    Err(FirestoreError::RequestStatus { path, status })
                }
            }
            _ => Self::json::<Value>(response, &path)
                .await
                .map(|_| Commit::Applied),
        }
    }

    /// Read the document, check the precondition locally and commit against the version
    /// that was read. A concurrent write forces another round.
    async fn conditional_update(
        &self,
        collection: &str,
        id: &str,
        update: &FieldUpdate,
    ) -> StorageResult<()> {
        let field = update
            .precondition
            .as_ref()
            .map(|(field, _)| field.as_str())
            .unwrap_or_default();

        for _ in 0..CONDITIONAL_ATTEMPTS {
            let Some(document) = self.fetch_document(collection, id).await? else {
                return Err(StorageError::not_found(collection, id));
            };
            if !update.precondition_holds(&decode_fields(&document)) {
                return Err(StorageError::precondition_failed(collection, id, field));
            }
            let path = format!("{collection}/{id}");
            let update_time = document
                .get("updateTime")
                .and_then(Value::as_str)
                .ok_or_else(|| FirestoreError::MalformedResponse {
                    path,
                    reason: "document without an updateTime",
                })?;

            match self
                .commit_update(collection, id, update, Some(update_time))
                .await?
            {
                Commit::Applied => return Ok(()),
                Commit::Missing => return Err(StorageError::not_found(collection, id)),
                Commit::Stale => debug!(collection, id, "document changed during conditional update"),
            }
        }

        warn!(collection, id, "conditional update kept losing to concurrent writes");
        Err(StorageError::precondition_failed(collection, id, field))
    }

    async fn list_all(&self, collection: &str) -> FirestoreResult<Vec<RawDocument>> {
        let url = self.resource_url(&[collection])?;
        let path = url.path().to_owned();
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut builder = self
                .request(Method::GET, url.clone())
                .await?
                .query(&[("pageSize", PAGE_SIZE)]);
            if let Some(token) = page_token.as_deref() {
                builder = builder.query(&[("pageToken", token)]);
            }
            let response = self.send(builder, &path).await?;
            let page = Self::json::<ListResponse>(response, &path).await?;
            for document in &page.documents {
                documents.push(Self::raw_document(document, &path)?);
            }
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(documents)
    }

    async fn run_query(
        &self,
        collection: &str,
        field: &str,
        value: &Value,
    ) -> FirestoreResult<Vec<RawDocument>> {
        let query = json!({
            "structuredQuery": {
                "from": [{ "collectionId": collection }],
                "where": {
                    "fieldFilter": {
                        "field": { "fieldPath": field },
                        "op": "EQUAL",
                        "value": encode_value(value),
                    }
                }
            }
        });

        let url = Url::clone(&self.run_query_url);
        let path = url.path().to_owned();
        let builder = self.request(Method::POST, url).await?.json(&query);
        let response = self.send(builder, &path).await?;
        let rows = Self::json::<Vec<QueryRow>>(response, &path).await?;
        rows.iter()
            .filter_map(|row| row.document.as_ref())
            .map(|document| Self::raw_document(document, &path))
            .collect()
    }
}

impl From<FirestoreError> for StorageError {
    fn from(err: FirestoreError) -> Self {
        StorageError::unavailable("Firestore request failed".to_owned(), err)
    }
}

impl DocumentStore for FirestoreDocumentStore {
    fn add(&self, collection: &str, fields: Fields) -> BoxFuture<'static, StorageResult<DocumentRef>> {
        let store = self.clone();
        let collection = collection.to_owned();
        Box::pin(async move {
            store
                .insert(&collection, None, &fields)
                .await?
                .ok_or_else(|| {
                    StorageError::unavailable(
                        "Firestore rejected a generated key".to_owned(),
                        FirestoreError::MalformedResponse {
                            path: collection.clone(),
                            reason: "conflict on a generated key",
                        },
                    )
                })
        })
    }

    fn set(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> BoxFuture<'static, StorageResult<DocumentRef>> {
        let store = self.clone();
        let reference = DocumentRef::new(collection, id);
        Box::pin(async move {
            if !is_addressable_key(&reference.id) {
                return Err(StorageError::invalid_key(&reference.collection, &reference.id));
            }
            store
                .replace(&reference.collection, &reference.id, &fields)
                .await?;
            Ok(reference)
        })
    }

    fn create(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let store = self.clone();
        let reference = DocumentRef::new(collection, id);
        Box::pin(async move {
            if !is_addressable_key(&reference.id) {
                return Err(StorageError::invalid_key(&reference.collection, &reference.id));
            }
            let created = store
                .insert(&reference.collection, Some(&reference.id), &fields)
                .await?;
            Ok(created.is_some())
        })
    }

    fn get(&self, collection: &str, id: &str) -> BoxFuture<'static, StorageResult<Option<RawDocument>>> {
        let store = self.clone();
        let reference = DocumentRef::new(collection, id);
        Box::pin(async move {
            if !is_addressable_key(&reference.id) {
                return Ok(None);
            }
            store
                .fetch(&reference.collection, &reference.id)
                .await
                .map_err(Into::into)
        })
    }

    fn update(
        &self,
        collection: &str,
        id: &str,
        update: FieldUpdate,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let reference = DocumentRef::new(collection, id);
        Box::pin(async move {
            let (collection, id) = (&reference.collection, &reference.id);
            if !is_addressable_key(id) {
                return Err(StorageError::not_found(collection, id));
            }
            if update.precondition.is_some() {
                return store.conditional_update(collection, id, &update).await;
            }
            match store.commit_update(collection, id, &update, None).await? {
                Commit::Applied => Ok(()),
                Commit::Missing | Commit::Stale => Err(StorageError::not_found(collection, id)),
            }
        })
    }

    fn list(&self, collection: &str) -> BoxFuture<'static, StorageResult<Vec<RawDocument>>> {
        let store = self.clone();
        let collection = collection.to_owned();
        Box::pin(async move { store.list_all(&collection).await.map_err(Into::into) })
    }

    fn query_eq(
        &self,
        collection: &str,
        field: &str,
        value: Value,
    ) -> BoxFuture<'static, StorageResult<Vec<RawDocument>>> {
        let store = self.clone();
        let collection = collection.to_owned();
        let field = field.to_owned();
        Box::pin(async move {
            store
                .run_query(&collection, &field, &value)
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            store.tokens.invalidate().await;
            store.ping().await.map_err(Into::into)
        })
    }
}
