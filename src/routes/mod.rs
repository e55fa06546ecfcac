use axum::Router;

use crate::state::SharedState;

/// `/api/auth/user` routes.
pub mod auth;
/// Swagger UI and the OpenAPI document.
pub mod docs;
/// Game catalog routes.
pub mod games;
/// `/healthcheck`.
pub mod health;
/// Game session routes.
pub mod sessions;
/// Statistics routes.
pub mod stats;

/// Compose all route trees and attach the shared state.
pub fn router(state: SharedState) -> Router<()> {
    health::router()
        .merge(auth::router())
        .merge(games::router())
        .merge(sessions::router())
        .merge(stats::router())
        .merge(docs::router())
        .with_state(state)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::{sync::Arc, time::Duration};

    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Method, Request, StatusCode, header::CONTENT_TYPE},
    };
    use futures::future::BoxFuture;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::{
        dao::{
            document::{DocumentRef, FieldUpdate, Fields, RawDocument},
            document_store::{DocumentStore, memory::MemoryDocumentStore},
            storage::{StorageError, StorageResult},
        },
        state::{AppState, SharedState},
    };

    /// Store double whose every operation fails.
    pub struct FailingStore;

    fn failure<T: Send + 'static>() -> BoxFuture<'static, StorageResult<T>> {
        Box::pin(async {
            Err(StorageError::unavailable(
                "connection refused".to_owned(),
                std::io::Error::other("backend down"),
            ))
        })
    }

    impl DocumentStore for FailingStore {
        fn add(&self, _: &str, _: Fields) -> BoxFuture<'static, StorageResult<DocumentRef>> {
            failure()
        }
        fn set(&self, _: &str, _: &str, _: Fields) -> BoxFuture<'static, StorageResult<DocumentRef>> {
            failure()
        }
        fn create(&self, _: &str, _: &str, _: Fields) -> BoxFuture<'static, StorageResult<bool>> {
            failure()
        }
        fn get(&self, _: &str, _: &str) -> BoxFuture<'static, StorageResult<Option<RawDocument>>> {
            failure()
        }
        fn update(&self, _: &str, _: &str, _: FieldUpdate) -> BoxFuture<'static, StorageResult<()>> {
            failure()
        }
        fn list(&self, _: &str) -> BoxFuture<'static, StorageResult<Vec<RawDocument>>> {
            failure()
        }
        fn query_eq(&self, _: &str, _: &str, _: Value) -> BoxFuture<'static, StorageResult<Vec<RawDocument>>> {
            failure()
        }
        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            failure()
        }
        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            failure()
        }
    }

    /// Memory store whose reads resolve late, so concurrent callers act on the same snapshot.
    pub struct SlowReads(pub MemoryDocumentStore);

    impl DocumentStore for SlowReads {
        fn add(&self, c: &str, f: Fields) -> BoxFuture<'static, StorageResult<DocumentRef>> {
            self.0.add(c, f)
        }
        fn set(&self, c: &str, id: &str, f: Fields) -> BoxFuture<'static, StorageResult<DocumentRef>> {
            self.0.set(c, id, f)
        }
        fn create(&self, c: &str, id: &str, f: Fields) -> BoxFuture<'static, StorageResult<bool>> {
            self.0.create(c, id, f)
        }
        fn get(&self, c: &str, id: &str) -> BoxFuture<'static, StorageResult<Option<RawDocument>>> {
            let read = self.0.get(c, id);
            Box::pin(async move {
                let document = read.await;
                tokio::time::sleep(Duration::from_millis(20)).await;
                document
            })
        }
        fn update(&self, c: &str, id: &str, u: FieldUpdate) -> BoxFuture<'static, StorageResult<()>> {
            self.0.update(c, id, u)
        }
        fn list(&self, c: &str) -> BoxFuture<'static, StorageResult<Vec<RawDocument>>> {
            self.0.list(c)
        }
        fn query_eq(&self, c: &str, f: &str, v: Value) -> BoxFuture<'static, StorageResult<Vec<RawDocument>>> {
            self.0.query_eq(c, f, v)
        }
        fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.0.health_check()
        }
        fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
            self.0.try_reconnect()
        }
    }

    pub fn memory_state() -> SharedState {
        AppState::with_store(Arc::new(MemoryDocumentStore::new()))
    }

    pub fn failing_state() -> SharedState {
        AppState::with_store(Arc::new(FailingStore))
    }

    pub fn slow_read_state() -> SharedState {
        AppState::with_store(Arc::new(SlowReads(MemoryDocumentStore::new())))
    }

    /// Send one request through the full router and decode the JSON answer.
    pub async fn call(
        state: &SharedState,
        method: Method,
        uri: &str,
        body: Option<&str>,
    ) -> (StatusCode, Value) {
        let app: Router = super::router(state.clone());
        let mut request = Request::builder().method(method).uri(uri);
        if body.is_some() {
            request = request.header(CONTENT_TYPE, "application/json");
        }
        let request = request
            .body(body.map(|raw| Body::from(raw.to_owned())).unwrap_or_else(Body::empty))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}
