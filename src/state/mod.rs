use std::sync::Arc;

use tokio::sync::{RwLock, watch};

use crate::{
    dao::{document_store::DocumentStore, repository::Repository},
    error::ServiceError,
};

/// Handle passed to every handler and service.
pub type SharedState = Arc<AppState>;

/// Central application state holding the storage handle and the degraded flag.
pub struct AppState {
    store: RwLock<Option<Arc<dyn DocumentStore>>>,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is installed.
    pub fn new() -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            store: RwLock::new(None),
            degraded: degraded_tx,
        })
    }

    /// State with `store` already installed.
    pub fn with_store(store: Arc<dyn DocumentStore>) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(false);
        Arc::new(Self {
            store: RwLock::new(Some(store)),
            degraded: degraded_tx,
        })
    }

    /// Obtain a handle to the current document store, if one is installed.
    pub async fn store(&self) -> Option<Arc<dyn DocumentStore>> {
        let guard = self.store.read().await;
        guard.as_ref().cloned()
    }

    /// Current store or [`ServiceError::Degraded`].
    pub async fn require_store(&self) -> Result<Arc<dyn DocumentStore>, ServiceError> {
        self.store().await.ok_or(ServiceError::Degraded)
    }

    /// Repository over the current store.
    pub async fn repository(&self) -> Result<Repository, ServiceError> {
        self.require_store().await.map(Repository::new)
    }

    /// Install a new document store implementation and leave degraded mode.
    pub async fn install_store(&self, store: Arc<dyn DocumentStore>) {
        {
            let mut guard = self.store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current document store and enter degraded mode.
    pub async fn clear_store(&self) {
        {
            let mut guard = self.store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub fn is_degraded(&self) -> bool {
        *self.degraded.borrow()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Update and broadcast the degraded flag when the value changes.
    pub fn update_degraded(&self, value: bool) {
        self.degraded.send_if_modified(|current| {
            if *current == value {
                false
            } else {
                *current = value;
                true
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::document_store::memory::MemoryDocumentStore;

    #[tokio::test]
    async fn starts_degraded_without_store() {
        let state = AppState::new();
        assert!(state.is_degraded());
        assert!(matches!(
            state.repository().await,
            Err(ServiceError::Degraded)
        ));
    }

    #[tokio::test]
    async fn install_and_clear_toggle_degraded_mode() {
        let state = AppState::new();
        let mut watcher = state.degraded_watcher();

        state.install_store(Arc::new(MemoryDocumentStore::new())).await;
        assert!(!state.is_degraded());
        assert!(watcher.has_changed().unwrap());
        assert!(!*watcher.borrow_and_update());

        state.clear_store().await;
        assert!(state.is_degraded());
        assert!(state.store().await.is_none());
    }

    #[tokio::test]
    async fn unchanged_flag_is_not_broadcast() {
        let state = AppState::with_store(Arc::new(MemoryDocumentStore::new()));
        let watcher = state.degraded_watcher();
        state.update_degraded(false);
        assert!(!watcher.has_changed().unwrap());
    }
}
