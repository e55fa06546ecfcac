use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    dao::{document_store::DocumentStore, models::NewGame, storage::StorageError},
    services::{catalog_service, stats_service},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the storage backend and keep the shared state in degraded mode while it is unavailable.
///
/// `seed` is written to the games collection after installation when the catalog is empty.
pub async fn run<F, Fut>(state: SharedState, seed: Vec<NewGame>, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn DocumentStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                bootstrap(&state, &seed).await;
                delay = INITIAL_DELAY;

                watch_health(&state, store.as_ref()).await;

                state.clear_store().await;
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Prepare documents the routes expect to exist.
async fn bootstrap(state: &SharedState, seed: &[NewGame]) {
    if let Err(err) = stats_service::ensure_global_stats(state).await {
        warn!(error = %err, "failed to initialize global statistics");
    }
    if seed.is_empty() {
        return;
    }
    match catalog_service::seed_if_empty(state, seed).await {
        Ok(0) => {}
        Ok(count) => info!(count, "seeded game catalog"),
        Err(err) => warn!(error = %err, "failed to seed game catalog"),
    }
}

/// Poll the store until it fails and cannot be reconnected.
async fn watch_health(state: &SharedState, store: &dyn DocumentStore) {
    loop {
        match store.health_check().await {
            Ok(()) => {
                if state.is_degraded() {
                    info!("storage healthy again; leaving degraded mode");
                    state.update_degraded(false);
                }
                sleep(HEALTH_POLL_INTERVAL).await;
            }
            Err(err) => {
                warn!(error = %err, "storage health check failed");
                if reconnect(state, store).await {
                    state.update_degraded(false);
                    sleep(HEALTH_POLL_INTERVAL).await;
                } else {
                    warn!("exhausted storage reconnect attempts; staying in degraded mode");
                    return;
                }
            }
        }
    }
}

async fn reconnect(state: &SharedState, store: &dyn DocumentStore) -> bool {
    let mut reconnect_delay = INITIAL_DELAY;

    for attempt in 0..MAX_RECONNECT_ATTEMPTS {
        match store.try_reconnect().await {
            Ok(()) => {
                info!(attempt, "storage reconnection succeeded after health check failure");
                return true;
            }
            Err(reconnect_err) => {
                if attempt == 0 {
                    warn!(
                        attempt, error = %reconnect_err,
                        "storage reconnect first attempt failed; entering degraded mode"
                    );
                    state.update_degraded(true);
                } else {
                    warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                }
                sleep(reconnect_delay).await;
                reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dao::{document_store::memory::MemoryDocumentStore, models::GameCategory},
        state::AppState,
    };

    #[tokio::test]
    async fn installs_store_and_bootstraps_documents() {
        let state = AppState::new();
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
        let seed = vec![NewGame {
            game_id: "tic-tac-toe".into(),
            name: "Tic Tac Toe".into(),
            description: String::new(),
            category: GameCategory::Classic,
            icon: "⭕".into(),
            is_active: true,
        }];

        let mut watcher = state.degraded_watcher();
        let supervisor = tokio::spawn(run(state.clone(), seed, move || {
            let store = store.clone();
            async move { Ok(store) }
        }));

        watcher.wait_for(|degraded| !*degraded).await.unwrap();
        // bootstrap runs right after the flag flips
        for _ in 0..100 {
            if catalog_service::list_all(&state).await.unwrap().len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        assert!(stats_service::global_stats(&state).await.is_ok());
        assert_eq!(catalog_service::list_all(&state).await.unwrap().len(), 1);
        supervisor.abort();
    }
}
