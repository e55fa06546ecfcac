//! Fun-Vault backend entrypoint wiring configuration, storage supervision and HTTP routes.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use futures::future::BoxFuture;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fun_vault_back::{
    config::{AppConfig, StoreBackend},
    dao::{
        document_store::{
            DocumentStore, firestore::FirestoreDocumentStore, memory::MemoryDocumentStore,
        },
        storage::StorageError,
    },
    routes,
    services::storage_supervisor,
    state::{AppState, SharedState},
};

type ConnectFuture = BoxFuture<'static, Result<Arc<dyn DocumentStore>, StorageError>>;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::from_env().context("loading configuration")?;
    info!(backend = config.backend.name(), "selected storage backend");

    let app_state = AppState::new();
    // Only the in-memory store starts empty on every run.
    let seed = match config.backend {
        StoreBackend::Memory => config.catalog.clone(),
        _ => Vec::new(),
    };
    tokio::spawn(storage_supervisor::run(
        app_state.clone(),
        seed,
        connector(config.backend.clone()),
    ));

    let app = build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(%addr, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

/// Connection factory for the selected backend, retried by the storage supervisor.
fn connector(backend: StoreBackend) -> impl FnMut() -> ConnectFuture + Send + 'static {
    let memory: Arc<dyn DocumentStore> = Arc::new(MemoryDocumentStore::new());
    move || {
        let backend = backend.clone();
        let memory = memory.clone();
        Box::pin(async move {
            match backend {
                StoreBackend::Firestore(config) => {
                    let store = FirestoreDocumentStore::connect(config).await?;
                    Ok(Arc::new(store) as Arc<dyn DocumentStore>)
                }
                StoreBackend::Memory => Ok(memory),
            }
        })
    }
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }

    info!("shutdown signal received");
}
