//! Global and per-game statistics.

use tracing::{info, warn};

use crate::{
    dao::models::{DatabaseCounts, GameStats, GlobalCounter, GlobalStats},
    error::ServiceError,
    state::SharedState,
};

/// Read the global singleton; `NotFound` before it is initialized.
pub async fn global_stats(state: &SharedState) -> Result<GlobalStats, ServiceError> {
    state
        .repository()
        .await?
        .get_global_stats()
        .await?
        .into_data()
        .ok_or_else(|| ServiceError::NotFound("Global statistics not found".into()))
}

/// Statistics of every game; entries whose win rate is not normalized are logged.
pub async fn game_stats(state: &SharedState) -> Result<Vec<GameStats>, ServiceError> {
    let stats = state.repository().await?.list_game_stats().await?;
    for entry in stats.iter().filter(|entry| !entry.win_rate.is_normalized()) {
        warn!(uid = %entry.uid, game_uid = %entry.game_uid, "win rate fractions do not sum to 1");
    }
    Ok(stats)
}

/// Document counts of the main collections.
pub async fn database_counts(state: &SharedState) -> Result<DatabaseCounts, ServiceError> {
    Ok(state.repository().await?.database_counts().await?)
}

/// Create the global statistics singleton when it does not exist yet.
pub async fn ensure_global_stats(state: &SharedState) -> Result<(), ServiceError> {
    let repository = state.repository().await?;
    if !repository.get_global_stats().await?.exists() {
        repository.initialize_global_stats().await?;
        info!("initialized global statistics");
    }
    Ok(())
}

/// Increment a global counter; failures are logged and swallowed.
pub async fn bump_global(state: &SharedState, counter: GlobalCounter, delta: i64) {
    let result = match state.repository().await {
        Ok(repository) => repository
            .increment_global_stats(&[(counter, delta)])
            .await
            .map_err(ServiceError::from),
        Err(err) => Err(err),
    };
    if let Err(err) = result {
        warn!(counter = counter.field(), error = %err, "failed to update global statistics");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{dao::document_store::memory::MemoryDocumentStore, state::AppState};

    #[tokio::test]
    async fn missing_singleton_is_not_found_until_ensured() {
        let state = AppState::with_store(Arc::new(MemoryDocumentStore::new()));
        assert!(matches!(
            global_stats(&state).await,
            Err(ServiceError::NotFound(_))
        ));

        ensure_global_stats(&state).await.unwrap();
        let stats = global_stats(&state).await.unwrap();
        assert_eq!(stats.total_players, 0);
    }

    #[tokio::test]
    async fn ensure_keeps_existing_counters() {
        let state = AppState::with_store(Arc::new(MemoryDocumentStore::new()));
        ensure_global_stats(&state).await.unwrap();
        bump_global(&state, GlobalCounter::TotalMatches, 3).await;

        ensure_global_stats(&state).await.unwrap();
        assert_eq!(global_stats(&state).await.unwrap().total_matches, 3);
    }

    #[tokio::test]
    async fn bump_without_singleton_does_not_fail() {
        let state = AppState::with_store(Arc::new(MemoryDocumentStore::new()));
        bump_global(&state, GlobalCounter::TotalPlayers, 1).await;
        assert!(global_stats(&state).await.is_err());
    }
}
