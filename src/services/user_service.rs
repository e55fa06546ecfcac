//! Anonymous user provisioning keyed by the identity provider's subject id.

use tracing::{debug, info};

use crate::{
    dao::{
        document::DocumentRef,
        models::{AnonymousUser, AnonymousUserPatch, GlobalCounter},
    },
    error::ServiceError,
    services::stats_service,
    state::SharedState,
};

/// Result of [`upsert_user`].
#[derive(Debug)]
pub enum UpsertOutcome {
    /// User already existed; `lastActiveAt` was refreshed.
    Updated(AnonymousUser),
    /// User document was created.
    Created(DocumentRef),
}

/// Create the user on first contact, otherwise record activity.
///
/// Creation never overwrites: a caller that loses the race to create the same user falls
/// back to refreshing it, and only the winner counts a new player.
pub async fn upsert_user(state: &SharedState, user_id: &str) -> Result<UpsertOutcome, ServiceError> {
    let repository = state.repository().await?;

    if !repository.get_anonymous_user(user_id).await?.exists() {
        if let Some(reference) = repository.create_anonymous_user_with_id(user_id).await? {
            info!(user_id, "created anonymous user");
            stats_service::bump_global(state, GlobalCounter::TotalPlayers, 1).await;
            return Ok(UpsertOutcome::Created(reference));
        }
        debug!(user_id, "anonymous user was created concurrently");
    }

    repository
        .update_anonymous_user(user_id, &AnonymousUserPatch::default())
        .await?;
    let user = repository
        .get_anonymous_user(user_id)
        .await?
        .into_data()
        .ok_or_else(|| ServiceError::NotFound("User not found".into()))?;
    debug!(user_id, "refreshed anonymous user activity");
    Ok(UpsertOutcome::Updated(user))
}

/// Read a user.
pub async fn get_user(state: &SharedState, user_id: &str) -> Result<AnonymousUser, ServiceError> {
    state
        .repository()
        .await?
        .get_anonymous_user(user_id)
        .await?
        .into_data()
        .ok_or_else(|| ServiceError::NotFound("User not found".into()))
}

/// Atomically add one to the user's `gamesPlayed`.
pub async fn increment_games_played(state: &SharedState, user_id: &str) -> Result<(), ServiceError> {
    state
        .repository()
        .await?
        .increment_user_games_played(user_id)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        dao::document_store::memory::MemoryDocumentStore, routes::test_support::slow_read_state,
        state::AppState,
    };

    fn state() -> SharedState {
        AppState::with_store(Arc::new(MemoryDocumentStore::new()))
    }

    #[tokio::test]
    async fn first_contact_creates_then_updates() {
        let state = state();
        stats_service::ensure_global_stats(&state).await.unwrap();

        let created = upsert_user(&state, "anon-1").await.unwrap();
        assert!(matches!(created, UpsertOutcome::Created(ref r) if r.id == "anon-1"));

        let first = get_user(&state, "anon-1").await.unwrap();
        let updated = upsert_user(&state, "anon-1").await.unwrap();
        let UpsertOutcome::Updated(user) = updated else {
            panic!("expected an update");
        };
        assert_eq!(user.uid, "anon-1");
        assert_eq!(user.games_played, 0);
        assert!(user.last_active_at >= first.last_active_at);

        let counts = state.repository().await.unwrap().database_counts().await.unwrap();
        assert_eq!(counts.total_users, 1);
        let stats = stats_service::global_stats(&state).await.unwrap();
        assert_eq!(stats.total_players, 1);
    }

    #[tokio::test]
    async fn concurrent_first_contacts_create_once() {
        let state = slow_read_state();
        stats_service::ensure_global_stats(&state).await.unwrap();

        let (first, second) =
            tokio::join!(upsert_user(&state, "anon-1"), upsert_user(&state, "anon-1"));
        let outcomes = [first.unwrap(), second.unwrap()];
        let created = outcomes
            .iter()
            .filter(|outcome| matches!(outcome, UpsertOutcome::Created(_)))
            .count();
        assert_eq!(created, 1);

        let stats = stats_service::global_stats(&state).await.unwrap();
        assert_eq!(stats.total_players, 1);
    }

    #[tokio::test]
    async fn repeated_contact_keeps_games_played() {
        let state = slow_read_state();
        upsert_user(&state, "u").await.unwrap();
        increment_games_played(&state, "u").await.unwrap();

        let (first, second) = tokio::join!(upsert_user(&state, "u"), upsert_user(&state, "u"));
        assert!(matches!(first.unwrap(), UpsertOutcome::Updated(ref user) if user.games_played == 1));
        assert!(matches!(second.unwrap(), UpsertOutcome::Updated(_)));
        assert_eq!(get_user(&state, "u").await.unwrap().games_played, 1);
    }

    #[tokio::test]
    async fn slash_in_user_id_is_rejected() {
        let state = state();
        assert!(matches!(
            upsert_user(&state, "a/b").await,
            Err(ServiceError::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let state = state();
        assert!(matches!(
            get_user(&state, "ghost").await,
            Err(ServiceError::NotFound(message)) if message == "User not found"
        ));
    }

    #[tokio::test]
    async fn increments_accumulate() {
        let state = state();
        upsert_user(&state, "u").await.unwrap();
        for _ in 0..3 {
            increment_games_played(&state, "u").await.unwrap();
        }
        assert_eq!(get_user(&state, "u").await.unwrap().games_played, 3);
    }

    #[tokio::test]
    async fn incrementing_unknown_user_is_a_storage_failure() {
        let state = state();
        assert!(matches!(
            increment_games_played(&state, "ghost").await,
            Err(ServiceError::Unavailable(_))
        ));
    }
}
