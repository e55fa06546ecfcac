//! Read-only access to the game catalog.

use crate::{
    dao::models::{Game, NewGame},
    error::ServiceError,
    state::SharedState,
};

/// Every game in the catalog, active or not.
pub async fn list_all(state: &SharedState) -> Result<Vec<Game>, ServiceError> {
    Ok(state.repository().await?.list_games().await?)
}

/// Games flagged `isActive`.
pub async fn list_active(state: &SharedState) -> Result<Vec<Game>, ServiceError> {
    Ok(state.repository().await?.list_active_games().await?)
}

/// Look a game up by its slug (`gameId`), not its document key.
pub async fn find_by_game_id(state: &SharedState, game_id: &str) -> Result<Option<Game>, ServiceError> {
    let games = list_all(state).await?;
    Ok(games.into_iter().find(|game| game.game_id == game_id))
}

/// Insert `games` when the catalog is empty; returns how many were written.
pub async fn seed_if_empty(
    state: &SharedState,
    games: &[NewGame],
) -> Result<usize, ServiceError> {
    let repository = state.repository().await?;
    if !repository.list_games().await?.is_empty() {
        return Ok(0);
    }
    for game in games {
        repository.create_game(game).await?;
    }
    Ok(games.len())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        dao::{document_store::memory::MemoryDocumentStore, models::GameCategory},
        state::AppState,
    };

    fn game(slug: &str, active: bool) -> NewGame {
        NewGame {
            game_id: slug.into(),
            name: slug.into(),
            description: String::new(),
            category: GameCategory::Puzzle,
            icon: "?".into(),
            is_active: active,
        }
    }

    #[tokio::test]
    async fn seeding_only_happens_once() {
        let state = AppState::with_store(Arc::new(MemoryDocumentStore::new()));
        let catalog = [game("a", true), game("b", false)];

        assert_eq!(seed_if_empty(&state, &catalog).await.unwrap(), 2);
        assert_eq!(seed_if_empty(&state, &catalog).await.unwrap(), 0);
        assert_eq!(list_all(&state).await.unwrap().len(), 2);
        assert_eq!(list_active(&state).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn finds_games_by_slug() {
        let state = AppState::with_store(Arc::new(MemoryDocumentStore::new()));
        seed_if_empty(&state, &[game("sudoku", true)]).await.unwrap();

        let found = find_by_game_id(&state, "sudoku").await.unwrap().unwrap();
        assert_eq!(found.name, "sudoku");
        assert!(find_by_game_id(&state, "chess").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn degraded_state_is_reported() {
        let state = AppState::new();
        assert!(matches!(list_all(&state).await, Err(ServiceError::Degraded)));
    }
}
