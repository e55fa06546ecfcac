use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::QueryRejection},
    routing::get,
};

use crate::{
    dto::catalog::{GameResponse, GamesQuery, GamesResponse},
    error::AppError,
    services::catalog_service,
    state::SharedState,
};

/// Game catalog endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/games", get(list_games))
        .route("/api/games/{game_id}", get(get_game))
}

/// List the catalog, optionally restricted to active games.
#[utoipa::path(
    get,
    path = "/api/games",
    tag = "games",
    params(GamesQuery),
    responses(
        (status = 200, description = "Games in the catalog", body = GamesResponse),
        (status = 500, description = "Storage failure")
    )
)]
pub async fn list_games(
    State(state): State<SharedState>,
    query: Result<Query<GamesQuery>, QueryRejection>,
) -> Result<Json<GamesResponse>, AppError> {
    let Query(query) = query?;
    let games = if query.active_only() {
        catalog_service::list_active(&state).await
    } else {
        catalog_service::list_all(&state).await
    }
    .map_err(AppError::from_service("Failed to fetch games"))?;

    Ok(Json(GamesResponse { games }))
}

/// Fetch a game by its slug.
#[utoipa::path(
    get,
    path = "/api/games/{game_id}",
    tag = "games",
    params(("game_id" = String, Path, description = "Game slug, e.g. tic-tac-toe")),
    responses(
        (status = 200, description = "Game", body = GameResponse),
        (status = 404, description = "Game not found")
    )
)]
pub async fn get_game(
    State(state): State<SharedState>,
    Path(game_id): Path<String>,
) -> Result<Json<GameResponse>, AppError> {
    let game = catalog_service::find_by_game_id(&state, &game_id)
        .await
        .map_err(AppError::from_service("Failed to fetch game"))?
        .ok_or_else(|| AppError::NotFound("Game not found".into()))?;
    Ok(Json(GameResponse { game }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::{
        dao::models::{GameCategory, NewGame},
        routes::test_support::{call, failing_state, memory_state},
        services::catalog_service,
    };

    fn game(slug: &str, active: bool) -> NewGame {
        NewGame {
            game_id: slug.into(),
            name: slug.into(),
            description: "d".into(),
            category: GameCategory::Classic,
            icon: "*".into(),
            is_active: active,
        }
    }

    #[tokio::test]
    async fn empty_catalog_lists_no_games() {
        let state = memory_state();
        let (status, body) = call(&state, Method::GET, "/api/games?active=true", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"games": []}));
    }

    #[tokio::test]
    async fn active_flag_filters_listing() {
        let state = memory_state();
        catalog_service::seed_if_empty(&state, &[game("a", true), game("b", false)])
            .await
            .unwrap();

        let (_, all) = call(&state, Method::GET, "/api/games", None).await;
        assert_eq!(all["games"].as_array().unwrap().len(), 2);

        let (_, active) = call(&state, Method::GET, "/api/games?active=true", None).await;
        let active = active["games"].as_array().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0]["gameId"], "a");
        assert_eq!(active[0]["isActive"], true);
        assert_eq!(active[0]["category"], "CLASSIC");

        let (_, other) = call(&state, Method::GET, "/api/games?active=yes", None).await;
        assert_eq!(other["games"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn games_are_fetched_by_slug() {
        let state = memory_state();
        catalog_service::seed_if_empty(&state, &[game("tic-tac-toe", true)])
            .await
            .unwrap();

        let (status, body) = call(&state, Method::GET, "/api/games/tic-tac-toe", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["game"]["gameId"], "tic-tac-toe");

        let (status, body) = call(&state, Method::GET, "/api/games/chess", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Game not found"}));
    }

    #[tokio::test]
    async fn storage_failure_is_opaque() {
        let state = failing_state();
        let (status, body) = call(&state, Method::GET, "/api/games", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Failed to fetch games"}));
    }
}
