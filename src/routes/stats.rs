use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dao::models::DatabaseCounts,
    dto::stats::{GameStatsResponse, GlobalStatsResponse},
    error::AppError,
    services::stats_service,
    state::SharedState,
};

/// Statistics endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/stats/global", get(global_stats))
        .route("/api/stats/games", get(game_stats))
        .route("/api/stats/database", get(database_counts))
}

/// Site-wide counters.
#[utoipa::path(
    get,
    path = "/api/stats/global",
    tag = "stats",
    responses(
        (status = 200, description = "Site-wide counters", body = GlobalStatsResponse),
        (status = 404, description = "Statistics not initialized")
    )
)]
pub async fn global_stats(
    State(state): State<SharedState>,
) -> Result<Json<GlobalStatsResponse>, AppError> {
    let stats = stats_service::global_stats(&state)
        .await
        .map_err(AppError::from_service("Failed to fetch statistics"))?;
    Ok(Json(GlobalStatsResponse { stats }))
}

/// Statistics of every game.
#[utoipa::path(
    get,
    path = "/api/stats/games",
    tag = "stats",
    responses((status = 200, description = "Per-game statistics", body = GameStatsResponse))
)]
pub async fn game_stats(
    State(state): State<SharedState>,
) -> Result<Json<GameStatsResponse>, AppError> {
    let stats = stats_service::game_stats(&state)
        .await
        .map_err(AppError::from_service("Failed to fetch statistics"))?;
    Ok(Json(GameStatsResponse { stats }))
}

/// Document counts per collection.
#[utoipa::path(
    get,
    path = "/api/stats/database",
    tag = "stats",
    responses((status = 200, description = "Collection sizes", body = DatabaseCounts))
)]
pub async fn database_counts(
    State(state): State<SharedState>,
) -> Result<Json<DatabaseCounts>, AppError> {
    let counts = stats_service::database_counts(&state)
        .await
        .map_err(AppError::from_service("Failed to fetch database statistics"))?;
    Ok(Json(counts))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::{
        routes::test_support::{call, failing_state, memory_state},
        services::stats_service,
    };

    #[tokio::test]
    async fn global_stats_follow_user_and_session_activity() {
        let state = memory_state();
        let (status, body) = call(&state, Method::GET, "/api/stats/global", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"error": "Global statistics not found"}));

        stats_service::ensure_global_stats(&state).await.unwrap();
        call(&state, Method::POST, "/api/auth/user", Some(r#"{"userId": "u1"}"#)).await;
        call(
            &state,
            Method::POST,
            "/api/sessions",
            Some(r#"{"gameUid": "g", "userId": "u1"}"#),
        )
        .await;

        let (status, body) = call(&state, Method::GET, "/api/stats/global", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["stats"]["totalPlayers"], 1);
        assert_eq!(body["stats"]["totalMatches"], 1);
        assert_eq!(body["stats"]["totalGamesPlayed"], 0);
    }

    #[tokio::test]
    async fn database_counts_are_reported() {
        let state = memory_state();
        call(&state, Method::POST, "/api/auth/user", Some(r#"{"userId": "u1"}"#)).await;

        let (status, body) = call(&state, Method::GET, "/api/stats/database", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({"totalGames": 0, "totalSessions": 0, "totalUsers": 1, "totalGameStats": 0})
        );

        let (_, body) = call(&state, Method::GET, "/api/stats/games", None).await;
        assert_eq!(body, json!({"stats": []}));
    }

    #[tokio::test]
    async fn storage_failure_is_opaque() {
        let state = failing_state();
        let (status, body) = call(&state, Method::GET, "/api/stats/database", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Failed to fetch database statistics"}));
    }
}
