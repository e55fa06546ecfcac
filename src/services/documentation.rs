use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the Fun-Vault backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::auth::upsert_user,
        crate::routes::auth::get_user,
        crate::routes::auth::increment_games,
        crate::routes::games::list_games,
        crate::routes::games::get_game,
        crate::routes::sessions::start_session,
        crate::routes::sessions::list_sessions,
        crate::routes::sessions::get_session,
        crate::routes::sessions::finish_session,
        crate::routes::stats::global_stats,
        crate::routes::stats::game_stats,
        crate::routes::stats::database_counts,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::health::HealthStatus,
            crate::dto::user::UserIdRequest,
            crate::dto::user::UpsertUserResponse,
            crate::dto::user::UserResponse,
            crate::dto::user::MessageResponse,
            crate::dto::catalog::GamesResponse,
            crate::dto::catalog::GameResponse,
            crate::dto::session::StartSessionRequest,
            crate::dto::session::FinishSessionRequest,
            crate::dto::session::SessionStartedResponse,
            crate::dto::session::SessionResponse,
            crate::dto::session::SessionsResponse,
            crate::dto::stats::GlobalStatsResponse,
            crate::dto::stats::GameStatsResponse,
            crate::dao::models::Game,
            crate::dao::models::GameCategory,
            crate::dao::models::AnonymousUser,
            crate::dao::models::GameSession,
            crate::dao::models::SessionStatus,
            crate::dao::models::PlayerType,
            crate::dao::models::GameStats,
            crate::dao::models::WinRate,
            crate::dao::models::GlobalStats,
            crate::dao::models::DatabaseCounts,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "users", description = "Anonymous user provisioning"),
        (name = "games", description = "Game catalog"),
        (name = "sessions", description = "Game session bookkeeping"),
        (name = "stats", description = "Aggregate statistics"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/healthcheck",
            "/api/auth/user",
            "/api/auth/user/increment-games",
            "/api/games",
            "/api/games/{game_id}",
            "/api/sessions",
            "/api/sessions/{id}",
            "/api/sessions/{id}/finish",
            "/api/stats/global",
            "/api/stats/games",
            "/api/stats/database",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
