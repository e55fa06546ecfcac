use axum::{Json, Router, extract::State, routing::get};

use crate::{dto::health::HealthResponse, services::health_service, state::SharedState};

/// Report whether the storage backend is usable.
#[utoipa::path(
    get,
    path = "/healthcheck",
    tag = "health",
    responses((status = 200, description = "Service health", body = HealthResponse))
)]
/// Report `ok` while storage is installed and healthy, `degraded` otherwise.
pub async fn healthcheck(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(health_service::health_status(&state).await)
}

/// Configure the health routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/healthcheck", get(healthcheck))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::{
        routes::test_support::{call, memory_state},
        state::AppState,
    };

    #[tokio::test]
    async fn reports_ok_with_store() {
        let (status, body) = call(&memory_state(), Method::GET, "/healthcheck", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn reports_degraded_without_store() {
        let state = AppState::new();
        let (status, body) = call(&state, Method::GET, "/healthcheck", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "degraded"}));

        let (status, body) = call(&state, Method::GET, "/api/games", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Failed to fetch games"}));
    }
}
