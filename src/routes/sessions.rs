use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    routing::{get, post},
};
use validator::Validate;

use crate::{
    dto::{
        session::{
            FinishSessionRequest, SessionResponse, SessionStartedResponse, SessionsResponse,
            StartSessionRequest, required_game_uid,
        },
        user::{MessageResponse, UserQuery, required_user_id},
    },
    error::AppError,
    services::session_service,
    state::SharedState,
};

/// Game session endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/sessions", post(start_session).get(list_sessions))
        .route("/api/sessions/{id}", get(get_session))
        .route("/api/sessions/{id}/finish", post(finish_session))
}

/// Open a new session for a user.
#[utoipa::path(
    post,
    path = "/api/sessions",
    tag = "sessions",
    request_body = StartSessionRequest,
    responses(
        (status = 200, description = "Session started", body = SessionStartedResponse),
        (status = 400, description = "Invalid request")
    )
)]
pub async fn start_session(
    State(state): State<SharedState>,
    payload: Result<Json<StartSessionRequest>, JsonRejection>,
) -> Result<Json<SessionStartedResponse>, AppError> {
    let Json(request) = payload?;
    request.validate()?;
    let game_uid = required_game_uid(request.game_uid)?;
    let user_id = required_user_id(request.user_id)?;

    let session_id = session_service::start_session(&state, &game_uid, &user_id)
        .await
        .map_err(AppError::from_service("Failed to start session"))?;
    Ok(Json(SessionStartedResponse {
        message: "Session started successfully",
        session_id,
    }))
}

/// List the sessions of a user.
#[utoipa::path(
    get,
    path = "/api/sessions",
    tag = "sessions",
    params(UserQuery),
    responses((status = 200, description = "Sessions of the user", body = SessionsResponse))
)]
pub async fn list_sessions(
    State(state): State<SharedState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<SessionsResponse>, AppError> {
    let Query(query) = query?;
    query.validate()?;
    let user_id = required_user_id(query.user_id)?;

    let sessions = session_service::list_user_sessions(&state, &user_id)
        .await
        .map_err(AppError::from_service("Failed to fetch sessions"))?;
    Ok(Json(SessionsResponse { sessions }))
}

/// Fetch a session by key.
#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    tag = "sessions",
    params(("id" = String, Path, description = "Session key")),
    responses(
        (status = 200, description = "Session", body = SessionResponse),
        (status = 404, description = "Session not found")
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = session_service::get_session(&state, &id)
        .await
        .map_err(AppError::from_service("Failed to fetch session"))?;
    Ok(Json(SessionResponse { session }))
}

/// Close a STARTED session as COMPLETED (with a winner) or ABANDONED.
#[utoipa::path(
    post,
    path = "/api/sessions/{id}/finish",
    tag = "sessions",
    params(("id" = String, Path, description = "Session key")),
    request_body = FinishSessionRequest,
    responses(
        (status = 200, description = "Session finished", body = MessageResponse),
        (status = 400, description = "Invalid outcome"),
        (status = 404, description = "Session not found"),
        (status = 409, description = "Session already finished")
    )
)]
pub async fn finish_session(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    payload: Result<Json<FinishSessionRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(request) = payload?;
    session_service::finish_session(&state, &id, request.status, request.winner)
        .await
        .map_err(AppError::from_service("Failed to finish session"))?;
    Ok(Json(MessageResponse {
        message: "Session finished successfully".into(),
    }))
}
