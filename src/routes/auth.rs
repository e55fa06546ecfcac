use axum::{
    Json, Router,
    extract::{
        Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    routing::post,
};
use validator::Validate;

use crate::{
    dto::user::{
        MessageResponse, UpsertUserResponse, UserIdRequest, UserQuery, UserResponse,
        required_user_id,
    },
    error::AppError,
    services::user_service::{self, UpsertOutcome},
    state::SharedState,
};

/// Anonymous user endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/auth/user", post(upsert_user).get(get_user))
        .route("/api/auth/user/increment-games", post(increment_games))
}

/// Create the anonymous user on first contact or refresh its activity timestamp.
#[utoipa::path(
    post,
    path = "/api/auth/user",
    tag = "users",
    request_body = UserIdRequest,
    responses(
        (status = 200, description = "User created or updated", body = UpsertUserResponse),
        (status = 400, description = "Missing user id"),
        (status = 500, description = "Storage failure")
    )
)]
pub async fn upsert_user(
    State(state): State<SharedState>,
    payload: Result<Json<UserIdRequest>, JsonRejection>,
) -> Result<Json<UpsertUserResponse>, AppError> {
    let Json(request) = payload?;
    request.validate()?;
    let user_id = required_user_id(request.user_id)?;

    let outcome = user_service::upsert_user(&state, &user_id)
        .await
        .map_err(AppError::from_service("Failed to create/update user"))?;

    Ok(Json(match outcome {
        UpsertOutcome::Updated(user) => UpsertUserResponse::Updated {
            message: "User updated successfully",
            user,
        },
        UpsertOutcome::Created(reference) => UpsertUserResponse::Created {
            message: "User created successfully",
            user_id: reference.id,
        },
    }))
}

/// Fetch an anonymous user.
#[utoipa::path(
    get,
    path = "/api/auth/user",
    tag = "users",
    params(UserQuery),
    responses(
        (status = 200, description = "User found", body = UserResponse),
        (status = 400, description = "Missing user id"),
        (status = 404, description = "User not found")
    )
)]
pub async fn get_user(
    State(state): State<SharedState>,
    query: Result<Query<UserQuery>, QueryRejection>,
) -> Result<Json<UserResponse>, AppError> {
    let Query(query) = query?;
    query.validate()?;
    let user_id = required_user_id(query.user_id)?;

    let user = user_service::get_user(&state, &user_id)
        .await
        .map_err(AppError::from_service("Failed to fetch user"))?;
    Ok(Json(UserResponse { user }))
}

/// Add one to the user's played games counter.
#[utoipa::path(
    post,
    path = "/api/auth/user/increment-games",
    tag = "users",
    request_body = UserIdRequest,
    responses(
        (status = 200, description = "Counter incremented", body = MessageResponse),
        (status = 400, description = "Missing user id"),
        (status = 500, description = "Storage failure or unknown user")
    )
)]
pub async fn increment_games(
    State(state): State<SharedState>,
    payload: Result<Json<UserIdRequest>, JsonRejection>,
) -> Result<Json<MessageResponse>, AppError> {
    let Json(request) = payload?;
    request.validate()?;
    let user_id = required_user_id(request.user_id)?;

    user_service::increment_games_played(&state, &user_id)
        .await
        .map_err(AppError::from_service("Failed to increment games played"))?;
    Ok(Json(MessageResponse {
        message: "Games played incremented successfully".into(),
    }))
}
