use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    dao::models::{GameSession, PlayerType, SessionStatus},
    dto::validation::validate_user_id,
    error::AppError,
};

const GAME_UID_REQUIRED: &str = "Game UID is required";

/// Body of `POST /api/sessions`.
#[derive(Debug, Deserialize, ToSchema, Validate)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    /// Catalog key of the game being played.
    #[serde(default)]
    #[validate(
        required(message = "Game UID is required"),
        length(min = 1, message = "Game UID is required")
    )]
    pub game_uid: Option<String>,
    /// Subject id of the anonymous player.
    #[serde(default)]
    #[validate(
        required(message = "User ID is required"),
        custom(function = "validate_user_id")
    )]
    pub user_id: Option<String>,
}

/// Take the game key out of a validated request.
pub fn required_game_uid(game_uid: Option<String>) -> Result<String, AppError> {
    game_uid.ok_or_else(|| AppError::BadRequest(GAME_UID_REQUIRED.to_owned()))
}

/// Body of `POST /api/sessions/{id}/finish`.
#[derive(Debug, Deserialize, ToSchema)]
pub struct FinishSessionRequest {
    /// Terminal status to move to.
    pub status: SessionStatus,
    /// Outcome; required for COMPLETED, rejected for ABANDONED.
    #[serde(default)]
    pub winner: Option<PlayerType>,
}

/// Answer to a started session.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartedResponse {
    /// Human readable acknowledgement.
    pub message: &'static str,
    /// Key of the new session.
    pub session_id: String,
}

/// Body of `GET /api/sessions/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionResponse {
    /// The requested session.
    pub session: GameSession,
}

/// Body of `GET /api/sessions`.
#[derive(Debug, Serialize, ToSchema)]
pub struct SessionsResponse {
    /// Sessions of the requested user.
    pub sessions: Vec<GameSession>,
}
