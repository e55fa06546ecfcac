use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::{
    dao::models::AnonymousUser,
    dto::validation::{USER_ID_REQUIRED, validate_user_id},
    error::AppError,
};

/// Body carrying the identity provider's subject id.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct UserIdRequest {
    /// Subject id issued by the identity provider.
    #[serde(rename = "userId", default)]
    #[validate(
        required(message = "User ID is required"),
        custom(function = "validate_user_id")
    )]
    pub user_id: Option<String>,
}

/// Query string selecting a user.
#[derive(Debug, Deserialize, IntoParams, Validate)]
#[into_params(parameter_in = Query)]
pub struct UserQuery {
    /// Subject id issued by the identity provider.
    #[serde(rename = "userId", default)]
    #[validate(
        required(message = "User ID is required"),
        custom(function = "validate_user_id")
    )]
    pub user_id: Option<String>,
}

/// Take the identifier out of a validated request.
pub fn required_user_id(user_id: Option<String>) -> Result<String, AppError> {
    user_id.ok_or_else(|| AppError::BadRequest(USER_ID_REQUIRED.to_owned()))
}

/// Outcome of `POST /api/auth/user`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(untagged)]
pub enum UpsertUserResponse {
    /// The user existed and its activity was refreshed.
    Updated {
        /// Human readable acknowledgement.
        message: &'static str,
        /// User after the refresh.
        user: AnonymousUser,
    },
    /// The user was created.
    Created {
        /// Human readable acknowledgement.
        message: &'static str,
        /// Key of the new user.
        #[serde(rename = "userId")]
        user_id: String,
    },
}

/// Body of `GET /api/auth/user`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    /// The requested user.
    pub user: AnonymousUser,
}

/// Generic acknowledgement.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    /// Human readable acknowledgement.
    pub message: String,
}
