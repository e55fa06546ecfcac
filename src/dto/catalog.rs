use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::dao::models::Game;

/// Query string of `GET /api/games`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct GamesQuery {
    /// Only `true` restricts the listing to active games.
    pub active: Option<String>,
}

impl GamesQuery {
    /// Whether the listing is restricted to active games.
    pub fn active_only(&self) -> bool {
        self.active.as_deref() == Some("true")
    }
}

/// Body of `GET /api/games`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct GamesResponse {
    /// Matching catalog entries.
    pub games: Vec<Game>,
}

/// Body of `GET /api/games/{id}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameResponse {
    /// The requested entry.
    pub game: Game,
}
