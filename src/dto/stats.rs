use serde::Serialize;
use utoipa::ToSchema;

use crate::dao::models::{GameStats, GlobalStats};

/// Body of `GET /api/stats/global`.
#[derive(Debug, Serialize, ToSchema)]
pub struct GlobalStatsResponse {
    /// Site-wide counters.
    pub stats: GlobalStats,
}

/// Body of `GET /api/stats/games`.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameStatsResponse {
    /// Statistics of every game.
    pub stats: Vec<GameStats>,
}
