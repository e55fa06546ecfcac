//! Typed entities of the five collections and the session status rules.

use serde::{Deserialize, Serialize};
use serde_with::rust::double_option;
use thiserror::Error;
use utoipa::ToSchema;

/// Games collection.
pub const GAMES: &str = "games";
/// Game sessions collection.
pub const GAME_SESSIONS: &str = "gameSessions";
/// Anonymous users collection.
pub const ANONYMOUS_USERS: &str = "anonymousUsers";
/// Per-game statistics collection.
pub const GAME_STATISTICS: &str = "gameStatistics";
/// Global statistics collection (holds a single document).
pub const GLOBAL_STATISTICS: &str = "globalStatistics";
/// Key of the global statistics singleton.
pub const GLOBAL_STATS_ID: &str = "global";

/// Broad family a game belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameCategory {
    /// Two-player board games against the AI.
    Strategy,
    /// Single-player puzzles.
    Puzzle,
    /// Arcade classics.
    Classic,
}

/// Lifecycle status of a game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Session is in progress.
    Started,
    /// Session reached an outcome.
    Completed,
    /// Player left before an outcome.
    Abandoned,
}

/// Outcome of a completed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerType {
    /// The human player won.
    Player,
    /// The computer opponent won.
    Ai,
    /// Nobody won.
    Draw,
}

/// Error returned when a session status change is not allowed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidStatusTransition {
    /// The session already reached a terminal status.
    #[error("session is already {from:?}")]
    AlreadyFinished {
        /// Status the session is in.
        from: SessionStatus,
    },
    /// STARTED was requested as the next status.
    #[error("a session cannot move back to STARTED")]
    BackToStarted,
    /// COMPLETED without a winner.
    #[error("a completed session requires a winner")]
    MissingWinner,
    /// A winner on a status other than COMPLETED.
    #[error("only completed sessions carry a winner")]
    UnexpectedWinner,
}

impl SessionStatus {
    /// Whether no further transition is accepted.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Completed | SessionStatus::Abandoned)
    }

    /// Validate moving from `self` to `next` with the given outcome.
    pub fn finish(
        self,
        next: SessionStatus,
        winner: Option<PlayerType>,
    ) -> Result<SessionStatus, InvalidStatusTransition> {
        if self.is_terminal() {
            return Err(InvalidStatusTransition::AlreadyFinished { from: self });
        }
        match (next, winner) {
            (SessionStatus::Started, _) => Err(InvalidStatusTransition::BackToStarted),
            (SessionStatus::Completed, None) => Err(InvalidStatusTransition::MissingWinner),
            (SessionStatus::Abandoned, Some(_)) => Err(InvalidStatusTransition::UnexpectedWinner),
            (next, _) => Ok(next),
        }
    }
}

/// Catalog entry for a playable game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Game {
    /// Document key.
    pub uid: String,
    /// Stable slug, e.g. `tic-tac-toe`.
    pub game_id: String,
    /// Display name.
    pub name: String,
    /// One-line pitch shown in the catalog.
    pub description: String,
    /// Catalog family.
    pub category: GameCategory,
    /// Icon identifier understood by the front end.
    pub icon: String,
    /// Whether the game is offered to players.
    pub is_active: bool,
    /// Creation time.
    pub created_at: String,
    /// Last write time.
    pub last_updated_at: String,
}

/// Fields accepted when creating a game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGame {
    /// Stable slug.
    pub game_id: String,
    /// Display name.
    pub name: String,
    /// Catalog blurb.
    pub description: String,
    /// Catalog family.
    pub category: GameCategory,
    /// Icon identifier.
    pub icon: String,
    /// Offered to players.
    pub is_active: bool,
}

/// Anonymous player keyed by the identity provider's subject id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnonymousUser {
    /// Identity provider subject id, also the document key.
    pub uid: String,
    /// Number of games the user finished.
    pub games_played: u64,
    /// Creation time.
    pub created_at: String,
    /// Refreshed on every upsert and increment.
    pub last_active_at: String,
}

/// Fields accepted when creating an anonymous user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAnonymousUser {
    /// Finished games.
    pub games_played: u64,
    /// Last activity time.
    pub last_active_at: String,
}

/// Partial update of an anonymous user; `None` leaves the stored value untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnonymousUserPatch {
    /// Finished games.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub games_played: Option<u64>,
    /// Last activity time.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_active_at: Option<String>,
}

/// One played instance of a game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    /// Document key.
    pub uid: String,
    /// Key of the played game.
    pub game_uid: String,
    /// Owner of the session.
    pub anonymous_user_uid: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Set once the session is COMPLETED.
    #[serde(default)]
    pub winner: Option<PlayerType>,
    /// Start time.
    pub started_at: String,
    /// Set once the session is finished.
    #[serde(default)]
    pub ended_at: Option<String>,
    /// Creation time.
    pub created_at: String,
    /// Last write time.
    pub last_updated_at: String,
}

/// Fields accepted when creating a session.
///
/// `winner: None` omits the field. `ended_at: Some(None)` stores an explicit null
/// while `None` omits it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGameSession {
    /// Key of the game.
    pub game_uid: String,
    /// Key of the owner.
    pub anonymous_user_uid: String,
    /// Lifecycle status.
    pub status: SessionStatus,
    /// Outcome, COMPLETED only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub winner: Option<PlayerType>,
    /// Start time.
    pub started_at: String,
    /// End time; explicit null while running.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    pub ended_at: Option<Option<String>>,
}

/// Partial update of a session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSessionPatch {
    /// Lifecycle status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<SessionStatus>,
    /// `Some(None)` clears the stored winner.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    pub winner: Option<Option<PlayerType>>,
    /// `Some(None)` clears the stored end time.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "double_option"
    )]
    pub ended_at: Option<Option<String>>,
}

/// Share of outcomes for a game; fractions are expected to sum to one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct WinRate {
    /// Fraction of player wins.
    pub player: f64,
    /// Fraction of AI wins.
    pub ai: f64,
    /// Fraction of draws.
    pub draw: f64,
}

impl WinRate {
    const TOLERANCE: f64 = 1e-6;

    /// Whether the three fractions add up to 1.0.
    pub fn is_normalized(&self) -> bool {
        ((self.player + self.ai + self.draw) - 1.0).abs() <= Self::TOLERANCE
    }
}

/// Aggregates for a single game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GameStats {
    /// Document key.
    pub uid: String,
    /// Key of the game.
    pub game_uid: String,
    /// Completed sessions.
    pub total_games_played: u64,
    /// Seconds.
    pub average_play_time: f64,
    /// Outcome distribution.
    pub win_rate: WinRate,
    /// Last write time.
    pub last_updated_at: String,
}

/// Fields accepted when creating game statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGameStats {
    /// Key of the game.
    pub game_uid: String,
    /// Completed sessions.
    pub total_games_played: u64,
    /// Average session length in seconds.
    pub average_play_time: f64,
    /// Outcome distribution.
    pub win_rate: WinRate,
}

/// Partial update of game statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStatsPatch {
    /// Completed sessions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_games_played: Option<u64>,
    /// Average session length in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_play_time: Option<f64>,
    /// Outcome distribution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub win_rate: Option<WinRate>,
}

/// Site-wide counters; only ever moved forward through atomic increments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GlobalStats {
    /// Sessions that reached COMPLETED.
    pub total_games_played: u64,
    /// Anonymous users ever created.
    pub total_players: u64,
    /// Sessions ever started.
    pub total_matches: u64,
    /// Last write time.
    pub last_updated_at: String,
}

/// Counter fields of [`GlobalStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlobalCounter {
    /// `totalGamesPlayed`.
    TotalGamesPlayed,
    /// `totalPlayers`.
    TotalPlayers,
    /// `totalMatches`.
    TotalMatches,
}

impl GlobalCounter {
    /// Stored field name.
    pub fn field(self) -> &'static str {
        match self {
            GlobalCounter::TotalGamesPlayed => "totalGamesPlayed",
            GlobalCounter::TotalPlayers => "totalPlayers",
            GlobalCounter::TotalMatches => "totalMatches",
        }
    }
}

/// Document counts across the main collections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseCounts {
    /// Games in the catalog.
    pub total_games: usize,
    /// Sessions ever started.
    pub total_sessions: usize,
    /// Anonymous users.
    pub total_users: usize,
    /// Per-game statistics documents.
    pub total_game_stats: usize,
}

/// Existence-aware read result.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    /// Key that was read.
    pub id: String,
    /// Decoded document, `None` when missing.
    pub data: Option<T>,
}

impl<T> Snapshot<T> {
    /// Whether the document was found.
    pub fn exists(&self) -> bool {
        self.data.is_some()
    }

    /// Drop the key and keep the document.
    pub fn into_data(self) -> Option<T> {
        self.data
    }
}
