//! Game session lifecycle: start, finish and lookups.

use tracing::{info, warn};

use crate::{
    dao::{
        models::{GameSession, GameSessionPatch, GlobalCounter, NewGameSession, PlayerType, SessionStatus},
        storage::StorageError,
        timestamp::now_iso,
    },
    error::ServiceError,
    services::stats_service,
    state::SharedState,
};

/// Open a session in the STARTED state; returns its key.
pub async fn start_session(
    state: &SharedState,
    game_uid: &str,
    user_id: &str,
) -> Result<String, ServiceError> {
    let session = NewGameSession {
        game_uid: game_uid.to_owned(),
        anonymous_user_uid: user_id.to_owned(),
        status: SessionStatus::Started,
        winner: None,
        started_at: now_iso(),
        ended_at: Some(None),
    };
    let reference = state
        .repository()
        .await?
        .create_game_session(&session)
        .await?;
    info!(session_id = %reference.id, game_uid, user_id, "game session started");
    stats_service::bump_global(state, GlobalCounter::TotalMatches, 1).await;
    Ok(reference.id)
}

/// Move a STARTED session to a terminal status and stamp `endedAt`.
///
/// The write is conditioned on the stored status, so of two concurrent finishes only one
/// lands; the other gets [`ServiceError::InvalidState`].
pub async fn finish_session(
    state: &SharedState,
    session_id: &str,
    status: SessionStatus,
    winner: Option<PlayerType>,
) -> Result<(), ServiceError> {
    let repository = state.repository().await?;
    let current = repository
        .get_game_session(session_id)
        .await?
        .into_data()
        .ok_or_else(|| ServiceError::NotFound("Session not found".into()))?;

    let next = current.status.finish(status, winner)?;
    let patch = GameSessionPatch {
        status: Some(next),
        winner: winner.map(Some),
        ended_at: Some(Some(now_iso())),
    };
    match repository.finish_game_session(session_id, &patch).await {
        Ok(()) => {}
        Err(StorageError::PreconditionFailed { .. }) => {
            warn!(session_id, status = ?next, "session was finished concurrently");
            return Err(ServiceError::InvalidState("session is already finished".into()));
        }
        Err(err) => return Err(err.into()),
    }
    info!(session_id, status = ?next, "game session finished");

    if next == SessionStatus::Completed {
        stats_service::bump_global(state, GlobalCounter::TotalGamesPlayed, 1).await;
    }
    Ok(())
}

/// Read a session.
pub async fn get_session(state: &SharedState, session_id: &str) -> Result<GameSession, ServiceError> {
    state
        .repository()
        .await?
        .get_game_session(session_id)
        .await?
        .into_data()
        .ok_or_else(|| ServiceError::NotFound("Session not found".into()))
}

/// Sessions owned by `user_id`.
pub async fn list_user_sessions(
    state: &SharedState,
    user_id: &str,
) -> Result<Vec<GameSession>, ServiceError> {
    Ok(state
        .repository()
        .await?
        .list_user_game_sessions(user_id)
        .await?)
}
