//! Typed data access over the five collections.

use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::warn;

use crate::dao::{
    document::{DocumentRef, FieldUpdate, Fields, RawDocument, decode, to_fields},
    document_store::DocumentStore,
    models::{
        ANONYMOUS_USERS, AnonymousUser, AnonymousUserPatch, DatabaseCounts, GAME_SESSIONS,
        GAME_STATISTICS, GAMES, GLOBAL_STATISTICS, GLOBAL_STATS_ID, Game, GameSession,
        GameSessionPatch, GameStats, GameStatsPatch, GlobalCounter, GlobalStats,
        NewAnonymousUser, NewGame, NewGameSession, NewGameStats, SessionStatus, Snapshot,
    },
    storage::{StorageError, StorageResult},
    timestamp::now_iso,
};

const CREATED_AT: &str = "createdAt";
const LAST_UPDATED_AT: &str = "lastUpdatedAt";
const LAST_ACTIVE_AT: &str = "lastActiveAt";
const GAMES_PLAYED: &str = "gamesPlayed";
const STATUS: &str = "status";

/// Entry point for every persistence operation of the service.
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn DocumentStore>,
}

impl Repository {
    /// Wrap a backend.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Underlying backend, for health checks and raw access.
    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    async fn create<T: Serialize>(
        &self,
        collection: &str,
        payload: &T,
        stamps: &[&str],
    ) -> StorageResult<DocumentRef> {
        let fields = stamped(to_fields(collection, payload)?, stamps);
        self.store.add(collection, fields).await
    }

    async fn snapshot<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: &str,
    ) -> StorageResult<Snapshot<T>> {
        let data = self
            .store
            .get(collection, id)
            .await?
            .map(|document| decode(collection, document))
            .transpose()?;
        Ok(Snapshot {
            id: id.to_owned(),
            data,
        })
    }

    async fn patch<T: Serialize>(
        &self,
        collection: &str,
        id: &str,
        patch: &T,
        stamp: &str,
    ) -> StorageResult<()> {
        let fields = stamped(to_fields(collection, patch)?, &[stamp]);
        self.store
            .update(collection, id, FieldUpdate::merge(fields))
            .await
    }

    fn decode_all<T: DeserializeOwned>(
        collection: &str,
        documents: Vec<RawDocument>,
    ) -> StorageResult<Vec<T>> {
        documents
            .into_iter()
            .map(|document| decode(collection, document))
            .collect()
    }

    /// Atomically add `delta` to a numeric field.
    pub async fn increment_counter(
        &self,
        collection: &str,
        id: &str,
        field: &str,
        delta: i64,
    ) -> StorageResult<()> {
        self.store
            .update(collection, id, FieldUpdate::default().with_increment(field, delta))
            .await
    }

    /// Documents of `collection` whose `field` equals `value`.
    pub async fn query_by_equality<T: DeserializeOwned>(
        &self,
        collection: &str,
        field: &str,
        value: Value,
    ) -> StorageResult<Vec<T>> {
        let documents = self.store.query_eq(collection, field, value).await?;
        Self::decode_all(collection, documents)
    }

    // games

    /// Create a catalog entry under a generated key.
    pub async fn create_game(&self, game: &NewGame) -> StorageResult<DocumentRef> {
        self.create(GAMES, game, &[CREATED_AT, LAST_UPDATED_AT]).await
    }

    /// Read a catalog entry.
    pub async fn get_game(&self, uid: &str) -> StorageResult<Snapshot<Game>> {
        self.snapshot(GAMES, uid).await
    }

    /// Every catalog entry, active or not.
    pub async fn list_games(&self) -> StorageResult<Vec<Game>> {
        Self::decode_all(GAMES, self.store.list(GAMES).await?)
    }

    /// Catalog entries flagged active.
    pub async fn list_active_games(&self) -> StorageResult<Vec<Game>> {
        self.query_by_equality(GAMES, "isActive", Value::Bool(true))
            .await
    }

    // game sessions

    /// Create a session under a generated key.
    pub async fn create_game_session(&self, session: &NewGameSession) -> StorageResult<DocumentRef> {
        self.create(GAME_SESSIONS, session, &[CREATED_AT, LAST_UPDATED_AT])
            .await
    }

    /// Read a session.
    pub async fn get_game_session(&self, uid: &str) -> StorageResult<Snapshot<GameSession>> {
        self.snapshot(GAME_SESSIONS, uid).await
    }

    /// Merge `patch` into a session regardless of its status.
    pub async fn update_game_session(&self, uid: &str, patch: &GameSessionPatch) -> StorageResult<()> {
        self.patch(GAME_SESSIONS, uid, patch, LAST_UPDATED_AT).await
    }

    /// Merge `patch` only if the stored session is still STARTED.
    ///
    /// Fails with [`StorageError::PreconditionFailed`] when another writer finished it first.
    pub async fn finish_game_session(&self, uid: &str, patch: &GameSessionPatch) -> StorageResult<()> {
        let started = serde_json::to_value(SessionStatus::Started).map_err(|source| {
            StorageError::Encode {
                collection: GAME_SESSIONS.to_owned(),
                source,
            }
        })?;
        let fields = stamped(to_fields(GAME_SESSIONS, patch)?, &[LAST_UPDATED_AT]);
        let update = FieldUpdate::merge(fields).when_equals(STATUS, started);
        self.store.update(GAME_SESSIONS, uid, update).await
    }

    /// Sessions owned by `user_uid`.
    pub async fn list_user_game_sessions(&self, user_uid: &str) -> StorageResult<Vec<GameSession>> {
        self.query_by_equality(
            GAME_SESSIONS,
            "anonymousUserUid",
            Value::String(user_uid.to_owned()),
        )
        .await
    }

    // anonymous users

    /// Create a user under a generated key.
    pub async fn create_anonymous_user(&self, user: &NewAnonymousUser) -> StorageResult<DocumentRef> {
        self.create(ANONYMOUS_USERS, user, &[CREATED_AT]).await
    }

    /// Create a user keyed by the identity provider's subject id.
    ///
    /// Returns `None` without touching the stored user when the key is already taken.
    pub async fn create_anonymous_user_with_id(
        &self,
        user_id: &str,
    ) -> StorageResult<Option<DocumentRef>> {
        let user = NewAnonymousUser {
            games_played: 0,
            last_active_at: now_iso(),
        };
        let fields = stamped(to_fields(ANONYMOUS_USERS, &user)?, &[CREATED_AT]);
        let created = self.store.create(ANONYMOUS_USERS, user_id, fields).await?;
        Ok(created.then(|| DocumentRef::new(ANONYMOUS_USERS, user_id)))
    }

    /// Read a user.
    pub async fn get_anonymous_user(&self, user_id: &str) -> StorageResult<Snapshot<AnonymousUser>> {
        self.snapshot(ANONYMOUS_USERS, user_id).await
    }

    /// Merge `patch`; `lastActiveAt` is always refreshed.
    pub async fn update_anonymous_user(
        &self,
        user_id: &str,
        patch: &AnonymousUserPatch,
    ) -> StorageResult<()> {
        self.patch(ANONYMOUS_USERS, user_id, patch, LAST_ACTIVE_AT)
            .await
    }

    /// Add one to `gamesPlayed` and refresh `lastActiveAt` in one write.
    pub async fn increment_user_games_played(&self, user_id: &str) -> StorageResult<()> {
        let update = FieldUpdate::default()
            .with_field(LAST_ACTIVE_AT, now_iso())
            .with_increment(GAMES_PLAYED, 1);
        self.store.update(ANONYMOUS_USERS, user_id, update).await
    }

    // game statistics

    /// Create a per-game statistics document.
    pub async fn create_game_stats(&self, stats: &NewGameStats) -> StorageResult<DocumentRef> {
        self.create(GAME_STATISTICS, stats, &[LAST_UPDATED_AT]).await
    }

    /// Read per-game statistics.
    pub async fn get_game_stats(&self, uid: &str) -> StorageResult<Snapshot<GameStats>> {
        self.snapshot(GAME_STATISTICS, uid).await
    }

    /// Merge `patch` into per-game statistics.
    pub async fn update_game_stats(&self, uid: &str, patch: &GameStatsPatch) -> StorageResult<()> {
        self.patch(GAME_STATISTICS, uid, patch, LAST_UPDATED_AT).await
    }

    /// Statistics of every game.
    pub async fn list_game_stats(&self) -> StorageResult<Vec<GameStats>> {
        Self::decode_all(GAME_STATISTICS, self.store.list(GAME_STATISTICS).await?)
    }

    // global statistics

    /// Read the global singleton.
    pub async fn get_global_stats(&self) -> StorageResult<Snapshot<GlobalStats>> {
        self.snapshot(GLOBAL_STATISTICS, GLOBAL_STATS_ID).await
    }

    /// Apply several counter increments in one atomic write.
    ///
    /// Counters never move backwards, so non-positive deltas are dropped.
    pub async fn increment_global_stats(&self, deltas: &[(GlobalCounter, i64)]) -> StorageResult<()> {
        let mut update = FieldUpdate::default().with_field(LAST_UPDATED_AT, now_iso());
        for &(counter, delta) in deltas {
            if delta > 0 {
                update = update.with_increment(counter.field(), delta);
            } else {
                warn!(counter = counter.field(), delta, "ignoring non-positive global counter delta");
            }
        }
        self.store
            .update(GLOBAL_STATISTICS, GLOBAL_STATS_ID, update)
            .await
    }

    /// Overwrite the global singleton with zeroed counters.
    pub async fn initialize_global_stats(&self) -> StorageResult<DocumentRef> {
        let stats = GlobalStats {
            total_games_played: 0,
            total_players: 0,
            total_matches: 0,
            last_updated_at: now_iso(),
        };
        let fields = to_fields(GLOBAL_STATISTICS, &stats)?;
        self.store
            .set(GLOBAL_STATISTICS, GLOBAL_STATS_ID, fields)
            .await
    }

    /// Document counts of the four main collections.
    pub async fn database_counts(&self) -> StorageResult<DatabaseCounts> {
        let (games, sessions, users, stats) = futures::try_join!(
            self.store.list(GAMES),
            self.store.list(GAME_SESSIONS),
            self.store.list(ANONYMOUS_USERS),
            self.store.list(GAME_STATISTICS),
        )?;
        Ok(DatabaseCounts {
            total_games: games.len(),
            total_sessions: sessions.len(),
            total_users: users.len(),
            total_game_stats: stats.len(),
        })
    }
}

fn stamped(mut fields: Fields, stamps: &[&str]) -> Fields {
    let now = now_iso();
    for stamp in stamps {
        fields.insert((*stamp).to_owned(), Value::String(now.clone()));
    }
    fields
}
