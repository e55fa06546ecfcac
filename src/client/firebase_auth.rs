//! Anonymous identities from Firebase Authentication over its REST API.

use std::{env, sync::Arc};

use futures::future::BoxFuture;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use time::{Duration, OffsetDateTime};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info};

use super::{
    error::AuthError,
    identity::{AuthStateChange, Identity, IdentityProvider},
};

const IDENTITY_TOOLKIT: &str = "identitytoolkit.googleapis.com/v1";
const SECURE_TOKEN: &str = "securetoken.googleapis.com/v1";
const SIGN_UP: &str = "accounts:signUp";
const REFRESH: &str = "token";
/// Tokens this close to expiry are refreshed before use.
const REFRESH_MARGIN: Duration = Duration::seconds(60);

/// Where and how to reach the identity service.
#[derive(Debug, Clone)]
pub struct FirebaseAuthConfig {
    /// Web API key of the project.
    pub api_key: String,
    /// `host:port` of the Auth emulator; production endpoints otherwise.
    pub emulator_host: Option<String>,
}

impl FirebaseAuthConfig {
    /// Production endpoints with `api_key`.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            emulator_host: None,
        }
    }

    /// Route every call to the Auth emulator at `host`.
    pub fn with_emulator(mut self, host: impl Into<String>) -> Self {
        self.emulator_host = Some(host.into());
        self
    }

    /// Read `FIREBASE_API_KEY` and the optional `FIREBASE_AUTH_EMULATOR_HOST`.
    pub fn from_env() -> Result<Self, AuthError> {
        let api_key = env::var("FIREBASE_API_KEY").map_err(|_| AuthError::MissingEnvVar {
            var: "FIREBASE_API_KEY",
        })?;
        let config = Self::new(api_key);
        Ok(match env::var("FIREBASE_AUTH_EMULATOR_HOST") {
            Ok(host) if !host.trim().is_empty() => config.with_emulator(host.trim()),
            _ => config,
        })
    }

    fn service_root(&self, service: &str) -> String {
        match self.emulator_host.as_deref() {
            Some(host) if host.starts_with("http://") || host.starts_with("https://") => {
                format!("{}/{service}", host.trim_end_matches('/'))
            }
            Some(host) => format!("http://{host}/{service}"),
            None => format!("https://{service}"),
        }
    }

    fn sign_up_url(&self) -> String {
        format!("{}/{SIGN_UP}", self.service_root(IDENTITY_TOOLKIT))
    }

    fn refresh_url(&self) -> String {
        format!("{}/{REFRESH}", self.service_root(SECURE_TOKEN))
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignUpResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    local_id: String,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    user_id: String,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

struct TokenSet {
    identity: Identity,
    id_token: String,
    refresh_token: String,
    expires_at: OffsetDateTime,
}

impl TokenSet {
    fn new(
        uid: String,
        id_token: String,
        refresh_token: String,
        expires_in: &str,
    ) -> Result<Self, AuthError> {
        let seconds = expires_in
            .parse::<i64>()
            .map_err(|_| AuthError::InvalidExpiry {
                value: expires_in.to_owned(),
            })?;
        Ok(Self {
            identity: Identity {
                uid,
                is_anonymous: true,
            },
            id_token,
            refresh_token,
            expires_at: OffsetDateTime::now_utc() + Duration::seconds(seconds),
        })
    }

    fn is_fresh(&self) -> bool {
        self.expires_at - REFRESH_MARGIN > OffsetDateTime::now_utc()
    }
}

struct ProviderInner {
    client: Client,
    config: FirebaseAuthConfig,
    session: Mutex<Option<TokenSet>>,
    changes: watch::Sender<AuthStateChange>,
}

/// [`IdentityProvider`] backed by Firebase Authentication.
///
/// A fresh provider has no identity and reports `Resolved(None)`; call
/// [`FirebaseAuthProvider::restore`] with a persisted refresh token to resume a session.
#[derive(Clone)]
pub struct FirebaseAuthProvider {
    inner: Arc<ProviderInner>,
}

impl FirebaseAuthProvider {
    /// Provider with a fresh HTTP client.
    pub fn new(config: FirebaseAuthConfig) -> Result<Self, AuthError> {
        let client = Client::builder()
            .build()
            .map_err(|source| AuthError::ClientBuilder { source })?;
        Ok(Self::with_client(client, config))
    }

    /// Provider sharing an existing HTTP client.
    pub fn with_client(client: Client, config: FirebaseAuthConfig) -> Self {
        let (changes, _rx) = watch::channel(AuthStateChange::Resolved(None));
        Self {
            inner: Arc::new(ProviderInner {
                client,
                config,
                session: Mutex::new(None),
                changes,
            }),
        }
    }

    /// Resume the identity owning `refresh_token` and make it current.
    pub async fn restore(&self, refresh_token: &str) -> Result<Identity, AuthError> {
        let tokens = self.inner.refresh(refresh_token).await?;
        let identity = tokens.identity.clone();
        *self.inner.session.lock().await = Some(tokens);
        info!(uid = %identity.uid, "restored identity session");
        self.inner.publish(Some(identity.clone()));
        Ok(identity)
    }

    /// Refresh token of the current identity, for persistence between runs.
    pub async fn refresh_token(&self) -> Option<String> {
        self.inner
            .session
            .lock()
            .await
            .as_ref()
            .map(|tokens| tokens.refresh_token.clone())
    }
}

impl ProviderInner {
    fn publish(&self, identity: Option<Identity>) {
        self.changes.send_replace(AuthStateChange::Resolved(identity));
    }

    fn keyed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.query(&[("key", self.config.api_key.as_str())])
    }

    async fn send<T: DeserializeOwned>(
        &self,
        endpoint: &'static str,
        builder: RequestBuilder,
    ) -> Result<T, AuthError> {
        let response = builder
            .send()
            .await
            .map_err(|source| AuthError::Request { endpoint, source })?;
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorEnvelope>().await {
                Ok(envelope) => envelope.error.message,
                Err(_) => status.canonical_reason().unwrap_or("unknown error").to_owned(),
            };
            debug!(endpoint, %status, %message, "identity request rejected");
            return Err(AuthError::Rejected {
                endpoint,
                status,
                message,
            });
        }
        response
            .json::<T>()
            .await
            .map_err(|source| AuthError::Decode { endpoint, source })
    }

    async fn sign_up(&self) -> Result<Identity, AuthError> {
        let builder = self
            .keyed(self.client.post(self.config.sign_up_url()))
            .json(&json!({ "returnSecureToken": true }));
        let body: SignUpResponse = self.send(SIGN_UP, builder).await?;
        let tokens = TokenSet::new(
            body.local_id,
            body.id_token,
            body.refresh_token,
            &body.expires_in,
        )?;
        let identity = tokens.identity.clone();
        *self.session.lock().await = Some(tokens);
        info!(uid = %identity.uid, "signed in anonymously");
        self.publish(Some(identity.clone()));
        Ok(identity)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenSet, AuthError> {
        let builder = self
            .keyed(self.client.post(self.config.refresh_url()))
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ]);
        let body: RefreshResponse = self.send(REFRESH, builder).await?;
        TokenSet::new(
            body.user_id,
            body.id_token,
            body.refresh_token,
            &body.expires_in,
        )
    }

    async fn token_for(&self, uid: &str) -> Result<String, AuthError> {
        let mut session = self.session.lock().await;
        let current = session
            .as_ref()
            .filter(|tokens| tokens.identity.uid == uid)
            .ok_or(AuthError::NotSignedIn)?;
        if current.is_fresh() {
            return Ok(current.id_token.clone());
        }

        debug!(uid, "refreshing id token");
        let refreshed = self.refresh(&current.refresh_token).await?;
        let token = refreshed.id_token.clone();
        *session = Some(refreshed);
        Ok(token)
    }
}

impl IdentityProvider for FirebaseAuthProvider {
    fn current_identity(&self) -> Option<Identity> {
        match &*self.inner.changes.borrow() {
            AuthStateChange::Resolved(identity) => identity.clone(),
            AuthStateChange::Pending => None,
        }
    }

    fn subscribe(&self) -> watch::Receiver<AuthStateChange> {
        self.inner.changes.subscribe()
    }

    fn sign_in_anonymously(&self) -> BoxFuture<'static, Result<Identity, AuthError>> {
        let inner = self.inner.clone();
        Box::pin(async move { inner.sign_up().await })
    }

    fn id_token(&self, identity: &Identity) -> BoxFuture<'static, Result<String, AuthError>> {
        let inner = self.inner.clone();
        let uid = identity.uid.clone();
        Box::pin(async move { inner.token_for(&uid).await })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use axum::{
        Form, Json, Router,
        http::StatusCode,
        routing::post,
    };
    use serde_json::{Value, json};
    use tokio::net::TcpListener;

    use super::*;

    /// Minimal stand-in for the Auth emulator. Sign-up tokens expire inside the refresh margin.
    async fn spawn_emulator() -> String {
        let app = Router::new()
            .route(
                "/identitytoolkit.googleapis.com/v1/accounts:signUp",
                post(|| async {
                    Json(json!({
                        "idToken": "id-1",
                        "refreshToken": "refresh-1",
                        "expiresIn": "30",
                        "localId": "anon-1"
                    }))
                }),
            )
            .route(
                "/securetoken.googleapis.com/v1/token",
                post(|Form(form): Form<HashMap<String, String>>| async move {
                    if form.get("refresh_token").map(String::as_str) == Some("refresh-1") {
                        Ok(Json(json!({
                            "id_token": "id-2",
                            "refresh_token": "refresh-2",
                            "expires_in": "3600",
                            "user_id": "anon-1"
                        })))
                    } else {
                        Err((
                            StatusCode::BAD_REQUEST,
                            Json::<Value>(json!({"error": {"message": "INVALID_REFRESH_TOKEN"}})),
                        ))
                    }
                }),
            );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        addr.to_string()
    }

    async fn provider() -> FirebaseAuthProvider {
        let host = spawn_emulator().await;
        FirebaseAuthProvider::new(FirebaseAuthConfig::new("test-key").with_emulator(host)).unwrap()
    }

    #[test]
    fn urls_follow_emulator_override() {
        let production = FirebaseAuthConfig::new("k");
        assert_eq!(
            production.sign_up_url(),
            "https://identitytoolkit.googleapis.com/v1/accounts:signUp"
        );
        let emulator = FirebaseAuthConfig::new("k").with_emulator("localhost:9099");
        assert_eq!(
            emulator.refresh_url(),
            "http://localhost:9099/securetoken.googleapis.com/v1/token"
        );
    }

    #[tokio::test]
    async fn sign_in_publishes_identity_and_refreshes_short_lived_token() {
        let provider = provider().await;
        let mut changes = provider.subscribe();
        assert_eq!(*changes.borrow_and_update(), AuthStateChange::Resolved(None));

        let identity = provider.sign_in_anonymously().await.unwrap();
        assert_eq!(identity.uid, "anon-1");
        assert!(identity.is_anonymous);
        assert!(changes.has_changed().unwrap());
        assert_eq!(provider.current_identity(), Some(identity.clone()));

        assert_eq!(provider.id_token(&identity).await.unwrap(), "id-2");
        assert_eq!(provider.refresh_token().await.as_deref(), Some("refresh-2"));
    }

    #[tokio::test]
    async fn restore_resumes_persisted_session() {
        let provider = provider().await;
        let identity = provider.restore("refresh-1").await.unwrap();
        assert_eq!(identity.uid, "anon-1");
        assert_eq!(provider.id_token(&identity).await.unwrap(), "id-2");
    }

    #[tokio::test]
    async fn rejected_restore_keeps_no_identity() {
        let provider = provider().await;
        let err = provider.restore("stale").await.unwrap_err();
        assert!(matches!(
            err,
            AuthError::Rejected { ref message, .. } if message == "INVALID_REFRESH_TOKEN"
        ));
        assert_eq!(provider.current_identity(), None);
    }

    #[tokio::test]
    async fn token_for_unknown_identity_is_refused() {
        let provider = provider().await;
        let stranger = Identity {
            uid: "someone".into(),
            is_anonymous: true,
        };
        assert!(matches!(
            provider.id_token(&stranger).await,
            Err(AuthError::NotSignedIn)
        ));
    }
}
