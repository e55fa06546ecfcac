use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{
    config::{CredentialSource, ServiceAccount},
    error::{FirestoreError, FirestoreResult},
};

const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";
const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const EMULATOR_TOKEN: &str = "owner";
const TOKEN_LIFETIME: Duration = Duration::from_secs(3600);
const REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    sub: &'a str,
    aud: &'a str,
    scope: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    value: String,
    expires_at: u64,
}

/// Produces bearer tokens for Firestore requests.
///
/// Service account tokens are cached until shortly before they expire.
pub struct TokenSource {
    client: Client,
    credentials: CredentialSource,
    cache: RwLock<Option<CachedToken>>,
}

impl TokenSource {
    /// Token source using `client` for the OAuth exchange.
    pub fn new(client: Client, credentials: CredentialSource) -> Self {
        Self {
            client,
            credentials,
            cache: RwLock::new(None),
        }
    }

    /// Return a valid bearer token, minting a new one when needed.
    pub async fn bearer(&self) -> FirestoreResult<String> {
        let account = match &self.credentials {
            CredentialSource::Ambient => return Ok(EMULATOR_TOKEN.to_owned()),
            CredentialSource::ServiceAccount(account) => account,
        };

        let now = unix_now();
        if let Some(cached) = self.cache.read().await.as_ref()
            && cached.expires_at > now + REFRESH_MARGIN.as_secs()
        {
            return Ok(cached.value.clone());
        }

        let mut cache = self.cache.write().await;
        if let Some(cached) = cache.as_ref()
            && cached.expires_at > now + REFRESH_MARGIN.as_secs()
        {
            return Ok(cached.value.clone());
        }

        let response = self.exchange(account, now).await?;
        let lifetime = response
            .expires_in
            .unwrap_or_else(|| TOKEN_LIFETIME.as_secs());
        debug!(expires_in = lifetime, "minted Firestore access token");
        *cache = Some(CachedToken {
            value: response.access_token.clone(),
            expires_at: now + lifetime,
        });
        Ok(response.access_token)
    }

    /// Drop any cached token so the next request mints a fresh one.
    pub async fn invalidate(&self) {
        self.cache.write().await.take();
    }

    async fn exchange(&self, account: &ServiceAccount, now: u64) -> FirestoreResult<TokenResponse> {
        let claims = AssertionClaims {
            iss: &account.client_email,
            sub: &account.client_email,
            aud: TOKEN_ENDPOINT,
            scope: DATASTORE_SCOPE,
            iat: now,
            exp: now + TOKEN_LIFETIME.as_secs(),
        };
        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|source| FirestoreError::Signing { source })?;
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|source| FirestoreError::Signing { source })?;

        let response = self
            .client
            .post(TOKEN_ENDPOINT)
            .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", &assertion)])
            .send()
            .await
            .map_err(|source| FirestoreError::TokenRequest { source })?;

        let status = response.status();
        if !status.is_success() {
            warn!(%status, "access token exchange rejected");
            return Err(FirestoreError::TokenStatus { status });
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|source| FirestoreError::TokenRequest { source })
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or_default()
}
