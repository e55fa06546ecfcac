use std::sync::Arc;

use reqwest::{Client, RequestBuilder, Url, cookie::Jar};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;

use crate::{
    dao::models::{AnonymousUser, Game},
    dto::{
        catalog::GamesResponse,
        user::{MessageResponse, UserResponse},
    },
};

use super::{credentials::CookieCredentials, error::ClientError};

/// Answer of [`ApiClient::upsert_user`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum UpsertReply {
    /// The user already existed.
    Updated {
        /// Server acknowledgement.
        message: String,
        /// User after the refresh.
        user: AnonymousUser,
    },
    /// The user was created.
    Created {
        /// Server acknowledgement.
        message: String,
        /// Key of the new user.
        #[serde(rename = "userId")]
        user_id: String,
    },
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Typed client for the user and catalog routes.
///
/// Requests carry the cookies of the client's jar, including the bearer token
/// written through [`ApiClient::credentials`].
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
    jar: Arc<Jar>,
}

impl ApiClient {
    /// Client for the backend at `base_url`, with its own cookie jar.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = Url::parse(base_url).map_err(|err| ClientError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: err.to_string(),
        })?;
        let jar = Arc::new(Jar::default());
        let client = Client::builder()
            .cookie_provider(jar.clone())
            .build()
            .map_err(|source| ClientError::ClientBuilder { source })?;
        Ok(Self {
            client,
            base_url,
            jar,
        })
    }

    /// Credential store writing into this client's cookie jar.
    pub fn credentials(&self) -> CookieCredentials {
        CookieCredentials::new(self.jar.clone(), self.base_url.clone())
    }

    /// `POST /api/auth/user`.
    pub async fn upsert_user(&self, user_id: &str) -> Result<UpsertReply, ClientError> {
        let path = "/api/auth/user";
        let builder = self
            .client
            .post(self.url(path)?)
            .json(&json!({ "userId": user_id }));
        self.send(path, builder).await
    }

    /// `GET /api/auth/user`.
    pub async fn get_user(&self, user_id: &str) -> Result<AnonymousUser, ClientError> {
        let path = "/api/auth/user";
        let builder = self.client.get(self.url(path)?).query(&[("userId", user_id)]);
        let body: UserResponse = self.send(path, builder).await?;
        Ok(body.user)
    }

    /// `POST /api/auth/user/increment-games`; returns the server message.
    pub async fn increment_games_played(&self, user_id: &str) -> Result<String, ClientError> {
        let path = "/api/auth/user/increment-games";
        let builder = self
            .client
            .post(self.url(path)?)
            .json(&json!({ "userId": user_id }));
        let body: MessageResponse = self.send(path, builder).await?;
        Ok(body.message)
    }

    /// `GET /api/games`, optionally active games only.
    pub async fn list_games(&self, active_only: bool) -> Result<Vec<Game>, ClientError> {
        let path = "/api/games";
        let mut builder = self.client.get(self.url(path)?);
        if active_only {
            builder = builder.query(&[("active", "true")]);
        }
        let body: GamesResponse = self.send(path, builder).await?;
        Ok(body.games)
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|err| ClientError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: err.to_string(),
            })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        path: &str,
        builder: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = builder.send().await.map_err(|source| ClientError::Request {
            path: path.to_owned(),
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorBody>().await {
                Ok(body) => body.error,
                Err(_) => status.canonical_reason().unwrap_or("unknown error").to_owned(),
            };
            return Err(ClientError::Status {
                path: path.to_owned(),
                status,
                message,
            });
        }
        response.json::<T>().await.map_err(|source| ClientError::Decode {
            path: path.to_owned(),
            source,
        })
    }
}
