//! OAuth2 client-credentials authentication against the Copernicus identity service.
mod token_store;
pub use token_store::TokenStore;

use crate::error::{AuthError, TransportError};
use crate::secrets::ClientCredentials;
use crate::transport::{self, AuthenticatedSession};
use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{error, info, instrument};
use url::Url;

/// Seconds before `expires_at` at which a token is already treated as expired.
pub const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Deserialize, Serialize, Clone, PartialEq)]
pub struct Token {
    pub access_token: String,
    #[serde(deserialize_with = "epoch_seconds")]
    pub expires_at: i64,
    /// Everything else the identity service returned, kept verbatim.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl std::fmt::Debug for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Token")
            .field("expires_at", &self.expires_at)
            .finish_non_exhaustive()
    }
}

fn epoch_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    let n = serde_json::Number::deserialize(deserializer)?;
    n.as_i64()
        .or_else(|| n.as_f64().map(|f| f.floor() as i64))
        .ok_or_else(|| D::Error::custom("expires_at is out of range"))
}

impl Token {
    pub fn new(access_token: &str, expires_at: i64) -> Self {
        Self {
            access_token: access_token.to_string(),
            expires_at,
            extra: Map::new(),
        }
    }

    /// Builds a token from a raw token-endpoint response. `expires_at` is derived from
    /// `expires_in` when the response does not carry it.
    pub fn from_response(mut body: Map<String, Value>, now: DateTime<Utc>) -> Result<Self, AuthError> {
        if !body.contains_key("expires_at") {
            let expires_in = body
                .get("expires_in")
                .and_then(Value::as_i64)
                .ok_or_else(|| AuthError::InvalidToken("missing expires_in".to_string()))?;
            body.insert(
                "expires_at".to_string(),
                Value::from(now.timestamp() + expires_in),
            );
        }
        serde_json::from_value(Value::Object(body))
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp() >= self.expires_at - EXPIRY_MARGIN_SECS
    }
}

pub trait TokenEndpoint {
    async fn exchange(self: &Self, credentials: &ClientCredentials) -> Result<Token, AuthError>;
}

/// Client-credentials grant over HTTP.
pub struct OAuthClient {
    http: reqwest::Client,
    token_url: Url,
}

impl OAuthClient {
    pub fn new(http: reqwest::Client, token_url: Url) -> Self {
        Self { http, token_url }
    }
}

impl TokenEndpoint for OAuthClient {
    #[instrument(skip_all, fields(token_url = %self.token_url))]
    async fn exchange(self: &Self, credentials: &ClientCredentials) -> Result<Token, AuthError> {
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", credentials.client_id.as_str()),
            ("client_secret", credentials.client_secret.as_str()),
        ];
        let response = self
            .http
            .post(self.token_url.clone())
            .form(&form)
            .send()
            .await
            .map_err(TransportError::from)?;
        let response = transport::check_status(response).await?;
        let body: Map<String, Value> = response.json().await.map_err(TransportError::from)?;
        Token::from_response(body, Utc::now())
    }
}

/// Owns the token lifecycle: reuse the cached token while it is valid, otherwise
/// exchange the client credentials for a new one and cache it.
pub struct Authenticator<E = OAuthClient> {
    credentials: ClientCredentials,
    store: TokenStore,
    endpoint: E,
    http: reqwest::Client,
}

impl<E: TokenEndpoint> Authenticator<E> {
    pub fn new(
        credentials: ClientCredentials,
        store: TokenStore,
        endpoint: E,
        http: reqwest::Client,
    ) -> Self {
        Self {
            credentials,
            store,
            endpoint,
            http,
        }
    }

    pub async fn authenticate(&self) -> Result<(Token, AuthenticatedSession), AuthError> {
        let token = self.token_at(Utc::now()).await?;
        let session = AuthenticatedSession::new(self.http.clone(), &token);
        Ok((token, session))
    }

    pub async fn token_at(&self, now: DateTime<Utc>) -> Result<Token, AuthError> {
        if let Some(token) = self.store.load()? {
            if !token.is_expired(now) {
                info!(path = %self.store.path().display(), "Using existing token from file");
                return Ok(token);
            }
        }

        info!("Fetching new token");
        let token = match self.endpoint.exchange(&self.credentials).await {
            Ok(token) => token,
            Err(e) => {
                error!(error = %e, "Failed to fetch token");
                return Err(e);
            }
        };
        self.store.save(&token)?;
        Ok(token)
    }
}
