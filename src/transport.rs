//! Authenticated HTTP transport shared by the catalog and process clients.
use crate::auth::Token;
use crate::error::TransportError;
use reqwest::header::ACCEPT;
use serde_json::Value;
use std::time::Duration;
use url::Url;

const MAX_ERROR_BODY: usize = 512;

pub trait Transport {
    /// POSTs `body` as JSON and returns the raw response payload of a 2xx response.
    async fn post_json(self: &Self, url: &Url, body: &Value, accept: &str)
        -> Result<Vec<u8>, TransportError>;
}

/// A bearer-token session handed out by the authenticator. It carries a copy of the
/// access token and never refreshes it.
#[derive(Clone)]
pub struct AuthenticatedSession {
    http: reqwest::Client,
    access_token: String,
}

impl std::fmt::Debug for AuthenticatedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticatedSession").finish_non_exhaustive()
    }
}

impl AuthenticatedSession {
    pub fn new(http: reqwest::Client, token: &Token) -> Self {
        Self {
            http,
            access_token: token.access_token.clone(),
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

impl Transport for AuthenticatedSession {
    async fn post_json(
        self: &Self,
        url: &Url,
        body: &Value,
        accept: &str,
    ) -> Result<Vec<u8>, TransportError> {
        let response = self
            .http
            .post(url.clone())
            .bearer_auth(&self.access_token)
            .header(ACCEPT, accept)
            .json(body)
            .send()
            .await?;
        let response = check_status(response).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder().timeout(timeout).build()
}

/// Turns a non-2xx response into `TransportError::Status`, keeping the start of the body
/// for diagnostics.
pub async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::Status {
        status: status.as_u16(),
        body: body.chars().take(MAX_ERROR_BODY).collect(),
    })
}
