use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server responded with status {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Error, Debug)]
pub enum CredentialError {
    #[error("Failed to load {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to load {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("token exchange failed: {0}")]
    Exchange(#[from] TransportError),
    #[error("token endpoint returned an unusable response: {0}")]
    InvalidToken(String),
    #[error("unable to access token cache {}: {source}", path.display())]
    Cache {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("unable to serialize token: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("catalog request for page {page} failed: {source}")]
    Transport {
        page: usize,
        source: TransportError,
    },
    #[error("unable to decode catalog page {page}: {source}")]
    Decode {
        page: usize,
        source: serde_json::Error,
    },
    #[error("catalog returned cursor {cursor} a second time on page {page}")]
    RepeatedCursor { page: usize, cursor: String },
    #[error("catalog pagination exceeded {max_pages} pages")]
    PageLimit { max_pages: usize },
}

#[derive(Error, Debug)]
pub enum PersistError {
    #[error("object store {operation} failed for {bucket}/{key}: {source}")]
    ObjectStore {
        operation: &'static str,
        bucket: String,
        key: String,
        source: BoxError,
    },
    #[error("metadata store error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("metadata store error: {0}")]
    Other(String),
}

/// Failure of a single timestamp. Never aborts the run.
#[derive(Error, Debug)]
pub enum ItemError {
    #[error("image fetch failed: {0}")]
    Fetch(#[from] TransportError),
    #[error("unparseable acquisition timestamp {timestamp:?}: {source}")]
    Timestamp {
        timestamp: String,
        source: chrono::ParseError,
    },
    #[error("blob upload failed: {0}")]
    Blob(PersistError),
    #[error("metadata insert failed: {0}")]
    Metadata(PersistError),
}

#[derive(Error, Debug, PartialEq)]
#[error("a window of {n_days} days before {end} is outside the supported date range")]
pub struct WindowError {
    pub n_days: u32,
    pub end: DateTime<Utc>,
}

/// Failure that aborts the whole run.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Credentials(#[from] CredentialError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error("unable to build http client: {0}")]
    Client(reqwest::Error),
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("bounding box coordinates must be finite")]
    NonFinite,
    #[error("bounding box min_{axis} ({min}) is greater than max_{axis} ({max})")]
    Inverted {
        axis: &'static str,
        min: f64,
        max: f64,
    },
    #[error("{0} must be greater than zero")]
    Zero(&'static str),
    #[error("location name must not be empty")]
    EmptyLocation,
}
