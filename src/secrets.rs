//! Credential files kept in the secrets directory.
use crate::error::CredentialError;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;

const SENTINEL_HUB_FILE: &str = "sentinelhub_credentials.json";
const OBJECT_STORE_FILE: &str = "minio_credentials.json";
const DATABASE_FILE: &str = "pg_credentials.json";

#[derive(Deserialize, Clone)]
pub struct ClientCredentials {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Deserialize, Clone)]
pub struct ObjectStoreCredentials {
    pub endpoint: String,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Deserialize, Clone)]
pub struct DatabaseCredentials {
    pub hostname: String,
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for ObjectStoreCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreCredentials")
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key)
            .finish_non_exhaustive()
    }
}

impl std::fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseCredentials")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

pub struct Secrets {
    dir: PathBuf,
}

impl Secrets {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn load_json<T: DeserializeOwned>(&self, file_name: &str) -> Result<T, CredentialError> {
        let path = self.dir.join(file_name);
        let content = fs::read_to_string(&path).map_err(|source| CredentialError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| CredentialError::Parse { path, source })
    }

    pub fn sentinel_hub(&self) -> Result<ClientCredentials, CredentialError> {
        self.load_json(SENTINEL_HUB_FILE)
    }

    pub fn object_store(&self) -> Result<ObjectStoreCredentials, CredentialError> {
        self.load_json(OBJECT_STORE_FILE)
    }

    pub fn database(&self) -> Result<DatabaseCredentials, CredentialError> {
        self.load_json(DATABASE_FILE)
    }
}
