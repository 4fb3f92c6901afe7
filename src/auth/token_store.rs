use super::Token;
use crate::error::AuthError;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

/// File-backed cache for the most recent access token.
pub struct TokenStore {
    path: PathBuf,
}

impl TokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns `None` when there is no cache file or its content is not a token.
    pub fn load(&self) -> Result<Option<Token>, AuthError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(AuthError::Cache {
                    path: self.path.clone(),
                    source,
                })
            }
        };
        match serde_json::from_str(&content) {
            Ok(token) => Ok(Some(token)),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Ignoring unreadable token cache");
                Ok(None)
            }
        }
    }

    pub fn save(&self, token: &Token) -> Result<(), AuthError> {
        let cache_err = |source: std::io::Error| AuthError::Cache {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent).map_err(cache_err)?;
            }
        }

        let content = serde_json::to_string(token)?;
        let partial = self.path.with_extension("json.partial");
        fs::write(&partial, content).map_err(cache_err)?;
        fs::rename(&partial, &self.path).map_err(cache_err)?;
        Ok(())
    }
}
