//! The two sinks every downloaded image is written to.
use crate::error::PersistError;
use crate::model::ImageRecord;
use crate::window;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A row with the same acquisition timestamp and bounding box is already stored.
    AlreadyExists,
}

pub trait BlobStore {
    /// Creates `bucket` when missing, then writes `bytes` under `key`, replacing any
    /// existing object.
    async fn put_blob(
        self: &Self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PersistError>;
}

pub trait MetadataStore {
    async fn insert_metadata(self: &Self, record: &ImageRecord) -> Result<InsertOutcome, PersistError>;
}

/// `<compact timestamp>_<location>.tiff`; the same acquisition always maps to the same key.
pub fn storage_key(acquired: &DateTime<Utc>, location_name: &str) -> String {
    format!("{}_{}.tiff", window::to_compact(acquired), location_name)
}
