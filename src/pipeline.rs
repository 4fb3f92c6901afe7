//! Authenticate once, discover once, then fetch and persist every discovered timestamp,
//! isolating failures per timestamp.
use crate::auth::{Authenticator, OAuthClient, TokenEndpoint, TokenStore};
use crate::config::AcquisitionConfig;
use crate::error::{DiscoveryError, ItemError, PipelineError};
use crate::model::{DiscoveredTimestamp, ImageRecord};
use crate::persistence::{self, BlobStore, InsertOutcome, MetadataStore};
use crate::postgres::PostgresStore;
use crate::s3::ObjectStore;
use crate::secrets::Secrets;
use crate::sentinel_hub::{CatalogClient, ImageClient, IMAGE_CONTENT_TYPE};
use crate::transport::{self, Transport};
use crate::window::{self, AcquisitionWindow};
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    Stored { key: String },
    /// The blob was written but the metadata row already existed.
    AlreadyRecorded { key: String },
}

#[derive(Debug)]
pub struct ItemReport {
    pub timestamp: DiscoveredTimestamp,
    pub result: Result<ItemOutcome, ItemError>,
}

/// Per-item results of one run, in discovery order.
#[derive(Debug)]
pub struct RunSummary {
    pub window: AcquisitionWindow,
    pub items: Vec<ItemReport>,
}

impl RunSummary {
    pub fn attempted(&self) -> usize {
        self.items.len()
    }

    pub fn succeeded(&self) -> usize {
        self.count(|r| matches!(r, Ok(ItemOutcome::Stored { .. })))
    }

    pub fn skipped_duplicate(&self) -> usize {
        self.count(|r| matches!(r, Ok(ItemOutcome::AlreadyRecorded { .. })))
    }

    pub fn failed(&self) -> usize {
        self.count(|r| r.is_err())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &ItemError)> {
        self.items.iter().filter_map(|item| match &item.result {
            Err(e) => Some((item.timestamp.as_str(), e)),
            Ok(_) => None,
        })
    }

    fn count(&self, pred: impl Fn(&Result<ItemOutcome, ItemError>) -> bool) -> usize {
        self.items.iter().filter(|item| pred(&item.result)).count()
    }
}

/// Everything after authentication: discovery, then fetch and persist per timestamp.
///
/// Only a failed discovery is an error. Item failures end up in the summary.
pub async fn acquire<T, B, M>(
    transport: &T,
    config: &AcquisitionConfig,
    window: &AcquisitionWindow,
    blobs: &B,
    metadata: &M,
) -> Result<RunSummary, DiscoveryError>
where
    T: Transport,
    B: BlobStore,
    M: MetadataStore,
{
    let catalog = CatalogClient::new(
        transport,
        config.endpoints.catalog_url.clone(),
        &config.discovery,
    );
    let images = ImageClient::new(transport, config.endpoints.process_url.clone());

    info!(location = %config.location.name, collection = %config.collection, "Discovering images");
    let timestamps = catalog
        .discover(window, &config.location.bbox, &config.collection)
        .await?;

    let images = &images;
    let items: Vec<ItemReport> = stream::iter(timestamps)
        .map(|timestamp| async move {
            let result = store_one(images, config, blobs, metadata, &timestamp).await;
            if let Err(e) = &result {
                error!(%timestamp, error = %e, "Failed to process and save image");
            }
            ItemReport { timestamp, result }
        })
        .buffered(config.pipeline.concurrency)
        .collect()
        .await;

    Ok(RunSummary {
        window: *window,
        items,
    })
}

async fn store_one<T, B, M>(
    images: &ImageClient<'_, T>,
    config: &AcquisitionConfig,
    blobs: &B,
    metadata: &M,
    timestamp: &str,
) -> Result<ItemOutcome, ItemError>
where
    T: Transport,
    B: BlobStore,
    M: MetadataStore,
{
    let acquired = window::parse_acquisition(timestamp).map_err(|source| ItemError::Timestamp {
        timestamp: timestamp.to_string(),
        source,
    })?;
    let bbox = &config.location.bbox;

    let image = images.fetch(timestamp, bbox, &config.collection).await?;

    let key = persistence::storage_key(&acquired, &config.location.name);
    blobs
        .put_blob(&config.bucket, &key, image, IMAGE_CONTENT_TYPE)
        .await
        .map_err(ItemError::Blob)?;
    info!(bucket = %config.bucket, %key, "Saved image");

    // The blob stays in place if this insert fails
    let record = ImageRecord {
        collection_id: config.collection.clone(),
        location_name: config.location.name.clone(),
        acquisition_timestamp: acquired,
        bbox: *bbox,
        storage_key: key.clone(),
    };
    match metadata
        .insert_metadata(&record)
        .await
        .map_err(ItemError::Metadata)?
    {
        InsertOutcome::Inserted => Ok(ItemOutcome::Stored { key }),
        InsertOutcome::AlreadyExists => {
            warn!(%timestamp, %key, "Skipping row: metadata already recorded");
            Ok(ItemOutcome::AlreadyRecorded { key })
        }
    }
}

pub struct AcquisitionPipeline<E = OAuthClient, B = ObjectStore, M = PostgresStore> {
    config: AcquisitionConfig,
    authenticator: Authenticator<E>,
    blobs: B,
    metadata: M,
}

impl AcquisitionPipeline {
    /// Wires the production adapters from the credential files in `config.secrets_dir`.
    pub async fn connect(config: AcquisitionConfig) -> Result<Self, PipelineError> {
        let secrets = Secrets::new(&config.secrets_dir);
        let http = transport::http_client(config.http.timeout()).map_err(PipelineError::Client)?;

        let authenticator = Authenticator::new(
            secrets.sentinel_hub()?,
            TokenStore::new(config.token_cache_path()),
            OAuthClient::new(http.clone(), config.endpoints.token_url.clone()),
            http,
        );
        let timeout = config.http.timeout();
        let blobs = ObjectStore::from_credentials(&secrets.object_store()?, timeout).await;
        let metadata = PostgresStore::connect_lazy(&secrets.database()?, &config.database, timeout);

        Ok(Self::new(config, authenticator, blobs, metadata))
    }
}

impl<E, B, M> AcquisitionPipeline<E, B, M>
where
    E: TokenEndpoint,
    B: BlobStore,
    M: MetadataStore,
{
    pub fn new(config: AcquisitionConfig, authenticator: Authenticator<E>, blobs: B, metadata: M) -> Self {
        Self {
            config,
            authenticator,
            blobs,
            metadata,
        }
    }

    /// The last `n_days` up to now.
    pub async fn run(&self, n_days: u32) -> Result<RunSummary, PipelineError> {
        self.run_window(AcquisitionWindow::last_days(n_days, Utc::now())?)
            .await
    }

    /// The last `n_days` up to the start of today (UTC).
    pub async fn run_history(&self, n_days: u32) -> Result<RunSummary, PipelineError> {
        self.run_window(AcquisitionWindow::history(n_days, Utc::now())?)
            .await
    }

    pub async fn run_window(&self, window: AcquisitionWindow) -> Result<RunSummary, PipelineError> {
        let (_token, session) = self.authenticator.authenticate().await?;
        let summary = acquire(&session, &self.config, &window, &self.blobs, &self.metadata).await?;
        Ok(summary)
    }
}
