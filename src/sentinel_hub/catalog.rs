use crate::config::DiscoverySettings;
use crate::error::DiscoveryError;
use crate::model::{BoundingBox, DiscoveredTimestamp};
use crate::transport::Transport;
use crate::window::AcquisitionWindow;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use tracing::{debug, info, instrument};
use url::Url;

#[derive(Deserialize, Debug)]
struct SearchPage {
    #[serde(default)]
    features: Vec<Feature>,
    #[serde(default)]
    context: Option<SearchContext>,
}

#[derive(Deserialize, Debug)]
struct Feature {
    properties: FeatureProperties,
}

#[derive(Deserialize, Debug)]
struct FeatureProperties {
    datetime: String,
}

#[derive(Deserialize, Debug)]
struct SearchContext {
    /// Opaque; forwarded to the next request exactly as received.
    next: Option<Value>,
}

/// Discovers acquisition timestamps through the catalog search endpoint.
pub struct CatalogClient<'a, T> {
    transport: &'a T,
    url: Url,
    page_size: u32,
    max_pages: usize,
}

impl<'a, T: Transport> CatalogClient<'a, T> {
    pub fn new(transport: &'a T, url: Url, settings: &DiscoverySettings) -> Self {
        Self {
            transport,
            url,
            page_size: settings.page_size,
            max_pages: settings.max_pages,
        }
    }

    /// Follows the `context.next` cursor until a page comes back empty or without a
    /// cursor. Any failing page fails the whole call.
    #[instrument(skip_all, fields(collection = collection))]
    pub async fn discover(
        &self,
        window: &AcquisitionWindow,
        bbox: &BoundingBox,
        collection: &str,
    ) -> Result<Vec<DiscoveredTimestamp>, DiscoveryError> {
        let datetime = window.interval();
        info!(%datetime, "Extracting available dates");

        let mut timestamps: Vec<DiscoveredTimestamp> = vec![];
        let mut seen_cursors: HashSet<String> = HashSet::new();
        let mut cursor: Option<Value> = None;

        for page in 1.. {
            if page > self.max_pages {
                return Err(DiscoveryError::PageLimit {
                    max_pages: self.max_pages,
                });
            }

            let mut body = json!({
                "bbox": bbox.to_array(),
                "datetime": datetime,
                "collections": [collection],
                "limit": self.page_size,
            });
            if let Some(next) = cursor.take() {
                body["next"] = next;
            }

            let bytes = self
                .transport
                .post_json(&self.url, &body, "application/json")
                .await
                .map_err(|source| DiscoveryError::Transport { page, source })?;
            let search_page: SearchPage = serde_json::from_slice(&bytes)
                .map_err(|source| DiscoveryError::Decode { page, source })?;

            debug!(page, features = search_page.features.len(), "Catalog page");
            if search_page.features.is_empty() {
                break;
            }
            timestamps.extend(
                search_page
                    .features
                    .into_iter()
                    .map(|f| f.properties.datetime),
            );

            let Some(next) = search_page.context.and_then(|c| c.next) else {
                break;
            };
            let key = next.to_string();
            if !seen_cursors.insert(key.clone()) {
                return Err(DiscoveryError::RepeatedCursor { page, cursor: key });
            }
            cursor = Some(next);
        }

        info!(count = timestamps.len(), "Available dates");
        Ok(timestamps)
    }
}
