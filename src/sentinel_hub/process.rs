use super::{CRS84, EVALSCRIPT, IMAGE_CONTENT_TYPE, OUTPUT_SIZE};
use crate::error::TransportError;
use crate::model::BoundingBox;
use crate::transport::Transport;
use serde_json::{json, Value};
use tracing::{info, instrument};
use url::Url;

/// Point-in-time process request: `from == to == timestamp`.
pub fn process_request(timestamp: &str, bbox: &BoundingBox, collection: &str) -> Value {
    json!({
        "input": {
            "bounds": {
                "properties": { "crs": CRS84 },
                "bbox": bbox.to_array(),
            },
            "data": [
                {
                    "type": collection,
                    "dataFilter": {
                        "timeRange": { "from": timestamp, "to": timestamp }
                    },
                }
            ],
        },
        "output": { "width": OUTPUT_SIZE, "height": OUTPUT_SIZE },
        "evalscript": EVALSCRIPT,
    })
}

/// Retrieves one composited raster per acquisition timestamp.
pub struct ImageClient<'a, T> {
    transport: &'a T,
    url: Url,
}

impl<'a, T: Transport> ImageClient<'a, T> {
    pub fn new(transport: &'a T, url: Url) -> Self {
        Self { transport, url }
    }

    /// Returns the response payload as-is; nothing is decoded.
    #[instrument(skip(self, bbox))]
    pub async fn fetch(
        &self,
        timestamp: &str,
        bbox: &BoundingBox,
        collection: &str,
    ) -> Result<Vec<u8>, TransportError> {
        let request = process_request(timestamp, bbox, collection);
        let image = self
            .transport
            .post_json(&self.url, &request, IMAGE_CONTENT_TYPE)
            .await?;
        info!(bytes = image.len(), "Downloaded image");
        Ok(image)
    }
}
