//! Utility functions for creating s3 clients, and the S3 backed blob store
use crate::error::PersistError;
use crate::persistence::BlobStore;
use crate::secrets::ObjectStoreCredentials;
use aws_config::timeout::TimeoutConfig;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::time::Duration;
use tracing::{info, instrument};

const DEFAULT_REGION: &str = "us-east-1";

/// MinIO is addressed without a scheme in the credentials file and served over plain http.
fn endpoint_url(endpoint: &str) -> String {
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{endpoint}")
    }
}

/// `timeout` bounds each S3 operation, retries included.
pub async fn client_from_credentials(creds: &ObjectStoreCredentials, timeout: Duration) -> Client {
    let credentials = Credentials::new(
        creds.access_key.clone(),
        creds.secret_key.clone(),
        None,
        None,
        "minio_credentials",
    );
    let base_config = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(DEFAULT_REGION))
        .credentials_provider(credentials)
        .timeout_config(
            TimeoutConfig::builder()
                .connect_timeout(timeout)
                .operation_timeout(timeout)
                .build(),
        )
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&base_config)
        .endpoint_url(endpoint_url(&creds.endpoint))
        .force_path_style(true)
        .build();

    Client::from_conf(s3_config)
}

fn object_store_error<E>(operation: &'static str, bucket: &str, key: &str, err: E) -> PersistError
where
    E: std::error::Error,
{
    PersistError::ObjectStore {
        operation,
        bucket: bucket.to_string(),
        key: key.to_string(),
        source: DisplayErrorContext(&err).to_string().into(),
    }
}

pub struct ObjectStore {
    client: Client,
}

impl ObjectStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub async fn from_credentials(creds: &ObjectStoreCredentials, timeout: Duration) -> Self {
        let client = client_from_credentials(creds, timeout).await;
        Self::new(client)
    }

    /// Idempotent; losing a creation race to another writer counts as success.
    async fn ensure_bucket(self: &Self, bucket: &str) -> Result<(), PersistError> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => return Ok(()),
            Err(e) => match e.as_service_error() {
                Some(service_err) if service_err.is_not_found() => {}
                _ => return Err(object_store_error("head_bucket", bucket, "", e)),
            },
        }

        match self.client.create_bucket().bucket(bucket).send().await {
            Ok(_) => {
                info!(bucket, "Bucket created");
                Ok(())
            }
            Err(e) => match e.as_service_error() {
                Some(service_err)
                    if service_err.is_bucket_already_owned_by_you()
                        || service_err.is_bucket_already_exists() =>
                {
                    Ok(())
                }
                _ => Err(object_store_error("create_bucket", bucket, "", e)),
            },
        }
    }
}

impl BlobStore for ObjectStore {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn put_blob(
        self: &Self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PersistError> {
        self.ensure_bucket(bucket).await?;

        let size = bytes.len() as i64;
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .content_length(size)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| object_store_error("put_object", bucket, key, e))?;

        info!("Image uploaded successfully");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::black_hole;

    #[test]
    fn test_endpoint_url_defaults_to_http() {
        assert_eq!(endpoint_url("localhost:9000"), "http://localhost:9000");
        assert_eq!(endpoint_url("https://minio.example.com"), "https://minio.example.com");
    }

    #[test]
    fn test_object_store_error_message() {
        let err = object_store_error(
            "put_object",
            "satellite-images",
            "a.tiff",
            std::io::Error::new(std::io::ErrorKind::Other, "connection refused"),
        );
        let message = err.to_string();
        assert!(message.contains("put_object"));
        assert!(message.contains("satellite-images/a.tiff"));
        assert!(message.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_unresponsive_endpoint_times_out() {
        let (url, server) = black_hole().await;
        let creds = ObjectStoreCredentials {
            endpoint: url.as_str().trim_end_matches('/').to_string(),
            access_key: "minio".to_string(),
            secret_key: "minio123".to_string(),
        };
        let store = ObjectStore::from_credentials(&creds, Duration::from_secs(1)).await;

        let result = tokio::time::timeout(
            Duration::from_secs(20),
            store.put_blob("satellite-images", "a.tiff", vec![1, 2, 3], "image/tiff"),
        )
        .await;
        server.abort();

        let err = result.expect("put_blob should give up on its own").unwrap_err();
        assert!(matches!(
            err,
            PersistError::ObjectStore {
                operation: "head_bucket",
                ..
            }
        ));
    }
}
