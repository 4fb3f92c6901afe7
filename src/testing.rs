//! Recording fakes for the network seams.
use crate::auth::{Token, TokenEndpoint};
use crate::error::{AuthError, PersistError, TransportError};
use crate::model::ImageRecord;
use crate::persistence::{BlobStore, InsertOutcome, MetadataStore};
use crate::secrets::ClientCredentials;
use crate::transport::Transport;
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

pub enum FakeResponse {
    Body(Vec<u8>),
    Status(u16),
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub url: Url,
    pub body: Value,
    pub accept: String,
}

/// Answers requests from per-url queues, falling back to a shared queue.
#[derive(Default)]
pub struct FakeTransport {
    shared: Mutex<VecDeque<FakeResponse>>,
    routed: Mutex<HashMap<String, VecDeque<FakeResponse>>>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond_json(&self, body: Value) {
        self.respond_bytes(body.to_string().into_bytes());
    }

    pub fn respond_bytes(&self, bytes: Vec<u8>) {
        self.shared.lock().unwrap().push_back(FakeResponse::Body(bytes));
    }

    pub fn respond_status(&self, status: u16) {
        self.shared.lock().unwrap().push_back(FakeResponse::Status(status));
    }

    pub fn route(&self, url: &Url, response: FakeResponse) {
        self.routed
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, url: &Url) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| &r.url == url)
            .collect()
    }
}

impl Transport for FakeTransport {
    async fn post_json(
        self: &Self,
        url: &Url,
        body: &Value,
        accept: &str,
    ) -> Result<Vec<u8>, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.clone(),
            body: body.clone(),
            accept: accept.to_string(),
        });

        let routed = self
            .routed
            .lock()
            .unwrap()
            .get_mut(url.as_str())
            .and_then(VecDeque::pop_front);
        let response = routed
            .or_else(|| self.shared.lock().unwrap().pop_front())
            .unwrap_or_else(|| panic!("no response queued for {url}"));

        match response {
            FakeResponse::Body(bytes) => Ok(bytes),
            FakeResponse::Status(status) => Err(TransportError::Status {
                status,
                body: String::new(),
            }),
        }
    }
}

pub fn catalog_page(timestamps: &[String], next: Option<Value>) -> Value {
    let features: Vec<Value> = timestamps
        .iter()
        .map(|ts| json!({"type": "Feature", "properties": {"datetime": ts}}))
        .collect();
    match next {
        Some(next) => json!({"type": "FeatureCollection", "features": features, "context": {"next": next}}),
        None => json!({"type": "FeatureCollection", "features": features, "context": {}}),
    }
}

pub struct FakeTokenEndpoint {
    response: Result<Token, u16>,
    calls: AtomicUsize,
}

impl FakeTokenEndpoint {
    pub fn returning(token: Token) -> Self {
        Self {
            response: Ok(token),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(status: u16) -> Self {
        Self {
            response: Err(status),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl TokenEndpoint for FakeTokenEndpoint {
    async fn exchange(self: &Self, _credentials: &ClientCredentials) -> Result<Token, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.response {
            Ok(token) => Ok(token.clone()),
            Err(status) => Err(AuthError::Exchange(TransportError::Status {
                status: *status,
                body: "invalid_client".to_string(),
            })),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub bucket: String,
    pub key: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Keeps every put in order; keys listed in `failing_keys` are rejected.
#[derive(Default)]
pub struct RecordingBlobStore {
    puts: Mutex<Vec<StoredBlob>>,
    failing_keys: Vec<String>,
}

impl RecordingBlobStore {
    pub fn failing_on(keys: &[&str]) -> Self {
        Self {
            puts: Mutex::default(),
            failing_keys: keys.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn puts(&self) -> Vec<StoredBlob> {
        self.puts.lock().unwrap().clone()
    }
}

impl BlobStore for RecordingBlobStore {
    async fn put_blob(
        self: &Self,
        bucket: &str,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<(), PersistError> {
        if self.failing_keys.iter().any(|k| k == key) {
            return Err(PersistError::ObjectStore {
                operation: "put_object",
                bucket: bucket.to_string(),
                key: key.to_string(),
                source: "connection refused".into(),
            });
        }
        self.puts.lock().unwrap().push(StoredBlob {
            bucket: bucket.to_string(),
            key: key.to_string(),
            bytes,
            content_type: content_type.to_string(),
        });
        Ok(())
    }
}

/// Enforces the `(acquisition_timestamp, bbox)` uniqueness the real table has.
#[derive(Default)]
pub struct MemoryMetadataStore {
    rows: Mutex<Vec<ImageRecord>>,
    attempts: AtomicUsize,
    unavailable: bool,
}

impl MemoryMetadataStore {
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    pub fn rows(&self) -> Vec<ImageRecord> {
        self.rows.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl MetadataStore for MemoryMetadataStore {
    async fn insert_metadata(self: &Self, record: &ImageRecord) -> Result<InsertOutcome, PersistError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(PersistError::Other("database is unavailable".to_string()));
        }
        let mut rows = self.rows.lock().unwrap();
        let duplicate = rows.iter().any(|row| {
            row.acquisition_timestamp == record.acquisition_timestamp
                && row.bbox.to_array() == record.bbox.to_array()
        });
        if duplicate {
            return Ok(InsertOutcome::AlreadyExists);
        }
        rows.push(record.clone());
        Ok(InsertOutcome::Inserted)
    }
}

/// One HTTP request as it arrived on the socket.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

fn parse_head(head: &str) -> (String, Vec<(String, String)>) {
    let mut lines = head.split("\r\n");
    let request_line = lines.next().unwrap_or_default().to_string();
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    (request_line, headers)
}

/// Serves exactly one request on a local port with the given status and body, and hands
/// back what the client sent.
pub async fn serve_once(status: u16, body: &'static str) -> (Url, JoinHandle<CapturedRequest>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();

    let handle = tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf: Vec<u8> = vec![];
        let mut chunk = [0u8; 4096];

        let head_end = loop {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before the request head was complete");
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos;
            }
        };
        let (request_line, headers) = parse_head(&String::from_utf8_lossy(&buf[..head_end]));
        let content_length: usize = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
            .and_then(|(_, v)| v.parse().ok())
            .unwrap_or(0);
        while buf.len() < head_end + 4 + content_length {
            let n = socket.read(&mut chunk).await.unwrap();
            assert!(n > 0, "connection closed before the request body was complete");
            buf.extend_from_slice(&chunk[..n]);
        }

        let response = format!(
            "HTTP/1.1 {status} Stub\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        socket.shutdown().await.ok();

        CapturedRequest {
            request_line,
            headers,
            body: String::from_utf8_lossy(&buf[head_end + 4..]).to_string(),
        }
    });
    (url, handle)
}

/// Accepts connections and never answers them.
pub async fn black_hole() -> (Url, JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = Url::parse(&format!("http://{}/", listener.local_addr().unwrap())).unwrap();
    let handle = tokio::spawn(async move {
        let mut open = vec![];
        loop {
            let (socket, _) = listener.accept().await.unwrap();
            open.push(socket);
        }
    });
    (url, handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BoundingBox;
    use crate::window::parse_acquisition;

    #[tokio::test]
    async fn test_memory_store_rejects_duplicates() {
        let store = MemoryMetadataStore::default();
        let record = ImageRecord {
            collection_id: "sentinel-2-l2a".to_string(),
            location_name: "xxx".to_string(),
            acquisition_timestamp: parse_acquisition("2025-01-01T00:00:00.000000Z").unwrap(),
            bbox: BoundingBox::new(0.0, 0.0, 1.0, 1.0).unwrap(),
            storage_key: "20250101000000000000_xxx.tiff".to_string(),
        };

        assert_eq!(store.insert_metadata(&record).await.unwrap(), InsertOutcome::Inserted);
        assert_eq!(
            store.insert_metadata(&record).await.unwrap(),
            InsertOutcome::AlreadyExists
        );
        assert_eq!(store.rows().len(), 1);
        assert_eq!(store.attempts(), 2);
    }
}
