//! Document signing and delivery.
//!
//! When a session ends, the finished document is read back from disk,
//! signed with HMAC-SHA256 over its exact persisted bytes, and handed to
//! an [`Uploader`] as a single fire-and-forget POST. Signing the bytes on
//! disk (rather than a re-derived structure) lets the collector verify the
//! integrity of precisely what was persisted.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::config::{ConfigSource, CONFIG_SECTION, SECRET_KEY, SERVER_KEY};

type HmacSha256 = Hmac<Sha256>;

/// User agent sent with every upload request.
pub const USER_AGENT: &str = concat!("analytics-session-recorder/", env!("CARGO_PKG_VERSION"));

/// Upload pipeline errors. Any of these aborts the upload; none of them
/// fail the session close that triggered it, and nothing is retried.
#[derive(Debug)]
pub enum UploadError {
    /// The collector URL or shared secret is missing from configuration
    ConfigMissing { key: &'static str },
    /// The closed document could not be read back from storage
    StorageRead {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl std::fmt::Display for UploadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadError::ConfigMissing { key } => {
                write!(f, "{key} not configured; can't send data to server")
            }
            UploadError::StorageRead { path, source } => {
                write!(
                    f,
                    "Session document {} could not be loaded: {}",
                    path.display(),
                    source
                )
            }
        }
    }
}

impl std::error::Error for UploadError {}

/// One authenticated request, ready for transport.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

/// Transport collaborator. Implementations own delivery concerns such as
/// timeouts and retries; the pipeline never waits on a response.
pub trait Uploader {
    /// Dispatch one request, fire-and-forget.
    fn post(&self, request: UploadRequest);
}

/// An uploader that drops every request, for embedders with delivery
/// disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUploader;

impl Uploader for NoopUploader {
    fn post(&self, request: UploadRequest) {
        tracing::debug!("dropping upload to {} (noop uploader)", request.url);
    }
}

/// Compute the delivery authentication token: HMAC-SHA256 over `payload`
/// keyed with `secret`, encoded as 64 lowercase hex characters.
pub fn authorization_token(secret: &str, payload: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts keys of any length");
    mac.update(payload);
    hex::encode(mac.finalize().into_bytes())
}

/// Signs closed session documents and hands them to the transport.
pub struct UploadPipeline {
    config: Box<dyn ConfigSource>,
    uploader: Box<dyn Uploader>,
}

impl UploadPipeline {
    pub fn new(config: Box<dyn ConfigSource>, uploader: Box<dyn Uploader>) -> Self {
        Self { config, uploader }
    }

    /// Sign and dispatch one closed document. Issues at most one request.
    pub fn dispatch(&self, document_path: &Path) -> Result<(), UploadError> {
        let server = self
            .config
            .get(CONFIG_SECTION, SERVER_KEY)
            .ok_or(UploadError::ConfigMissing { key: SERVER_KEY })?;
        let secret = self
            .config
            .get(CONFIG_SECTION, SECRET_KEY)
            .ok_or(UploadError::ConfigMissing { key: SECRET_KEY })?;

        let body = fs::read(document_path).map_err(|e| UploadError::StorageRead {
            path: document_path.to_path_buf(),
            source: e,
        })?;

        let token = authorization_token(&secret, &body);

        let mut headers = HashMap::new();
        headers.insert("User-Agent".to_owned(), USER_AGENT.to_owned());
        headers.insert("Content-Type".to_owned(), "application/json".to_owned());
        headers.insert("Accept".to_owned(), "application/json".to_owned());
        headers.insert("Authorization".to_owned(), token);

        tracing::debug!("dispatching {} byte document to {}", body.len(), server);
        self.uploader.post(UploadRequest {
            url: server,
            headers,
            body,
        });
        Ok(())
    }
}

/// Uploader backed by `reqwest`, dispatching requests on a private tokio
/// runtime so session closure never blocks on delivery.
#[cfg(feature = "uploader")]
pub struct HttpUploader {
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
}

#[cfg(feature = "uploader")]
impl HttpUploader {
    /// Create an uploader with a 10 second request timeout.
    pub fn new() -> Result<Self, std::io::Error> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("Failed to create HTTP client");

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;

        Ok(Self { client, runtime })
    }
}

#[cfg(feature = "uploader")]
impl Uploader for HttpUploader {
    fn post(&self, request: UploadRequest) {
        let mut builder = self.client.post(&request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        let builder = builder.body(request.body);
        let url = request.url;

        // Response handling stays inside the spawned task; callers have
        // already moved on.
        self.runtime.spawn(async move {
            match builder.send().await {
                Ok(response) if response.status().is_success() => {
                    tracing::debug!("collector {} accepted upload: {}", url, response.status());
                }
                Ok(response) => {
                    tracing::warn!("collector {} rejected upload: {}", url, response.status());
                }
                Err(e) => {
                    tracing::warn!("upload to {} failed: {}", url, e);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StaticConfigSource;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct CapturingUploader {
        requests: Arc<Mutex<Vec<UploadRequest>>>,
    }

    impl Uploader for CapturingUploader {
        fn post(&self, request: UploadRequest) {
            self.requests.lock().unwrap().push(request);
        }
    }

    #[test]
    fn test_authorization_token_known_answer() {
        // RFC 4231 test case 2.
        let token = authorization_token("Jefe", b"what do ya want for nothing?");
        assert_eq!(
            token,
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn test_authorization_token_shape() {
        let token = authorization_token("s", b"{}");
        assert_eq!(token.len(), 64);
        assert!(token
            .chars()
            .all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_dispatch_posts_signed_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.analytics");
        fs::write(&path, b"{\"events\": []}").unwrap();

        let uploader = CapturingUploader::default();
        let requests = uploader.requests.clone();
        let pipeline = UploadPipeline::new(
            Box::new(StaticConfigSource::with_delivery(
                "https://collector.example/ingest",
                "s3cret",
            )),
            Box::new(uploader),
        );
        pipeline.dispatch(&path).unwrap();

        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.url, "https://collector.example/ingest");
        assert_eq!(request.body, b"{\"events\": []}");
        assert_eq!(
            request.headers.get("Content-Type").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(
            request.headers.get("Accept").map(String::as_str),
            Some("application/json")
        );
        assert_eq!(
            request.headers.get("User-Agent").map(String::as_str),
            Some(USER_AGENT)
        );
        assert_eq!(
            request.headers.get("Authorization").cloned(),
            Some(authorization_token("s3cret", &request.body))
        );
    }

    #[test]
    fn test_dispatch_skips_upload_when_server_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.analytics");
        fs::write(&path, b"{}").unwrap();

        let mut config = StaticConfigSource::new();
        config.set(CONFIG_SECTION, SECRET_KEY, "s3cret");

        let uploader = CapturingUploader::default();
        let requests = uploader.requests.clone();
        let pipeline = UploadPipeline::new(Box::new(config), Box::new(uploader));

        assert!(matches!(
            pipeline.dispatch(&path),
            Err(UploadError::ConfigMissing { key: SERVER_KEY })
        ));
        assert!(requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dispatch_skips_upload_when_secret_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.analytics");
        fs::write(&path, b"{}").unwrap();

        let mut config = StaticConfigSource::new();
        config.set(CONFIG_SECTION, SERVER_KEY, "https://collector.example");

        let uploader = CapturingUploader::default();
        let requests = uploader.requests.clone();
        let pipeline = UploadPipeline::new(Box::new(config), Box::new(uploader));

        assert!(matches!(
            pipeline.dispatch(&path),
            Err(UploadError::ConfigMissing { key: SECRET_KEY })
        ));
        assert!(requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_dispatch_reports_unreadable_document() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("gone.analytics");

        let uploader = CapturingUploader::default();
        let requests = uploader.requests.clone();
        let pipeline = UploadPipeline::new(
            Box::new(StaticConfigSource::with_delivery("https://c.example", "s")),
            Box::new(uploader),
        );

        assert!(matches!(
            pipeline.dispatch(&missing),
            Err(UploadError::StorageRead { .. })
        ));
        assert!(requests.lock().unwrap().is_empty());
    }
}
