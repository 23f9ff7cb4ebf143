//! Embedded analytics session recorder.
//!
//! This library accumulates structured usage events for the lifetime of
//! one user session, persists them incrementally as an append-only JSON
//! document, and on session close signs the document with HMAC-SHA256 and
//! uploads it to a remote collector.
//!
//! # Architecture
//!
//! ```text
//! caller ──▶ FileAnalyticsProvider ──▶ DocumentWriter ──▶ {sessionId}.analytics
//!                     │                                          │
//!                     └──▶ UploadPipeline ── HMAC-SHA256 ──▶ Uploader ──▶ collector
//! ```
//!
//! The document is valid JSON whenever it is closed, no matter how many
//! events were recorded; the upload signs the exact bytes on disk, so the
//! collector can verify the integrity of precisely what was persisted.
//!
//! # Example
//!
//! ```no_run
//! use analytics_session_recorder::{
//!     AnalyticsProvider, EventAttribute, FileAnalyticsProvider, NoopUploader,
//!     RecorderConfig, StaticConfigSource, UploadPipeline,
//! };
//!
//! let pipeline = UploadPipeline::new(
//!     Box::new(StaticConfigSource::with_delivery(
//!         "https://collector.example/ingest",
//!         "shared-secret",
//!     )),
//!     Box::new(NoopUploader),
//! );
//! let mut provider = FileAnalyticsProvider::new(RecorderConfig::default(), pipeline);
//!
//! provider.start_session(&[]);
//! provider.record_event("login", &[EventAttribute::new("method", "password")]);
//! provider.end_session();
//! ```

pub mod attribute;
pub mod config;
pub mod document;
pub mod event;
pub mod session;
pub mod upload;

// Re-export key types at crate root for convenience
pub use attribute::EventAttribute;
pub use config::{
    ConfigError, ConfigSource, FileConfigSource, RecorderConfig, StaticConfigSource,
    CONFIG_SECTION, SECRET_KEY, SERVER_KEY,
};
pub use document::{DocumentError, DocumentWriter};
pub use event::{EventRecord, RecordCounter};
pub use session::{AnalyticsProvider, FileAnalyticsProvider};
pub use upload::{
    authorization_token, NoopUploader, UploadError, UploadPipeline, UploadRequest, Uploader,
};

// HTTP uploader re-export (when enabled)
#[cfg(feature = "uploader")]
pub use upload::HttpUploader;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
