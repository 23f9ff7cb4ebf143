//! Incremental writer for session documents.
//!
//! A session document is written across many calls over the lifetime of a
//! session: header fields first, then an `events` array that grows one
//! fragment at a time. The writer only guarantees document syntax; it has
//! no notion of a session. Lifecycle rules (no events after close) live
//! with the owner, which drops the writer when the session ends.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde_json::Value;

/// File extension for persisted session documents.
pub const DOCUMENT_EXTENSION: &str = "analytics";

/// Errors from creating or writing a session document.
#[derive(Debug)]
pub enum DocumentError {
    /// The document file could not be created
    SinkUnavailable {
        path: PathBuf,
        source: std::io::Error,
    },
    /// A write or flush on an open document failed
    Io(std::io::Error),
}

impl std::fmt::Display for DocumentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentError::SinkUnavailable { path, source } => {
                write!(f, "Could not create document {}: {}", path.display(), source)
            }
            DocumentError::Io(e) => write!(f, "Document write failed: {e}"),
        }
    }
}

impl std::error::Error for DocumentError {}

#[derive(Debug, PartialEq)]
enum Phase {
    Header,
    Events,
}

/// Append-only writer that emits one valid JSON document across many writes.
///
/// The output, read end-to-end after [`close`](DocumentWriter::close),
/// parses as a single object whose `events` array holds the appended
/// fragments in call order. The "first event written" state is owned here,
/// per document, so a fresh writer always starts a fresh array.
#[derive(Debug)]
pub struct DocumentWriter {
    out: BufWriter<File>,
    path: PathBuf,
    phase: Phase,
    wrote_first_event: bool,
}

impl DocumentWriter {
    /// Create the document file and write the opening of the root object.
    ///
    /// Parent directories are created as needed. Failure to create the
    /// sink is reported as [`DocumentError::SinkUnavailable`].
    pub fn create(path: &Path) -> Result<Self, DocumentError> {
        let sink_unavailable = |source| DocumentError::SinkUnavailable {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(sink_unavailable)?;
        }
        let file = File::create(path).map_err(sink_unavailable)?;
        let mut writer = Self {
            out: BufWriter::new(file),
            path: path.to_path_buf(),
            phase: Phase::Header,
            wrote_first_event: false,
        };
        writer.out.write_all(b"{\n").map_err(DocumentError::Io)?;
        Ok(writer)
    }

    /// Path of the file this writer was opened on.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write one `"key": value` header line.
    ///
    /// Only valid before [`begin_event_list`](DocumentWriter::begin_event_list);
    /// a header field written after the event list began is dropped.
    pub fn write_header_field(&mut self, key: &str, value: &Value) -> Result<(), DocumentError> {
        if self.phase != Phase::Header {
            tracing::warn!("header field {} written after the event list began; dropping", key);
            return Ok(());
        }
        let line = format!("\t{}: {},\n", Value::String(key.to_owned()), value);
        self.out.write_all(line.as_bytes()).map_err(DocumentError::Io)
    }

    /// Open the `events` array. Header fields can no longer be written.
    pub fn begin_event_list(&mut self) -> Result<(), DocumentError> {
        self.phase = Phase::Events;
        self.out.write_all(b"\t\"events\": [").map_err(DocumentError::Io)
    }

    /// Append one pre-serialized event fragment.
    ///
    /// Every fragment after the first is preceded by a `,` separator; the
    /// fragment itself is written verbatim.
    pub fn append_event(&mut self, fragment: &str) -> Result<(), DocumentError> {
        debug_assert_eq!(self.phase, Phase::Events);
        if self.wrote_first_event {
            self.out.write_all(b",").map_err(DocumentError::Io)?;
        }
        self.wrote_first_event = true;
        self.out.write_all(b"\n\t\t").map_err(DocumentError::Io)?;
        self.out
            .write_all(fragment.as_bytes())
            .map_err(DocumentError::Io)
    }

    /// Flush buffered bytes to the operating system without closing.
    pub fn flush(&mut self) -> Result<(), DocumentError> {
        self.out.flush().map_err(DocumentError::Io)
    }

    /// Write the closing list/object syntax, flush, and release the sink.
    ///
    /// Consuming the writer is what makes "no appends after close" hold;
    /// there is deliberately no way to reopen. Returns the document path
    /// for the read-back that follows.
    pub fn close(mut self) -> Result<PathBuf, DocumentError> {
        if self.phase == Phase::Header {
            // A document closed before any event list still reads back as
            // a valid, empty one.
            self.begin_event_list()?;
        }
        self.out.write_all(b"\n\t]\n}\n").map_err(DocumentError::Io)?;
        self.out.flush().map_err(DocumentError::Io)?;
        Ok(self.path)
    }
}
