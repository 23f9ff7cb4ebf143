//! Configuration for the analytics session recorder.
//!
//! Delivery settings (collector URL and shared secret) are resolved through
//! the [`ConfigSource`] trait so embedders can supply values from whatever
//! configuration system hosts the recorder. Two implementations ship with
//! the crate: an in-memory source and a JSON-file-backed one.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Logical section holding the recorder's delivery settings.
pub const CONFIG_SECTION: &str = "analytics";

/// Key for the collector endpoint URL.
pub const SERVER_KEY: &str = "server";

/// Key for the shared HMAC secret.
pub const SECRET_KEY: &str = "secret";

/// Read access to sectioned configuration values.
pub trait ConfigSource {
    /// Look up a value, returning `None` when the key is not configured.
    fn get(&self, section: &str, key: &str) -> Option<String>;
}

/// In-memory configuration source, for tests and embedders that resolve
/// settings themselves.
#[derive(Debug, Clone, Default)]
pub struct StaticConfigSource {
    sections: HashMap<String, HashMap<String, String>>,
}

impl StaticConfigSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor with the collector URL and secret populated.
    pub fn with_delivery(server: impl Into<String>, secret: impl Into<String>) -> Self {
        let mut source = Self::new();
        source.set(CONFIG_SECTION, SERVER_KEY, server);
        source.set(CONFIG_SECTION, SECRET_KEY, secret);
        source
    }

    /// Set one value.
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.sections
            .entry(section.to_owned())
            .or_default()
            .insert(key.to_owned(), value.into());
    }
}

impl ConfigSource for StaticConfigSource {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        self.sections.get(section)?.get(key).cloned()
    }
}

/// Configuration loaded from a JSON file of sections:
///
/// ```json
/// { "analytics": { "server": "https://collector.example/ingest", "secret": "..." } }
/// ```
#[derive(Debug, Clone, Default)]
pub struct FileConfigSource {
    sections: HashMap<String, HashMap<String, String>>,
}

impl FileConfigSource {
    /// A source with nothing configured.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Load configuration from the default location. A missing file
    /// behaves as empty configuration.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from an explicit path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::empty());
        }
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        let sections =
            serde_json::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        Ok(Self { sections })
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("analytics-session-recorder")
            .join("config.json")
    }
}

impl ConfigSource for FileConfigSource {
    fn get(&self, section: &str, key: &str) -> Option<String> {
        self.sections.get(section)?.get(key).cloned()
    }
}

/// Settings for a [`FileAnalyticsProvider`](crate::session::FileAnalyticsProvider).
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Directory where session documents are written
    pub analytics_dir: PathBuf,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        let data_dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("analytics-session-recorder");

        Self {
            analytics_dir: data_dir.join("sessions"),
        }
    }
}

/// Configuration errors.
#[derive(Debug)]
pub enum ConfigError {
    IoError(String),
    ParseError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(e) => write!(f, "IO error: {e}"),
            ConfigError::ParseError(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_source_lookup() {
        let source = StaticConfigSource::with_delivery("https://collector.example", "s3cret");
        assert_eq!(
            source.get(CONFIG_SECTION, SERVER_KEY).as_deref(),
            Some("https://collector.example")
        );
        assert_eq!(
            source.get(CONFIG_SECTION, SECRET_KEY).as_deref(),
            Some("s3cret")
        );
        assert!(source.get(CONFIG_SECTION, "missing").is_none());
        assert!(source.get("other", SERVER_KEY).is_none());
    }

    #[test]
    fn test_file_source_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileConfigSource::load_from(&dir.path().join("nope.json")).unwrap();
        assert!(source.get(CONFIG_SECTION, SERVER_KEY).is_none());
    }

    #[test]
    fn test_file_source_reads_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"analytics": {"server": "https://collector.example/ingest", "secret": "k"}}"#,
        )
        .unwrap();

        let source = FileConfigSource::load_from(&path).unwrap();
        assert_eq!(
            source.get(CONFIG_SECTION, SERVER_KEY).as_deref(),
            Some("https://collector.example/ingest")
        );
        assert_eq!(source.get(CONFIG_SECTION, SECRET_KEY).as_deref(), Some("k"));
    }

    #[test]
    fn test_file_source_rejects_malformed_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            FileConfigSource::load_from(&path),
            Err(ConfigError::ParseError(_))
        ));
    }
}
