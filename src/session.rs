//! Session lifecycle and the provider surface.
//!
//! One provider instance owns at most one open session document at a time.
//! Sessions run from `start_session` to `end_session`; ending a session
//! closes its document and hands it to the upload pipeline. Operations
//! that need an active session are dropped with a warning when there is
//! none, and identity is frozen while a session is in progress.

use std::path::PathBuf;

use chrono::Utc;
use serde_json::json;

use crate::attribute::EventAttribute;
use crate::config::RecorderConfig;
use crate::document::{DocumentError, DocumentWriter, DOCUMENT_EXTENSION};
use crate::event::{EventRecord, RecordCounter};
use crate::upload::UploadPipeline;

/// Timestamp layout embedded in derived session ids. Filesystem-safe on
/// every supported platform.
const SESSION_TIMESTAMP_FORMAT: &str = "%Y.%m.%d-%H.%M.%S";

/// The capability surface of an analytics provider: session lifecycle,
/// identity and demographics, and one operation per event kind.
///
/// Implementations needing new event kinds extend this trait. Rust has no
/// overloading, so the open-attribute shapes of the purchase and currency
/// operations carry a `_with_attributes` suffix.
pub trait AnalyticsProvider {
    /// Begin a new session, ending any session already in progress first.
    /// Returns `false` when the session document could not be created.
    fn start_session(&mut self, attributes: &[EventAttribute]) -> bool;

    /// Close the current session document and deliver it. A no-op when no
    /// session is active; calling it twice performs the close once.
    fn end_session(&mut self);

    /// Force buffered document bytes to storage without ending the session.
    fn flush_events(&mut self);

    /// Set the user id. Ignored while a session is active.
    fn set_user_id(&mut self, user_id: &str);
    fn user_id(&self) -> &str;

    fn session_id(&self) -> &str;
    /// Override the session id. Returns `false` (and changes nothing)
    /// while a session is active.
    fn set_session_id(&mut self, session_id: &str) -> bool;

    /// Demographics and build metadata are captured into the document
    /// header when a session starts; setting them mid-session only affects
    /// later sessions.
    fn set_age(&mut self, age: i32);
    fn set_gender(&mut self, gender: &str);
    fn set_location(&mut self, location: &str);
    fn set_build_info(&mut self, build_info: &str);

    /// Attributes merged ahead of the call-site attributes of every event
    /// recorded from now on.
    fn set_default_attributes(&mut self, attributes: Vec<EventAttribute>);
    fn default_attributes(&self) -> &[EventAttribute];

    fn record_event(&mut self, event_name: &str, attributes: &[EventAttribute]);
    fn record_item_purchase(
        &mut self,
        item_id: &str,
        currency: &str,
        per_item_cost: i32,
        item_quantity: i32,
    );
    fn record_item_purchase_with_attributes(
        &mut self,
        item_id: &str,
        item_quantity: i32,
        attributes: &[EventAttribute],
    );
    fn record_currency_purchase(
        &mut self,
        game_currency_type: &str,
        game_currency_amount: i32,
        real_currency_type: &str,
        real_money_cost: f32,
        payment_provider: &str,
    );
    fn record_currency_purchase_with_attributes(
        &mut self,
        game_currency_type: &str,
        game_currency_amount: i32,
        attributes: &[EventAttribute],
    );
    fn record_currency_given(&mut self, game_currency_type: &str, game_currency_amount: i32);
    fn record_currency_given_with_attributes(
        &mut self,
        game_currency_type: &str,
        game_currency_amount: i32,
        attributes: &[EventAttribute],
    );
    fn record_error(&mut self, message: &str, attributes: &[EventAttribute]);
    fn record_progress(
        &mut self,
        progress_type: &str,
        progress_name: &str,
        attributes: &[EventAttribute],
    );
}

/// Analytics provider that persists each session as a `.analytics` JSON
/// document on disk and uploads it, signed, when the session ends.
///
/// Expects one logical caller; `&mut self` receivers leave no room for
/// concurrent use without an external lock.
pub struct FileAnalyticsProvider {
    analytics_dir: PathBuf,
    /// The open document of the active session; `None` both before the
    /// first session and after a session ends.
    document: Option<DocumentWriter>,
    user_id: String,
    session_id: String,
    age: i32,
    gender: String,
    location: String,
    build_info: String,
    default_attributes: Vec<EventAttribute>,
    counter: RecordCounter,
    pipeline: UploadPipeline,
}

impl FileAnalyticsProvider {
    /// Create a provider. The user id starts as a random UUID until
    /// [`set_user_id`](AnalyticsProvider::set_user_id) replaces it.
    pub fn new(config: RecorderConfig, pipeline: UploadPipeline) -> Self {
        Self {
            analytics_dir: config.analytics_dir,
            document: None,
            user_id: uuid::Uuid::new_v4().to_string(),
            session_id: String::new(),
            age: 0,
            gender: String::new(),
            location: String::new(),
            build_info: String::new(),
            default_attributes: Vec::new(),
            counter: RecordCounter::new(),
            pipeline,
        }
    }

    /// Replace the record counter, e.g. with one shared across providers
    /// or seeded for tests.
    pub fn with_record_counter(mut self, counter: RecordCounter) -> Self {
        self.counter = counter;
        self
    }

    /// Whether a session is currently active.
    pub fn is_session_active(&self) -> bool {
        self.document.is_some()
    }

    /// Path of the current (or most recent) session document.
    pub fn document_path(&self) -> PathBuf {
        self.analytics_dir
            .join(format!("{}.{}", self.session_id, DOCUMENT_EXTENSION))
    }

    /// Header fields are snapshotted here, once, as the document opens;
    /// metadata set after this point is invisible to the running session.
    fn write_header(&self, writer: &mut DocumentWriter) -> Result<(), DocumentError> {
        writer.write_header_field("sessionId", &json!(self.session_id))?;
        writer.write_header_field("userId", &json!(self.user_id))?;
        if !self.build_info.is_empty() {
            writer.write_header_field("buildInfo", &json!(self.build_info))?;
        }
        if self.age != 0 {
            writer.write_header_field("age", &json!(self.age))?;
        }
        if !self.gender.is_empty() {
            writer.write_header_field("gender", &json!(self.gender))?;
        }
        if !self.location.is_empty() {
            writer.write_header_field("location", &json!(self.location))?;
        }
        writer.begin_event_list()
    }

    /// Serialize and append one record. Returns whether it was written.
    fn append_record(&mut self, record: &EventRecord) -> bool {
        let Some(writer) = self.document.as_mut() else {
            return false;
        };
        let fragment = match record.to_fragment() {
            Ok(fragment) => fragment,
            Err(e) => {
                tracing::warn!("failed to serialize event record: {}", e);
                return false;
            }
        };
        if let Err(e) = writer.append_event(&fragment) {
            tracing::warn!("failed to append event record: {}", e);
            return false;
        }
        true
    }

    fn warn_inactive(&self, operation: &str) {
        tracing::warn!("{} called before start_session; ignoring", operation);
    }
}

impl AnalyticsProvider for FileAnalyticsProvider {
    fn start_session(&mut self, attributes: &[EventAttribute]) -> bool {
        if self.is_session_active() {
            // Starting twice never silently overwrites an open document.
            self.end_session();
        }
        // Session attributes are accepted for interface compatibility; the
        // header snapshot is what the document records.
        let _ = attributes;

        self.session_id = format!(
            "{}-{}",
            self.user_id,
            Utc::now().format(SESSION_TIMESTAMP_FORMAT)
        );
        let path = self.document_path();
        let mut writer = match DocumentWriter::create(&path) {
            Ok(writer) => writer,
            Err(e) => {
                tracing::warn!("failed to create file to log analytics events to: {}", e);
                return false;
            }
        };
        if let Err(e) = self.write_header(&mut writer) {
            tracing::warn!("failed to write session header: {}", e);
            return false;
        }
        self.document = Some(writer);
        tracing::debug!(
            "session created file {} for user {}",
            path.display(),
            self.user_id
        );
        true
    }

    fn end_session(&mut self) {
        let Some(writer) = self.document.take() else {
            return;
        };
        let path = match writer.close() {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("failed to close session document: {}", e);
                return;
            }
        };
        if let Err(e) = self.pipeline.dispatch(&path) {
            tracing::error!("{}", e);
        }
        tracing::debug!(
            "session ended for user {} and session id {}",
            self.user_id,
            self.session_id
        );
    }

    fn flush_events(&mut self) {
        if let Some(writer) = self.document.as_mut() {
            match writer.flush() {
                Ok(()) => tracing::debug!("analytics file flushed"),
                Err(e) => tracing::warn!("failed to flush analytics file: {}", e),
            }
        }
    }

    fn set_user_id(&mut self, user_id: &str) {
        if self.is_session_active() {
            tracing::warn!("set_user_id called while a session is in progress; ignoring");
            return;
        }
        self.user_id = user_id.to_owned();
        tracing::debug!("user is now {}", self.user_id);
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn session_id(&self) -> &str {
        &self.session_id
    }

    fn set_session_id(&mut self, session_id: &str) -> bool {
        if self.is_session_active() {
            tracing::warn!("set_session_id called while a session is in progress; ignoring");
            return false;
        }
        self.session_id = session_id.to_owned();
        tracing::debug!("session is now {}", self.session_id);
        true
    }

    fn set_age(&mut self, age: i32) {
        self.age = age;
    }

    fn set_gender(&mut self, gender: &str) {
        self.gender = gender.to_owned();
    }

    fn set_location(&mut self, location: &str) {
        self.location = location.to_owned();
    }

    fn set_build_info(&mut self, build_info: &str) {
        self.build_info = build_info.to_owned();
    }

    fn set_default_attributes(&mut self, attributes: Vec<EventAttribute>) {
        self.default_attributes = attributes;
    }

    fn default_attributes(&self) -> &[EventAttribute] {
        &self.default_attributes
    }

    fn record_event(&mut self, event_name: &str, attributes: &[EventAttribute]) {
        if !self.is_session_active() {
            self.warn_inactive("record_event");
            return;
        }
        let record = EventRecord::generic(
            event_name,
            attributes,
            &self.default_attributes,
            self.counter.next_id(),
        );
        if self.append_record(&record) {
            tracing::debug!(
                "analytics event {} written with {} attributes",
                event_name,
                attributes.len()
            );
        }
    }

    fn record_item_purchase(
        &mut self,
        item_id: &str,
        currency: &str,
        per_item_cost: i32,
        item_quantity: i32,
    ) {
        if !self.is_session_active() {
            self.warn_inactive("record_item_purchase");
            return;
        }
        let record = EventRecord::item_purchase(
            item_id,
            currency,
            per_item_cost,
            item_quantity,
            &self.default_attributes,
        );
        if self.append_record(&record) {
            tracing::debug!(
                "{} of item {} purchased with {} at a cost of {} each",
                item_quantity,
                item_id,
                currency,
                per_item_cost
            );
        }
    }

    fn record_item_purchase_with_attributes(
        &mut self,
        item_id: &str,
        item_quantity: i32,
        attributes: &[EventAttribute],
    ) {
        if !self.is_session_active() {
            self.warn_inactive("record_item_purchase");
            return;
        }
        let record = EventRecord::item_purchase_with_attributes(
            item_id,
            item_quantity,
            attributes,
            &self.default_attributes,
        );
        if self.append_record(&record) {
            tracing::debug!(
                "item purchase id {}, quantity {}, {} attributes",
                item_id,
                item_quantity,
                attributes.len()
            );
        }
    }

    fn record_currency_purchase(
        &mut self,
        game_currency_type: &str,
        game_currency_amount: i32,
        real_currency_type: &str,
        real_money_cost: f32,
        payment_provider: &str,
    ) {
        if !self.is_session_active() {
            self.warn_inactive("record_currency_purchase");
            return;
        }
        let record = EventRecord::currency_purchase(
            game_currency_type,
            game_currency_amount,
            real_currency_type,
            real_money_cost,
            payment_provider,
            &self.default_attributes,
        );
        if self.append_record(&record) {
            tracing::debug!(
                "{} of currency {} purchased with {} at a cost of {} each",
                game_currency_amount,
                game_currency_type,
                real_currency_type,
                real_money_cost
            );
        }
    }

    fn record_currency_purchase_with_attributes(
        &mut self,
        game_currency_type: &str,
        game_currency_amount: i32,
        attributes: &[EventAttribute],
    ) {
        if !self.is_session_active() {
            self.warn_inactive("record_currency_purchase");
            return;
        }
        let record = EventRecord::currency_purchase_with_attributes(
            game_currency_type,
            game_currency_amount,
            attributes,
            &self.default_attributes,
        );
        if self.append_record(&record) {
            tracing::debug!(
                "currency purchase type {}, quantity {}, {} attributes",
                game_currency_type,
                game_currency_amount,
                attributes.len()
            );
        }
    }

    fn record_currency_given(&mut self, game_currency_type: &str, game_currency_amount: i32) {
        if !self.is_session_active() {
            self.warn_inactive("record_currency_given");
            return;
        }
        let record = EventRecord::currency_given(
            game_currency_type,
            game_currency_amount,
            &self.default_attributes,
        );
        if self.append_record(&record) {
            tracing::debug!(
                "{} of currency {} given to user",
                game_currency_amount,
                game_currency_type
            );
        }
    }

    fn record_currency_given_with_attributes(
        &mut self,
        game_currency_type: &str,
        game_currency_amount: i32,
        attributes: &[EventAttribute],
    ) {
        if !self.is_session_active() {
            self.warn_inactive("record_currency_given");
            return;
        }
        let record = EventRecord::currency_given_with_attributes(
            game_currency_type,
            game_currency_amount,
            attributes,
            &self.default_attributes,
        );
        if self.append_record(&record) {
            tracing::debug!(
                "currency given type {}, quantity {}, {} attributes",
                game_currency_type,
                game_currency_amount,
                attributes.len()
            );
        }
    }

    fn record_error(&mut self, message: &str, attributes: &[EventAttribute]) {
        if !self.is_session_active() {
            self.warn_inactive("record_error");
            return;
        }
        let record = EventRecord::error(message, attributes, &self.default_attributes);
        if self.append_record(&record) {
            tracing::debug!("error {} written with {} attributes", message, attributes.len());
        }
    }

    fn record_progress(
        &mut self,
        progress_type: &str,
        progress_name: &str,
        attributes: &[EventAttribute],
    ) {
        if !self.is_session_active() {
            self.warn_inactive("record_progress");
            return;
        }
        let record = EventRecord::progress(
            progress_type,
            progress_name,
            attributes,
            &self.default_attributes,
        );
        if self.append_record(&record) {
            tracing::debug!(
                "progress event type {}, name {}, {} attributes",
                progress_type,
                progress_name,
                attributes.len()
            );
        }
    }
}

impl Drop for FileAnalyticsProvider {
    fn drop(&mut self) {
        // A provider discarded mid-session still closes and delivers its
        // document.
        self.end_session();
    }
}
