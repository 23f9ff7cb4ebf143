//! Event record construction.
//!
//! Each `record_*` operation is translated here into one serialized JSON
//! fragment ready for [`DocumentWriter::append_event`]. Generic named
//! events are enriched with a monotonic record id and a capture-time UTC
//! timestamp; the specialized purchase/currency/error/progress records are
//! not. Every record carries the configured default attributes ahead of
//! its call-site attributes, both in their own order, duplicates included.
//!
//! [`DocumentWriter::append_event`]: crate::document::DocumentWriter::append_event

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::attribute::EventAttribute;

/// Monotonic counter for generic event record ids.
///
/// Cloned handles share the same underlying counter, so a counter created
/// once per process keeps increasing across sessions; ending a session
/// never resets it.
#[derive(Debug, Clone, Default)]
pub struct RecordCounter {
    next: Arc<AtomicU64>,
}

impl RecordCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start counting from a specific value.
    pub fn starting_at(value: u64) -> Self {
        Self {
            next: Arc::new(AtomicU64::new(value)),
        }
    }

    /// Take the next record id.
    pub fn next_id(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// A generic named event: `{eventName, recordId, timestamp, attributes?}`.
///
/// The `attributes` key is omitted entirely when the merged list is empty.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericEvent {
    pub event_name: String,
    pub record_id: u64,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attributes: Vec<EventAttribute>,
}

/// A specialized event serialized under a fixed `eventName`, with its
/// fixed fields carried as leading quoted-string attributes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NamedEvent {
    pub event_name: &'static str,
    pub attributes: Vec<EventAttribute>,
}

/// The open-attribute item purchase shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPurchaseEvent {
    pub event_type: &'static str,
    pub item_id: String,
    pub item_quantity: i32,
    pub attributes: Vec<EventAttribute>,
}

/// The open-attribute currency purchase/given shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CurrencyEvent {
    pub event_type: &'static str,
    pub game_currency_type: String,
    pub game_currency_amount: i32,
    pub attributes: Vec<EventAttribute>,
}

/// An error event: `{error, attributes}`.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorEvent {
    pub error: String,
    pub attributes: Vec<EventAttribute>,
}

/// A progress event: `{eventType: "Progress", progressType, progressName, attributes}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub event_type: &'static str,
    pub progress_type: String,
    pub progress_name: String,
    pub attributes: Vec<EventAttribute>,
}

/// One recorded occurrence, ready for serialization into the document.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EventRecord {
    Generic(GenericEvent),
    Named(NamedEvent),
    ItemPurchase(ItemPurchaseEvent),
    Currency(CurrencyEvent),
    Error(ErrorEvent),
    Progress(ProgressEvent),
}

impl EventRecord {
    /// A generic named event with record id and capture-time timestamp.
    pub fn generic(
        event_name: &str,
        attributes: &[EventAttribute],
        defaults: &[EventAttribute],
        record_id: u64,
    ) -> Self {
        EventRecord::Generic(GenericEvent {
            event_name: event_name.to_owned(),
            record_id,
            timestamp: Utc::now(),
            attributes: merge_attributes(defaults, attributes),
        })
    }

    /// The four-field item purchase shape. All fields become quoted
    /// attributes, numeric values included.
    pub fn item_purchase(
        item_id: &str,
        currency: &str,
        per_item_cost: i32,
        item_quantity: i32,
        defaults: &[EventAttribute],
    ) -> Self {
        let mut attributes = vec![
            EventAttribute::new("itemId", item_id),
            EventAttribute::new("currency", currency),
            EventAttribute::new("perItemCost", per_item_cost.to_string()),
            EventAttribute::new("itemQuantity", item_quantity.to_string()),
        ];
        attributes.extend_from_slice(defaults);
        EventRecord::Named(NamedEvent {
            event_name: "recordItemPurchase",
            attributes,
        })
    }

    /// The open-attribute item purchase shape; quantity stays numeric.
    pub fn item_purchase_with_attributes(
        item_id: &str,
        item_quantity: i32,
        attributes: &[EventAttribute],
        defaults: &[EventAttribute],
    ) -> Self {
        EventRecord::ItemPurchase(ItemPurchaseEvent {
            event_type: "ItemPurchase",
            item_id: item_id.to_owned(),
            item_quantity,
            attributes: merge_attributes(defaults, attributes),
        })
    }

    /// The five-field currency purchase shape.
    pub fn currency_purchase(
        game_currency_type: &str,
        game_currency_amount: i32,
        real_currency_type: &str,
        real_money_cost: f32,
        payment_provider: &str,
        defaults: &[EventAttribute],
    ) -> Self {
        let mut attributes = vec![
            EventAttribute::new("gameCurrencyType", game_currency_type),
            EventAttribute::new("gameCurrencyAmount", game_currency_amount.to_string()),
            EventAttribute::new("realCurrencyType", real_currency_type),
            EventAttribute::new("realMoneyCost", real_money_cost.to_string()),
            EventAttribute::new("paymentProvider", payment_provider),
        ];
        attributes.extend_from_slice(defaults);
        EventRecord::Named(NamedEvent {
            event_name: "recordCurrencyPurchase",
            attributes,
        })
    }

    /// The open-attribute currency purchase shape.
    pub fn currency_purchase_with_attributes(
        game_currency_type: &str,
        game_currency_amount: i32,
        attributes: &[EventAttribute],
        defaults: &[EventAttribute],
    ) -> Self {
        EventRecord::Currency(CurrencyEvent {
            event_type: "CurrencyPurchase",
            game_currency_type: game_currency_type.to_owned(),
            game_currency_amount,
            attributes: merge_attributes(defaults, attributes),
        })
    }

    /// The two-field currency given shape.
    pub fn currency_given(
        game_currency_type: &str,
        game_currency_amount: i32,
        defaults: &[EventAttribute],
    ) -> Self {
        let mut attributes = vec![
            EventAttribute::new("gameCurrencyType", game_currency_type),
            EventAttribute::new("gameCurrencyAmount", game_currency_amount.to_string()),
        ];
        attributes.extend_from_slice(defaults);
        EventRecord::Named(NamedEvent {
            event_name: "recordCurrencyGiven",
            attributes,
        })
    }

    /// The open-attribute currency given shape.
    pub fn currency_given_with_attributes(
        game_currency_type: &str,
        game_currency_amount: i32,
        attributes: &[EventAttribute],
        defaults: &[EventAttribute],
    ) -> Self {
        EventRecord::Currency(CurrencyEvent {
            event_type: "CurrencyGiven",
            game_currency_type: game_currency_type.to_owned(),
            game_currency_amount,
            attributes: merge_attributes(defaults, attributes),
        })
    }

    /// An error event.
    pub fn error(
        message: &str,
        attributes: &[EventAttribute],
        defaults: &[EventAttribute],
    ) -> Self {
        EventRecord::Error(ErrorEvent {
            error: message.to_owned(),
            attributes: merge_attributes(defaults, attributes),
        })
    }

    /// A progress event.
    pub fn progress(
        progress_type: &str,
        progress_name: &str,
        attributes: &[EventAttribute],
        defaults: &[EventAttribute],
    ) -> Self {
        EventRecord::Progress(ProgressEvent {
            event_type: "Progress",
            progress_type: progress_type.to_owned(),
            progress_name: progress_name.to_owned(),
            attributes: merge_attributes(defaults, attributes),
        })
    }

    /// Serialize this record into a document fragment.
    pub fn to_fragment(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Default attributes precede call-site attributes; both keep their own
/// relative order. Duplicate names are legal and preserved.
fn merge_attributes(
    defaults: &[EventAttribute],
    call_site: &[EventAttribute],
) -> Vec<EventAttribute> {
    let mut merged = Vec::with_capacity(defaults.len() + call_site.len());
    merged.extend_from_slice(defaults);
    merged.extend_from_slice(call_site);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parse(record: &EventRecord) -> Value {
        serde_json::from_str(&record.to_fragment().unwrap()).unwrap()
    }

    #[test]
    fn test_record_counter_is_monotonic_and_shared() {
        let counter = RecordCounter::starting_at(5);
        let clone = counter.clone();
        assert_eq!(counter.next_id(), 5);
        assert_eq!(clone.next_id(), 6);
        assert_eq!(counter.next_id(), 7);
    }

    #[test]
    fn test_generic_event_carries_record_id_and_timestamp() {
        let record = EventRecord::generic(
            "login",
            &[EventAttribute::new("method", "password")],
            &[],
            42,
        );
        let parsed = parse(&record);
        assert_eq!(parsed["eventName"], "login");
        assert_eq!(parsed["recordId"], 42);
        assert!(parsed["timestamp"].as_str().unwrap().contains('T'));
        assert_eq!(parsed["attributes"][0]["name"], "method");
    }

    #[test]
    fn test_generic_event_omits_empty_attributes() {
        let record = EventRecord::generic("tick", &[], &[], 0);
        let parsed = parse(&record);
        assert!(parsed.get("attributes").is_none());
    }

    #[test]
    fn test_defaults_precede_call_site_attributes() {
        let defaults = [EventAttribute::new("platform", "pc")];
        let call_site = [
            EventAttribute::new("method", "password"),
            EventAttribute::new("platform", "override"),
        ];
        let record = EventRecord::generic("login", &call_site, &defaults, 0);
        let parsed = parse(&record);
        let attrs = parsed["attributes"].as_array().unwrap();
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs[0]["name"], "platform");
        assert_eq!(attrs[0]["value"], "pc");
        assert_eq!(attrs[1]["name"], "method");
        // Duplicate names survive the merge in order.
        assert_eq!(attrs[2]["name"], "platform");
        assert_eq!(attrs[2]["value"], "override");
    }

    #[test]
    fn test_item_purchase_fields_become_quoted_attributes() {
        let record = EventRecord::item_purchase("sword01", "gold", 10, 2, &[]);
        let parsed = parse(&record);
        assert_eq!(parsed["eventName"], "recordItemPurchase");
        let attrs = parsed["attributes"].as_array().unwrap();
        assert_eq!(attrs[0]["name"], "itemId");
        assert_eq!(attrs[0]["value"], "sword01");
        assert_eq!(attrs[1]["value"], "gold");
        assert_eq!(attrs[2]["name"], "perItemCost");
        assert_eq!(attrs[2]["value"], "10");
        assert_eq!(attrs[3]["name"], "itemQuantity");
        assert_eq!(attrs[3]["value"], "2");
    }

    #[test]
    fn test_open_item_purchase_keeps_quantity_numeric() {
        let record = EventRecord::item_purchase_with_attributes(
            "shield02",
            3,
            &[EventAttribute::new("source", "shop")],
            &[],
        );
        let parsed = parse(&record);
        assert_eq!(parsed["eventType"], "ItemPurchase");
        assert_eq!(parsed["itemId"], "shield02");
        assert_eq!(parsed["itemQuantity"], 3);
        assert_eq!(parsed["attributes"][0]["name"], "source");
    }

    #[test]
    fn test_currency_purchase_five_field_shape() {
        let record = EventRecord::currency_purchase("gems", 100, "USD", 9.99, "appstore", &[]);
        let parsed = parse(&record);
        assert_eq!(parsed["eventName"], "recordCurrencyPurchase");
        let attrs = parsed["attributes"].as_array().unwrap();
        assert_eq!(attrs.len(), 5);
        assert_eq!(attrs[3]["name"], "realMoneyCost");
        assert_eq!(attrs[3]["value"], "9.99");
        assert_eq!(attrs[4]["value"], "appstore");
    }

    #[test]
    fn test_progress_and_error_shapes() {
        let progress = parse(&EventRecord::progress("level", "castle-3", &[], &[]));
        assert_eq!(progress["eventType"], "Progress");
        assert_eq!(progress["progressType"], "level");
        assert_eq!(progress["progressName"], "castle-3");
        assert_eq!(progress["attributes"], serde_json::json!([]));

        let error = parse(&EventRecord::error("out of memory", &[], &[]));
        assert_eq!(error["error"], "out of memory");
        assert_eq!(error["attributes"], serde_json::json!([]));
    }

    #[test]
    fn test_specialized_events_inherit_defaults() {
        let defaults = [EventAttribute::new("platform", "pc")];
        let given = parse(&EventRecord::currency_given("gold", 50, &defaults));
        let attrs = given["attributes"].as_array().unwrap();
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs[0]["name"], "gameCurrencyType");
        assert_eq!(attrs[2]["name"], "platform");

        let open = parse(&EventRecord::currency_given_with_attributes(
            "gold",
            50,
            &[EventAttribute::new("reason", "quest")],
            &defaults,
        ));
        let attrs = open["attributes"].as_array().unwrap();
        assert_eq!(attrs[0]["name"], "platform");
        assert_eq!(attrs[1]["name"], "reason");
    }
}
