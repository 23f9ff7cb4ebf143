//! Event attribute value type.
//!
//! Attributes are name/value pairs attached to recorded events. A value is
//! either plain text (escaped and quoted on serialization) or a pre-formed
//! JSON fragment that is embedded verbatim.

use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde_json::value::RawValue;

/// A single name/value pair attached to an analytics event.
///
/// Attributes are immutable once constructed. A non-empty `name` is the
/// caller's responsibility and is not checked here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventAttribute {
    /// Attribute name
    pub name: String,
    /// Attribute value, either plain text or a pre-formed JSON fragment
    pub value: String,
    /// Whether `value` is already a valid JSON value and must not be re-quoted
    pub is_json_fragment: bool,
}

impl EventAttribute {
    /// Create an attribute whose value is treated as plain text.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            is_json_fragment: false,
        }
    }

    /// Create an attribute whose value is a pre-formed JSON fragment.
    ///
    /// The caller guarantees that `value` is a syntactically valid JSON
    /// value. A fragment that fails validation is demoted to a plain string
    /// at serialization time so it cannot corrupt the document.
    pub fn json_fragment(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            is_json_fragment: true,
        }
    }
}

impl Serialize for EventAttribute {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("EventAttribute", 2)?;
        state.serialize_field("name", &self.name)?;
        if self.is_json_fragment {
            match RawValue::from_string(self.value.clone()) {
                Ok(raw) => state.serialize_field("value", &raw)?,
                Err(_) => state.serialize_field("value", &self.value)?,
            }
        } else {
            state.serialize_field("value", &self.value)?;
        }
        state.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_value_is_quoted() {
        let attr = EventAttribute::new("method", "password");
        let json = serde_json::to_string(&attr).unwrap();
        assert_eq!(json, r#"{"name":"method","value":"password"}"#);
    }

    #[test]
    fn test_plain_value_is_escaped() {
        let attr = EventAttribute::new("note", "say \"hi\"\nthen stop");
        let json = serde_json::to_string(&attr).unwrap();
        assert_eq!(json, r#"{"name":"note","value":"say \"hi\"\nthen stop"}"#);
    }

    #[test]
    fn test_json_fragment_embedded_verbatim() {
        let attr = EventAttribute::json_fragment("payload", r#"{"a":1,"b":[2,3]}"#);
        let json = serde_json::to_string(&attr).unwrap();
        assert_eq!(json, r#"{"name":"payload","value":{"a":1,"b":[2,3]}}"#);
    }

    #[test]
    fn test_invalid_fragment_falls_back_to_string() {
        let attr = EventAttribute::json_fragment("payload", "{not json");
        let json = serde_json::to_string(&attr).unwrap();
        assert_eq!(json, r#"{"name":"payload","value":"{not json"}"#);
    }
}
