//! Inbound payload decoding.
//!
//! The costing backend wraps some payloads in an envelope:
//!
//! ```json
//! { "version": "1.0", "topics": [ { "value": <any>, ... }, ... ] }
//! ```
//!
//! and publishes others as bare JSON values. [`decode`] normalizes both
//! shapes to the bare application value by inspecting only `topics[0]`:
//!
//! - object with an array field `topics` whose first element is an object
//!   containing `value` -> `topics[0].value`
//! - `topics[0]` exists but has no `value` field -> `topics[0]` itself
//! - anything else -> the parsed value unchanged
//!
//! No further schema validation happens here; downstream components treat
//! the decoded value as opaque JSON. Envelope unwrapping is inbound-only --
//! the outbound command path sends raw serialized values.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecodeError;

/// Version tag written by [`Envelope::wrap`].
pub const ENVELOPE_VERSION: &str = "1.0";

/// Decode raw transport bytes into the canonical application value.
///
/// # Errors
///
/// Returns [`DecodeError::Json`] when the payload is not valid JSON.
pub fn decode(payload: &[u8]) -> Result<Value, DecodeError> {
    let parsed: Value = serde_json::from_slice(payload)?;
    Ok(unwrap_envelope(parsed))
}

/// Unwrap the optional envelope shape around a parsed value.
fn unwrap_envelope(parsed: Value) -> Value {
    let unwrapped = parsed
        .get("topics")
        .and_then(Value::as_array)
        .and_then(|entries| entries.first())
        .map(|first| first.get("value").unwrap_or(first).clone());
    unwrapped.unwrap_or(parsed)
}

/// The wrapper shape the backend places around some payloads.
///
/// Provided for tools and tests that need to synthesize backend frames;
/// the ingest path never constructs one, it only unwraps via [`decode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Envelope format version tag.
    pub version: String,
    /// Entries carried by this frame; only the first is ever inspected.
    pub topics: Vec<EnvelopeEntry>,
}

/// One entry inside an [`Envelope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeEntry {
    /// The application value for this entry.
    pub value: Value,
}

impl Envelope {
    /// Wrap a single application value in the standard envelope shape.
    pub fn wrap(value: Value) -> Self {
        Self {
            version: ENVELOPE_VERSION.to_owned(),
            topics: vec![EnvelopeEntry { value }],
        }
    }

    /// Serialize the envelope to wire bytes.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Json`] when serialization fails (only
    /// possible for values containing non-string map keys).
    pub fn to_bytes(&self) -> Result<Vec<u8>, DecodeError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn enveloped_value_round_trips() {
        let value = json!({ "basic": { "inbound": 2.5 } });
        let bytes = Envelope::wrap(value.clone()).to_bytes().unwrap();
        assert_eq!(decode(&bytes).unwrap(), value);
    }

    #[test]
    fn bare_value_round_trips() {
        let value = json!([1, 2, { "a": true }]);
        let bytes = serde_json::to_vec(&value).unwrap();
        assert_eq!(decode(&bytes).unwrap(), value);
    }

    #[test]
    fn observed_backend_frame_unwraps() {
        let raw = br#"{"version":"1.0","topics":[{"value":{"basic":{"inbound":2.5}}}]}"#;
        assert_eq!(decode(raw).unwrap(), json!({ "basic": { "inbound": 2.5 } }));
    }

    #[test]
    fn entry_without_value_field_is_taken_whole() {
        let raw = br#"{"version":"1.0","topics":[{"basic":{"inbound":1.0}}]}"#;
        assert_eq!(decode(raw).unwrap(), json!({ "basic": { "inbound": 1.0 } }));
    }

    #[test]
    fn non_object_first_entry_is_taken_whole() {
        let raw = br#"{"version":"1.0","topics":["plain"]}"#;
        assert_eq!(decode(raw).unwrap(), json!("plain"));
    }

    #[test]
    fn empty_topics_array_yields_parsed_value() {
        let raw = br#"{"version":"1.0","topics":[]}"#;
        assert_eq!(decode(raw).unwrap(), json!({ "version": "1.0", "topics": [] }));
    }

    #[test]
    fn object_without_topics_is_bare() {
        let raw = br#"{"status":"ok"}"#;
        assert_eq!(decode(raw).unwrap(), json!({ "status": "ok" }));
    }

    #[test]
    fn topics_field_that_is_not_an_array_is_bare() {
        let raw = br#"{"topics":"CostSync/State/Rate_Cards"}"#;
        assert_eq!(
            decode(raw).unwrap(),
            json!({ "topics": "CostSync/State/Rate_Cards" })
        );
    }

    #[test]
    fn invalid_json_is_a_decode_error() {
        let result = decode(b"{not json");
        assert!(matches!(result, Err(DecodeError::Json(_))));
    }
}
