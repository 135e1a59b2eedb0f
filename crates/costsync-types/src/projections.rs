//! Tolerant typed views over the specialized bucket values.
//!
//! The store keeps every bucket as an opaque [`serde_json::Value`] so that
//! applying a message can never fail. Where the payload shape is knowable
//! (the three high-traffic buckets) these projections give consumers a
//! typed read: deserialization is attempted at read time and simply yields
//! `None` when the bucket is absent or shaped differently than expected.
//!
//! Every struct is deliberately permissive: all fields are optional and
//! unknown fields are preserved in an `extra` map rather than rejected,
//! because the backend evolves its payloads independently of this client.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One rate card: per-direction tariffs for a service tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RateCard {
    /// Cost per unit for inbound goods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inbound: Option<f64>,
    /// Cost per unit for outbound goods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outbound: Option<f64>,
    /// Cost per unit per period for storage.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<f64>,
    /// Fields the backend sends that this client does not model.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// The full rate-card bucket: service tier name to rate card.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RateCardSet(pub BTreeMap<String, RateCard>);

/// One surcharge entry: either a flat amount, a percentage, or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Surcharge {
    /// Flat surcharge amount per unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flat: Option<f64>,
    /// Percentage surcharge applied to the base rate.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percent: Option<f64>,
    /// Fields the backend sends that this client does not model.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// The surcharge bucket: surcharge name to entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SurchargeSchedule(pub BTreeMap<String, Surcharge>);

/// One warehouse site as published by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Warehouse {
    /// Human-readable site name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Geographic region code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// Fields the backend sends that this client does not model.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// The warehouse bucket: site code to warehouse record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WarehouseDirectory(pub BTreeMap<String, Warehouse>);

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rate_card_set_tolerates_partial_payload() {
        let value = json!({ "basic": { "inbound": 2.5 } });
        let set: RateCardSet = serde_json::from_value(value).unwrap();
        let basic = set.0.get("basic").unwrap();
        assert_eq!(basic.inbound, Some(2.5));
        assert_eq!(basic.outbound, None);
    }

    #[test]
    fn unknown_fields_are_kept_not_rejected() {
        let value = json!({ "basic": { "inbound": 1.0, "currency": "EUR" } });
        let set: RateCardSet = serde_json::from_value(value).unwrap();
        let basic = set.0.get("basic").unwrap();
        assert_eq!(basic.extra.get("currency"), Some(&json!("EUR")));
    }

    #[test]
    fn mismatched_shape_fails_cleanly() {
        // A scalar where a map is expected must not panic, just not parse.
        let set: Option<RateCardSet> = serde_json::from_value(json!(42)).ok();
        assert!(set.is_none());
    }

    #[test]
    fn surcharge_accepts_flat_and_percent() {
        let value = json!({ "fuel": { "percent": 4.5 }, "peak": { "flat": 0.8 } });
        let schedule: SurchargeSchedule = serde_json::from_value(value).unwrap();
        assert_eq!(
            schedule.0.get("fuel").and_then(|s| s.percent),
            Some(4.5)
        );
        assert_eq!(schedule.0.get("peak").and_then(|s| s.flat), Some(0.8));
    }
}
