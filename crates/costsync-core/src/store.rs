//! The immutable state snapshot and its merge rule.
//!
//! [`Snapshot`] is the full bucket mapping at one instant. Applying a
//! message never mutates in place: [`Snapshot::apply`] produces a new
//! snapshot that shallow-copies the previous one, replaces the matched
//! specialized bucket wholesale, and sets the catch-all entry for the
//! message's topic. The ingest task swaps the new snapshot in atomically,
//! so readers never observe a partially applied update.
//!
//! `apply` is a pure function of `(previous, topic, value)`: no I/O, no
//! clock, no failure mode. A value of unexpected shape is stored as-is;
//! tolerating it is the reader's job (see the typed projections).

use std::collections::BTreeMap;

use costsync_types::{BucketId, RateCardSet, SurchargeSchedule, Topic, WarehouseDirectory};
use serde_json::Value;

use crate::classify::classify;

/// The full, immutable state of all buckets at one instant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Specialized bucket: latest rate-card payload, replaced wholesale.
    rates: Option<Value>,
    /// Specialized bucket: latest surcharge payload, replaced wholesale.
    surcharges: Option<Value>,
    /// Specialized bucket: latest warehouse payload, replaced wholesale.
    warehouses: Option<Value>,
    /// Catch-all bucket: latest decoded value per full topic string.
    raw: BTreeMap<String, Value>,
    /// Number of messages applied since the empty snapshot.
    revision: u64,
}

impl Snapshot {
    /// The empty snapshot every store starts from.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Apply one decoded message, producing the successor snapshot.
    ///
    /// The matched specialized bucket (if any) is replaced in full -- never
    /// merged field-by-field -- and the catch-all entry for `topic` is set.
    /// All other catch-all keys are preserved unchanged.
    pub fn apply(&self, topic: &Topic, value: Value) -> Self {
        let mut next = self.clone();
        next.revision = next.revision.wrapping_add(1);
        if let Some(bucket) = classify(topic) {
            next.set_specialized(bucket, value.clone());
        }
        next.raw.insert(topic.as_str().to_owned(), value);
        next
    }

    /// Replace one specialized bucket's value wholesale.
    fn set_specialized(&mut self, bucket: BucketId, value: Value) {
        match bucket {
            BucketId::Rates => self.rates = Some(value),
            BucketId::Surcharges => self.surcharges = Some(value),
            BucketId::Warehouses => self.warehouses = Some(value),
        }
    }

    /// The opaque value of a specialized bucket, if it has been populated.
    pub const fn bucket(&self, bucket: BucketId) -> Option<&Value> {
        match bucket {
            BucketId::Rates => self.rates.as_ref(),
            BucketId::Surcharges => self.surcharges.as_ref(),
            BucketId::Warehouses => self.warehouses.as_ref(),
        }
    }

    /// The catch-all entry for a topic, if one has arrived.
    pub fn raw(&self, topic: &str) -> Option<&Value> {
        self.raw.get(topic)
    }

    /// Every catch-all entry, keyed by full topic string.
    pub const fn raw_all(&self) -> &BTreeMap<String, Value> {
        &self.raw
    }

    /// Number of messages applied since the empty snapshot.
    ///
    /// Strictly increasing across successive applies; cheap change
    /// detection for consumers that poll.
    pub const fn revision(&self) -> u64 {
        self.revision
    }

    /// Whether no message has been applied yet.
    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Typed view of the rates bucket.
    ///
    /// `None` when the bucket is absent or shaped differently than
    /// expected -- both are valid states, since buckets populate
    /// asynchronously and the backend evolves its payloads.
    pub fn rate_cards(&self) -> Option<RateCardSet> {
        self.rates
            .clone()
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Typed view of the surcharges bucket; see [`Snapshot::rate_cards`].
    pub fn surcharge_schedule(&self) -> Option<SurchargeSchedule> {
        self.surcharges
            .clone()
            .and_then(|value| serde_json::from_value(value).ok())
    }

    /// Typed view of the warehouses bucket; see [`Snapshot::rate_cards`].
    pub fn warehouse_directory(&self) -> Option<WarehouseDirectory> {
        self.warehouses
            .clone()
            .and_then(|value| serde_json::from_value(value).ok())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn topic(raw: &str) -> Topic {
        Topic::from(raw)
    }

    #[test]
    fn specialized_write_also_updates_catch_all() {
        let snapshot = Snapshot::empty().apply(
            &topic("X/State/Rate_Cards"),
            json!({ "basic": { "inbound": 2.5 } }),
        );

        let expected = json!({ "basic": { "inbound": 2.5 } });
        assert_eq!(snapshot.bucket(BucketId::Rates), Some(&expected));
        assert_eq!(snapshot.raw("X/State/Rate_Cards"), Some(&expected));
    }

    #[test]
    fn specialized_bucket_is_replaced_not_merged() {
        let t = topic("X/State/Rate_Cards");
        let first = Snapshot::empty().apply(&t, json!({ "basic": { "inbound": 1.0 } }));
        let second = first.apply(&t, json!({ "express": { "outbound": 9.0 } }));

        // Total replacement: nothing from the first payload survives.
        assert_eq!(
            second.bucket(BucketId::Rates),
            Some(&json!({ "express": { "outbound": 9.0 } }))
        );
    }

    #[test]
    fn catch_all_routing_is_idempotent() {
        let t = topic("X/State/Job_Queue");
        let value = json!({ "queued": 3 });
        let once = Snapshot::empty().apply(&t, value.clone());
        let twice = once.apply(&t, value);

        assert_eq!(once.raw_all(), twice.raw_all());
    }

    #[test]
    fn catch_all_write_never_touches_specialized_buckets() {
        let with_rates = Snapshot::empty().apply(
            &topic("X/State/Rate_Cards"),
            json!({ "basic": { "inbound": 2.5 } }),
        );
        let after = with_rates.apply(&topic("X/State/Job_Queue"), json!({ "queued": 1 }));

        assert_eq!(
            after.bucket(BucketId::Rates),
            with_rates.bucket(BucketId::Rates)
        );
        assert_eq!(after.bucket(BucketId::Surcharges), None);
        assert_eq!(after.bucket(BucketId::Warehouses), None);
    }

    #[test]
    fn other_catch_all_keys_are_preserved() {
        let first = Snapshot::empty().apply(&topic("A/State/One"), json!(1));
        let second = first.apply(&topic("A/State/Two"), json!(2));

        assert_eq!(second.raw("A/State/One"), Some(&json!(1)));
        assert_eq!(second.raw("A/State/Two"), Some(&json!(2)));
    }

    #[test]
    fn apply_leaves_the_previous_snapshot_untouched() {
        let t = topic("X/State/Rate_Cards");
        let first = Snapshot::empty().apply(&t, json!("old"));
        let _second = first.apply(&t, json!("new"));

        assert_eq!(first.raw("X/State/Rate_Cards"), Some(&json!("old")));
        assert_eq!(first.revision(), 1);
    }

    #[test]
    fn revision_counts_applies() {
        let first = Snapshot::empty().apply(&topic("A"), json!(1));
        let second = first.apply(&topic("B"), json!(2));
        assert_eq!(second.revision(), 2);
    }

    #[test]
    fn typed_projection_reads_the_rates_bucket() {
        let snapshot = Snapshot::empty().apply(
            &topic("X/State/Rate_Cards"),
            json!({ "basic": { "inbound": 2.5 } }),
        );
        let cards = snapshot.rate_cards().unwrap();
        assert_eq!(
            cards.0.get("basic").and_then(|c| c.inbound),
            Some(2.5)
        );
    }

    #[test]
    fn typed_projection_tolerates_unexpected_shape() {
        // The store accepts anything; the typed view just declines.
        let snapshot =
            Snapshot::empty().apply(&topic("X/State/Rate_Cards"), json!("not a map"));
        assert!(snapshot.rate_cards().is_none());
        assert_eq!(snapshot.bucket(BucketId::Rates), Some(&json!("not a map")));
    }

    #[test]
    fn empty_buckets_are_a_valid_state() {
        let snapshot = Snapshot::empty();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.bucket(BucketId::Rates), None);
        assert_eq!(snapshot.raw("anything"), None);
    }
}
