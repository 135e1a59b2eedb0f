//! Substring routing from topic to specialized bucket.
//!
//! Topics are never parsed into a typed schema. Classification checks the
//! full topic string for substring containment against a small static
//! table, in a fixed priority order; the first match wins. A topic that
//! matches nothing still lands in the catch-all bucket -- that write is
//! unconditional and handled by the store, not here.

use costsync_types::{BucketId, Topic};

/// Priority-ordered routing table: `(substring, specialized bucket)`.
///
/// The order is part of the contract: when a topic contains more than one
/// needle, the earlier entry wins.
pub const ROUTING_TABLE: [(&str, BucketId); 3] = [
    ("Rate_Cards", BucketId::Rates),
    ("Surcharge", BucketId::Surcharges),
    ("Warehouse", BucketId::Warehouses),
];

/// Decide which specialized bucket, if any, a topic belongs to.
///
/// Returns `None` for topics that only update the catch-all bucket.
pub fn classify(topic: &Topic) -> Option<BucketId> {
    ROUTING_TABLE
        .iter()
        .find(|(needle, _)| topic.contains(needle))
        .map(|&(_, bucket)| bucket)
}
