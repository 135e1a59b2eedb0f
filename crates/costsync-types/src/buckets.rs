//! Identities of the specialized store buckets.
//!
//! The store holds a small fixed set of named slots: three specialized
//! buckets for the high-traffic topic families, plus one catch-all bucket
//! keyed by the full topic string. Only the specialized buckets need an
//! identity -- the catch-all is written unconditionally for every message.

use serde::{Deserialize, Serialize};

/// A specialized bucket in the synchronized store.
///
/// A message updates at most one specialized bucket (decided by the topic
/// classifier) and always also lands in the catch-all under its own topic
/// key; specialized routing is additive, never exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketId {
    /// Per-service rate cards published by the costing backend.
    Rates,
    /// Surcharge schedules (fuel, peak-season, handling).
    Surcharges,
    /// Warehouse directory and per-site metadata.
    Warehouses,
}

impl BucketId {
    /// All specialized buckets, in classifier priority order.
    pub const ALL: [Self; 3] = [Self::Rates, Self::Surcharges, Self::Warehouses];

    /// Stable snake_case name of the bucket, matching its serde tag.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Rates => "rates",
            Self::Surcharges => "surcharges",
            Self::Warehouses => "warehouses",
        }
    }
}

impl core::fmt::Display for BucketId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.name())
    }
}
