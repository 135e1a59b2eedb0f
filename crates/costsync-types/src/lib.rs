//! Shared type definitions for the CostSync state-synchronization core.
//!
//! This crate is the single source of truth for the vocabulary shared by
//! the pure core (`costsync-core`) and the transport layer
//! (`costsync-client`): topic keys, bucket identities, connection status,
//! command correlation tokens, and the typed read projections of the
//! specialized buckets.
//!
//! # Modules
//!
//! - [`topic`] -- Hierarchical topic key used for subscription and routing
//! - [`buckets`] -- Identities of the specialized store buckets
//! - [`status`] -- Connection status reported by the connection manager
//! - [`correlation`] -- Tokens that join outbound commands to inbound
//!   confirmations
//! - [`projections`] -- Tolerant typed views over the opaque bucket values

pub mod buckets;
pub mod correlation;
pub mod projections;
pub mod status;
pub mod topic;

// Re-export all public types at crate root for convenience.
pub use buckets::BucketId;
pub use correlation::{CORRELATION_FIELD, CorrelationToken};
pub use projections::{
    RateCard, RateCardSet, Surcharge, SurchargeSchedule, Warehouse, WarehouseDirectory,
};
pub use status::ConnectionStatus;
pub use topic::{TOPIC_DELIMITER, Topic};
