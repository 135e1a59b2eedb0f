//! Pure state-synchronization core for CostSync.
//!
//! Everything in this crate is synchronous and side-effect free: decoding
//! the wire envelope, classifying topics into buckets, applying messages to
//! the immutable snapshot, and tracking command correlation. The transport
//! layer (`costsync-client`) drives these functions from its ingest task;
//! nothing here performs I/O or depends on a runtime.
//!
//! # Modules
//!
//! - [`envelope`] -- Inbound payload decoding and the optional wrapper shape
//! - [`classify`] -- Substring routing from topic to specialized bucket
//! - [`store`] -- The immutable [`store::Snapshot`] and its `apply` merge
//! - [`correlation`] -- Pending-command bookkeeping for confirmation joins
//! - [`error`] -- Decode error taxonomy

pub mod classify;
pub mod correlation;
pub mod envelope;
pub mod error;
pub mod store;

pub use classify::{ROUTING_TABLE, classify};
pub use correlation::{CorrelationTracker, PendingCommand};
pub use envelope::{Envelope, decode};
pub use error::DecodeError;
pub use store::Snapshot;
