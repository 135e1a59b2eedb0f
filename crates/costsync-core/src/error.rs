//! Error types for the pure core.
//!
//! Uses `thiserror` for typed errors. Decoding is the only fallible
//! operation in this crate: classification and snapshot application are
//! total functions, so a malformed payload is rejected at the decode
//! boundary and never reaches the store.

/// Errors that can occur while decoding an inbound payload.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload bytes are not valid JSON.
    ///
    /// Recovered locally by the caller: the message is dropped and logged,
    /// the snapshot stays untouched.
    #[error("payload is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}
