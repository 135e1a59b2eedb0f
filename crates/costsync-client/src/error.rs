//! Error types for the transport layer.
//!
//! Nothing here is fatal to the process: decode failures drop a single
//! message, transport failures surface as `ConnectionStatus::Error` until
//! the retry loop recovers, and publish preconditions degrade to logged
//! no-ops. These variants cover the few operations that do return errors
//! to the caller (store lifecycle).

/// Errors returned by store lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The ingest pipeline is gone; the store was torn down or its task
    /// panicked.
    #[error("ingest channel closed")]
    ChannelClosed,

    /// The MQTT client rejected an operation.
    #[error("mqtt error: {0}")]
    Mqtt(String),
}
