use thiserror::Error;

/// Errors that can occur when recording to a bridge.
///
/// Callers treat every variant the same way: log and continue. The
/// distinction exists so operators can tell a broken backing store apart
/// from a record that could not be encoded.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The backing store rejected or could not accept the record.
    #[error("Bridge unavailable: {0}")]
    Unavailable(String),

    /// A record could not be serialized for the backing store.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for bridge operations.
pub type Result<T> = std::result::Result<T, BridgeError>;
