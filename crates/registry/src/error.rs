use thiserror::Error;

/// Errors that can occur during registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No registration exists for the given service ID.
    #[error("Service not found: {0}")]
    NotFound(String),

    /// A health status string did not match any known status.
    #[error("Invalid health status: {0}")]
    InvalidHealthStatus(String),
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
