//! Error types for the licensing module.

use thiserror::Error;

/// Licensing-specific errors.
#[derive(Debug, Error)]
pub enum LicenseError {
    /// No record exists for the given key.
    #[error("license key not found: {0}")]
    NotFound(String),

    /// Add refused because the key already exists and reissue is disabled.
    #[error("license key already exists: {0}")]
    KeyExists(String),

    /// Admin secret did not match.
    #[error("forbidden")]
    Forbidden,

    /// Service configuration rejected (e.g. an empty admin secret).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Expiry value could not be parsed.
    #[error("invalid expiry timestamp: {0}")]
    InvalidExpiry(String),

    /// Backing store exists but could not be decoded.
    #[error("corrupt license store: {0}")]
    CorruptStore(String),

    /// Backing store could not be read or written.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LicenseError {
    /// Returns true if this error means the durable state may lag memory.
    #[must_use]
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Serialization(_))
    }
}

/// Result type for license operations.
pub type LicenseResult<T> = Result<T, LicenseError>;
