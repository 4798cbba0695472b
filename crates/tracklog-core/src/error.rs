//! Error types for tracklog-core.
//!
//! # Error Policy
//!
//! None of these errors is allowed to take down the background runner. Each
//! is handled where it occurs:
//!
//! | Error | Where | Handling |
//! |-------|-------|----------|
//! | [`Error::PermissionDenied`] | [`Sampler::start`](crate::Sampler::start) | Logged; sampler stays stopped until permission is granted |
//! | [`Error::StorageFailure`] | writer queue | Logged; the sample is dropped, no retry |
//! | [`Error::NoLocationAvailable`] | sampler | Event skipped silently |
//! | [`Error::InvalidLocation`] | sampler | Logged; the event is dropped |
//!
//! Only start/stop acknowledgements and permission outcomes reach the UI
//! boundary; data-layer failures degrade to "no new samples".

use thiserror::Error;

/// Errors that can occur in the sampling pipeline.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The caller lacks location permission.
    #[error("Location permission not granted")]
    PermissionDenied,

    /// The persistence layer is unavailable or corrupt.
    #[error("Storage failure: {0}")]
    StorageFailure(#[from] tracklog_store::Error),

    /// The provider has no fix for this update.
    #[error("No location available")]
    NoLocationAvailable,

    /// The provider delivered coordinates outside WGS84 bounds.
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The keep-alive promotion could not be acquired.
    #[error("Keep-alive unavailable: {0}")]
    KeepAlive(String),
}

/// Result type alias using tracklog-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            Error::PermissionDenied.to_string(),
            "Location permission not granted"
        );
        assert_eq!(Error::NoLocationAvailable.to_string(), "No location available");
        assert_eq!(
            Error::InvalidConfig("fastest_interval must be > 0".into()).to_string(),
            "Invalid configuration: fastest_interval must be > 0"
        );
    }

    #[test]
    fn test_storage_failure_from_store_error() {
        let io = std::io::Error::other("disk gone");
        let err: Error = tracklog_store::Error::Io(io).into();
        assert!(matches!(err, Error::StorageFailure(_)));
        assert!(err.to_string().contains("disk gone"));
    }
}
