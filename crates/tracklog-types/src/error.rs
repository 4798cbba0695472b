//! Error types for value parsing in tracklog-types.

use thiserror::Error;

/// Errors that can occur when parsing tracklog values.
///
/// This error type is platform-agnostic and does not include
/// storage or provider errors (those belong in tracklog-store and tracklog-core).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The name does not correspond to a known accuracy priority.
    #[error("Unknown priority: {0}")]
    UnknownPriority(String),
}

/// Result type alias using tracklog-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
