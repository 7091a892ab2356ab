//! Error types for the memoization layer
//!
//! Provides configuration and key-resolution errors using thiserror.
//! Failures of the wrapped function are never converted: they flow back to the
//! caller as the caller's own error type.

use thiserror::Error;

// == Throttle Error Enum ==
/// Errors raised by the memoization layer itself.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ThrottleError {
    /// None of `cache`, `max_age` or `max_size` was configured
    #[error(
        "No cache limitation options set, set at least one of \"cache\", \"max_age\", or \"max_size\""
    )]
    Unbounded,

    /// `max_size` must hold at least one entry
    #[error("Invalid max_size: {0}")]
    InvalidMaxSize(usize),

    /// Error policy name is not one of `clear`, `persist`, `cached`
    #[error("Unknown error policy: {0}")]
    UnknownPolicy(String),

    /// Resolver output could not be turned into a cache key
    #[error("Failed to resolve cache key: {0}")]
    Key(String),

    /// The computation a caller was waiting on ended without a result
    /// (the wrapped function panicked)
    #[error("Computation abandoned before completing")]
    Abandoned,
}

// == Result Type Alias ==
/// Convenience Result type for configuration and key resolution.
pub type Result<T> = std::result::Result<T, ThrottleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert!(ThrottleError::Unbounded.to_string().contains("max_age"));
        assert_eq!(
            ThrottleError::InvalidMaxSize(0).to_string(),
            "Invalid max_size: 0"
        );
        assert_eq!(
            ThrottleError::UnknownPolicy("retry".to_string()).to_string(),
            "Unknown error policy: retry"
        );
        assert_eq!(
            ThrottleError::Key("bad".to_string()).to_string(),
            "Failed to resolve cache key: bad"
        );
        assert_eq!(
            ThrottleError::Abandoned.to_string(),
            "Computation abandoned before completing"
        );
    }
}
