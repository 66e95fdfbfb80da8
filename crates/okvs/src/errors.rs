// SPDX-License-Identifier: LGPL-3.0-only
//
// This file is provided WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE.

//! Error types for OKVS construction, lookup and persistence
//!
//! `UnsolvableSystem` is an expected outcome of a random draw and is returned like any
//! other error; callers decide whether to re-key and retry.

use thiserror::Error;

/// Main error type for OKVS operations
#[derive(Error, Debug)]
pub enum OkvsError {
    /// The number of supplied pairs differs from the configured `N`
    #[error("Parameter mismatch: expected {expected} pairs, got {actual}")]
    ParameterMismatch { expected: usize, actual: usize },

    /// Table parameters that cannot describe a valid store
    #[error("Invalid parameters: {message}")]
    InvalidParameters { message: String },

    /// No pivot exists for a row during forward elimination
    #[error("Unsolvable system: row {row} has no pivot after elimination")]
    UnsolvableSystem { row: usize },

    /// A decoded value differs from the value encoded for the same key
    #[error("Decode mismatch for pair {index}")]
    DecodeMismatch { index: usize },

    /// An input value is not a canonical element of the ring
    #[error("Value of pair {index} is not a canonical ring element")]
    ValueOutOfRange { index: usize },

    /// Modular arithmetic failures
    #[error("Mathematical error: {message}")]
    Math { message: String },

    /// Malformed persisted table
    #[error("Codec error: {message}")]
    Codec { message: String },

    /// Configuration loading or validation failure
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Worker pool could not be built
    #[error("Scheduler error: {message}")]
    Scheduler { message: String },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for OKVS operations
pub type OkvsResult<T> = Result<T, OkvsError>;

/// Mathematical error type for field arithmetic failures
#[derive(Error, Debug)]
pub enum MathError {
    /// Modular inverse doesn't exist
    #[error("Modular inverse does not exist for {a} mod {modulus} (gcd != 1)")]
    NoModularInverse { a: String, modulus: String },

    /// Invalid modulus for a prime field
    #[error("Invalid modulus: {modulus} - {reason}")]
    InvalidModulus { modulus: String, reason: String },
}

impl From<MathError> for OkvsError {
    fn from(err: MathError) -> Self {
        OkvsError::Math {
            message: err.to_string(),
        }
    }
}

impl From<figment::Error> for OkvsError {
    fn from(err: figment::Error) -> Self {
        OkvsError::Config {
            message: err.to_string(),
        }
    }
}

impl OkvsError {
    /// Create an invalid parameters error with a message
    pub fn invalid_parameters(message: impl Into<String>) -> Self {
        OkvsError::InvalidParameters {
            message: message.into(),
        }
    }

    /// Create a codec error with a message
    pub fn codec(message: impl Into<String>) -> Self {
        OkvsError::Codec {
            message: message.into(),
        }
    }

    /// Create a configuration error with a message
    pub fn config(message: impl Into<String>) -> Self {
        OkvsError::Config {
            message: message.into(),
        }
    }

    /// True when the failure came from the random draw and a re-keyed attempt may succeed
    pub fn is_unsolvable(&self) -> bool {
        matches!(self, OkvsError::UnsolvableSystem { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_math_error_converts() {
        let err: OkvsError = MathError::NoModularInverse {
            a: "0".to_string(),
            modulus: "7".to_string(),
        }
        .into();
        assert!(matches!(err, OkvsError::Math { .. }));
        assert!(err.to_string().contains("0 mod 7"));
    }

    #[test]
    fn test_only_unsolvable_is_retryable() {
        assert!(OkvsError::UnsolvableSystem { row: 3 }.is_unsolvable());
        assert!(!OkvsError::ParameterMismatch {
            expected: 1,
            actual: 2
        }
        .is_unsolvable());
        assert!(!OkvsError::invalid_parameters("w").is_unsolvable());
    }
}
