//! # Error Types for the Chronovault Wallet Engine
//!
//! This module provides error handling for every stage of the timelock
//! commit-reveal protocol: timing preconditions, schedule lookups, beacon
//! availability, and ledger submission.
//!
//! Every failure carries the violated precondition rather than a generic
//! message, so a rejected commit or reveal states the exact instant and
//! boundary involved.

use thiserror::Error;

/// Main error type for all wallet protocol operations
#[derive(Debug, Error)]
pub enum WalletError {
    /// A commit or reveal was attempted outside its legal window.
    /// Rejected locally before any network call; never retried.
    #[error("timing violation during {operation}: now is {now}, expiration is {expiration}")]
    Timing {
        operation: &'static str,
        now: u64,
        expiration: u64,
    },

    /// No schedule leaf matches the requested expiration timestamp.
    /// The caller miscomputed the boundary or the schedule was exhausted.
    #[error("no schedule entry with expiration {expiration}")]
    ProofNotFound { expiration: u64 },

    /// The beacon has not yet published the signature for a round.
    /// Retryable by polling until the caller-chosen bound is reached.
    #[error("beacon round {round} is not yet available")]
    RoundNotReady { round: u64 },

    /// The OTP rotation schedule has no rotations left for the current time
    #[error("rotation schedule exhausted: last expiration {last_expiration}, now {now}")]
    ScheduleExhausted { last_expiration: u64, now: u64 },

    /// A rotation schedule was requested with no rotations
    #[error("rotation schedule must contain at least one rotation")]
    EmptySchedule,

    /// Invalid expiration-clock inputs
    #[error("clock error: {message}")]
    Clock { message: String },

    /// The ledger rejected a commit or reveal for lack of escrowed funds
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u64, available: u64 },

    /// The ledger rejected a submitted transaction. Fatal for the attempt;
    /// resubmission is an explicit caller decision, not automatic.
    #[error("ledger transaction reverted during {operation}: {reason}")]
    TransactionReverted {
        operation: &'static str,
        reason: String,
    },

    /// Cryptographic operation failures (point decoding, pairing input shape)
    #[error("cryptographic operation failed: {message}")]
    Cryptography { message: String },

    /// Invalid wallet state for the requested transition
    #[error("invalid wallet state: {message}")]
    InvalidState { message: String },

    /// Beacon gateway request failures
    #[error("beacon gateway request failed: {source}")]
    Network {
        #[from]
        source: reqwest::Error,
    },

    /// Unexpected beacon gateway response shape
    #[error("invalid beacon response: {message}")]
    InvalidBeaconResponse { message: String },

    /// File I/O operations on persisted wallet state
    #[error("file operation failed: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization errors
    #[error("JSON processing error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
}

/// Result type alias for wallet operations
pub type WalletResult<T> = Result<T, WalletError>;

impl WalletError {
    /// Create a timing error for a named protocol operation
    pub fn timing(operation: &'static str, now: u64, expiration: u64) -> Self {
        Self::Timing {
            operation,
            now,
            expiration,
        }
    }

    /// Create a clock error with a message
    pub fn clock(message: impl Into<String>) -> Self {
        Self::Clock {
            message: message.into(),
        }
    }

    /// Create a cryptography error with a message
    pub fn crypto(message: impl Into<String>) -> Self {
        Self::Cryptography {
            message: message.into(),
        }
    }

    /// Create an invalid-state error with a message
    pub fn state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a transaction-reverted error for a named operation
    pub fn reverted(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::TransactionReverted {
            operation,
            reason: reason.into(),
        }
    }

    /// Check if this error is retryable.
    ///
    /// Only beacon availability and transport failures qualify; timing and
    /// lookup violations are final for the attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            WalletError::RoundNotReady { .. } | WalletError::Network { .. }
        )
    }

    /// Check if this error is a configuration error, fatal at initialization
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            WalletError::EmptySchedule | WalletError::Clock { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let timing = WalletError::timing("reveal", 100, 160);
        assert!(matches!(timing, WalletError::Timing { .. }));
        assert_eq!(
            timing.to_string(),
            "timing violation during reveal: now is 100, expiration is 160"
        );

        let clock = WalletError::clock("interval must be positive");
        assert!(clock.is_configuration());
    }

    #[test]
    fn test_error_classification() {
        assert!(WalletError::RoundNotReady { round: 42 }.is_retryable());
        assert!(!WalletError::ProofNotFound { expiration: 1 }.is_retryable());
        assert!(!WalletError::timing("commit", 5, 5).is_retryable());
        assert!(WalletError::EmptySchedule.is_configuration());
        assert!(!WalletError::EmptySchedule.is_retryable());
    }
}
