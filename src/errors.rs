//! Unified error type for the ledger and session state machine.
//!
//! Variants fall into three groups. Validation errors are raised before any
//! database access. Business-rule errors are raised inside a transaction,
//! which is rolled back. Both are meant to be shown to the user. Everything
//! else is a system failure and is propagated unchanged.

use crate::entities::SessionStatus;
use thiserror::Error;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Credit amounts must be strictly positive.
    #[error("Amount must be positive, got {amount}")]
    InvalidAmount {
        /// The rejected amount
        amount: i64,
    },

    /// Both sides of a transfer or session are the same user.
    #[error("User {user_id} cannot exchange credits with themselves")]
    SameUser {
        /// The duplicated identity
        user_id: String,
    },

    /// A required field is missing or malformed.
    #[error("Invalid input: {message}")]
    Validation {
        /// What was wrong with the input
        message: String,
    },

    /// The source wallet cannot cover the transfer.
    #[error("Insufficient balance: available {available}, required {required}")]
    InsufficientBalance {
        /// Balance of the source wallet at the time of the check
        available: i64,
        /// Amount the transfer needed
        required: i64,
    },

    /// The actor is not allowed to perform the action.
    #[error("User {user_id} is not allowed to {action}")]
    Unauthorized {
        /// The rejected actor
        user_id: String,
        /// Human-readable action, e.g. `"complete session #3"`
        action: String,
    },

    /// The session cannot move from its current status with this action.
    #[error("Cannot {action} a session in status '{}'", .from.as_str())]
    InvalidTransition {
        /// Status the session was in
        from: SessionStatus,
        /// Attempted action
        action: &'static str,
    },

    /// No wallet exists for the user.
    #[error("Wallet not found for user {user_id}")]
    WalletNotFound {
        /// Identity that has no wallet
        user_id: String,
    },

    /// No session with this id.
    #[error("Session #{id} not found")]
    SessionNotFound {
        /// Requested session id
        id: i64,
    },

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// Environment variable could not be read.
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Database failure.
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

impl Error {
    /// Returns true for validation and business-rule errors, which the caller
    /// should report as a message rather than treat as a fault.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::InvalidAmount { .. }
                | Self::SameUser { .. }
                | Self::Validation { .. }
                | Self::InsufficientBalance { .. }
                | Self::Unauthorized { .. }
                | Self::InvalidTransition { .. }
                | Self::WalletNotFound { .. }
                | Self::SessionNotFound { .. }
        )
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
