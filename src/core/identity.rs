//! Caller identity as supplied by the identity provider.
//!
//! The ledger trusts this value as-is; credentials are checked upstream.

use serde::{Deserialize, Serialize};

/// The user performing an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Opaque, stable user identity
    pub user_id: String,
    /// Staff/admin capability that bypasses ownership checks
    pub is_privileged: bool,
}

impl Actor {
    /// A regular member
    pub fn member(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_privileged: false,
        }
    }

    /// A staff member with elevated privilege
    pub fn staff(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            is_privileged: true,
        }
    }

    /// True if the actor is `user_id` or is privileged
    #[must_use]
    pub fn is_or_privileged(&self, user_id: &str) -> bool {
        self.is_privileged || self.user_id == user_id
    }
}
