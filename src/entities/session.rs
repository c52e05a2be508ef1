//! Session entity - A scheduled help exchange between a requester and a helper.
//!
//! Status, duration and level are stored as short strings through
//! `DeriveActiveEnum`, so the table stays readable from plain SQL.
//! `agreed_amount` is always derived from the price table by the session
//! state machine and is never taken from a caller.

use sea_orm::entity::prelude::*;
use sea_orm::sea_query::StringLen;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Lifecycle status of a session
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(12))")]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    /// Created by the requester, waiting for the helper
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Accepted by the helper
    #[sea_orm(string_value = "accepted")]
    Accepted,
    /// Finished and paid for (terminal)
    #[sea_orm(string_value = "completed")]
    Completed,
    /// Called off by a participant (terminal)
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl SessionStatus {
    /// Lowercase name as stored in the database
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Completed and cancelled sessions never change again
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// Length of a session
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
pub enum SessionDuration {
    /// 60 minutes
    #[sea_orm(string_value = "60")]
    #[serde(rename = "60")]
    Sixty,
    /// 90 minutes
    #[sea_orm(string_value = "90")]
    #[serde(rename = "90")]
    Ninety,
    /// 2 hours
    #[sea_orm(string_value = "120")]
    #[serde(rename = "120")]
    TwoHours,
}

impl SessionDuration {
    /// Length in minutes
    #[must_use]
    pub const fn minutes(self) -> u32 {
        match self {
            Self::Sixty => 60,
            Self::Ninety => 90,
            Self::TwoHours => 120,
        }
    }

    /// Maps a length in minutes back to a duration, `None` if unsupported
    #[must_use]
    pub const fn from_minutes(minutes: u32) -> Option<Self> {
        match minutes {
            60 => Some(Self::Sixty),
            90 => Some(Self::Ninety),
            120 => Some(Self::TwoHours),
            _ => None,
        }
    }
}

impl FromStr for SessionDuration {
    type Err = crate::errors::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .ok()
            .and_then(Self::from_minutes)
            .ok_or_else(|| crate::errors::Error::Validation {
                message: format!("Unsupported session duration '{s}'"),
            })
    }
}

/// Skill level the session is pitched at
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "lowercase")]
pub enum SessionLevel {
    /// Beginner level
    #[sea_orm(string_value = "beginner")]
    Beginner,
    /// Intermediate level
    #[sea_orm(string_value = "intermediate")]
    Intermediate,
    /// Advanced level
    #[sea_orm(string_value = "advanced")]
    Advanced,
}

impl FromStr for SessionLevel {
    type Err = crate::errors::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            _ => Err(crate::errors::Error::Validation {
                message: format!("Unsupported session level '{s}'"),
            }),
        }
    }
}

/// Session database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "sessions")]
pub struct Model {
    /// Unique identifier for the session
    #[sea_orm(primary_key)]
    pub id: i64,
    /// User asking for help, pays on completion
    pub requester_id: String,
    /// User giving help, paid on completion
    pub helper_id: String,
    /// Short title, e.g. "Learn Rust"
    pub title: String,
    /// Optional longer description
    pub description: String,
    /// Session length
    pub duration: SessionDuration,
    /// Session level
    pub level: SessionLevel,
    /// Price in credits, derived from duration and level
    pub agreed_amount: i64,
    /// Current lifecycle status
    pub status: SessionStatus,
    /// Set once the ledger transfer for this session has been committed
    pub credits_transferred: bool,
    /// When the session is scheduled to take place
    pub scheduled_time: Option<DateTimeUtc>,
    /// When the session was created
    pub created_at: DateTimeUtc,
    /// When the session was last modified
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// Whether the user takes part in the session as requester or helper
    #[must_use]
    pub fn involves(&self, user_id: &str) -> bool {
        self.requester_id == user_id || self.helper_id == user_id
    }
}

/// Defines relationships between sessions and ledger entries
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// A completed session has its payment entry
    #[sea_orm(has_many = "super::credit_transaction::Entity")]
    CreditTransactions,
}

impl Related<super::credit_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CreditTransactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
