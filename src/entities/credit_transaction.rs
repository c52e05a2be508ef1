//! Credit transaction entity - Immutable ledger entry for one transfer.
//!
//! `from_user_id` is `None` for credits issued by the system. `session_id`
//! links the entry to the session whose completion paid for it.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Ledger entry database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "credit_transactions")]
pub struct Model {
    /// Unique identifier for the entry
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Paying user, `None` for system-originated credits
    pub from_user_id: Option<String>,
    /// Receiving user
    pub to_user_id: Option<String>,
    /// Credits moved, always positive
    pub amount: i64,
    /// Free-text note, e.g. `"Session #12"`
    pub note: String,
    /// Session that triggered the transfer, if any
    pub session_id: Option<i64>,
    /// When the transfer was committed
    pub created_at: DateTimeUtc,
}

/// Defines relationships between ledger entries and sessions
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each entry belongs to at most one session
    #[sea_orm(
        belongs_to = "super::session::Entity",
        from = "Column::SessionId",
        to = "super::session::Column::Id"
    )]
    Session,
}

impl Related<super::session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Session.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
