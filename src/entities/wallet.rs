//! Wallet entity - One credit balance per user.
//!
//! The wallet is keyed by the opaque identity supplied by the identity provider,
//! so the one-wallet-per-user invariant is enforced by the primary key.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Wallet database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "wallets")]
pub struct Model {
    /// Owning user identity
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: String,
    /// Current balance in credits, never negative
    pub balance: i64,
    /// When the wallet was created
    pub created_at: DateTimeUtc,
    /// When the balance last changed
    pub updated_at: DateTimeUtc,
}

/// Wallets are linked to ledger entries by user id only, without a foreign key,
/// because ledger entries outlive the participants they name.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
