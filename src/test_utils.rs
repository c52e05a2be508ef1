//! Shared test utilities.
//!
//! Helpers for setting up an in-memory database and creating wallets and
//! sessions with sensible defaults.

use crate::{
    core::{
        identity::Actor,
        pricing::PriceTable,
        session::{self, NewSession},
        wallet,
    },
    entities::{self, SessionDuration, SessionLevel},
    errors::Result,
};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};

/// Creates an in-memory `SQLite` database with all tables initialized.
///
/// The pool is pinned to one connection: every `SQLite` in-memory connection
/// is its own database.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let mut options = ConnectOptions::new("sqlite::memory:");
    options.max_connections(1).min_connections(1).sqlx_logging(false);
    let db = Database::connect(options).await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Creates a wallet holding `balance` credits.
pub async fn create_test_wallet(
    db: &DatabaseConnection,
    user_id: &str,
    balance: i64,
) -> Result<entities::wallet::Model> {
    wallet::ensure_wallet(db, user_id, balance).await
}

/// Creates a pending session priced with the standard table.
///
/// # Defaults
/// * duration: 60 minutes
/// * level: beginner (5 credits)
/// * title: `"Test session"`
pub async fn create_test_session(
    db: &DatabaseConnection,
    requester_id: &str,
    helper_id: &str,
) -> Result<entities::session::Model> {
    create_custom_session(
        db,
        &PriceTable::standard(),
        requester_id,
        helper_id,
        SessionDuration::Sixty,
        SessionLevel::Beginner,
    )
    .await
}

/// Creates a pending session with a custom price table, duration and level.
pub async fn create_custom_session(
    db: &DatabaseConnection,
    prices: &PriceTable,
    requester_id: &str,
    helper_id: &str,
    duration: SessionDuration,
    level: SessionLevel,
) -> Result<entities::session::Model> {
    session::create_session(
        db,
        prices,
        &Actor::member(requester_id),
        NewSession {
            helper_id: helper_id.to_string(),
            title: "Test session".to_string(),
            description: String::new(),
            duration,
            level,
            scheduled_time: None,
        },
    )
    .await
}
