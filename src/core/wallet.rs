//! Wallet ledger - Handles balances and credit transfers between users.
//!
//! Every balance change goes through [`transfer`] or [`grant_credits`], which
//! lock the affected wallet rows, validate, update balances and append one
//! immutable ledger entry inside a single database transaction. When called
//! with an already open transaction the work runs in a savepoint, so an outer
//! operation (such as session completion) can roll everything back together.

use crate::{
    config::credits::{CreditsConfig, ManualTransferPolicy},
    core::identity::Actor,
    entities::{CreditTransaction, Wallet, credit_transaction, wallet},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{Condition, QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use tracing::{debug, info, instrument, warn};

/// Balance and history of one wallet, for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletStatement {
    /// Current balance
    pub balance: i64,
    /// Sum of all credits the user has paid out
    pub total_sent: i64,
    /// Sum of all credits the user has received
    pub total_received: i64,
    /// Entries where the user is sender or receiver, newest first
    pub entries: Vec<credit_transaction::Model>,
}

/// Looks up a wallet without locking it.
pub async fn get_wallet<C>(db: &C, user_id: &str) -> Result<Option<wallet::Model>>
where
    C: ConnectionTrait,
{
    Wallet::find_by_id(user_id.to_owned())
        .one(db)
        .await
        .map_err(Into::into)
}

/// Returns the current balance, failing if the user has no wallet.
pub async fn get_balance<C>(db: &C, user_id: &str) -> Result<i64>
where
    C: ConnectionTrait,
{
    get_wallet(db, user_id)
        .await?
        .map(|wallet| wallet.balance)
        .ok_or_else(|| Error::WalletNotFound {
            user_id: user_id.to_owned(),
        })
}

/// Returns the user's wallet, creating it with `starting_balance` if missing.
///
/// An existing wallet is returned untouched, so calling this repeatedly never
/// resets a balance. If a concurrent caller creates the wallet first, the
/// insert fails on the primary key and the winner's row is returned instead.
#[instrument(skip(db))]
pub async fn ensure_wallet<C>(db: &C, user_id: &str, starting_balance: i64) -> Result<wallet::Model>
where
    C: ConnectionTrait,
{
    if starting_balance < 0 {
        return Err(Error::InvalidAmount {
            amount: starting_balance,
        });
    }

    if let Some(existing) = get_wallet(db, user_id).await? {
        return Ok(existing);
    }

    let now = Utc::now();
    let new_wallet = wallet::ActiveModel {
        user_id: Set(user_id.to_owned()),
        balance: Set(starting_balance),
        created_at: Set(now),
        updated_at: Set(now),
    };

    match new_wallet.insert(db).await {
        Ok(created) => {
            info!(user_id, balance = starting_balance, "Created wallet");
            Ok(created)
        }
        Err(insert_error) => {
            debug!(user_id, "Wallet insert failed, checking for concurrent creation");
            get_wallet(db, user_id)
                .await?
                .ok_or(Error::Database(insert_error))
        }
    }
}

/// Hook for the identity provider to call right after a user is created.
///
/// Creates the user's wallet with the configured starting balance.
pub async fn on_user_created<C>(
    db: &C,
    user_id: &str,
    config: &CreditsConfig,
) -> Result<wallet::Model>
where
    C: ConnectionTrait,
{
    ensure_wallet(db, user_id, config.initial_credits).await
}

async fn lock_wallet<C>(db: &C, user_id: &str) -> Result<wallet::Model>
where
    C: ConnectionTrait,
{
    Wallet::find_by_id(user_id.to_owned())
        .lock_exclusive()
        .one(db)
        .await?
        .ok_or_else(|| Error::WalletNotFound {
            user_id: user_id.to_owned(),
        })
}

async fn set_balance<C>(db: &C, wallet: wallet::Model, balance: i64) -> Result<wallet::Model>
where
    C: ConnectionTrait,
{
    let mut active: wallet::ActiveModel = wallet.into();
    active.balance = Set(balance);
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Moves `amount` credits from one user's wallet to another's.
///
/// Both wallet rows are locked in ascending `user_id` order so that two
/// opposite-direction transfers cannot deadlock. The transfer is rejected
/// without touching any row if the amount is not positive or both users are
/// the same, and rolled back if the source balance is too low.
///
/// # Returns
/// The ledger entry recording the transfer.
#[instrument(skip(db, note))]
pub async fn transfer<C>(
    db: &C,
    from_user: &str,
    to_user: &str,
    amount: i64,
    note: &str,
    session_id: Option<i64>,
) -> Result<credit_transaction::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    if amount <= 0 {
        return Err(Error::InvalidAmount { amount });
    }

    if from_user == to_user {
        return Err(Error::SameUser {
            user_id: from_user.to_owned(),
        });
    }

    let txn = db.begin().await?;

    let (first, second) = if from_user < to_user {
        (from_user, to_user)
    } else {
        (to_user, from_user)
    };
    let first_wallet = lock_wallet(&txn, first).await?;
    let second_wallet = lock_wallet(&txn, second).await?;
    let (source, destination) = if first == from_user {
        (first_wallet, second_wallet)
    } else {
        (second_wallet, first_wallet)
    };

    if source.balance < amount {
        warn!(
            from_user,
            available = source.balance,
            required = amount,
            "Transfer rejected: insufficient balance"
        );
        return Err(Error::InsufficientBalance {
            available: source.balance,
            required: amount,
        });
    }

    let source_balance = source.balance - amount;
    let destination_balance = destination
        .balance
        .checked_add(amount)
        .ok_or(Error::InvalidAmount { amount })?;

    set_balance(&txn, source, source_balance).await?;
    set_balance(&txn, destination, destination_balance).await?;

    let entry = credit_transaction::ActiveModel {
        from_user_id: Set(Some(from_user.to_owned())),
        to_user_id: Set(Some(to_user.to_owned())),
        amount: Set(amount),
        note: Set(note.to_owned()),
        session_id: Set(session_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(
        transaction_id = entry.id,
        from_user, to_user, amount, "Transferred credits"
    );
    Ok(entry)
}

/// Issues system credits to a user. Only privileged actors may do this.
///
/// The ledger entry has no sender.
#[instrument(skip(db, actor, note), fields(actor = %actor.user_id))]
pub async fn grant_credits<C>(
    db: &C,
    actor: &Actor,
    to_user: &str,
    amount: i64,
    note: &str,
) -> Result<credit_transaction::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    if !actor.is_privileged {
        warn!("Credit grant rejected: actor is not privileged");
        return Err(Error::Unauthorized {
            user_id: actor.user_id.clone(),
            action: "grant credits".to_string(),
        });
    }

    if amount <= 0 {
        return Err(Error::InvalidAmount { amount });
    }

    let txn = db.begin().await?;

    let recipient = lock_wallet(&txn, to_user).await?;
    let new_balance = recipient
        .balance
        .checked_add(amount)
        .ok_or(Error::InvalidAmount { amount })?;
    set_balance(&txn, recipient, new_balance).await?;

    let entry = credit_transaction::ActiveModel {
        from_user_id: Set(None),
        to_user_id: Set(Some(to_user.to_owned())),
        amount: Set(amount),
        note: Set(note.to_owned()),
        session_id: Set(None),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(transaction_id = entry.id, to_user, amount, "Granted system credits");
    Ok(entry)
}

/// Transfer initiated by a user from their own wallet, outside of any session.
///
/// Whether this is allowed at all is decided by `policy`; session payments do
/// not go through here and are never affected by it.
pub async fn manual_transfer<C>(
    db: &C,
    policy: ManualTransferPolicy,
    actor: &Actor,
    to_user: &str,
    amount: i64,
    note: &str,
) -> Result<credit_transaction::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let allowed = match policy {
        ManualTransferPolicy::Disabled => false,
        ManualTransferPolicy::PrivilegedOnly => actor.is_privileged,
        ManualTransferPolicy::Everyone => true,
    };

    if !allowed {
        warn!(actor = %actor.user_id, ?policy, "Manual transfer rejected by policy");
        return Err(Error::Unauthorized {
            user_id: actor.user_id.clone(),
            action: "transfer credits manually".to_string(),
        });
    }

    transfer(db, &actor.user_id, to_user, amount, note, None).await
}

/// Builds the wallet page view: balance plus sent and received history.
///
/// This is a display read and takes no locks. A user without a wallet gets
/// one with the configured starting balance.
pub async fn get_wallet_statement<C>(
    db: &C,
    user_id: &str,
    config: &CreditsConfig,
) -> Result<WalletStatement>
where
    C: ConnectionTrait,
{
    let wallet = ensure_wallet(db, user_id, config.initial_credits).await?;

    let entries = CreditTransaction::find()
        .filter(
            Condition::any()
                .add(credit_transaction::Column::FromUserId.eq(user_id))
                .add(credit_transaction::Column::ToUserId.eq(user_id)),
        )
        .order_by_desc(credit_transaction::Column::CreatedAt)
        .order_by_desc(credit_transaction::Column::Id)
        .all(db)
        .await?;

    let total_sent = entries
        .iter()
        .filter(|entry| entry.from_user_id.as_deref() == Some(user_id))
        .map(|entry| entry.amount)
        .sum();
    let total_received = entries
        .iter()
        .filter(|entry| entry.to_user_id.as_deref() == Some(user_id))
        .map(|entry| entry.amount)
        .sum();

    Ok(WalletStatement {
        balance: wallet.balance,
        total_sent,
        total_received,
        entries,
    })
}

/// Ledger entries linked to a session, oldest first.
pub async fn get_transactions_for_session<C>(
    db: &C,
    session_id: i64,
) -> Result<Vec<credit_transaction::Model>>
where
    C: ConnectionTrait,
{
    CreditTransaction::find()
        .filter(credit_transaction::Column::SessionId.eq(session_id))
        .order_by_asc(credit_transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_transfer_validation() -> Result<()> {
        // Validation happens before any query, so an empty mock is enough
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = transfer(&db, "alice", "bob", 0, "zero", None).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: 0 })));

        let result = transfer(&db, "alice", "bob", -3, "negative", None).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: -3 })));

        let result = transfer(&db, "alice", "alice", 5, "self", None).await;
        assert!(matches!(result, Err(Error::SameUser { user_id: _ })));

        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_moves_credits_and_records_entry() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_wallet(&db, "alice", 20).await?;
        create_test_wallet(&db, "bob", 20).await?;

        let entry = transfer(&db, "alice", "bob", 8, "tutoring", None).await?;

        assert_eq!(entry.from_user_id.as_deref(), Some("alice"));
        assert_eq!(entry.to_user_id.as_deref(), Some("bob"));
        assert_eq!(entry.amount, 8);
        assert_eq!(entry.note, "tutoring");
        assert_eq!(entry.session_id, None);

        assert_eq!(get_balance(&db, "alice").await?, 12);
        assert_eq!(get_balance(&db, "bob").await?, 28);
        assert_eq!(CreditTransaction::find().all(&db).await?.len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn test_transfers_conserve_total_balance() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_wallet(&db, "alice", 30).await?;
        create_test_wallet(&db, "bob", 10).await?;

        // Mix of directions, including draining a wallet to exactly zero
        let moves = [
            ("alice", "bob", 7),
            ("bob", "alice", 12),
            ("bob", "alice", 5),
            ("alice", "bob", 40),
        ];
        for (from, to, amount) in moves {
            transfer(&db, from, to, amount, "move", None).await?;
            let total = get_balance(&db, "alice").await? + get_balance(&db, "bob").await?;
            assert_eq!(total, 40);
        }

        assert_eq!(get_balance(&db, "alice").await?, 0);
        assert_eq!(get_balance(&db, "bob").await?, 40);

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_opposite_transfers_run_concurrently() -> Result<()> {
        let db = Arc::new(setup_test_db().await?);
        create_test_wallet(&db, "alice", 100).await?;
        create_test_wallet(&db, "bob", 100).await?;

        let handles: Vec<_> = (0..20)
            .map(|i| {
                let db = Arc::clone(&db);
                tokio::spawn(async move {
                    if i % 2 == 0 {
                        transfer(&*db, "alice", "bob", 3, "a to b", None).await
                    } else {
                        transfer(&*db, "bob", "alice", 2, "b to a", None).await
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap()?;
        }

        let alice = get_balance(&*db, "alice").await?;
        let bob = get_balance(&*db, "bob").await?;
        assert_eq!(alice + bob, 200);
        assert_eq!(alice, 90);
        assert_eq!(bob, 110);
        assert_eq!(CreditTransaction::find().all(&*db).await?.len(), 20);

        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_insufficient_balance_changes_nothing() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_wallet(&db, "alice", 4).await?;
        create_test_wallet(&db, "bob", 0).await?;

        let result = transfer(&db, "alice", "bob", 5, "too much", None).await;
        assert!(matches!(
            result,
            Err(Error::InsufficientBalance {
                available: 4,
                required: 5
            })
        ));

        assert_eq!(get_balance(&db, "alice").await?, 4);
        assert_eq!(get_balance(&db, "bob").await?, 0);
        assert!(CreditTransaction::find().all(&db).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_to_missing_wallet_fails() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_wallet(&db, "alice", 10).await?;

        let result = transfer(&db, "alice", "ghost", 5, "nobody", None).await;
        assert!(matches!(
            result,
            Err(Error::WalletNotFound { ref user_id }) if user_id == "ghost"
        ));
        assert_eq!(get_balance(&db, "alice").await?, 10);

        Ok(())
    }

    #[tokio::test]
    async fn test_transfer_rolls_back_with_outer_transaction() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_wallet(&db, "alice", 10).await?;
        create_test_wallet(&db, "bob", 10).await?;

        {
            let outer = db.begin().await?;
            transfer(&outer, "alice", "bob", 6, "inside", None).await?;
            assert_eq!(get_balance(&outer, "alice").await?, 4);
            outer.rollback().await?;
        }

        assert_eq!(get_balance(&db, "alice").await?, 10);
        assert_eq!(get_balance(&db, "bob").await?, 10);
        assert!(CreditTransaction::find().all(&db).await?.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_wallet_does_not_reset_balance() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_wallet(&db, "alice", 10).await?;
        create_test_wallet(&db, "bob", 10).await?;
        transfer(&db, "alice", "bob", 3, "gift", None).await?;

        let again = ensure_wallet(&db, "alice", 10).await?;
        assert_eq!(again.balance, 7);
        assert_eq!(Wallet::find().all(&db).await?.len(), 2);

        let result = ensure_wallet(&db, "carol", -1).await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: -1 })));

        Ok(())
    }

    #[tokio::test]
    async fn test_on_user_created_uses_initial_credits() -> Result<()> {
        let db = setup_test_db().await?;
        let config = CreditsConfig {
            initial_credits: 25,
            ..CreditsConfig::default()
        };

        let wallet = on_user_created(&db, "new_student", &config).await?;
        assert_eq!(wallet.user_id, "new_student");
        assert_eq!(wallet.balance, 25);
        assert_eq!(get_balance(&db, "new_student").await?, 25);

        Ok(())
    }

    #[tokio::test]
    async fn test_get_balance_missing_wallet() -> Result<()> {
        let db = setup_test_db().await?;
        let result = get_balance(&db, "nobody").await;
        assert!(matches!(result, Err(Error::WalletNotFound { user_id: _ })));
        assert!(get_wallet(&db, "nobody").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_grant_credits_requires_privilege() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_wallet(&db, "alice", 0).await?;

        let result = grant_credits(&db, &Actor::member("bob"), "alice", 10, "bonus").await;
        assert!(matches!(result, Err(Error::Unauthorized { .. })));
        assert_eq!(get_balance(&db, "alice").await?, 0);

        let entry = grant_credits(&db, &Actor::staff("admin"), "alice", 10, "bonus").await?;
        assert_eq!(entry.from_user_id, None);
        assert_eq!(entry.to_user_id.as_deref(), Some("alice"));
        assert_eq!(get_balance(&db, "alice").await?, 10);

        let result = grant_credits(&db, &Actor::staff("admin"), "alice", 0, "nothing").await;
        assert!(matches!(result, Err(Error::InvalidAmount { amount: 0 })));

        Ok(())
    }

    #[tokio::test]
    async fn test_manual_transfer_policy() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_wallet(&db, "alice", 20).await?;
        create_test_wallet(&db, "staff", 20).await?;

        let member = Actor::member("alice");
        let staff = Actor::staff("staff");

        let result =
            manual_transfer(&db, ManualTransferPolicy::PrivilegedOnly, &member, "staff", 5, "x")
                .await;
        assert!(matches!(result, Err(Error::Unauthorized { .. })));

        let result =
            manual_transfer(&db, ManualTransferPolicy::Disabled, &staff, "alice", 5, "x").await;
        assert!(matches!(result, Err(Error::Unauthorized { .. })));

        manual_transfer(&db, ManualTransferPolicy::PrivilegedOnly, &staff, "alice", 5, "x")
            .await?;
        manual_transfer(&db, ManualTransferPolicy::Everyone, &member, "staff", 2, "y").await?;

        assert_eq!(get_balance(&db, "alice").await?, 23);
        assert_eq!(get_balance(&db, "staff").await?, 17);

        Ok(())
    }

    #[tokio::test]
    async fn test_wallet_statement_merges_history() -> Result<()> {
        let db = setup_test_db().await?;
        let config = CreditsConfig::default();
        create_test_wallet(&db, "alice", 20).await?;
        create_test_wallet(&db, "bob", 20).await?;
        create_test_wallet(&db, "carol", 20).await?;

        let first = transfer(&db, "alice", "bob", 3, "first", None).await?;
        let second = transfer(&db, "bob", "alice", 5, "second", None).await?;
        transfer(&db, "bob", "carol", 1, "unrelated", None).await?;
        let third = transfer(&db, "alice", "carol", 2, "third", None).await?;

        let statement = get_wallet_statement(&db, "alice", &config).await?;
        assert_eq!(statement.balance, 20);
        assert_eq!(statement.total_sent, 5);
        assert_eq!(statement.total_received, 5);
        let ids: Vec<i64> = statement.entries.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![third.id, second.id, first.id]);

        // First access creates the wallet with the starting balance
        let fresh = get_wallet_statement(&db, "dave", &config).await?;
        assert_eq!(fresh.balance, config.initial_credits);
        assert!(fresh.entries.is_empty());

        Ok(())
    }
}
