//! Session business logic - lifecycle of a help session and its settlement.
//!
//! A session moves `pending → accepted → completed`, or to `cancelled` from
//! either open state. Every transition re-reads the session row under an
//! exclusive lock inside a transaction, so concurrent requests for the same
//! session are serialised and decisions never rest on a stale copy.
//!
//! Completion pays the helper through [`crate::core::wallet::transfer`] inside
//! the same transaction as the status change. If the payment fails, the
//! status change is rolled back too and the session can be completed again
//! later. The `credits_transferred` flag makes repeated completion a no-op.

use crate::{
    core::{identity::Actor, pricing::PriceTable, wallet},
    entities::{
        Session, SessionDuration, SessionLevel, SessionStatus, credit_transaction, session,
    },
    errors::{Error, Result},
};
use chrono::{DateTime, Utc};
use sea_orm::{QueryOrder, QuerySelect, Set, TransactionTrait, prelude::*};
use tracing::{debug, info, instrument, warn};

/// Longest accepted session title, in characters
pub const MAX_TITLE_LENGTH: usize = 160;

/// Input for [`create_session`]. The price is not part of it: it always comes
/// from the price table.
#[derive(Debug, Clone)]
pub struct NewSession {
    /// User who will give the help
    pub helper_id: String,
    /// Short title
    pub title: String,
    /// Longer description, may be empty
    pub description: String,
    /// Session length
    pub duration: SessionDuration,
    /// Session level
    pub level: SessionLevel,
    /// Planned start time
    pub scheduled_time: Option<DateTime<Utc>>,
}

/// Editable fields of a pending session
#[derive(Debug, Clone)]
pub struct SessionDetails {
    /// Short title
    pub title: String,
    /// Longer description, may be empty
    pub description: String,
    /// Session length
    pub duration: SessionDuration,
    /// Session level
    pub level: SessionLevel,
    /// Planned start time
    pub scheduled_time: Option<DateTime<Utc>>,
}

/// Result of [`complete_session`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionOutcome {
    /// The session after the call
    pub session: session::Model,
    /// Ledger entry created by this call; `None` if the session was already
    /// completed and nothing happened
    pub transaction: Option<credit_transaction::Model>,
}

fn validate_title(title: &str) -> Result<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(Error::Validation {
            message: "Session title cannot be empty".to_string(),
        });
    }
    if title.chars().count() > MAX_TITLE_LENGTH {
        return Err(Error::Validation {
            message: format!("Session title cannot exceed {MAX_TITLE_LENGTH} characters"),
        });
    }
    Ok(title.to_owned())
}

fn unauthorized(actor: &Actor, action: &str, session_id: i64) -> Error {
    warn!(actor = %actor.user_id, session_id, action, "Session action rejected");
    Error::Unauthorized {
        user_id: actor.user_id.clone(),
        action: format!("{action} session #{session_id}"),
    }
}

async fn lock_session<C>(db: &C, session_id: i64) -> Result<session::Model>
where
    C: ConnectionTrait,
{
    Session::find_by_id(session_id)
        .lock_exclusive()
        .one(db)
        .await?
        .ok_or(Error::SessionNotFound { id: session_id })
}

async fn set_status<C>(
    db: &C,
    current: session::Model,
    status: SessionStatus,
) -> Result<session::Model>
where
    C: ConnectionTrait,
{
    let mut active: session::ActiveModel = current.into();
    active.status = Set(status);
    active.updated_at = Set(Utc::now());
    active.update(db).await.map_err(Into::into)
}

/// Creates a pending session requested by `requester`.
///
/// The helper must be a different user and the title must be non-empty.
/// `agreed_amount` is looked up in `prices`.
#[instrument(skip(db, prices, requester, new_session), fields(requester = %requester.user_id))]
pub async fn create_session<C>(
    db: &C,
    prices: &PriceTable,
    requester: &Actor,
    new_session: NewSession,
) -> Result<session::Model>
where
    C: ConnectionTrait,
{
    let title = validate_title(&new_session.title)?;
    let helper_id = new_session.helper_id.trim().to_owned();

    if helper_id.is_empty() {
        return Err(Error::Validation {
            message: "A helper is required".to_string(),
        });
    }

    if helper_id == requester.user_id {
        return Err(Error::SameUser { user_id: helper_id });
    }

    let agreed_amount = prices.price_for(new_session.duration, new_session.level);
    let now = Utc::now();

    let created = session::ActiveModel {
        requester_id: Set(requester.user_id.clone()),
        helper_id: Set(helper_id),
        title: Set(title),
        description: Set(new_session.description.trim().to_owned()),
        duration: Set(new_session.duration),
        level: Set(new_session.level),
        agreed_amount: Set(agreed_amount),
        status: Set(SessionStatus::Pending),
        credits_transferred: Set(false),
        scheduled_time: Set(new_session.scheduled_time),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        session_id = created.id,
        helper = %created.helper_id,
        agreed_amount,
        "Created session"
    );
    Ok(created)
}

/// Helper (or staff) accepts a pending session.
#[instrument(skip(db, actor), fields(actor = %actor.user_id))]
pub async fn accept_session<C>(db: &C, session_id: i64, actor: &Actor) -> Result<session::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let current = lock_session(&txn, session_id).await?;

    if !actor.is_or_privileged(&current.helper_id) {
        return Err(unauthorized(actor, "accept", session_id));
    }

    if current.status != SessionStatus::Pending {
        return Err(Error::InvalidTransition {
            from: current.status,
            action: "accept",
        });
    }

    let accepted = set_status(&txn, current, SessionStatus::Accepted).await?;
    txn.commit().await?;

    info!(session_id, "Session accepted");
    Ok(accepted)
}

/// Marks a session completed and pays the helper, exactly once.
///
/// Safe to call repeatedly and concurrently: the session row is locked, an
/// already completed session is returned unchanged, and the transfer only
/// happens while `credits_transferred` is false. A failed transfer (for
/// example an insufficient balance) rolls back the status change as well.
#[instrument(skip(db, actor), fields(actor = %actor.user_id))]
pub async fn complete_session<C>(
    db: &C,
    session_id: i64,
    actor: &Actor,
) -> Result<CompletionOutcome>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let current = lock_session(&txn, session_id).await?;

    if current.status == SessionStatus::Completed {
        txn.commit().await?;
        debug!(session_id, "Session already completed, nothing to do");
        return Ok(CompletionOutcome {
            session: current,
            transaction: None,
        });
    }

    if !matches!(
        current.status,
        SessionStatus::Pending | SessionStatus::Accepted
    ) {
        return Err(Error::InvalidTransition {
            from: current.status,
            action: "complete",
        });
    }

    if !actor.is_or_privileged(&current.requester_id) {
        return Err(unauthorized(actor, "complete", session_id));
    }

    let completed = set_status(&txn, current, SessionStatus::Completed).await?;

    let (completed, transaction) = if completed.credits_transferred {
        (completed, None)
    } else {
        let entry = wallet::transfer(
            &txn,
            &completed.requester_id,
            &completed.helper_id,
            completed.agreed_amount,
            &format!("Session #{session_id}"),
            Some(session_id),
        )
        .await?;

        let mut active: session::ActiveModel = completed.into();
        active.credits_transferred = Set(true);
        active.updated_at = Set(Utc::now());
        (active.update(&txn).await?, Some(entry))
    };

    txn.commit().await?;

    info!(
        session_id,
        amount = completed.agreed_amount,
        paid = transaction.is_some(),
        "Session completed"
    );
    Ok(CompletionOutcome {
        session: completed,
        transaction,
    })
}

/// Cancels an open session. Requester, helper or staff may cancel.
///
/// Cancelling never touches the ledger.
#[instrument(skip(db, actor), fields(actor = %actor.user_id))]
pub async fn cancel_session<C>(db: &C, session_id: i64, actor: &Actor) -> Result<session::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let txn = db.begin().await?;
    let current = lock_session(&txn, session_id).await?;

    if !actor.is_privileged && !current.involves(&actor.user_id) {
        return Err(unauthorized(actor, "cancel", session_id));
    }

    if current.status.is_terminal() {
        return Err(Error::InvalidTransition {
            from: current.status,
            action: "cancel",
        });
    }

    let cancelled = set_status(&txn, current, SessionStatus::Cancelled).await?;
    txn.commit().await?;

    info!(session_id, "Session cancelled");
    Ok(cancelled)
}

/// Edits a pending session and re-prices it from `prices`.
///
/// Only the requester or staff may edit, and only before the helper accepts,
/// so an accepted price never changes underneath the helper.
#[instrument(skip(db, prices, actor, details), fields(actor = %actor.user_id))]
pub async fn update_session_details<C>(
    db: &C,
    prices: &PriceTable,
    session_id: i64,
    actor: &Actor,
    details: SessionDetails,
) -> Result<session::Model>
where
    C: ConnectionTrait + TransactionTrait,
{
    let title = validate_title(&details.title)?;

    let txn = db.begin().await?;
    let current = lock_session(&txn, session_id).await?;

    if !actor.is_or_privileged(&current.requester_id) {
        return Err(unauthorized(actor, "edit", session_id));
    }

    if current.status != SessionStatus::Pending {
        return Err(Error::InvalidTransition {
            from: current.status,
            action: "edit",
        });
    }

    let agreed_amount = prices.price_for(details.duration, details.level);

    let mut active: session::ActiveModel = current.into();
    active.title = Set(title);
    active.description = Set(details.description.trim().to_owned());
    active.duration = Set(details.duration);
    active.level = Set(details.level);
    active.scheduled_time = Set(details.scheduled_time);
    active.agreed_amount = Set(agreed_amount);
    active.updated_at = Set(Utc::now());
    let updated = active.update(&txn).await?;

    txn.commit().await?;

    info!(session_id, agreed_amount, "Session details updated");
    Ok(updated)
}

/// Finds a session by id.
pub async fn get_session<C>(db: &C, session_id: i64) -> Result<session::Model>
where
    C: ConnectionTrait,
{
    Session::find_by_id(session_id)
        .one(db)
        .await?
        .ok_or(Error::SessionNotFound { id: session_id })
}

/// Finds a session the actor is allowed to see: participants and staff only.
pub async fn get_session_for_actor<C>(
    db: &C,
    session_id: i64,
    actor: &Actor,
) -> Result<session::Model>
where
    C: ConnectionTrait,
{
    let found = get_session(db, session_id).await?;
    if actor.is_privileged || found.involves(&actor.user_id) {
        Ok(found)
    } else {
        Err(unauthorized(actor, "view", session_id))
    }
}

/// Sessions the user asked for, newest first.
pub async fn list_requested_sessions<C>(db: &C, user_id: &str) -> Result<Vec<session::Model>>
where
    C: ConnectionTrait,
{
    Session::find()
        .filter(session::Column::RequesterId.eq(user_id))
        .order_by_desc(session::Column::CreatedAt)
        .order_by_desc(session::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Sessions where the user is the helper, newest first.
pub async fn list_helping_sessions<C>(db: &C, user_id: &str) -> Result<Vec<session::Model>>
where
    C: ConnectionTrait,
{
    Session::find()
        .filter(session::Column::HelperId.eq(user_id))
        .order_by_desc(session::Column::CreatedAt)
        .order_by_desc(session::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}
