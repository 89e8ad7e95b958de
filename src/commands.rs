//! Mutation commands. Each performs exactly one guarded write (the chat
//! commands compose the seen-mark with the insert, as the source does) and
//! patches the caller's local view state optimistically, rolling it back
//! when the write fails so the view never silently diverges from the store.

use crate::config::Config;
use crate::entity::Uid;
use crate::model::{Booking, BookingStatus, Message};
use crate::store::Store;
use chrono::Utc;
use std::future::Future;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum CommandError {
    /// Rejected before any write was attempted.
    #[error("{0}")]
    Precondition(String),
    /// The guarded write matched no row: another session moved the record
    /// first.
    #[error("the booking was changed by another session; reload and retry")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error(transparent)]
    Store(anyhow::Error),
}

/// Bound every store round-trip; a hung backend surfaces as an error
/// instead of wedging the caller.
async fn write<T, Fut>(config: &Config, fut: Fut) -> Result<T, CommandError>
where
    Fut: Future<Output = anyhow::Result<T>>,
{
    match tokio::time::timeout(config.command_timeout, fut).await {
        Ok(result) => result.map_err(CommandError::Store),
        Err(_) => Err(CommandError::Store(anyhow::anyhow!(
            "store operation timed out"
        ))),
    }
}

fn find_local<'a>(local: &'a [Booking], id: &str) -> Result<&'a Booking, CommandError> {
    local
        .iter()
        .find(|b| b.id == id)
        .ok_or(CommandError::NotFound)
}

fn apply_local(
    local: &mut [Booking],
    id: &str,
    apply: impl FnOnce(&mut Booking),
) -> Result<Booking, CommandError> {
    let booking = local
        .iter_mut()
        .find(|b| b.id == id)
        .ok_or(CommandError::NotFound)?;
    let prior = booking.clone();
    apply(booking);
    Ok(prior)
}

fn restore_local(local: &mut [Booking], prior: Booking) {
    if let Some(booking) = local.iter_mut().find(|b| b.id == prior.id) {
        *booking = prior;
    }
}

async fn transition(
    store: &Store,
    config: &Config,
    local: &mut [Booking],
    id: &str,
    from: &[BookingStatus],
    to: BookingStatus,
    apply: impl FnOnce(&mut Booking),
) -> Result<(), CommandError> {
    let prior = apply_local(local, id, apply)?;
    let now = Utc::now();

    let moved = match write(config, store.transition_booking(id, from, to, now)).await {
        Ok(moved) => moved,
        Err(e) => {
            restore_local(local, prior);
            return Err(e);
        }
    };

    if !moved {
        restore_local(local, prior);
        // Distinguish a lost race from a vanished record.
        return match store.get_booking(id).await {
            Ok(Some(_)) => Err(CommandError::Conflict),
            Ok(None) => Err(CommandError::NotFound),
            Err(e) => Err(CommandError::Store(e)),
        };
    }
    Ok(())
}

pub async fn accept(
    store: &Store,
    config: &Config,
    local: &mut [Booking],
    id: &str,
) -> Result<(), CommandError> {
    let now = Utc::now();
    transition(
        store,
        config,
        local,
        id,
        &[BookingStatus::Pending],
        BookingStatus::Accepted,
        |b| {
            b.status = BookingStatus::Accepted;
            b.updated_at = Some(now);
        },
    )
    .await
}

pub async fn decline(
    store: &Store,
    config: &Config,
    local: &mut [Booking],
    id: &str,
) -> Result<(), CommandError> {
    let now = Utc::now();
    transition(
        store,
        config,
        local,
        id,
        &[BookingStatus::Pending],
        BookingStatus::Declined,
        |b| {
            b.status = BookingStatus::Declined;
            b.updated_at = Some(now);
        },
    )
    .await
}

/// States mark-done and cancel move out of: the accepted/paid pair, plus a
/// still-pending booking that has already been paid (the "paid, awaiting
/// completion" entries of the Upcoming tab).
fn upcoming_from_set(booking: &Booking) -> Vec<BookingStatus> {
    let mut from = vec![BookingStatus::Accepted, BookingStatus::Paid];
    if booking.paid {
        from.push(BookingStatus::Pending);
    }
    from
}

pub async fn mark_done(
    store: &Store,
    config: &Config,
    local: &mut [Booking],
    id: &str,
) -> Result<(), CommandError> {
    let booking = find_local(local, id)?;

    let Some(date) = booking.date else {
        return Err(CommandError::Precondition(
            "appointment has no scheduled date".to_string(),
        ));
    };
    let today = Utc::now().date_naive();
    if !config.completion_policy.allows(today, date.date_naive()) {
        return Err(CommandError::Precondition(
            "cannot mark this appointment as completed outside the allowed completion window"
                .to_string(),
        ));
    }
    if config.require_payment_before_completion && !booking.paid {
        return Err(CommandError::Precondition(
            "appointment must be paid before it can be completed".to_string(),
        ));
    }

    let from = upcoming_from_set(booking);
    let now = Utc::now();
    transition(
        store,
        config,
        local,
        id,
        &from,
        BookingStatus::Completed,
        |b| {
            b.status = BookingStatus::Completed;
            b.completed_at = Some(now);
        },
    )
    .await
}

pub async fn cancel(
    store: &Store,
    config: &Config,
    local: &mut [Booking],
    id: &str,
) -> Result<(), CommandError> {
    let from = upcoming_from_set(find_local(local, id)?);
    let now = Utc::now();
    transition(
        store,
        config,
        local,
        id,
        &from,
        BookingStatus::Cancelled,
        |b| {
            b.status = BookingStatus::Cancelled;
            b.cancelled_at = Some(now);
        },
    )
    .await
}

pub async fn mark_chat_seen(
    store: &Store,
    config: &Config,
    chat_id: &str,
) -> Result<(), CommandError> {
    let found = write(config, store.mark_chat_seen(chat_id, Utc::now())).await?;
    if !found {
        return Err(CommandError::NotFound);
    }
    Ok(())
}

/// Sending marks the chat seen first (replying implies having read it),
/// then appends one message authored by the consultant.
pub async fn send_message(
    store: &Store,
    config: &Config,
    chat_id: &str,
    sender: Uid,
    sender_name: String,
    text: String,
) -> Result<Message, CommandError> {
    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(CommandError::Precondition(
            "message text is empty".to_string(),
        ));
    }

    let found = write(config, store.mark_chat_seen(chat_id, Utc::now())).await?;
    if !found {
        return Err(CommandError::NotFound);
    }

    let message = Message {
        id: Uuid::new_v4().to_string(),
        chat_id: chat_id.to_string(),
        sender_id: sender,
        sender_name,
        text,
        created_at: Utc::now(),
        seen_by_consultant: true,
    };
    write(config, store.insert_message(&message)).await?;
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use crate::view::{partition_bookings, Tab};
    use crate::config::CompletionPolicy;
    use chrono::Duration;

    #[tokio::test]
    async fn accept_moves_booking_from_requests_to_upcoming() {
        let (_bus, store) = testutil::store().await;
        let config = Config::default();
        store
            .insert_booking(&testutil::booking("b1", "doc", BookingStatus::Pending, false))
            .await
            .unwrap();

        let mut local = store.bookings_of(&Uid::new("doc")).await.unwrap();
        assert_eq!(
            Tab::for_booking(local[0].status, local[0].paid),
            Some(Tab::Requests)
        );

        accept(&store, &config, &mut local, "b1").await.unwrap();

        assert_eq!(local[0].status, BookingStatus::Accepted);
        assert!(local[0].updated_at.is_some());
        let tabs = partition_bookings(&local);
        assert!(tabs.requests.is_empty());
        assert_eq!(tabs.upcoming.len(), 1);

        let stored = store.get_booking("b1").await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Accepted);
        assert!(stored.updated_at.is_some());
    }

    #[tokio::test]
    async fn mark_done_before_appointment_date_writes_nothing() {
        let (_bus, store) = testutil::store().await;
        let config = Config::default();
        let mut booking = testutil::booking("b1", "doc", BookingStatus::Accepted, true);
        booking.date = Some(Utc::now() + Duration::days(3));
        store.insert_booking(&booking).await.unwrap();

        let mut local = store.bookings_of(&Uid::new("doc")).await.unwrap();
        let before = local.clone();

        let err = mark_done(&store, &config, &mut local, "b1")
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Precondition(_)));

        // Local state untouched, store untouched.
        assert_eq!(local[0].status, before[0].status);
        assert!(local[0].completed_at.is_none());
        let stored = store.get_booking("b1").await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Accepted);
        assert!(stored.completed_at.is_none());
    }

    #[tokio::test]
    async fn mark_done_honors_policy_and_payment_gate() {
        let (_bus, store) = testutil::store().await;
        let config = Config {
            completion_policy: CompletionPolicy::SameDayOnly,
            require_payment_before_completion: true,
            ..Config::default()
        };

        // Yesterday's appointment fails the same-day-only window.
        let mut stale = testutil::booking("b1", "doc", BookingStatus::Accepted, true);
        stale.date = Some(Utc::now() - Duration::days(1));
        store.insert_booking(&stale).await.unwrap();

        // Today's unpaid appointment fails the payment gate.
        let unpaid = testutil::booking("b2", "doc", BookingStatus::Accepted, false);
        store.insert_booking(&unpaid).await.unwrap();

        // Today's paid appointment completes.
        let payable = testutil::booking("b3", "doc", BookingStatus::Accepted, true);
        store.insert_booking(&payable).await.unwrap();

        let mut local = store.bookings_of(&Uid::new("doc")).await.unwrap();

        assert!(matches!(
            mark_done(&store, &config, &mut local, "b1").await,
            Err(CommandError::Precondition(_))
        ));
        assert!(matches!(
            mark_done(&store, &config, &mut local, "b2").await,
            Err(CommandError::Precondition(_))
        ));
        mark_done(&store, &config, &mut local, "b3").await.unwrap();

        let stored = store.get_booking("b3").await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Completed);
        assert!(stored.completed_at.is_some());
    }

    #[tokio::test]
    async fn paid_pending_booking_can_complete() {
        let (_bus, store) = testutil::store().await;
        let config = Config::default();
        store
            .insert_booking(&testutil::booking("b1", "doc", BookingStatus::Pending, true))
            .await
            .unwrap();

        let mut local = store.bookings_of(&Uid::new("doc")).await.unwrap();
        mark_done(&store, &config, &mut local, "b1").await.unwrap();
        assert_eq!(
            store.get_booking("b1").await.unwrap().unwrap().status,
            BookingStatus::Completed
        );
    }

    #[tokio::test]
    async fn lost_race_rolls_local_state_back() {
        let (_bus, store) = testutil::store().await;
        let config = Config::default();
        store
            .insert_booking(&testutil::booking("b1", "doc", BookingStatus::Pending, false))
            .await
            .unwrap();

        let mut local = store.bookings_of(&Uid::new("doc")).await.unwrap();

        // Another session declines first.
        store
            .transition_booking(
                "b1",
                &[BookingStatus::Pending],
                BookingStatus::Declined,
                Utc::now(),
            )
            .await
            .unwrap();

        let err = accept(&store, &config, &mut local, "b1").await.unwrap_err();
        assert!(matches!(err, CommandError::Conflict));
        // The optimistic patch was undone.
        assert_eq!(local[0].status, BookingStatus::Pending);
        assert!(local[0].updated_at.is_none());
    }

    #[tokio::test]
    async fn terminal_states_admit_no_transition() {
        let (_bus, store) = testutil::store().await;
        let config = Config::default();
        store
            .insert_booking(&testutil::booking("b1", "doc", BookingStatus::Completed, true))
            .await
            .unwrap();

        let mut local = store.bookings_of(&Uid::new("doc")).await.unwrap();
        assert!(matches!(
            cancel(&store, &config, &mut local, "b1").await,
            Err(CommandError::Conflict)
        ));
        assert_eq!(
            store.get_booking("b1").await.unwrap().unwrap().status,
            BookingStatus::Completed
        );
    }

    #[tokio::test]
    async fn unknown_booking_is_not_found() {
        let (_bus, store) = testutil::store().await;
        let config = Config::default();
        let mut local = Vec::new();
        assert!(matches!(
            accept(&store, &config, &mut local, "ghost").await,
            Err(CommandError::NotFound)
        ));
    }

    #[tokio::test]
    async fn send_message_marks_chat_seen_and_appends() {
        let (_bus, store) = testutil::store().await;
        let config = Config::default();
        store
            .insert_chat(&testutil::chat("c1", "doc", "parent", None))
            .await
            .unwrap();

        let sent = send_message(
            &store,
            &config,
            "c1",
            Uid::new("doc"),
            "Dr. Reyes".to_string(),
            "  See you tomorrow.  ".to_string(),
        )
        .await
        .unwrap();
        assert_eq!(sent.text, "See you tomorrow.");

        let chats = store.chats_of(&Uid::new("doc")).await.unwrap();
        assert!(chats[0].seen_by_consultant);
        let messages = store.messages_of("c1").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].sender_id, Uid::new("doc"));

        assert!(matches!(
            send_message(
                &store,
                &config,
                "c1",
                Uid::new("doc"),
                "Dr. Reyes".to_string(),
                "   ".to_string()
            )
            .await,
            Err(CommandError::Precondition(_))
        ));
        assert!(matches!(
            mark_chat_seen(&store, &config, "ghost").await,
            Err(CommandError::NotFound)
        ));
    }
}
