//! Shared fixtures for the in-module tests.

use crate::bus::EventBus;
use crate::entity::Uid;
use crate::model::{Booking, BookingStatus, Chat, Message};
use crate::store::Store;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

pub async fn store() -> (Arc<EventBus>, Store) {
    let bus = Arc::new(EventBus::new());
    let store = Store::in_memory(bus.clone()).await.unwrap();
    store.init().await.unwrap();
    (bus, store)
}

pub fn booking(id: &str, consultant: &str, status: BookingStatus, paid: bool) -> Booking {
    Booking {
        id: id.to_string(),
        user_id: Uid::new(format!("user-{id}")),
        consultant_id: Uid::new(consultant),
        full_name: None,
        date: Some(Utc::now()),
        hour: None,
        platform: Some("Online".into()),
        amount_cents: 150_000,
        paid,
        status,
        rating: None,
        created_at: Utc::now(),
        updated_at: None,
        completed_at: None,
        cancelled_at: None,
    }
}

pub fn chat(id: &str, consultant: &str, parent: &str, last_seen: Option<DateTime<Utc>>) -> Chat {
    Chat {
        id: id.to_string(),
        consultant_id: Uid::new(consultant),
        parent_id: Uid::new(parent),
        seen_by_consultant: false,
        last_seen_by_consultant: last_seen,
        created_at: Utc::now() - Duration::days(1),
    }
}

pub fn message(id: &str, chat_id: &str, sender: &str, at: DateTime<Utc>) -> Message {
    Message {
        id: id.to_string(),
        chat_id: chat_id.to_string(),
        sender_id: Uid::new(sender),
        sender_name: sender.to_string(),
        text: format!("message {id}"),
        created_at: at,
        seen_by_consultant: false,
    }
}
