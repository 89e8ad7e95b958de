//! Pure projections from aggregated state to the three presentation
//! surfaces. Nothing here touches the store.

use crate::aggregate::DashboardStats;
use crate::entity::Uid;
use crate::model::{Booking, BookingStatus, Chat, Message};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    Requests,
    Upcoming,
    Completed,
}

impl Tab {
    /// The tab a booking belongs to, or `None` for declined/cancelled
    /// bookings which appear nowhere. Each status+paid combination maps to
    /// exactly one tab, so the three tabs partition what is shown.
    pub fn for_booking(status: BookingStatus, paid: bool) -> Option<Tab> {
        match status {
            BookingStatus::Pending if paid => Some(Tab::Upcoming),
            BookingStatus::Pending => Some(Tab::Requests),
            BookingStatus::Accepted | BookingStatus::Paid => Some(Tab::Upcoming),
            BookingStatus::Completed => Some(Tab::Completed),
            BookingStatus::Declined | BookingStatus::Cancelled => None,
        }
    }
}

/// A paid booking still pending acceptance sits in Upcoming with a
/// "paid, awaiting completion" badge.
pub fn awaiting_completion(booking: &Booking) -> bool {
    booking.status == BookingStatus::Pending && booking.paid
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingTabs {
    pub requests: Vec<Booking>,
    pub upcoming: Vec<Booking>,
    pub completed: Vec<Booking>,
}

pub fn partition_bookings(bookings: &[Booking]) -> BookingTabs {
    let mut tabs = BookingTabs {
        requests: Vec::new(),
        upcoming: Vec::new(),
        completed: Vec::new(),
    };
    for booking in bookings {
        match Tab::for_booking(booking.status, booking.paid) {
            Some(Tab::Requests) => tabs.requests.push(booking.clone()),
            Some(Tab::Upcoming) => tabs.upcoming.push(booking.clone()),
            Some(Tab::Completed) => tabs.completed.push(booking.clone()),
            None => {}
        }
    }
    tabs
}

#[derive(Debug, Clone, Serialize)]
pub struct StatCard {
    pub title: &'static str,
    pub value: String,
    pub subtitle: &'static str,
}

pub fn dashboard_cards(stats: &DashboardStats) -> Vec<StatCard> {
    vec![
        StatCard {
            title: "Active Patients",
            value: stats.patients.to_string(),
            subtitle: "Under your care",
        },
        StatCard {
            title: "Pending Appointments",
            value: stats.pending_appointments.to_string(),
            subtitle: "Awaiting confirmation",
        },
        StatCard {
            title: "New Messages",
            value: stats.unread_messages.to_string(),
            subtitle: "Unread conversations",
        },
        StatCard {
            title: "Average Rating",
            value: format!("{:.1}", stats.average_rating),
            subtitle: "Client feedback",
        },
    ]
}

/// Amount fields hold the smallest currency unit.
pub fn display_amount(amount_cents: i64) -> String {
    format!("{:.2}", amount_cents as f64 / 100.0)
}

#[derive(Debug, Clone, Serialize)]
pub struct BookingCard {
    #[serde(flatten)]
    pub booking: Booking,
    pub amount_display: String,
    pub awaiting_completion: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TabbedCards {
    pub requests: Vec<BookingCard>,
    pub upcoming: Vec<BookingCard>,
    pub completed: Vec<BookingCard>,
}

fn card(booking: &Booking) -> BookingCard {
    BookingCard {
        amount_display: display_amount(booking.amount_cents),
        awaiting_completion: awaiting_completion(booking),
        booking: booking.clone(),
    }
}

pub fn present_tabs(tabs: &BookingTabs) -> TabbedCards {
    TabbedCards {
        requests: tabs.requests.iter().map(card).collect(),
        upcoming: tabs.upcoming.iter().map(card).collect(),
        completed: tabs.completed.iter().map(card).collect(),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InboxEntry {
    pub chat_id: String,
    pub parent_id: Uid,
    pub parent_name: String,
    pub last_text: Option<String>,
    pub last_at: Option<DateTime<Utc>>,
    pub unread: bool,
}

/// The inbox unread marker is the chat-level rule: the chat has not been
/// seen and its latest message came from the counterpart. This is coarser
/// than the per-message dashboard count and deliberately kept separate.
pub fn inbox(
    chats: &[Chat],
    last_messages: &HashMap<String, Message>,
    parent_names: &HashMap<Uid, String>,
    viewer: &Uid,
) -> Vec<InboxEntry> {
    chats
        .iter()
        .map(|chat| {
            let last = last_messages.get(&chat.id);
            let unread = !chat.seen_by_consultant
                && last.is_some_and(|m| m.sender_id != *viewer);
            InboxEntry {
                chat_id: chat.id.clone(),
                parent_id: chat.parent_id.clone(),
                parent_name: parent_names
                    .get(&chat.parent_id)
                    .cloned()
                    .unwrap_or_else(|| "Unknown".to_string()),
                last_text: last.map(|m| m.text.clone()),
                last_at: last.map(|m| m.created_at),
                unread,
            }
        })
        .collect()
}
