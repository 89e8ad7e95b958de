use crate::entity::Uid;
use anyhow::bail;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Booking lifecycle states. `Paid` exists as a status value in older
/// documents while newer ones carry a separate `paid` flag; both are
/// modeled and `Paid` is treated like `Accepted` everywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Accepted,
    Paid,
    Completed,
    Declined,
    Cancelled,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 6] = [
        BookingStatus::Pending,
        BookingStatus::Accepted,
        BookingStatus::Paid,
        BookingStatus::Completed,
        BookingStatus::Declined,
        BookingStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Accepted => "accepted",
            BookingStatus::Paid => "paid",
            BookingStatus::Completed => "completed",
            BookingStatus::Declined => "declined",
            BookingStatus::Cancelled => "cancelled",
        }
    }

    /// No transition leaves a terminal state.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Declined | BookingStatus::Cancelled
        )
    }
}

impl FromStr for BookingStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BookingStatus::Pending),
            "accepted" => Ok(BookingStatus::Accepted),
            "paid" => Ok(BookingStatus::Paid),
            "completed" => Ok(BookingStatus::Completed),
            "declined" => Ok(BookingStatus::Declined),
            "cancelled" => Ok(BookingStatus::Cancelled),
            other => bail!("unknown booking status: {other}"),
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested consultation, normalized once at ingestion. `amount_cents`
/// is the smallest currency unit; display formatting divides by 100.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: String,
    pub user_id: Uid,
    pub consultant_id: Uid,
    /// Denormalized client name; enrichment fills it when missing.
    pub full_name: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub hour: Option<String>,
    pub platform: Option<String>,
    pub amount_cents: i64,
    pub paid: bool,
    pub status: BookingStatus,
    pub rating: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
}

/// A conversation between one consultant and one counterpart (the
/// "parent" in the source data). Never deleted by this system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: String,
    pub consultant_id: Uid,
    pub parent_id: Uid,
    pub seen_by_consultant: bool,
    pub last_seen_by_consultant: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub chat_id: String,
    pub sender_id: Uid,
    pub sender_name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub seen_by_consultant: bool,
}

impl Message {
    /// The unread invariant: a message counts toward the unread total only
    /// while it postdates the chat's last-seen mark, was not authored by the
    /// viewing consultant, and has not been flagged seen. A chat that was
    /// never opened has no last-seen mark, so every counterpart message
    /// counts.
    pub fn is_unread_in(&self, chat: &Chat, viewer: &Uid) -> bool {
        if self.seen_by_consultant || self.sender_id == *viewer {
            return false;
        }
        match chat.last_seen_by_consultant {
            Some(seen) => self.created_at > seen,
            None => true,
        }
    }
}

/// A client under a consultant's care. Purely a query result; the active
/// patient count is the size of this set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub consultant_id: Uid,
    pub full_name: Option<String>,
}

/// The consultant's own editable profile. List-valued fields are stored
/// JSON-encoded; the photo URL is an opaque reference into external
/// object storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsultantProfile {
    pub id: Uid,
    pub email: String,
    pub name: String,
    #[serde(default)]
    pub specialty: Option<String>,
    #[serde(default)]
    pub contact_info: Option<String>,
    #[serde(default)]
    pub clinic_address: Option<String>,
    #[serde(default)]
    pub available_days: Vec<String>,
    #[serde(default)]
    pub consultation_hours: Vec<String>,
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub unavailable_note: Option<String>,
}
