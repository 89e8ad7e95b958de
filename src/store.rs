use crate::{
    bus::{Collection, Event, EventBus},
    entity::{Uid, UserRecord},
    model::{Booking, BookingStatus, Chat, Client, ConsultantProfile, Message},
};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    ConnectOptions, Row, SqlitePool,
};
use std::{path::Path, str::FromStr, sync::Arc};

/// The backing store. Every committed mutation publishes a
/// `CollectionChanged` event on the bus, which is what drives the live
/// query layer; reads are plain queries.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
    bus: Arc<EventBus>,
}

impl Store {
    /// Create a new Store instance.
    /// This will automatically create the database file if it doesn't exist.
    pub async fn new(db_path: impl AsRef<Path>, bus: Arc<EventBus>) -> Result<Self> {
        let db_path = db_path.as_ref();

        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                std::fs::create_dir_all(parent).context("Failed to create database directory")?;
            }
        }

        let db_url = format!("sqlite://{}", db_path.to_string_lossy());

        let options = SqliteConnectOptions::from_str(&db_url)?
            .create_if_missing(true)
            .log_statements(tracing::log::LevelFilter::Trace);

        let pool = SqlitePool::connect_with(options)
            .await
            .context("Failed to connect to SQLite database")?;

        Ok(Self { pool, bus })
    }

    /// In-memory store for tests. A single connection, since every pooled
    /// connection would otherwise get its own empty database.
    pub async fn in_memory(bus: Arc<EventBus>) -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to open in-memory SQLite database")?;
        Ok(Self { pool, bus })
    }

    /// Initialize the database schema.
    pub async fn init(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS clients (
                id TEXT PRIMARY KEY,
                consultant_id TEXT NOT NULL,
                full_name TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_clients_consultant ON clients(consultant_id);

            CREATE TABLE IF NOT EXISTS bookings (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                consultant_id TEXT NOT NULL,
                full_name TEXT,
                date DATETIME,
                hour TEXT,
                platform TEXT,
                amount_cents INTEGER NOT NULL DEFAULT 0,
                paid INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL,
                rating REAL,
                created_at DATETIME NOT NULL,
                updated_at DATETIME,
                completed_at DATETIME,
                cancelled_at DATETIME
            );
            CREATE INDEX IF NOT EXISTS idx_bookings_consultant_status ON bookings(consultant_id, status);

            CREATE TABLE IF NOT EXISTS chats (
                id TEXT PRIMARY KEY,
                consultant_id TEXT NOT NULL,
                parent_id TEXT NOT NULL,
                seen_by_consultant INTEGER NOT NULL DEFAULT 0,
                last_seen_by_consultant DATETIME,
                created_at DATETIME NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chats_consultant ON chats(consultant_id);

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                chat_id TEXT NOT NULL,
                sender_id TEXT NOT NULL,
                sender_name TEXT NOT NULL,
                text TEXT NOT NULL,
                created_at DATETIME NOT NULL,
                seen_by_consultant INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_messages_chat_created ON messages(chat_id, created_at);

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                full_name TEXT,
                first_name TEXT,
                last_name TEXT,
                display_name TEXT
            );

            CREATE TABLE IF NOT EXISTS consultants (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL DEFAULT '',
                name TEXT NOT NULL DEFAULT '',
                specialty TEXT,
                contact_info TEXT,
                clinic_address TEXT,
                available_days TEXT NOT NULL DEFAULT '[]',
                consultation_hours TEXT NOT NULL DEFAULT '[]',
                platforms TEXT NOT NULL DEFAULT '[]',
                photo_url TEXT,
                unavailable_note TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("Failed to initialize database schema")?;

        Ok(())
    }

    fn publish_changed(&self, collection: Collection) {
        self.bus.publish(Event::CollectionChanged(collection));
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn clients_of(&self, consultant: &Uid) -> Result<Vec<Client>> {
        let rows = sqlx::query("SELECT id, consultant_id, full_name FROM clients WHERE consultant_id = ?")
            .bind(consultant.as_str())
            .fetch_all(&self.pool)
            .await
            .context("Failed to fetch clients")?;

        rows.iter().map(client_from_row).collect()
    }

    pub async fn bookings_of(&self, consultant: &Uid) -> Result<Vec<Booking>> {
        let rows = sqlx::query(
            "SELECT * FROM bookings WHERE consultant_id = ? ORDER BY created_at DESC",
        )
        .bind(consultant.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch bookings")?;

        rows.iter().map(booking_from_row).collect()
    }

    pub async fn pending_bookings_of(&self, consultant: &Uid) -> Result<Vec<Booking>> {
        let rows = sqlx::query(
            "SELECT * FROM bookings WHERE consultant_id = ? AND status = 'pending' ORDER BY created_at DESC",
        )
        .bind(consultant.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch pending bookings")?;

        rows.iter().map(booking_from_row).collect()
    }

    pub async fn rated_bookings_of(&self, consultant: &Uid) -> Result<Vec<Booking>> {
        let rows = sqlx::query(
            "SELECT * FROM bookings WHERE consultant_id = ? AND rating IS NOT NULL",
        )
        .bind(consultant.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch rated bookings")?;

        rows.iter().map(booking_from_row).collect()
    }

    pub async fn get_booking(&self, id: &str) -> Result<Option<Booking>> {
        let row = sqlx::query("SELECT * FROM bookings WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch booking")?;

        row.as_ref().map(booking_from_row).transpose()
    }

    /// Chats newest-first, matching the inbox ordering.
    pub async fn chats_of(&self, consultant: &Uid) -> Result<Vec<Chat>> {
        let rows = sqlx::query(
            "SELECT * FROM chats WHERE consultant_id = ? ORDER BY created_at DESC",
        )
        .bind(consultant.as_str())
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch chats")?;

        rows.iter().map(chat_from_row).collect()
    }

    /// Messages of one chat, oldest-first.
    pub async fn messages_of(&self, chat_id: &str) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT * FROM messages WHERE chat_id = ? ORDER BY created_at ASC",
        )
        .bind(chat_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch messages")?;

        rows.iter().map(message_from_row).collect()
    }

    pub async fn latest_message(&self, chat_id: &str) -> Result<Option<Message>> {
        let row = sqlx::query(
            "SELECT * FROM messages WHERE chat_id = ? ORDER BY created_at DESC LIMIT 1",
        )
        .bind(chat_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch latest message")?;

        row.as_ref().map(message_from_row).transpose()
    }

    pub async fn get_user(&self, id: &Uid) -> Result<Option<UserRecord>> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch user")?;

        row.as_ref().map(user_from_row).transpose()
    }

    pub async fn get_consultant(&self, id: &Uid) -> Result<Option<ConsultantProfile>> {
        let row = sqlx::query("SELECT * FROM consultants WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch consultant")?;

        row.as_ref().map(consultant_from_row).transpose()
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    pub async fn insert_booking(&self, booking: &Booking) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO bookings
                (id, user_id, consultant_id, full_name, date, hour, platform,
                 amount_cents, paid, status, rating, created_at, updated_at,
                 completed_at, cancelled_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&booking.id)
        .bind(booking.user_id.as_str())
        .bind(booking.consultant_id.as_str())
        .bind(&booking.full_name)
        .bind(booking.date)
        .bind(&booking.hour)
        .bind(&booking.platform)
        .bind(booking.amount_cents)
        .bind(booking.paid)
        .bind(booking.status.as_str())
        .bind(booking.rating)
        .bind(booking.created_at)
        .bind(booking.updated_at)
        .bind(booking.completed_at)
        .bind(booking.cancelled_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert booking")?;

        self.publish_changed(Collection::Bookings);
        Ok(())
    }

    /// Conditional status transition: the write succeeds only if the stored
    /// status is still one of `from`. Returns false when no row matched,
    /// which callers surface as either not-found or a lost race. The
    /// timestamp lands in `completed_at`/`cancelled_at` for the terminal
    /// transitions and `updated_at` otherwise.
    pub async fn transition_booking(
        &self,
        id: &str,
        from: &[BookingStatus],
        to: BookingStatus,
        at: DateTime<Utc>,
    ) -> Result<bool> {
        let stamp_column = match to {
            BookingStatus::Completed => "completed_at",
            BookingStatus::Cancelled => "cancelled_at",
            _ => "updated_at",
        };
        let placeholders = vec!["?"; from.len()].join(", ");
        let sql = format!(
            "UPDATE bookings SET status = ?, {stamp_column} = ? WHERE id = ? AND status IN ({placeholders})"
        );

        let mut query = sqlx::query(&sql).bind(to.as_str()).bind(at).bind(id);
        for status in from {
            query = query.bind(status.as_str());
        }

        let result = query
            .execute(&self.pool)
            .await
            .context("Failed to transition booking")?;

        let changed = result.rows_affected() > 0;
        if changed {
            self.publish_changed(Collection::Bookings);
        }
        Ok(changed)
    }

    /// Returns false when the chat does not exist.
    pub async fn mark_chat_seen(&self, chat_id: &str, at: DateTime<Utc>) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE chats SET seen_by_consultant = 1, last_seen_by_consultant = ? WHERE id = ?",
        )
        .bind(at)
        .bind(chat_id)
        .execute(&self.pool)
        .await
        .context("Failed to mark chat seen")?;

        let changed = result.rows_affected() > 0;
        if changed {
            self.publish_changed(Collection::Chats);
        }
        Ok(changed)
    }

    pub async fn insert_message(&self, message: &Message) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO messages (id, chat_id, sender_id, sender_name, text, created_at, seen_by_consultant)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&message.id)
        .bind(&message.chat_id)
        .bind(message.sender_id.as_str())
        .bind(&message.sender_name)
        .bind(&message.text)
        .bind(message.created_at)
        .bind(message.seen_by_consultant)
        .execute(&self.pool)
        .await
        .context("Failed to insert message")?;

        self.publish_changed(Collection::Messages {
            chat_id: message.chat_id.clone(),
        });
        Ok(())
    }

    pub async fn mark_chat_unseen(&self, chat_id: &str) -> Result<()> {
        sqlx::query("UPDATE chats SET seen_by_consultant = 0 WHERE id = ?")
            .bind(chat_id)
            .execute(&self.pool)
            .await
            .context("Failed to mark chat unseen")?;

        self.publish_changed(Collection::Chats);
        Ok(())
    }

    pub async fn insert_chat(&self, chat: &Chat) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO chats (id, consultant_id, parent_id, seen_by_consultant, last_seen_by_consultant, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&chat.id)
        .bind(chat.consultant_id.as_str())
        .bind(chat.parent_id.as_str())
        .bind(chat.seen_by_consultant)
        .bind(chat.last_seen_by_consultant)
        .bind(chat.created_at)
        .execute(&self.pool)
        .await
        .context("Failed to insert chat")?;

        self.publish_changed(Collection::Chats);
        Ok(())
    }

    pub async fn insert_client(&self, client: &Client) -> Result<()> {
        sqlx::query("INSERT INTO clients (id, consultant_id, full_name) VALUES (?, ?, ?)")
            .bind(&client.id)
            .bind(client.consultant_id.as_str())
            .bind(&client.full_name)
            .execute(&self.pool)
            .await
            .context("Failed to insert client")?;

        self.publish_changed(Collection::Clients);
        Ok(())
    }

    pub async fn insert_user(&self, user: &UserRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO users (id, full_name, first_name, last_name, display_name)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                full_name = excluded.full_name,
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                display_name = excluded.display_name
            "#,
        )
        .bind(user.id.as_str())
        .bind(&user.full_name)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.display_name)
        .execute(&self.pool)
        .await
        .context("Failed to insert user")?;

        self.publish_changed(Collection::Users);
        Ok(())
    }

    pub async fn upsert_consultant(&self, profile: &ConsultantProfile) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO consultants
                (id, email, name, specialty, contact_info, clinic_address,
                 available_days, consultation_hours, platforms, photo_url, unavailable_note)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                email = excluded.email,
                name = excluded.name,
                specialty = excluded.specialty,
                contact_info = excluded.contact_info,
                clinic_address = excluded.clinic_address,
                available_days = excluded.available_days,
                consultation_hours = excluded.consultation_hours,
                platforms = excluded.platforms,
                photo_url = excluded.photo_url,
                unavailable_note = excluded.unavailable_note
            "#,
        )
        .bind(profile.id.as_str())
        .bind(&profile.email)
        .bind(&profile.name)
        .bind(&profile.specialty)
        .bind(&profile.contact_info)
        .bind(&profile.clinic_address)
        .bind(serde_json::to_string(&profile.available_days)?)
        .bind(serde_json::to_string(&profile.consultation_hours)?)
        .bind(serde_json::to_string(&profile.platforms)?)
        .bind(&profile.photo_url)
        .bind(&profile.unavailable_note)
        .execute(&self.pool)
        .await
        .context("Failed to upsert consultant")?;

        self.publish_changed(Collection::Consultants);
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Row mapping
// ----------------------------------------------------------------------

fn client_from_row(row: &SqliteRow) -> Result<Client> {
    Ok(Client {
        id: row.try_get("id")?,
        consultant_id: Uid::new(row.try_get::<String, _>("consultant_id")?),
        full_name: row.try_get("full_name")?,
    })
}

fn booking_from_row(row: &SqliteRow) -> Result<Booking> {
    let status: String = row.try_get("status")?;
    Ok(Booking {
        id: row.try_get("id")?,
        user_id: Uid::new(row.try_get::<String, _>("user_id")?),
        consultant_id: Uid::new(row.try_get::<String, _>("consultant_id")?),
        full_name: row.try_get("full_name")?,
        date: row.try_get("date")?,
        hour: row.try_get("hour")?,
        platform: row.try_get("platform")?,
        amount_cents: row.try_get("amount_cents")?,
        paid: row.try_get("paid")?,
        status: status.parse()?,
        rating: row.try_get("rating")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        completed_at: row.try_get("completed_at")?,
        cancelled_at: row.try_get("cancelled_at")?,
    })
}

fn chat_from_row(row: &SqliteRow) -> Result<Chat> {
    Ok(Chat {
        id: row.try_get("id")?,
        consultant_id: Uid::new(row.try_get::<String, _>("consultant_id")?),
        parent_id: Uid::new(row.try_get::<String, _>("parent_id")?),
        seen_by_consultant: row.try_get("seen_by_consultant")?,
        last_seen_by_consultant: row.try_get("last_seen_by_consultant")?,
        created_at: row.try_get("created_at")?,
    })
}

fn message_from_row(row: &SqliteRow) -> Result<Message> {
    Ok(Message {
        id: row.try_get("id")?,
        chat_id: row.try_get("chat_id")?,
        sender_id: Uid::new(row.try_get::<String, _>("sender_id")?),
        sender_name: row.try_get("sender_name")?,
        text: row.try_get("text")?,
        created_at: row.try_get("created_at")?,
        seen_by_consultant: row.try_get("seen_by_consultant")?,
    })
}

fn user_from_row(row: &SqliteRow) -> Result<UserRecord> {
    Ok(UserRecord {
        id: Uid::new(row.try_get::<String, _>("id")?),
        full_name: row.try_get("full_name")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        display_name: row.try_get("display_name")?,
    })
}

fn consultant_from_row(row: &SqliteRow) -> Result<ConsultantProfile> {
    let days: String = row.try_get("available_days")?;
    let hours: String = row.try_get("consultation_hours")?;
    let platforms: String = row.try_get("platforms")?;
    Ok(ConsultantProfile {
        id: Uid::new(row.try_get::<String, _>("id")?),
        email: row.try_get("email")?,
        name: row.try_get("name")?,
        specialty: row.try_get("specialty")?,
        contact_info: row.try_get("contact_info")?,
        clinic_address: row.try_get("clinic_address")?,
        available_days: serde_json::from_str(&days).context("Malformed available_days")?,
        consultation_hours: serde_json::from_str(&hours).context("Malformed consultation_hours")?,
        platforms: serde_json::from_str(&platforms).context("Malformed platforms")?,
        photo_url: row.try_get("photo_url")?,
        unavailable_note: row.try_get("unavailable_note")?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;

    #[tokio::test]
    async fn transition_is_conditional_on_prior_status() {
        let (_bus, store) = testutil::store().await;
        let booking = testutil::booking("b1", "doc", BookingStatus::Pending, false);
        store.insert_booking(&booking).await.unwrap();

        // Wrong expected-from set: nothing written.
        let moved = store
            .transition_booking(
                "b1",
                &[BookingStatus::Accepted, BookingStatus::Paid],
                BookingStatus::Completed,
                Utc::now(),
            )
            .await
            .unwrap();
        assert!(!moved);
        let stored = store.get_booking("b1").await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Pending);
        assert!(stored.completed_at.is_none());

        // Correct expected-from set: status and stamp change.
        let moved = store
            .transition_booking("b1", &[BookingStatus::Pending], BookingStatus::Accepted, Utc::now())
            .await
            .unwrap();
        assert!(moved);
        let stored = store.get_booking("b1").await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Accepted);
        assert!(stored.updated_at.is_some());
    }

    #[tokio::test]
    async fn booking_round_trips() {
        let (_bus, store) = testutil::store().await;
        let mut booking = testutil::booking("b1", "doc", BookingStatus::Pending, true);
        booking.rating = Some(4.5);
        booking.hour = Some("9:00 AM to 10:00 AM".into());
        store.insert_booking(&booking).await.unwrap();

        let stored = store.get_booking("b1").await.unwrap().unwrap();
        assert_eq!(stored.status, BookingStatus::Pending);
        assert!(stored.paid);
        assert_eq!(stored.rating, Some(4.5));
        assert_eq!(stored.hour.as_deref(), Some("9:00 AM to 10:00 AM"));

        let rated = store.rated_bookings_of(&Uid::new("doc")).await.unwrap();
        assert_eq!(rated.len(), 1);
    }

    #[tokio::test]
    async fn mark_chat_seen_requires_existing_chat() {
        let (_bus, store) = testutil::store().await;
        assert!(!store.mark_chat_seen("nope", Utc::now()).await.unwrap());

        store
            .insert_chat(&testutil::chat("c1", "doc", "parent", None))
            .await
            .unwrap();
        assert!(store.mark_chat_seen("c1", Utc::now()).await.unwrap());

        let chats = store.chats_of(&Uid::new("doc")).await.unwrap();
        assert!(chats[0].seen_by_consultant);
        assert!(chats[0].last_seen_by_consultant.is_some());
    }

    #[tokio::test]
    async fn consultant_profile_round_trips() {
        let (_bus, store) = testutil::store().await;
        let profile = ConsultantProfile {
            id: Uid::new("doc"),
            email: "doc@example.com".into(),
            name: "Dr. Reyes".into(),
            specialty: Some("Pediatrics".into()),
            contact_info: None,
            clinic_address: Some("12 Mabini St".into()),
            available_days: vec!["Monday".into(), "Friday".into()],
            consultation_hours: vec!["9:00 AM to 10:00 AM".into()],
            platforms: vec!["Online".into()],
            photo_url: None,
            unavailable_note: None,
        };
        store.upsert_consultant(&profile).await.unwrap();

        let stored = store.get_consultant(&Uid::new("doc")).await.unwrap().unwrap();
        assert_eq!(stored.name, "Dr. Reyes");
        assert_eq!(stored.available_days, vec!["Monday", "Friday"]);

        // Upsert replaces.
        let mut updated = stored;
        updated.unavailable_note = Some("On leave in June".into());
        store.upsert_consultant(&updated).await.unwrap();
        let stored = store.get_consultant(&Uid::new("doc")).await.unwrap().unwrap();
        assert_eq!(stored.unavailable_note.as_deref(), Some("On leave in June"));
    }

    #[tokio::test]
    async fn counterpart_reply_reopens_inbox_marker() {
        use crate::view;
        use std::collections::HashMap;

        let (_bus, store) = testutil::store().await;
        let doc = Uid::new("doc");
        store
            .insert_chat(&testutil::chat("c1", "doc", "parent", None))
            .await
            .unwrap();
        assert!(store.mark_chat_seen("c1", Utc::now()).await.unwrap());

        // Counterpart replies: the message lands and the chat flips back
        // to unseen.
        store
            .insert_message(&testutil::message("m1", "c1", "parent", Utc::now()))
            .await
            .unwrap();
        store.mark_chat_unseen("c1").await.unwrap();

        let chats = store.chats_of(&doc).await.unwrap();
        let last = store.latest_message("c1").await.unwrap().unwrap();
        let mut last_messages = HashMap::new();
        last_messages.insert("c1".to_string(), last);
        let mut names = HashMap::new();
        names.insert(Uid::new("parent"), "Ana Cruz".to_string());

        let entries = view::inbox(&chats, &last_messages, &names, &doc);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].unread);
        assert_eq!(entries[0].parent_name, "Ana Cruz");
        assert_eq!(entries[0].last_text.as_deref(), Some("message m1"));
    }
}
