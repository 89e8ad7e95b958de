//! Outbound email notification for newly-observed pending bookings. The
//! actual mail dispatch lives behind an external endpoint; this module
//! only decides *when* to call it and with which batch.

use crate::bus::{Collection, EventBus};
use crate::entity::Uid;
use crate::live::{self, LiveUpdate, Subscription};
use crate::model::{Booking, ConsultantProfile};
use crate::store::Store;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

#[derive(Serialize)]
struct NotifyPayload<'a> {
    email: &'a str,
    name: &'a str,
    bookings: &'a [Booking],
}

pub struct Notifier {
    client: reqwest::Client,
    url: String,
    notified: HashSet<String>,
}

impl Notifier {
    pub fn new(url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
            notified: HashSet::new(),
        }
    }

    /// Send one notification covering every pending booking not yet
    /// announced. Ids are remembered only after a successful post, so a
    /// failed delivery is re-attempted on the next snapshot. Never fatal.
    pub async fn notify_new_pending(&mut self, profile: &ConsultantProfile, pending: &[Booking]) {
        let fresh: Vec<Booking> = pending
            .iter()
            .filter(|b| !self.notified.contains(&b.id))
            .cloned()
            .collect();
        if fresh.is_empty() {
            return;
        }

        let payload = NotifyPayload {
            email: &profile.email,
            name: &profile.name,
            bookings: &fresh,
        };

        match self.client.post(&self.url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(
                    "notified {} about {} new pending booking(s)",
                    profile.email,
                    fresh.len()
                );
                self.notified.extend(fresh.into_iter().map(|b| b.id));
            }
            Ok(response) => {
                warn!("notification endpoint returned {}", response.status());
            }
            Err(e) => {
                warn!("failed to reach notification endpoint: {e}");
            }
        }
    }
}

/// Watch a consultant's pending bookings and feed each snapshot to the
/// shared notifier. The returned subscription is owned by the session;
/// cancelling it ends the watch.
pub fn spawn_watch(
    notifier: Arc<Mutex<Notifier>>,
    store: Store,
    bus: &EventBus,
    consultant: Uid,
) -> Subscription {
    let fetch_store = store.clone();
    let fetch_uid = consultant.clone();
    let (sub, mut rx) = live::subscribe(
        bus,
        |c| matches!(c, Collection::Bookings),
        move || {
            let store = fetch_store.clone();
            let uid = fetch_uid.clone();
            async move { store.pending_bookings_of(&uid).await }
        },
    );

    tokio::spawn(async move {
        while let Some(update) = rx.recv().await {
            let pending = match update {
                LiveUpdate::Snapshot(pending) => pending,
                LiveUpdate::Error(e) => {
                    warn!("pending-booking watch failed: {e}");
                    continue;
                }
            };
            if pending.is_empty() {
                continue;
            }
            let profile = match store.get_consultant(&consultant).await {
                Ok(Some(profile)) => profile,
                Ok(None) => continue,
                Err(e) => {
                    warn!("could not load consultant profile for notification: {e:#}");
                    continue;
                }
            };
            notifier
                .lock()
                .await
                .notify_new_pending(&profile, &pending)
                .await;
        }
    });

    sub
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::BookingStatus;
    use crate::testutil;

    // Network-facing paths are exercised against a closed port: the
    // interesting behavior is that failures stay quiet and ids are only
    // remembered on success.
    #[tokio::test]
    async fn failed_delivery_is_retried_on_next_snapshot() {
        let profile = ConsultantProfile {
            id: Uid::new("doc"),
            email: "doc@example.com".into(),
            name: "Dr. Reyes".into(),
            specialty: None,
            contact_info: None,
            clinic_address: None,
            available_days: vec![],
            consultation_hours: vec![],
            platforms: vec![],
            photo_url: None,
            unavailable_note: None,
        };
        let pending = vec![testutil::booking("b1", "doc", BookingStatus::Pending, false)];

        let mut notifier = Notifier::new("http://127.0.0.1:1/notify".into());
        notifier.notify_new_pending(&profile, &pending).await;
        // Unreachable endpoint: nothing marked as announced.
        assert!(notifier.notified.is_empty());

        // A booking the notifier already announced is filtered out.
        notifier.notified.insert("b1".to_string());
        notifier.notify_new_pending(&profile, &pending).await;
        assert_eq!(notifier.notified.len(), 1);
    }
}
