//! The aggregation engine: one task per portal session that merges the
//! live client, booking, chat and per-chat message streams into the
//! dashboard's derived counters. Every triggering event recomputes from
//! the latest known snapshots; nothing is maintained incrementally, which
//! is fine at the tens-to-hundreds scale these sets have.

use crate::bus::{Collection, EventBus};
use crate::entity::Uid;
use crate::live::{subscribe_with, LiveUpdate, Subscription, SubscriptionSet};
use crate::model::{Booking, Chat, Client, Message};
use crate::store::Store;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::warn;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DashboardStats {
    pub patients: usize,
    pub pending_appointments: usize,
    pub unread_messages: usize,
    pub average_rating: f64,
}

/// Owns the session's aggregation task. Dropping the handle (or calling
/// `shutdown`) aborts the task, which in turn drops and cancels every
/// subscription the session opened.
pub struct AggregatorHandle {
    driver: JoinHandle<()>,
}

impl AggregatorHandle {
    pub fn shutdown(self) {
        self.driver.abort();
    }
}

impl Drop for AggregatorHandle {
    fn drop(&mut self) {
        self.driver.abort();
    }
}

/// One delivery from any of the session's subscriptions. The feeds are
/// independent and interleave arbitrarily; each carries only the identity
/// of the stream it refreshes.
enum Feed {
    Clients(LiveUpdate<Client>),
    Pending(LiveUpdate<Booking>),
    Rated(LiveUpdate<Booking>),
    Chats(LiveUpdate<Chat>),
    Messages {
        chat_id: String,
        update: LiveUpdate<Message>,
    },
}

#[derive(Default)]
struct AggState {
    patients: usize,
    pending: usize,
    ratings: Vec<f64>,
    chats: Vec<Chat>,
    /// Latest message snapshot per chat currently in the chat set.
    messages: HashMap<String, Vec<Message>>,
}

impl AggState {
    fn stats(&self, viewer: &Uid) -> DashboardStats {
        let unread_messages = self
            .chats
            .iter()
            .map(|chat| {
                self.messages
                    .get(&chat.id)
                    .map_or(0, |messages| {
                        messages
                            .iter()
                            .filter(|m| m.is_unread_in(chat, viewer))
                            .count()
                    })
            })
            .sum();

        let average_rating = if self.ratings.is_empty() {
            0.0
        } else {
            self.ratings.iter().sum::<f64>() / self.ratings.len() as f64
        };

        DashboardStats {
            patients: self.patients,
            pending_appointments: self.pending,
            unread_messages,
            average_rating,
        }
    }
}

pub struct Aggregator;

impl Aggregator {
    /// Spawn the aggregation task for one consultant session. The returned
    /// watch receiver always holds the latest stats; a new value is
    /// published after every contributing snapshot.
    pub fn spawn(
        store: Store,
        bus: Arc<EventBus>,
        consultant: Uid,
    ) -> (AggregatorHandle, watch::Receiver<DashboardStats>) {
        let (watch_tx, watch_rx) = watch::channel(DashboardStats::default());
        let (feed_tx, feed_rx) = mpsc::unbounded_channel();

        let mut subs = SubscriptionSet::new();

        {
            let store = store.clone();
            let uid = consultant.clone();
            let tx = feed_tx.clone();
            subs.add(subscribe_with(
                &bus,
                |c| matches!(c, Collection::Clients),
                move || {
                    let store = store.clone();
                    let uid = uid.clone();
                    async move { store.clients_of(&uid).await }
                },
                move |update| tx.send(Feed::Clients(update)).is_ok(),
            ));
        }
        {
            let store = store.clone();
            let uid = consultant.clone();
            let tx = feed_tx.clone();
            subs.add(subscribe_with(
                &bus,
                |c| matches!(c, Collection::Bookings),
                move || {
                    let store = store.clone();
                    let uid = uid.clone();
                    async move { store.pending_bookings_of(&uid).await }
                },
                move |update| tx.send(Feed::Pending(update)).is_ok(),
            ));
        }
        {
            let store = store.clone();
            let uid = consultant.clone();
            let tx = feed_tx.clone();
            subs.add(subscribe_with(
                &bus,
                |c| matches!(c, Collection::Bookings),
                move || {
                    let store = store.clone();
                    let uid = uid.clone();
                    async move { store.rated_bookings_of(&uid).await }
                },
                move |update| tx.send(Feed::Rated(update)).is_ok(),
            ));
        }
        {
            let store = store.clone();
            let uid = consultant.clone();
            let tx = feed_tx.clone();
            subs.add(subscribe_with(
                &bus,
                |c| matches!(c, Collection::Chats),
                move || {
                    let store = store.clone();
                    let uid = uid.clone();
                    async move { store.chats_of(&uid).await }
                },
                move |update| tx.send(Feed::Chats(update)).is_ok(),
            ));
        }

        let driver = tokio::spawn(drive(
            store, bus, consultant, subs, feed_tx, feed_rx, watch_tx,
        ));

        (AggregatorHandle { driver }, watch_rx)
    }
}

async fn drive(
    store: Store,
    bus: Arc<EventBus>,
    consultant: Uid,
    mut subs: SubscriptionSet,
    feed_tx: mpsc::UnboundedSender<Feed>,
    mut feed_rx: mpsc::UnboundedReceiver<Feed>,
    watch_tx: watch::Sender<DashboardStats>,
) {
    let mut state = AggState::default();
    // Nested subscriptions, one per chat in the current chat set.
    let mut chat_subs: HashMap<String, Subscription> = HashMap::new();

    while let Some(feed) = feed_rx.recv().await {
        match feed {
            Feed::Clients(LiveUpdate::Snapshot(clients)) => state.patients = clients.len(),
            Feed::Pending(LiveUpdate::Snapshot(bookings)) => state.pending = bookings.len(),
            Feed::Rated(LiveUpdate::Snapshot(bookings)) => {
                state.ratings = bookings.iter().filter_map(|b| b.rating).collect();
            }
            Feed::Chats(LiveUpdate::Snapshot(chats)) => {
                resync_chat_subs(&store, &bus, &feed_tx, &chats, &mut chat_subs);
                state.messages.retain(|chat_id, _| {
                    chats.iter().any(|c| c.id == *chat_id)
                });
                state.chats = chats;
            }
            Feed::Messages { chat_id, update } => match update {
                // Guard against a stale snapshot for a chat that has since
                // left the set; arrival order across feeds is arbitrary.
                LiveUpdate::Snapshot(messages) => {
                    if state.chats.iter().any(|c| c.id == chat_id) {
                        state.messages.insert(chat_id, messages);
                    }
                }
                LiveUpdate::Error(e) => {
                    warn!("message subscription for chat {chat_id} failed: {e}");
                }
            },
            Feed::Clients(LiveUpdate::Error(e))
            | Feed::Pending(LiveUpdate::Error(e))
            | Feed::Rated(LiveUpdate::Error(e))
            | Feed::Chats(LiveUpdate::Error(e)) => {
                warn!("dashboard subscription failed: {e}");
            }
        }

        if watch_tx.send(state.stats(&consultant)).is_err() {
            // No one is watching this session anymore.
            break;
        }
    }

    subs.cancel_all();
    for (_, sub) in chat_subs.drain() {
        sub.cancel();
    }
}

/// Open a message subscription for every newly-seen chat and cancel the
/// ones whose chat left the set; leaking the latter would keep dead
/// callbacks firing forever.
fn resync_chat_subs(
    store: &Store,
    bus: &EventBus,
    feed_tx: &mpsc::UnboundedSender<Feed>,
    chats: &[Chat],
    chat_subs: &mut HashMap<String, Subscription>,
) {
    let gone: Vec<String> = chat_subs
        .keys()
        .filter(|id| !chats.iter().any(|c| c.id == **id))
        .cloned()
        .collect();
    for id in gone {
        if let Some(sub) = chat_subs.remove(&id) {
            sub.cancel();
        }
    }

    for chat in chats {
        if chat_subs.contains_key(&chat.id) {
            continue;
        }
        let store = store.clone();
        let fetch_id = chat.id.clone();
        let interest_id = chat.id.clone();
        let deliver_id = chat.id.clone();
        let tx = feed_tx.clone();
        let sub = subscribe_with(
            bus,
            move |c| matches!(c, Collection::Messages { chat_id } if *chat_id == interest_id),
            move || {
                let store = store.clone();
                let chat_id = fetch_id.clone();
                async move { store.messages_of(&chat_id).await }
            },
            move |update| {
                tx.send(Feed::Messages {
                    chat_id: deliver_id.clone(),
                    update,
                })
                .is_ok()
            },
        );
        chat_subs.insert(chat.id.clone(), sub);
    }
}
