use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// A collection in the backing store. Change events are tagged with the
/// collection they touched so live queries can ignore unrelated writes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Collection {
    Clients,
    Bookings,
    Chats,
    /// The per-chat message subcollection.
    Messages { chat_id: String },
    Users,
    Consultants,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// One or more records in the collection were inserted or updated.
    /// Subscribers re-query; the event carries no payload.
    CollectionChanged(Collection),
}

pub struct EventBus {
    tx: broadcast::Sender<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(100);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: Event) {
        // We ignore the error if there are no receivers
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
