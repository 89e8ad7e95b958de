use crate::bus::{Collection, Event, EventBus};
use std::future::Future;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tracing::warn;

/// One delivery from a live query. Always a full snapshot of the matching
/// set, never a diff; fetch failures travel on the same channel instead of
/// panicking inside the subscription task.
#[derive(Debug, Clone)]
pub enum LiveUpdate<T> {
    Snapshot(Vec<T>),
    Error(String),
}

/// Handle to a running live query. Cancellation is abort-on-drop, so a
/// subscription can never outlive its owner; `cancel` exists for the cases
/// where teardown should be explicit.
pub struct Subscription {
    handle: JoinHandle<()>,
}

impl Subscription {
    pub fn cancel(self) {
        self.handle.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// The owned-subscription set of a view: everything added here dies
/// together on `cancel_all` (or when the set is dropped).
#[derive(Default)]
pub struct SubscriptionSet {
    subs: Vec<Subscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sub: Subscription) {
        self.subs.push(sub);
    }

    pub fn cancel_all(&mut self) {
        for sub in self.subs.drain(..) {
            sub.cancel();
        }
    }
}

/// Establish a live query: emit one initial snapshot, then re-run `fetch`
/// and emit a fresh snapshot every time the bus reports a change to a
/// collection `interest` cares about. `deliver` returning false means the
/// receiving side is gone and the task stops.
///
/// No ordering is guaranteed across different subscriptions; consumers must
/// treat each delivery as the latest-known state of that one query. A
/// lagged bus receiver resyncs with a fresh fetch rather than replaying
/// missed events.
pub fn subscribe_with<T, I, F, Fut, D>(
    bus: &EventBus,
    interest: I,
    fetch: F,
    deliver: D,
) -> Subscription
where
    T: Send + 'static,
    I: Fn(&Collection) -> bool + Send + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<Vec<T>>> + Send,
    D: Fn(LiveUpdate<T>) -> bool + Send + Sync + 'static,
{
    let mut bus_rx = bus.subscribe();

    let handle = tokio::spawn(async move {
        if !deliver(snapshot_or_error(fetch().await)) {
            return;
        }
        loop {
            match bus_rx.recv().await {
                Ok(Event::CollectionChanged(collection)) if interest(&collection) => {
                    if !deliver(snapshot_or_error(fetch().await)) {
                        return;
                    }
                }
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    warn!("live query lagged behind by {missed} events, resyncing");
                    if !deliver(snapshot_or_error(fetch().await)) {
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return,
            }
        }
    });

    Subscription { handle }
}

/// `subscribe_with` delivering into a channel; the common case.
pub fn subscribe<T, I, F, Fut>(
    bus: &EventBus,
    interest: I,
    fetch: F,
) -> (Subscription, mpsc::UnboundedReceiver<LiveUpdate<T>>)
where
    T: Send + 'static,
    I: Fn(&Collection) -> bool + Send + 'static,
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = anyhow::Result<Vec<T>>> + Send,
{
    let (tx, rx) = mpsc::unbounded_channel();
    let sub = subscribe_with(bus, interest, fetch, move |update| tx.send(update).is_ok());
    (sub, rx)
}

fn snapshot_or_error<T>(fetched: anyhow::Result<Vec<T>>) -> LiveUpdate<T> {
    match fetched {
        Ok(rows) => LiveUpdate::Snapshot(rows),
        Err(e) => LiveUpdate::Error(format!("{e:#}")),
    }
}
