// Real-time change fan-out

use crate::record::Record;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[cfg(test)]
mod tests;

/// Per-subscriber queue depth. Events beyond this are dropped for that
/// subscriber only.
const SUBSCRIBER_BUFFER: usize = 256;

/// Record change broadcast to every connected subscriber.
///
/// Wire format: `{"event": "record-saved", "data": {...record...}}`
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ChangeEvent {
    #[serde(rename = "record-saved")]
    Saved(Record),
    #[serde(rename = "record-updated")]
    Updated(Record),
    #[serde(rename = "record-deleted")]
    Deleted(Record),
}

impl ChangeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ChangeEvent::Saved(_) => "record-saved",
            ChangeEvent::Updated(_) => "record-updated",
            ChangeEvent::Deleted(_) => "record-deleted",
        }
    }

    pub fn record(&self) -> &Record {
        match self {
            ChangeEvent::Saved(r) | ChangeEvent::Updated(r) | ChangeEvent::Deleted(r) => r,
        }
    }
}

/// Handle returned to a newly registered subscriber
pub struct Subscription {
    pub id: Uuid,
    pub events: mpsc::Receiver<ChangeEvent>,
}

/// Registry of active subscribers.
///
/// Connections register on open and unregister on close. `publish` never
/// waits on a subscriber: a full queue drops the event for that subscriber
/// and a closed queue removes it from the registry.
pub struct ChangeNotifier {
    subscribers: DashMap<Uuid, mpsc::Sender<ChangeEvent>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
        }
    }

    /// Register a subscriber. It receives every event published from now on.
    pub fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = Uuid::new_v4();
        self.subscribers.insert(id, tx);

        info!(
            subscriber_id = %id,
            subscribers = self.subscribers.len(),
            "Subscriber registered"
        );

        Subscription { id, events: rx }
    }

    pub fn unsubscribe(&self, id: &Uuid) {
        if self.subscribers.remove(id).is_some() {
            info!(
                subscriber_id = %id,
                subscribers = self.subscribers.len(),
                "Subscriber removed"
            );
        }
    }

    /// Fan out `event` to all subscribers. Returns how many accepted it.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!(
                        subscriber_id = %entry.key(),
                        event = event.name(),
                        "Subscriber lagging, event dropped"
                    );
                }
                Err(TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        // Removal happens after iteration; DashMap shards are read-locked above
        for id in closed {
            self.unsubscribe(&id);
        }

        debug!(
            event = event.name(),
            record_id = %event.record().id,
            delivered = delivered,
            "Change broadcast"
        );

        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}
