//! Fan-out of state events to every connected observer.
//!
//! Built on [`tokio::sync::broadcast`]: publishing never blocks, so a
//! slow or dead observer cannot stall a transition. A subscriber that
//! falls more than the channel capacity behind receives
//! [`broadcast::error::RecvError::Lagged`] and is expected to resync
//! from a fresh snapshot.

use siege_types::ServerEvent;
use tokio::sync::broadcast;

use crate::store::Effect;

/// Cloneable handle to the event channel.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    tx: broadcast::Sender<ServerEvent>,
}

impl Broadcaster {
    /// Create a channel buffering up to `capacity` events per subscriber.
    /// A zero capacity is raised to one.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish one event. Returns the number of subscribers it reached;
    /// zero when nobody is connected, which is not an error.
    pub fn publish(&self, event: ServerEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    /// Publish every event an effect produces, in order.
    pub fn publish_effect(&self, effect: &Effect) -> usize {
        effect
            .events()
            .into_iter()
            .map(|event| self.publish(event))
            .max()
            .unwrap_or(0)
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
