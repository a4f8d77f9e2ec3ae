//! Registry of connected observers.
//!
//! Tracks who is connected and how many. Every change publishes a
//! `userCount` event; this is independent of the attack-state stream.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use siege_types::{ConnectionId, Observer, ServerEvent, UserCount};
use tokio::sync::broadcast;
use tracing::debug;

use crate::broadcast::Broadcaster;
use crate::clock::Clock;

/// Connected observers and their count.
pub struct SessionRegistry {
    observers: Mutex<BTreeMap<ConnectionId, Observer>>,
    count: AtomicU64,
    broadcaster: Broadcaster,
    clock: Arc<dyn Clock>,
}

impl SessionRegistry {
    /// Create an empty registry publishing through `broadcaster`.
    pub fn new(broadcaster: Broadcaster, clock: Arc<dyn Clock>) -> Self {
        Self {
            observers: Mutex::new(BTreeMap::new()),
            count: AtomicU64::new(0),
            broadcaster,
            clock,
        }
    }

    /// Register a new observer and publish the new count.
    pub fn connect(&self) -> Observer {
        let observer = Observer {
            connection_id: ConnectionId::new(),
            joined_at: self.clock.now(),
        };
        let mut observers = self.lock();
        observers.insert(observer.connection_id, observer);
        let count = self.store_count(&observers);
        // Published under the lock so count events are never reordered.
        self.broadcaster.publish(ServerEvent::UserCount(UserCount { count }));
        drop(observers);

        debug!(connection_id = %observer.connection_id, count, "Observer connected");
        observer
    }

    /// Remove an observer. Returns `false` if it was not registered, in
    /// which case nothing is published.
    pub fn disconnect(&self, connection_id: ConnectionId) -> bool {
        let mut observers = self.lock();
        if observers.remove(&connection_id).is_none() {
            return false;
        }
        let count = self.store_count(&observers);
        self.broadcaster.publish(ServerEvent::UserCount(UserCount { count }));
        drop(observers);

        debug!(%connection_id, count, "Observer disconnected");
        true
    }

    /// Subscribe to the event stream together with the observer count it
    /// starts from.
    ///
    /// Both are taken under the registry lock, so no `userCount` event can
    /// fall between the returned count and the first received event.
    pub fn subscribe(&self) -> (u64, broadcast::Receiver<ServerEvent>) {
        let observers = self.lock();
        let count = u64::try_from(observers.len()).unwrap_or(u64::MAX);
        let receiver = self.broadcaster.subscribe();
        drop(observers);
        (count, receiver)
    }

    /// Number of connected observers.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// All connected observers, ordered by connection id.
    pub fn observers(&self) -> Vec<Observer> {
        self.lock().values().copied().collect()
    }

    fn store_count(&self, observers: &BTreeMap<ConnectionId, Observer>) -> u64 {
        let count = u64::try_from(observers.len()).unwrap_or(u64::MAX);
        self.count.store(count, Ordering::Release);
        count
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<ConnectionId, Observer>> {
        self.observers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl core::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("count", &self.count())
            .finish_non_exhaustive()
    }
}
