//! Subscriber registry for metadata cache notifications.
//!
//! Observers are held as explicit handles. [`ObserverRegistry::publish`]
//! snapshots the subscriber list under the lock and notifies outside it, so an
//! observer may subscribe or unsubscribe from inside its own callback.

use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use crate::SubscriptionId;

/// Something that happened to the metadata cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetadataCacheEvent {
    /// The staleness window elapsed and every table was cleared.
    Expired,
    /// Every table was cleared on request.
    Cleared,
    /// One entity (and its attributes) was dropped from the cache.
    EntityInvalidated {
        /// Logical name of the entity.
        entity: String,
    },
}

/// Receives [`MetadataCacheEvent`]s.
pub trait MetadataObserver: Send + Sync {
    /// Called once per published event. Must not block for long; it runs on
    /// the thread that triggered the event.
    fn on_event(&self, event: &MetadataCacheEvent);
}

/// Holds subscribed observers.
#[derive(Default)]
pub struct ObserverRegistry {
    subscribers: RwLock<Vec<(SubscriptionId, Arc<dyn MetadataObserver>)>>,
}

impl ObserverRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `observer` and returns the handle that removes it again.
    pub fn subscribe(&self, observer: Arc<dyn MetadataObserver>) -> SubscriptionId {
        let id = SubscriptionId::new_random();
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push((id, observer));
        debug!(subscription = %id, "metadata observer subscribed");
        id
    }

    /// Removes the observer registered under `id`. Returns `false` if no such
    /// subscription exists.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let before = subscribers.len();
        subscribers.retain(|(sid, _)| *sid != id);
        before != subscribers.len()
    }

    /// Delivers `event` to every current subscriber.
    pub fn publish(&self, event: &MetadataCacheEvent) {
        let snapshot: Vec<Arc<dyn MetadataObserver>> = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();
        for observer in snapshot {
            observer.on_event(event);
        }
    }

    /// Number of current subscribers.
    pub fn len(&self) -> usize {
        self.subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nobody is subscribed.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for ObserverRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverRegistry")
            .field("subscribers", &self.len())
            .finish()
    }
}
