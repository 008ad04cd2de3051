//! Listener registry for push-style change notification.
//!
//! Listeners are cloned out of the registry before being invoked, so a
//! listener may subscribe or unsubscribe from inside its own callback.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, Weak};

/// Callback invoked with each published event.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

/// Identifies a registered listener.
pub type ListenerId = u64;

/// Fan-out registry of listeners for one event type.
pub struct ChangeFeed<E> {
    next_id: AtomicU64,
    listeners: RwLock<Vec<(ListenerId, Listener<E>)>>,
}

impl<E> Default for ChangeFeed<E> {
    fn default() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            listeners: RwLock::new(Vec::new()),
        }
    }
}

impl<E> ChangeFeed<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn subscribe(&self, listener: Listener<E>) -> ListenerId {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push((id, listener));
        id
    }

    /// Remove a listener. Returns false if it was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write().unwrap_or_else(|e| e.into_inner());
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Deliver an event to every listener registered at call time.
    pub fn publish(&self, event: &E) {
        let listeners: Vec<Listener<E>> = self
            .listeners
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Handle that unsubscribes its listener when cancelled or dropped.
pub struct Subscription<E> {
    feed: Weak<ChangeFeed<E>>,
    id: Option<ListenerId>,
}

impl<E> Subscription<E> {
    /// Register `listener` on a shared feed.
    pub fn attach(feed: &Arc<ChangeFeed<E>>, listener: Listener<E>) -> Self {
        let id = feed.subscribe(listener);
        Self {
            feed: Arc::downgrade(feed),
            id: Some(id),
        }
    }

    pub fn is_active(&self) -> bool {
        self.id.is_some() && self.feed.strong_count() > 0
    }

    /// Stop receiving events.
    pub fn cancel(&mut self) {
        if let (Some(id), Some(feed)) = (self.id.take(), self.feed.upgrade()) {
            feed.unsubscribe(id);
        }
    }
}

impl<E> Drop for Subscription<E> {
    fn drop(&mut self) {
        self.cancel();
    }
}
