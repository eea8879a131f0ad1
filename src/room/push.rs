//! Push event fan-out
//!
//! Snapshots read from the room socket are published under a fixed event
//! name. Subscribers get a [`Subscription`] back and must dispose it when
//! their room view goes away.

use crate::room::RoomState;
use log::{debug, warn};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Event name under which full snapshots are delivered
pub const ROOM_STATE_EVENT: &str = "room_state";

type Callback = Box<dyn Fn(&RoomState) + Send + Sync>;

struct Subscriber {
    id: u64,
    event: String,
    callback: Callback,
}

/// Snapshot dispatcher shared between the socket reader and room views
#[derive(Clone, Default)]
pub struct PushHub {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
    next_id: Arc<AtomicU64>,
}

impl PushHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for `event`
    pub fn subscribe<F>(&self, event: &str, callback: F) -> Subscription
    where
        F: Fn(&RoomState) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.write().push(Subscriber {
            id,
            event: event.to_string(),
            callback: Box::new(callback),
        });
        debug!("Subscriber {} attached to '{}'", id, event);

        Subscription {
            id,
            subscribers: Arc::downgrade(&self.subscribers),
            disposed: false,
        }
    }

    /// Deliver a snapshot to every subscriber of `event`
    pub fn publish(&self, event: &str, state: &RoomState) -> usize {
        let subs = self.subscribers.read();
        let mut delivered = 0;
        for sub in subs.iter().filter(|s| s.event == event) {
            (sub.callback)(state);
            delivered += 1;
        }
        if delivered == 0 {
            warn!("No subscriber for '{}'", event);
        }
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

/// Disposer returned by [`PushHub::subscribe`]
///
/// `dispose` consumes the handle, so it runs at most once; dropping an
/// undisposed handle disposes it.
pub struct Subscription {
    id: u64,
    subscribers: std::sync::Weak<RwLock<Vec<Subscriber>>>,
    disposed: bool,
}

impl Subscription {
    pub fn dispose(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.write().retain(|s| s.id != self.id);
            debug!("Subscriber {} detached", self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
