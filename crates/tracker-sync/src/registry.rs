use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;
use tracing::info;
use tracker_core::config::DEFAULT_MAILBOX_CAPACITY;
use uuid::Uuid;

use crate::event::Event;

/// Identity of one connected stream: optional client address plus a random token.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriberId(String);

impl SubscriberId {
    fn generate(origin: Option<&str>) -> Self {
        let token = Uuid::new_v4();
        match origin {
            Some(origin) => Self(format!("{origin}-{token}")),
            None => Self(token.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

type MailboxMap = HashMap<SubscriberId, mpsc::Sender<Event>>;

/// Process-wide table of active subscribers and their mailboxes.
///
/// One mutex guards the map. Registration, deregistration and broadcast
/// iteration all take it, and none of them hold it across an `.await`.
pub struct SubscriberRegistry {
    capacity: usize,
    mailboxes: Mutex<MailboxMap>,
}

impl SubscriberRegistry {
    /// Create an empty registry whose mailboxes hold `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            // tokio panics on a zero-sized channel
            capacity: capacity.max(1),
            mailboxes: Mutex::new(HashMap::new()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Register a new anonymous subscriber.
    pub fn register(self: &Arc<Self>) -> Subscription {
        self.insert(None)
    }

    /// Register a new subscriber whose id is prefixed with `origin`
    /// (usually the client IP).
    pub fn register_from(self: &Arc<Self>, origin: impl fmt::Display) -> Subscription {
        self.insert(Some(origin.to_string()))
    }

    fn insert(self: &Arc<Self>, origin: Option<String>) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = SubscriberId::generate(origin.as_deref());

        let total = {
            let mut map = self.lock();
            map.insert(id.clone(), tx);
            map.len()
        };
        info!(subscriber = %id, subscribers = total, "subscriber registered");

        Subscription {
            id,
            mailbox: rx,
            registry: Arc::clone(self),
        }
    }

    /// Remove a subscriber. Unknown or already-removed ids are a no-op.
    ///
    /// Returns `true` if this call removed the entry.
    pub fn deregister(&self, id: &SubscriberId) -> bool {
        let (removed, total) = {
            let mut map = self.lock();
            let removed = map.remove(id).is_some();
            (removed, map.len())
        };
        if removed {
            info!(subscriber = %id, subscribers = total, "subscriber deregistered");
        }
        removed
    }

    pub fn contains(&self, id: &SubscriberId) -> bool {
        self.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Visit every mailbox while holding the registry lock.
    ///
    /// `f` must not block: it runs inside the critical section.
    pub(crate) fn for_each_mailbox<F>(&self, mut f: F)
    where
        F: FnMut(&SubscriberId, &mpsc::Sender<Event>),
    {
        let map = self.lock();
        for (id, tx) in map.iter() {
            f(id, tx);
        }
    }

    // A panic while holding the lock cannot leave the map half-mutated
    // (every critical section is a single insert/remove/iterate), so a
    // poisoned lock is still safe to use.
    fn lock(&self) -> MutexGuard<'_, MailboxMap> {
        self.mailboxes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for SubscriberRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAILBOX_CAPACITY)
    }
}

/// A registered subscriber: its id plus the receiving end of its mailbox.
///
/// Dropping a `Subscription` deregisters it, so the registry never keeps
/// an entry for a mailbox nobody reads.
pub struct Subscription {
    id: SubscriberId,
    mailbox: mpsc::Receiver<Event>,
    registry: Arc<SubscriberRegistry>,
}

impl Subscription {
    pub fn id(&self) -> &SubscriberId {
        &self.id
    }

    /// Wait for the next event. Returns `None` once the subscriber has been
    /// deregistered and the mailbox is drained.
    pub async fn recv(&mut self) -> Option<Event> {
        self.mailbox.recv().await
    }

    /// Take the next event without waiting.
    pub fn try_recv(&mut self) -> Option<Event> {
        self.mailbox.try_recv().ok()
    }

    /// Number of events waiting in the mailbox.
    pub fn pending(&self) -> usize {
        self.mailbox.len()
    }

    /// Remove this subscriber from the registry.
    pub fn deregister(&self) -> bool {
        self.registry.deregister(&self.id)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("pending", &self.pending())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.registry.deregister(&self.id);
    }
}
