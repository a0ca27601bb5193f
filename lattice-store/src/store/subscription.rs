//! Mutation and action subscribers.
//!
//! Subscribers live in ordered lists. Emission always walks a point-in-time
//! copy of the list, so a subscriber that unsubscribes (itself or another)
//! while being notified neither skips nor repeats anyone.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::call::{ActionRecord, MutationRecord};
use super::{Store, StoreInner};
use crate::error::ActionError;
use crate::reactive::{StateTree, SubscriberId};

/// Called after every commit with the mutation and the resulting state.
pub type MutationSubscriber = dyn Fn(&MutationRecord, &StateTree) + Send + Sync;

pub type ActionHook = Arc<dyn Fn(&ActionRecord, &StateTree) + Send + Sync>;
pub type ActionErrorHook = Arc<dyn Fn(&ActionRecord, &StateTree, &ActionError) + Send + Sync>;

/// Hooks around one dispatch. Each is optional.
#[derive(Clone, Default)]
pub struct ActionSubscriber {
    pub(crate) before: Option<ActionHook>,
    pub(crate) after: Option<ActionHook>,
    pub(crate) error: Option<ActionErrorHook>,
}

impl ActionSubscriber {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs before the handlers are invoked.
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ActionRecord, &StateTree) + Send + Sync + 'static,
    {
        self.before = Some(Arc::new(hook));
        self
    }

    /// Runs once every handler has resolved.
    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ActionRecord, &StateTree) + Send + Sync + 'static,
    {
        self.after = Some(Arc::new(hook));
        self
    }

    /// Runs when the dispatch rejects, with the rejection reason.
    pub fn error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&ActionRecord, &StateTree, &ActionError) + Send + Sync + 'static,
    {
        self.error = Some(Arc::new(hook));
        self
    }
}

/// A plain function subscribes as a `before` hook.
impl<F> From<F> for ActionSubscriber
where
    F: Fn(&ActionRecord, &StateTree) + Send + Sync + 'static,
{
    fn from(hook: F) -> Self {
        ActionSubscriber::new().before(hook)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubscribeOptions {
    /// Insert at the front of the list instead of the back.
    pub prepend: bool,
}

pub(crate) struct SubscriberList<T: ?Sized> {
    entries: Mutex<Vec<(SubscriberId, Arc<T>)>>,
}

impl<T: ?Sized> SubscriberList<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn add(&self, subscriber: Arc<T>, prepend: bool) -> SubscriberId {
        let id = SubscriberId::new();
        let mut entries = self.entries.lock();
        if prepend {
            entries.insert(0, (id, subscriber));
        } else {
            entries.push((id, subscriber));
        }
        id
    }

    /// Returns `false` if `id` was already removed.
    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        let mut entries = self.entries.lock();
        match entries.iter().position(|(entry, _)| *entry == id) {
            Some(index) => {
                entries.remove(index);
                true
            }
            None => false,
        }
    }

    pub(crate) fn snapshot(&self) -> Vec<Arc<T>> {
        self.entries
            .lock()
            .iter()
            .map(|(_, subscriber)| Arc::clone(subscriber))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscriptionKind {
    Mutation,
    Action,
}

/// Handle returned by `subscribe` and `subscribe_action`.
///
/// Dropping the handle keeps the subscription; call `unsubscribe`.
#[derive(Clone)]
pub struct Subscription {
    store: Weak<StoreInner>,
    id: SubscriberId,
    kind: SubscriptionKind,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Remove the subscriber. Repeated calls are no-ops returning `false`.
    pub fn unsubscribe(&self) -> bool {
        let Some(store) = self.store.upgrade() else {
            return false;
        };
        match self.kind {
            SubscriptionKind::Mutation => store.subscribers.remove(self.id),
            SubscriptionKind::Action => store.action_subscribers.remove(self.id),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

impl Store {
    /// Subscribe to every commit.
    pub fn subscribe<F>(&self, subscriber: F) -> Subscription
    where
        F: Fn(&MutationRecord, &StateTree) + Send + Sync + 'static,
    {
        self.subscribe_with(subscriber, SubscribeOptions::default())
    }

    pub fn subscribe_with<F>(&self, subscriber: F, options: SubscribeOptions) -> Subscription
    where
        F: Fn(&MutationRecord, &StateTree) + Send + Sync + 'static,
    {
        let id = self.inner.subscribers.add(Arc::new(subscriber), options.prepend);
        Subscription {
            store: Arc::downgrade(&self.inner),
            id,
            kind: SubscriptionKind::Mutation,
        }
    }

    /// Subscribe to every dispatch. A plain function is a `before` hook.
    pub fn subscribe_action(&self, subscriber: impl Into<ActionSubscriber>) -> Subscription {
        self.subscribe_action_with(subscriber, SubscribeOptions::default())
    }

    pub fn subscribe_action_with(
        &self,
        subscriber: impl Into<ActionSubscriber>,
        options: SubscribeOptions,
    ) -> Subscription {
        let id = self
            .inner
            .action_subscribers
            .add(Arc::new(subscriber.into()), options.prepend);
        Subscription {
            store: Arc::downgrade(&self.inner),
            id,
            kind: SubscriptionKind::Action,
        }
    }
}
