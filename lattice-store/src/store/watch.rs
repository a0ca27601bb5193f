//! Reactive watchers.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use super::context::Getters;
use super::{Store, StoreInner};
use crate::path::Path;
use crate::reactive::{Effect, ReactiveContext, StateView, SubscriberId};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WatchOptions {
    /// Invoke the callback once right away, with `Null` as the old value.
    pub immediate: bool,
}

/// Handle returned by [`Store::watch`].
#[derive(Clone)]
pub struct WatchHandle {
    store: Weak<StoreInner>,
    id: SubscriberId,
}

impl WatchHandle {
    /// Stop watching. Repeated calls are no-ops.
    pub fn unwatch(&self) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        if let Some((_, effect)) = store.watchers.remove(&self.id) {
            effect.dispose();
            trace!(watcher = ?self.id, "unwatched");
        }
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchHandle").field("id", &self.id).finish()
    }
}

impl Store {
    /// Call `callback(new, old)` whenever the value computed by `getter`
    /// changes.
    pub fn watch<G, C>(&self, getter: G, callback: C) -> WatchHandle
    where
        G: Fn(&StateView, &Getters) -> Value + Send + Sync + 'static,
        C: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        self.watch_with(getter, callback, WatchOptions::default())
    }

    pub fn watch_with<G, C>(&self, getter: G, callback: C, options: WatchOptions) -> WatchHandle
    where
        G: Fn(&StateView, &Getters) -> Value + Send + Sync + 'static,
        C: Fn(&Value, &Value) + Send + Sync + 'static,
    {
        let state = self.inner.state.view(Path::root());
        let getters = Getters::new(Arc::downgrade(&self.inner), String::new());
        let last: Mutex<Option<Value>> = Mutex::new(None);
        let immediate = options.immediate;

        let effect = Effect::new(self.inner.state.runtime(), move || {
            let next = getter(&state, &getters);
            let previous = last.lock().replace(next.clone());
            // The callback's own reads must not become the watcher's deps.
            match previous {
                Some(previous) if previous != next => {
                    ReactiveContext::untracked(|| callback(&next, &previous))
                }
                None if immediate => ReactiveContext::untracked(|| callback(&next, &Value::Null)),
                _ => {}
            }
        });

        let id = effect.subscriber_id();
        self.inner.watchers.insert(id, effect);
        WatchHandle {
            store: Arc::downgrade(&self.inner),
            id,
        }
    }
}
