//! Reactive Runtime
//!
//! The runtime connects state writes to the computations that read the
//! written paths. Every store owns one runtime.
//!
//! # How It Works
//!
//! 1. Memos and effects register with the runtime and get a handle back.
//!
//! 2. After a computation runs, it reports the state paths it read.
//!
//! 3. When a write changes a set of paths, the runtime:
//!    a. Finds every computation with a dependency overlapping a changed path
//!    b. Marks them dirty
//!    c. Runs the eager ones (effects), or hands them back to the state
//!       tree to run once the current commit ends
//!    d. Memos are lazy - they recompute on next access

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::trace;

use super::subscriber::SubscriberId;
use crate::path::Path;

/// A computation that can be invalidated by state writes.
pub trait Reactive: Send + Sync {
    /// Get the subscriber ID for this reactive value.
    fn subscriber_id(&self) -> SubscriberId;

    /// Mark this reactive value as needing to re-evaluate.
    fn mark_dirty(&self);

    /// Re-run this reactive value now (effects only).
    fn schedule(&self);

    /// Check if this reactive value is an effect (eager) or memo (lazy).
    fn is_eager(&self) -> bool;
}

#[derive(Default)]
struct RuntimeInner {
    /// Weak references so a dropped memo never lingers here.
    registry: DashMap<SubscriberId, Weak<dyn Reactive>>,
    dependencies: DashMap<SubscriberId, Vec<Path>>,
}

/// Dependency registry for one store.
#[derive(Clone, Default)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

/// Handle to a registered reactive value.
///
/// Dropping this handle unregisters the reactive value from the runtime.
pub struct ReactiveHandle {
    subscriber_id: SubscriberId,
    runtime: Weak<RuntimeInner>,
}

impl Drop for ReactiveHandle {
    fn drop(&mut self) {
        if let Some(inner) = self.runtime.upgrade() {
            inner.registry.remove(&self.subscriber_id);
            inner.dependencies.remove(&self.subscriber_id);
        }
    }
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a reactive value with the runtime.
    ///
    /// Returns a handle that unregisters the value when dropped.
    pub fn register(&self, reactive: Arc<dyn Reactive>) -> ReactiveHandle {
        let subscriber_id = reactive.subscriber_id();
        self.inner
            .registry
            .insert(subscriber_id, Arc::downgrade(&reactive));

        ReactiveHandle {
            subscriber_id,
            runtime: Arc::downgrade(&self.inner),
        }
    }

    /// Replace the recorded dependencies of a subscriber.
    ///
    /// Called after every evaluation so stale reads never cause wakeups.
    pub fn set_dependencies(&self, subscriber_id: SubscriberId, paths: Vec<Path>) {
        self.inner.dependencies.insert(subscriber_id, paths);
    }

    /// Remove all dependencies for a subscriber.
    pub fn clear_dependencies(&self, subscriber_id: SubscriberId) {
        self.inner.dependencies.remove(&subscriber_id);
    }

    /// Number of live registered computations.
    pub fn registered_count(&self) -> usize {
        self.inner
            .registry
            .iter()
            .filter(|entry| entry.value().strong_count() > 0)
            .count()
    }

    /// Notify dependents that the values at `changed` were written.
    pub fn notify(&self, changed: &[Path]) {
        // No map guard may be held here: effects re-register dependencies.
        for effect in self.invalidate(changed) {
            effect.schedule();
        }
    }

    /// Mark every dependent of `changed` dirty and hand back the eager ones
    /// without running them.
    pub(crate) fn invalidate(&self, changed: &[Path]) -> Vec<Arc<dyn Reactive>> {
        if changed.is_empty() {
            return Vec::new();
        }

        let affected: Vec<SubscriberId> = self
            .inner
            .dependencies
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .iter()
                    .any(|dep| changed.iter().any(|path| path.overlaps(dep)))
            })
            .map(|entry| *entry.key())
            .collect();

        let mut effects = Vec::new();
        for subscriber_id in affected {
            let reactive = self
                .inner
                .registry
                .get(&subscriber_id)
                .and_then(|weak| weak.upgrade());

            if let Some(reactive) = reactive {
                reactive.mark_dirty();
                if reactive.is_eager() {
                    effects.push(reactive);
                }
            }
        }

        trace!(
            changed = changed.len(),
            effects = effects.len(),
            "propagating state change"
        );
        effects
    }
}

impl std::fmt::Debug for Runtime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Runtime")
            .field("registered", &self.registered_count())
            .finish()
    }
}
