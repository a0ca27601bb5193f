//! Memo Implementation
//!
//! A Memo is a cached derived value that re-evaluates only when a state path
//! it read has changed. Store getters are memos.
//!
//! # How Memos Work
//!
//! 1. On first access, the memo runs its computation inside a reactive
//!    context and caches the result along with the paths it read.
//!
//! 2. When accessed again, if no dependency changed, returns cached value.
//!
//! 3. When the runtime sees a write overlapping a dependency, the memo is
//!    marked dirty.
//!
//! 4. On next access, the memo recomputes.
//!
//! A memo read from inside another computation hands its own dependency set
//! to the outer computation, so a getter built on other getters is
//! invalidated by the writes that invalidate them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use super::context::ReactiveContext;
use super::runtime::{Reactive, ReactiveHandle, Runtime};
use super::subscriber::SubscriberId;
use crate::path::Path;

/// Dirty state for a memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoState {
    /// The cached value is up-to-date.
    Clean,

    /// The memo needs to recompute on next access.
    Dirty,
}

struct MemoInner<T> {
    subscriber_id: SubscriberId,
    compute: Box<dyn Fn() -> T + Send + Sync>,
    value: RwLock<Option<T>>,
    state: RwLock<MemoState>,
    dependencies: RwLock<Vec<Path>>,
    runtime: Runtime,
    evaluations: AtomicU64,
}

impl<T> Reactive for MemoInner<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn subscriber_id(&self) -> SubscriberId {
        self.subscriber_id
    }

    fn mark_dirty(&self) {
        *self.state.write() = MemoState::Dirty;
    }

    fn schedule(&self) {}

    fn is_eager(&self) -> bool {
        false
    }
}

/// A cached derived value that recomputes only when dependencies change.
pub struct Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    inner: Arc<MemoInner<T>>,
    _handle: Arc<ReactiveHandle>,
}

impl<T> Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create a new memo registered with `runtime`.
    ///
    /// The computation is not run immediately. It runs on first access.
    pub fn new<F>(runtime: &Runtime, compute: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        let inner = Arc::new(MemoInner {
            subscriber_id: SubscriberId::new(),
            compute: Box::new(compute),
            value: RwLock::new(None),
            state: RwLock::new(MemoState::Dirty),
            dependencies: RwLock::new(Vec::new()),
            runtime: runtime.clone(),
            evaluations: AtomicU64::new(0),
        });
        let handle = runtime.register(inner.clone());

        Self {
            inner,
            _handle: Arc::new(handle),
        }
    }

    pub fn subscriber_id(&self) -> SubscriberId {
        self.inner.subscriber_id
    }

    /// Get the current value, recomputing if necessary.
    pub fn get(&self) -> T {
        let cached = match *self.inner.state.read() {
            MemoState::Clean => self.inner.value.read().clone(),
            MemoState::Dirty => None,
        };

        let value = match cached {
            Some(value) => value,
            None => self.recompute(),
        };

        if ReactiveContext::is_active() {
            ReactiveContext::track_all(&self.inner.dependencies.read());
        }
        value
    }

    /// Mark the memo as needing recomputation.
    pub fn mark_dirty(&self) {
        self.inner.mark_dirty();
    }

    fn recompute(&self) -> T {
        // Marked clean before running so a write landing mid-evaluation is
        // not lost.
        *self.inner.state.write() = MemoState::Clean;

        let (value, dependencies) = {
            let _ctx = ReactiveContext::enter(self.inner.subscriber_id);
            let value = (self.inner.compute)();
            (value, ReactiveContext::get_dependencies())
        };

        self.inner
            .runtime
            .set_dependencies(self.inner.subscriber_id, dependencies.clone());
        *self.inner.dependencies.write() = dependencies;
        *self.inner.value.write() = Some(value.clone());
        self.inner.evaluations.fetch_add(1, Ordering::Relaxed);

        value
    }

    /// Get the current dirty state.
    pub fn state(&self) -> MemoState {
        *self.inner.state.read()
    }

    /// How many times the computation has run.
    pub fn evaluations(&self) -> u64 {
        self.inner.evaluations.load(Ordering::Relaxed)
    }

    /// Paths read during the last evaluation.
    pub fn dependencies(&self) -> Vec<Path> {
        self.inner.dependencies.read().clone()
    }

    /// Check if the memo has a cached value.
    pub fn has_value(&self) -> bool {
        self.inner.value.read().is_some()
    }
}

impl<T> Clone for Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            _handle: Arc::clone(&self._handle),
        }
    }
}

impl<T> std::fmt::Debug for Memo<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Memo")
            .field("subscriber_id", &self.inner.subscriber_id)
            .field("state", &self.state())
            .field("has_value", &self.has_value())
            .field("evaluations", &self.evaluations())
            .finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
