//! Reactive Context
//!
//! The reactive context tracks which computation is currently running so
//! that state reads can be attributed to it. A getter never declares what it
//! depends on; the paths it reads while evaluating are its dependencies.
//!
//! # Implementation
//!
//! We use a thread-local stack to track the currently executing computation.
//! Entering a memo or effect pushes an entry; the guard pops it. Nested
//! getters (a getter reading another getter) push nested entries.

use std::cell::RefCell;

use super::SubscriberId;
use crate::path::Path;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
}

/// An entry in the reactive context stack.
#[derive(Debug, Clone)]
struct ContextEntry {
    /// The subscriber ID of the current computation.
    subscriber_id: SubscriberId,
    /// State paths read during this computation, in read order.
    dependencies: Vec<Path>,
}

/// Guard that pops the context when dropped.
///
/// This keeps the stack balanced even if the computation panics.
pub struct ReactiveContext {
    subscriber_id: SubscriberId,
}

impl ReactiveContext {
    /// Enter a new reactive context for the given subscriber.
    ///
    /// While this context is active, every tracked state read is recorded
    /// against the subscriber.
    pub fn enter(subscriber_id: SubscriberId) -> Self {
        CONTEXT_STACK.with(|stack| {
            stack.borrow_mut().push(ContextEntry {
                subscriber_id,
                dependencies: Vec::new(),
            });
        });

        Self { subscriber_id }
    }

    /// Check if there is an active reactive context.
    pub fn is_active() -> bool {
        CONTEXT_STACK.with(|stack| !stack.borrow().is_empty())
    }

    /// Get the current subscriber ID, if any.
    pub fn current_subscriber() -> Option<SubscriberId> {
        CONTEXT_STACK.with(|stack| stack.borrow().last().map(|entry| entry.subscriber_id))
    }

    /// Record a read of `path` against the current computation.
    pub fn track_dependency(path: &Path) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                entry.dependencies.push(path.clone());
            }
        });
    }

    /// Record every path in `paths`; used when a cached memo is read from
    /// inside another computation.
    pub fn track_all(paths: &[Path]) {
        CONTEXT_STACK.with(|stack| {
            if let Some(entry) = stack.borrow_mut().last_mut() {
                entry.dependencies.extend(paths.iter().cloned());
            }
        });
    }

    /// Dependencies collected in the current context, deduplicated, in first
    /// read order.
    pub fn get_dependencies() -> Vec<Path> {
        CONTEXT_STACK.with(|stack| {
            let stack = stack.borrow();
            let Some(entry) = stack.last() else {
                return Vec::new();
            };
            let mut unique: Vec<Path> = Vec::with_capacity(entry.dependencies.len());
            for path in &entry.dependencies {
                if !unique.contains(path) {
                    unique.push(path.clone());
                }
            }
            unique
        })
    }

    /// Run `f` with tracking suspended.
    ///
    /// Reads inside `f` are not attributed to any enclosing computation.
    pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
        struct Restore(Vec<ContextEntry>);

        impl Drop for Restore {
            fn drop(&mut self) {
                let saved = std::mem::take(&mut self.0);
                CONTEXT_STACK.with(|stack| {
                    let mut stack = stack.borrow_mut();
                    let nested = std::mem::replace(&mut *stack, saved);
                    debug_assert!(nested.is_empty(), "unbalanced reactive context");
                });
            }
        }

        let _restore = Restore(CONTEXT_STACK.with(|stack| std::mem::take(&mut *stack.borrow_mut())));
        f()
    }
}

impl Drop for ReactiveContext {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let popped = stack.borrow_mut().pop();

            if let Some(entry) = popped {
                debug_assert_eq!(
                    entry.subscriber_id, self.subscriber_id,
                    "ReactiveContext mismatch: expected {:?}, got {:?}",
                    self.subscriber_id, entry.subscriber_id
                );
            }
        });
    }
}
