//! Reactive Primitives
//!
//! The store's change-tracking collaborator: a state tree whose reads are
//! tracked and whose writes invalidate dependents, plus the two kinds of
//! dependents the store needs.
//!
//! # Concepts
//!
//! ## State Tree
//!
//! One nested JSON value holding all application state. Reading a path
//! inside a tracking context registers the path as a dependency. Writing
//! computes which paths changed and notifies the runtime.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only
//! when a path it read changes. Every store getter is a memo.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that re-runs whenever a path it
//! read changes. Store watchers are effects.
//!
//! # Implementation Notes
//!
//! The reactive system uses a thread-local tracking context to detect
//! dependencies automatically, the same approach taken by SolidJS, Vue 3 and
//! Leptos. Dependencies are state paths; a write at path `a/b` affects reads
//! of `a`, `a/b` and `a/b/c` but not `a/c`.

mod context;
mod effect;
mod memo;
mod runtime;
mod state;
mod subscriber;

pub use context::ReactiveContext;
pub use effect::Effect;
pub use memo::{Memo, MemoState};
pub use runtime::{Reactive, ReactiveHandle, Runtime};
pub use state::{StateTree, StateView};
pub use subscriber::SubscriberId;

pub(crate) use state::empty_object;
