//! Reactive State Tree
//!
//! The single source of truth: one nested `serde_json::Value` rooted at an
//! object. Reads record their path in the active reactive context; writes
//! work out which paths actually changed and tell the runtime.
//!
//! # Write Guard
//!
//! The tree carries the store's write guard, a flag that is set while a
//! mutation (or another authorized internal write) is running. In strict mode
//! every write asserts that the guard is set. The guard does not prevent the
//! write; it flags it as illegitimate.
//!
//! Memos are invalidated at the write itself, but effects woken during a
//! commit run only after the outermost guard is released. A watcher callback
//! therefore never writes under the mutation's guard.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::{Map, Value};

use super::context::ReactiveContext;
use super::runtime::{Reactive, Runtime};
use crate::error::StoreError;
use crate::path::Path;

struct StateInner {
    root: RwLock<Value>,
    runtime: Runtime,
    committing: AtomicBool,
    strict: AtomicBool,
    deferred: Mutex<Vec<Arc<dyn Reactive>>>,
}

/// Shared handle to the reactive state tree.
///
/// Cloning the handle is cheap; every clone sees the same tree.
#[derive(Clone)]
pub struct StateTree {
    inner: Arc<StateInner>,
}

impl StateTree {
    pub fn new(root: Value) -> Self {
        Self::with_runtime(root, Runtime::new())
    }

    pub fn with_runtime(root: Value, runtime: Runtime) -> Self {
        Self {
            inner: Arc::new(StateInner {
                root: RwLock::new(root),
                runtime,
                committing: AtomicBool::new(false),
                strict: AtomicBool::new(false),
                deferred: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn runtime(&self) -> &Runtime {
        &self.inner.runtime
    }

    /// A view of the slice at `path`.
    pub fn view(&self, path: impl Into<Path>) -> StateView {
        StateView {
            tree: self.clone(),
            path: path.into(),
        }
    }

    /// Read the value at `path`, recording the read if a computation is
    /// being tracked.
    pub fn get(&self, path: &Path) -> Option<Value> {
        if ReactiveContext::is_active() {
            ReactiveContext::track_dependency(path);
        }
        self.get_untracked(path)
    }

    /// Read the value at `path` without establishing a dependency.
    pub fn get_untracked(&self, path: &Path) -> Option<Value> {
        lookup(&self.inner.root.read(), path).cloned()
    }

    /// A tracked copy of the whole tree.
    pub fn snapshot(&self) -> Value {
        self.get(&Path::root()).unwrap_or(Value::Null)
    }

    pub fn contains(&self, path: &Path) -> bool {
        lookup(&self.inner.root.read(), path).is_some()
    }

    /// Set the field at `path` on its (already existing) parent object.
    pub fn set(&self, path: &Path, value: Value) -> Result<(), StoreError> {
        self.assert_committing();

        let Some(key) = path.last() else {
            self.replace(value);
            return Ok(());
        };
        let parent = path.parent().unwrap_or_default();

        let previous = {
            let mut root = self.inner.root.write();
            let Some(Value::Object(fields)) = lookup_mut(&mut root, &parent) else {
                return Err(StoreError::StatePathNotFound { path: parent });
            };
            fields.insert(key.to_owned(), value.clone())
        };

        let mut changed = Vec::new();
        match previous {
            Some(previous) => diff_paths(path, &previous, &value, &mut changed),
            None => changed.push(path.clone()),
        }
        self.publish(&changed);
        Ok(())
    }

    /// Remove the field at `path` from its parent object.
    pub fn delete(&self, path: &Path) -> Option<Value> {
        self.assert_committing();

        let key = path.last()?;
        let parent = path.parent().unwrap_or_default();
        let removed = {
            let mut root = self.inner.root.write();
            match lookup_mut(&mut root, &parent) {
                Some(Value::Object(fields)) => fields.remove(key),
                _ => None,
            }
        };

        if removed.is_some() {
            self.publish(std::slice::from_ref(path));
        }
        removed
    }

    /// Mutate the slice at `path` in place.
    ///
    /// Returns `None` (and runs nothing) when no slice exists at `path`.
    pub fn update<R>(&self, path: &Path, f: impl FnOnce(&mut Value) -> R) -> Option<R> {
        self.assert_committing();

        let (result, changed) = {
            let mut root = self.inner.root.write();
            let slice = lookup_mut(&mut root, path)?;
            let before = slice.clone();
            let result = f(slice);
            let mut changed = Vec::new();
            diff_paths(path, &before, slice, &mut changed);
            (result, changed)
        };

        self.publish(&changed);
        Some(result)
    }

    /// Swap the whole tree.
    pub fn replace(&self, value: Value) {
        self.assert_committing();

        let previous = std::mem::replace(&mut *self.inner.root.write(), value);
        let current = self.inner.root.read().clone();
        let mut changed = Vec::new();
        diff_paths(&Path::root(), &previous, &current, &mut changed);
        self.publish(&changed);
    }

    /// Run `f` with the write guard set, restoring its prior value afterwards.
    ///
    /// Effects woken inside `f` run after the outermost guard is released.
    pub fn with_commit<R>(&self, f: impl FnOnce() -> R) -> R {
        struct Restore<'a> {
            flag: &'a AtomicBool,
            prior: bool,
        }

        impl Drop for Restore<'_> {
            fn drop(&mut self) {
                self.flag.store(self.prior, Ordering::SeqCst);
            }
        }

        let prior = self.inner.committing.swap(true, Ordering::SeqCst);
        let result = {
            let _restore = Restore {
                flag: &self.inner.committing,
                prior,
            };
            f()
        };
        if !prior {
            self.run_deferred();
        }
        result
    }

    fn publish(&self, changed: &[Path]) {
        if !self.is_committing() {
            self.inner.runtime.notify(changed);
            return;
        }
        let woken = self.inner.runtime.invalidate(changed);
        let mut deferred = self.inner.deferred.lock();
        for effect in woken {
            let id = effect.subscriber_id();
            if !deferred.iter().any(|queued| queued.subscriber_id() == id) {
                deferred.push(effect);
            }
        }
    }

    fn run_deferred(&self) {
        let effects = std::mem::take(&mut *self.inner.deferred.lock());
        for effect in effects {
            effect.schedule();
        }
    }

    pub fn is_committing(&self) -> bool {
        self.inner.committing.load(Ordering::SeqCst)
    }

    pub fn is_strict(&self) -> bool {
        self.inner.strict.load(Ordering::SeqCst)
    }

    pub(crate) fn set_strict(&self, strict: bool) {
        self.inner.strict.store(strict, Ordering::SeqCst);
    }

    fn assert_committing(&self) {
        if self.is_strict() {
            assert!(
                self.is_committing(),
                "[lattice-store] do not mutate store state outside mutation handlers."
            );
        }
    }
}

impl std::fmt::Debug for StateTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateTree")
            .field("root", &*self.inner.root.read())
            .field("strict", &self.is_strict())
            .finish()
    }
}

/// A tracked, read-only window onto one slice of the tree.
///
/// The slice is resolved on every read, so a view never goes stale when the
/// tree is replaced.
#[derive(Clone, Debug)]
pub struct StateView {
    tree: StateTree,
    path: Path,
}

impl StateView {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn tree(&self) -> &StateTree {
        &self.tree
    }

    /// The whole slice, or `Null` if it no longer exists.
    pub fn value(&self) -> Value {
        self.tree.get(&self.path).unwrap_or(Value::Null)
    }

    /// The field `key` of the slice, or `Null`.
    pub fn get(&self, key: &str) -> Value {
        self.tree.get(&self.path.child(key)).unwrap_or(Value::Null)
    }

    /// The value at a path relative to the slice, or `Null`.
    pub fn at(&self, relative: impl Into<Path>) -> Value {
        self.tree
            .get(&self.path.join(&relative.into()))
            .unwrap_or(Value::Null)
    }

    pub fn child(&self, key: &str) -> StateView {
        StateView {
            tree: self.tree.clone(),
            path: self.path.child(key),
        }
    }
}

/// Walk `path` from `root`. Arrays are indexed by numeric segments.
pub(crate) fn lookup<'a>(root: &'a Value, path: &Path) -> Option<&'a Value> {
    path.segments()
        .iter()
        .try_fold(root, |value, segment| match value {
            Value::Object(fields) => fields.get(segment),
            Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        })
}

pub(crate) fn lookup_mut<'a>(root: &'a mut Value, path: &Path) -> Option<&'a mut Value> {
    path.segments()
        .iter()
        .try_fold(root, |value, segment| match value {
            Value::Object(fields) => fields.get_mut(segment),
            Value::Array(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(move |i| items.get_mut(i)),
            _ => None,
        })
}

/// Collect the deepest paths at which `before` and `after` differ.
///
/// Objects are compared field by field; any other change (including a type
/// change or an array edit) is reported at the path where it happens.
pub(crate) fn diff_paths(base: &Path, before: &Value, after: &Value, out: &mut Vec<Path>) {
    if before == after {
        return;
    }
    match (before, after) {
        (Value::Object(old), Value::Object(new)) => {
            for (key, old_value) in old {
                match new.get(key) {
                    Some(new_value) => diff_paths(&base.child(key.as_str()), old_value, new_value, out),
                    None => out.push(base.child(key.as_str())),
                }
            }
            for key in new.keys().filter(|key| !old.contains_key(*key)) {
                out.push(base.child(key.as_str()));
            }
        }
        _ => out.push(base.clone()),
    }
}

/// An empty object, the default state of a module.
pub(crate) fn empty_object() -> Value {
    Value::Object(Map::new())
}
