//! Module-local views of the store.
//!
//! Handlers never see the store itself. They get a context scoped to their
//! module: state is the module's slice, getters are the module's own under
//! their short names, and `commit`/`dispatch` prefix the module's namespace.

use std::sync::{Arc, Weak};

use futures_util::future::{self, FutureExt};
use serde_json::Value;

use super::call::{Call, CommitOptions, DispatchOptions};
use super::dispatch::DispatchFuture;
use super::{Store, StoreInner};
use crate::error::{ActionError, StoreError};
use crate::path::Path;
use crate::reactive::{StateTree, StateView};

/// The context handed to actions and getters of one module.
///
/// Holds the store weakly; once the store is dropped every operation fails
/// with [`StoreError::StoreDropped`].
#[derive(Clone)]
pub struct LocalContext {
    store: Weak<StoreInner>,
    tree: StateTree,
    namespace: String,
    path: Path,
}

/// What an action handler receives.
pub type ActionContext = LocalContext;

impl LocalContext {
    pub(crate) fn new(store: Weak<StoreInner>, tree: StateTree, namespace: String, path: Path) -> Self {
        Self {
            store,
            tree,
            namespace,
            path,
        }
    }

    /// The namespace prefix, empty for modules that are not namespaced.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Path of the module's state slice.
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store(&self) -> Option<Store> {
        self.store.upgrade().map(Store::from_inner)
    }

    /// The module's state slice, resolved lazily on each read.
    pub fn state(&self) -> StateView {
        self.tree.view(self.path.clone())
    }

    pub fn root_state(&self) -> StateView {
        self.tree.view(Path::root())
    }

    /// The module's getters under their local names.
    pub fn getters(&self) -> Getters {
        Getters::new(self.store.clone(), self.namespace.clone())
    }

    pub fn root_getters(&self) -> Getters {
        Getters::new(self.store.clone(), String::new())
    }

    pub fn commit(&self, call: impl Into<Call>) -> Result<(), StoreError> {
        self.commit_with(call, CommitOptions::default())
    }

    pub fn commit_with(&self, call: impl Into<Call>, options: CommitOptions) -> Result<(), StoreError> {
        let store = self.store.upgrade().ok_or(StoreError::StoreDropped)?;
        if self.namespace.is_empty() || options.root {
            return store.commit(call.into());
        }

        let (kind, payload) = store.normalize(call.into())?;
        let global = format!("{}{}", self.namespace, kind);
        if !store.has_mutation(&global) {
            return Err(store.report(StoreError::UnknownLocalMutation { local: kind, global }));
        }
        store.commit(Call::new(global, payload))
    }

    pub fn dispatch(&self, call: impl Into<Call>) -> DispatchFuture {
        self.dispatch_with(call, DispatchOptions::default())
    }

    /// Dispatch through the module's namespace. An unknown local type is
    /// reported and resolves to `Null` without running anything.
    pub fn dispatch_with(&self, call: impl Into<Call>, options: DispatchOptions) -> DispatchFuture {
        let Some(store) = self.store.upgrade() else {
            return future::ready(Err(ActionError::from(StoreError::StoreDropped))).boxed();
        };
        if self.namespace.is_empty() || options.root {
            return store.dispatch(call.into());
        }

        let Ok((kind, payload)) = store.normalize(call.into()) else {
            return future::ready(Ok(Value::Null)).boxed();
        };
        let global = format!("{}{}", self.namespace, kind);
        if !store.has_action(&global) {
            store.report(StoreError::UnknownLocalAction { local: kind, global });
            return future::ready(Ok(Value::Null)).boxed();
        }
        store.dispatch(Call::new(global, payload))
    }
}

impl std::fmt::Debug for LocalContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalContext")
            .field("namespace", &self.namespace)
            .field("path", &self.path)
            .finish()
    }
}

/// Read access to getters, optionally scoped to a namespace.
///
/// A scoped handle answers to short names: in namespace `cart/`, `total`
/// resolves to the global getter `cart/total`.
#[derive(Clone)]
pub struct Getters {
    store: Weak<StoreInner>,
    namespace: String,
}

impl Getters {
    pub(crate) fn new(store: Weak<StoreInner>, namespace: String) -> Self {
        Self { store, namespace }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The current value of getter `key`, computing it if stale.
    pub fn get(&self, key: &str) -> Option<Value> {
        let store = self.store.upgrade()?;
        if self.namespace.is_empty() {
            return store.getter(key);
        }
        let projection = store.local_getters(&self.namespace);
        let global = projection.get(key)?;
        store.getter(global)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys().iter().any(|candidate| candidate == key)
    }

    /// Names this handle answers to, in registration order.
    pub fn keys(&self) -> Vec<String> {
        let Some(store) = self.store.upgrade() else {
            return Vec::new();
        };
        if self.namespace.is_empty() {
            return store.getter_keys();
        }
        store.local_getters(&self.namespace).keys().cloned().collect()
    }
}

impl std::fmt::Debug for Getters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Getters")
            .field("namespace", &self.namespace)
            .finish()
    }
}

/// What a getter handler receives.
#[derive(Clone, Debug)]
pub struct GetterArgs {
    /// The owning module's state slice.
    pub state: StateView,
    /// The owning module's getters under local names.
    pub getters: Getters,
    pub root_state: StateView,
    pub root_getters: Getters,
}

impl GetterArgs {
    pub(crate) fn for_module(local: &LocalContext) -> Self {
        Self {
            state: local.state(),
            getters: local.getters(),
            root_state: local.root_state(),
            root_getters: local.root_getters(),
        }
    }
}

pub(crate) fn root_context(store: &Arc<StoreInner>) -> LocalContext {
    LocalContext::new(
        Arc::downgrade(store),
        store.state.clone(),
        String::new(),
        Path::root(),
    )
}
