//! The registration pass.
//!
//! Walks a module subtree and flattens it into the store's lookup tables:
//! every handler is wrapped with its module's local context and filed under
//! its namespaced type. Nothing here touches state directly; state splices
//! are collected and applied once the tables are in place.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use futures_util::future::FutureExt;
use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use super::context::{GetterArgs, LocalContext};
use super::dispatch::DispatchFuture;
use super::StoreInner;
use crate::error::StoreError;
use crate::module::{ActionHandler, GetterHandler, ModuleNode, ModuleTree, MutationHandler};
use crate::path::Path;
use crate::reactive::StateTree;

/// Flattened handler tables, rebuilt from the module tree on every reset.
#[derive(Default)]
pub(crate) struct Tables {
    pub(crate) mutations: HashMap<String, Vec<WrappedMutation>>,
    pub(crate) actions: HashMap<String, Vec<WrappedAction>>,
    pub(crate) getters: IndexMap<String, WrappedGetter>,
    /// Namespace prefix to module path.
    pub(crate) namespaces: HashMap<String, Path>,
}

#[derive(Clone)]
pub(crate) struct WrappedMutation {
    handler: MutationHandler,
    local: LocalContext,
}

impl WrappedMutation {
    /// Apply the handler to the module's slice. `false` if the slice is gone.
    pub(crate) fn invoke(&self, state: &StateTree, payload: &Value) -> bool {
        state
            .update(self.local.path(), |slice| (self.handler)(slice, payload))
            .is_some()
    }

    pub(crate) fn path(&self) -> &Path {
        self.local.path()
    }
}

#[derive(Clone)]
pub(crate) struct WrappedAction {
    handler: ActionHandler,
    local: LocalContext,
    store: Weak<StoreInner>,
}

impl WrappedAction {
    /// Start the handler. A rejection is forwarded to the inspector before it
    /// reaches the caller.
    pub(crate) fn invoke(&self, payload: Value) -> DispatchFuture {
        let pending = (self.handler)(self.local.clone(), payload);
        let store = self.store.clone();
        async move {
            let result = pending.await;
            if let (Err(error), Some(store)) = (&result, store.upgrade()) {
                store.forward_action_error(error);
            }
            result
        }
        .boxed()
    }
}

#[derive(Clone)]
pub(crate) struct WrappedGetter {
    handler: GetterHandler,
    local: LocalContext,
}

impl WrappedGetter {
    pub(crate) fn evaluate(&self) -> Value {
        (self.handler)(&GetterArgs::for_module(&self.local))
    }
}

/// Register `node` (found at `path`) and its whole subtree into `tables`.
///
/// Unless `preserve_state` is set, each non-root module's initial state is
/// queued in `splices`, parents before children.
pub(crate) fn install_module(
    store: &Arc<StoreInner>,
    tree: &ModuleTree,
    tables: &mut Tables,
    path: &Path,
    node: &ModuleNode,
    preserve_state: bool,
    splices: &mut Vec<(Path, Value)>,
) {
    let namespace = tree.namespace(path);

    if node.is_namespaced() {
        if let Some(existing) = tables.namespaces.get(&namespace) {
            store.report(StoreError::DuplicateNamespace {
                namespace: namespace.clone(),
                path: existing.clone(),
            });
        }
        tables.namespaces.insert(namespace.clone(), path.clone());
    }

    if !path.is_root() && !preserve_state {
        splices.push((path.clone(), node.initial_state().clone()));
    }

    let local = LocalContext::new(
        Arc::downgrade(store),
        store.state.clone(),
        namespace.clone(),
        path.clone(),
    );

    for (key, handler) in node.mutations() {
        tables
            .mutations
            .entry(format!("{namespace}{key}"))
            .or_default()
            .push(WrappedMutation {
                handler: Arc::clone(handler),
                local: local.clone(),
            });
    }

    for (key, action) in node.actions() {
        let kind = if action.root {
            key.to_owned()
        } else {
            format!("{namespace}{key}")
        };
        tables.actions.entry(kind).or_default().push(WrappedAction {
            handler: Arc::clone(&action.handler),
            local: local.clone(),
            store: Arc::downgrade(store),
        });
    }

    for (key, handler) in node.getters() {
        let kind = format!("{namespace}{key}");
        if tables.getters.contains_key(&kind) {
            store.report(StoreError::DuplicateGetter { key: kind });
            continue;
        }
        tables.getters.insert(
            kind,
            WrappedGetter {
                handler: Arc::clone(handler),
                local: local.clone(),
            },
        );
    }

    debug!(module = %path, namespace = %namespace, "installed module");

    for (key, child) in node.children() {
        install_module(store, tree, tables, &path.child(key), child, preserve_state, splices);
    }
}

impl StoreInner {
    /// Write queued module states into the tree under the write guard.
    pub(crate) fn splice_states(&self, splices: Vec<(Path, Value)>) {
        if splices.is_empty() {
            return;
        }
        self.state.with_commit(|| {
            for (path, value) in splices {
                if self.state.contains(&path) {
                    warn!(
                        field = %path,
                        "state field was overridden by a module with the same name"
                    );
                }
                if let Err(err) = self.state.set(&path, value) {
                    self.report(err);
                }
            }
        });
    }

    /// Rebuild every table from the module tree, keeping state as it is.
    ///
    /// With `hot` set, every memo and watcher is forced to re-evaluate so
    /// swapped handlers take effect immediately.
    pub(crate) fn reset_store(self: &Arc<Self>, hot: bool) {
        let tables = {
            let modules = self.modules.read();
            let mut tables = Tables::default();
            let mut splices = Vec::new();
            install_module(
                self,
                &modules,
                &mut tables,
                &Path::root(),
                modules.root(),
                true,
                &mut splices,
            );
            tables
        };
        *self.tables.write() = tables;
        self.reset_getters(hot);
    }

    pub(crate) fn has_mutation(&self, kind: &str) -> bool {
        self.tables.read().mutations.contains_key(kind)
    }

    pub(crate) fn has_action(&self, kind: &str) -> bool {
        self.tables.read().actions.contains_key(kind)
    }
}
