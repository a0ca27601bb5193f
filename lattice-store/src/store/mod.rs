//! The Store
//!
//! One store owns one state tree, one module tree and the flattened handler
//! tables built from it. State changes only through `commit`; asynchronous
//! work goes through `dispatch`, which eventually commits.
//!
//! # Example
//!
//! ```rust,ignore
//! use lattice_store::{host, Module, Store};
//! use serde_json::json;
//!
//! let host = host::install(Default::default());
//! let store = Store::builder(
//!     Module::new()
//!         .state(json!({ "count": 0 }))
//!         .mutation("increment", |state, _| {
//!             state["count"] = json!(state["count"].as_i64().unwrap_or(0) + 1);
//!         })
//!         .getter("even", |args| json!(args.state.get("count").as_i64().unwrap_or(0) % 2 == 0)),
//! )
//! .build(host);
//!
//! store.commit("increment")?;
//! assert_eq!(store.getter("even"), Some(json!(false)));
//! ```

mod call;
mod commit;
mod context;
mod dispatch;
mod getters;
mod install;
mod subscription;
mod watch;

use std::sync::{Arc, OnceLock, Weak};

use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::{debug, error};

pub use call::{ActionRecord, Call, CommitOptions, DispatchOptions, MutationRecord, RegisterOptions};
pub use context::{ActionContext, GetterArgs, Getters, LocalContext};
pub use dispatch::DispatchFuture;
pub use subscription::{ActionSubscriber, MutationSubscriber, SubscribeOptions, Subscription};
pub use watch::{WatchHandle, WatchOptions};

use getters::{GetterRegistry, LocalProjection};
use install::{install_module, Tables};
use subscription::SubscriberList;

use crate::devtools::{self, Inspector};
use crate::error::StoreError;
use crate::host::Host;
use crate::module::{Module, ModuleTree};
use crate::path::Path;
use crate::reactive::{Effect, Runtime, StateTree, SubscriberId};

/// A plugin runs once, right after the store is built.
pub type Plugin = Box<dyn Fn(&Store) + Send + Sync>;

pub(crate) struct StoreInner {
    pub(crate) state: StateTree,
    pub(crate) modules: RwLock<ModuleTree>,
    pub(crate) tables: RwLock<Tables>,
    pub(crate) getters: RwLock<GetterRegistry>,
    pub(crate) local_getters_cache: DashMap<String, Arc<LocalProjection>>,
    pub(crate) subscribers: SubscriberList<MutationSubscriber>,
    pub(crate) action_subscribers: SubscriberList<ActionSubscriber>,
    pub(crate) watchers: DashMap<SubscriberId, Effect>,
    pub(crate) inspector: OnceLock<Arc<dyn Inspector>>,
    dev_mode: bool,
}

impl StoreInner {
    /// Log `err` when developer diagnostics are on, and hand it back.
    pub(crate) fn report(&self, err: StoreError) -> StoreError {
        if self.dev_mode {
            error!("[lattice-store] {err}");
        }
        err
    }

    /// An untracked copy of the whole state.
    pub(crate) fn snapshot(&self) -> Value {
        self.state.get_untracked(&Path::root()).unwrap_or(Value::Null)
    }
}

/// Shared handle to a store. Clones refer to the same store.
#[derive(Clone)]
pub struct Store {
    pub(crate) inner: Arc<StoreInner>,
}

impl Store {
    pub fn builder(root: Module) -> StoreBuilder {
        StoreBuilder::new(root)
    }

    pub(crate) fn from_inner(inner: Arc<StoreInner>) -> Self {
        Self { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<StoreInner> {
        Arc::downgrade(&self.inner)
    }

    /// The reactive state tree. Reads through it are tracked.
    pub fn state(&self) -> &StateTree {
        &self.inner.state
    }

    /// An untracked copy of the whole state.
    pub fn snapshot(&self) -> Value {
        self.inner.snapshot()
    }

    /// All getters, under their global names.
    pub fn getters(&self) -> Getters {
        Getters::new(self.downgrade(), String::new())
    }

    /// Shorthand for `getters().get(key)`.
    pub fn getter(&self, key: &str) -> Option<Value> {
        self.inner.getter(key)
    }

    pub fn is_strict(&self) -> bool {
        self.inner.state.is_strict()
    }

    /// The local context of the module registered under `namespace`
    /// (for example `"cart/"`). The empty namespace is the root module.
    pub fn module_context(&self, namespace: &str) -> Option<LocalContext> {
        if namespace.is_empty() {
            return Some(context::root_context(&self.inner));
        }
        let path = self.inner.tables.read().namespaces.get(namespace).cloned();
        match path {
            Some(path) => Some(LocalContext::new(
                self.downgrade(),
                self.inner.state.clone(),
                namespace.to_owned(),
                path,
            )),
            None => {
                if self.inner.dev_mode {
                    error!(namespace, "[lattice-store] module namespace not found");
                }
                None
            }
        }
    }

    /// Swap the whole state tree. The only sanctioned way to write state
    /// outside a mutation, used for hydration and time travel.
    pub fn replace_state(&self, state: Value) {
        self.inner.state.with_commit(|| self.inner.state.replace(state));
    }

    /// Register a module at `path` after construction.
    pub fn register_module(&self, path: impl Into<Path>, module: Module) -> Result<(), StoreError> {
        self.register_module_with(path, module, RegisterOptions::default())
    }

    pub fn register_module_with(
        &self,
        path: impl Into<Path>,
        module: Module,
        options: RegisterOptions,
    ) -> Result<(), StoreError> {
        let path = path.into();
        if path.is_root() {
            return Err(self.inner.report(StoreError::RootRegistration));
        }

        self.inner
            .modules
            .write()
            .register(&path, module, true)
            .map_err(|err| self.inner.report(err))?;

        let mut splices = Vec::new();
        {
            let modules = self.inner.modules.read();
            let mut tables = self.inner.tables.write();
            if let Some(node) = modules.get(&path) {
                install_module(
                    &self.inner,
                    &modules,
                    &mut tables,
                    &path,
                    node,
                    options.preserve_state,
                    &mut splices,
                );
            }
        }
        self.inner.splice_states(splices);
        self.inner.reset_getters(false);

        debug!(module = %path, "registered module");
        Ok(())
    }

    /// Remove a module registered with `register_module`, along with its
    /// state slice, handlers and getters.
    pub fn unregister_module(&self, path: impl Into<Path>) -> Result<(), StoreError> {
        let path = path.into();
        self.inner
            .modules
            .write()
            .unregister(&path)
            .map_err(|err| self.inner.report(err))?;

        self.inner.state.with_commit(|| self.inner.state.delete(&path));
        self.inner.reset_store(false);

        debug!(module = %path, "unregistered module");
        Ok(())
    }

    pub fn has_module(&self, path: impl Into<Path>) -> bool {
        self.inner.modules.read().is_registered(&path.into())
    }

    /// Swap handler and getter definitions in place, keeping state.
    ///
    /// A nested module in `module` that is not registered is skipped and
    /// reported; everything that matched is still applied.
    pub fn hot_update(&self, module: Module) -> Result<(), StoreError> {
        let result = self
            .inner
            .modules
            .write()
            .update(&module)
            .map_err(|err| self.inner.report(err));
        self.inner.reset_store(true);

        debug!("hot update applied");
        result
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.inner.state)
            .field("getters", &self.inner.getter_keys())
            .field("subscribers", &self.inner.subscribers.len())
            .field("action_subscribers", &self.inner.action_subscribers.len())
            .field("watchers", &self.inner.watchers.len())
            .finish()
    }
}

/// Configures and builds a [`Store`].
pub struct StoreBuilder {
    root: Module,
    strict: bool,
    devtools: Option<bool>,
    dev_mode: bool,
    plugins: Vec<Plugin>,
    inspector: Option<Arc<dyn Inspector>>,
}

impl StoreBuilder {
    pub fn new(root: Module) -> Self {
        Self {
            root,
            strict: false,
            devtools: None,
            dev_mode: cfg!(debug_assertions),
            plugins: Vec::new(),
            inspector: None,
        }
    }

    /// Panic on any state write outside a mutation.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Attach the inspector. Defaults to the host's setting.
    pub fn devtools(mut self, devtools: bool) -> Self {
        self.devtools = Some(devtools);
        self
    }

    /// Log misuse (unknown types, bad registrations) at error level.
    /// Defaults to on in debug builds.
    pub fn dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    /// Add a plugin. Plugins run in the order they were added.
    pub fn plugin<F>(mut self, plugin: F) -> Self
    where
        F: Fn(&Store) + Send + Sync + 'static,
    {
        self.plugins.push(Box::new(plugin));
        self
    }

    /// Use this inspector instead of the host's.
    pub fn inspector(mut self, inspector: Arc<dyn Inspector>) -> Self {
        self.inspector = Some(inspector);
        self
    }

    pub fn build(self, host: &Host) -> Store {
        let tree = ModuleTree::new(self.root);
        let state = StateTree::with_runtime(tree.root().initial_state().clone(), Runtime::new());

        let store = Store::from_inner(Arc::new(StoreInner {
            state,
            modules: RwLock::new(tree),
            tables: RwLock::new(Tables::default()),
            getters: RwLock::new(GetterRegistry::default()),
            local_getters_cache: DashMap::new(),
            subscribers: SubscriberList::new(),
            action_subscribers: SubscriberList::new(),
            watchers: DashMap::new(),
            inspector: OnceLock::new(),
            dev_mode: self.dev_mode,
        }));

        let mut splices = Vec::new();
        {
            let modules = store.inner.modules.read();
            let mut tables = store.inner.tables.write();
            install_module(
                &store.inner,
                &modules,
                &mut tables,
                &Path::root(),
                modules.root(),
                false,
                &mut splices,
            );
        }
        store.inner.splice_states(splices);
        store.inner.reset_getters(false);
        store.inner.state.set_strict(self.strict);

        for plugin in &self.plugins {
            plugin(&store);
        }

        if self.devtools.unwrap_or_else(|| host.devtools()) {
            match self.inspector.or_else(|| host.inspector()) {
                Some(inspector) => devtools::attach(&store, inspector),
                None => debug!("devtools enabled but no inspector configured"),
            }
        }

        debug!(strict = self.strict, plugins = self.plugins.len(), "store created");
        store
    }
}

impl std::fmt::Debug for StoreBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreBuilder")
            .field("root", &self.root)
            .field("strict", &self.strict)
            .field("devtools", &self.devtools)
            .field("dev_mode", &self.dev_mode)
            .field("plugins", &self.plugins.len())
            .finish()
    }
}
