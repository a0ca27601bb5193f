//! Raw module definitions.
//!
//! A `Module` is what application code writes: initial state, handler
//! tables and nested modules. It is plain data; the store turns it into a
//! `ModuleNode` when it is registered.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use indexmap::IndexMap;
use serde_json::Value;

use crate::error::ActionError;
use crate::reactive::empty_object;
use crate::store::{ActionContext, GetterArgs};

/// Writes a module's state slice. Receives the slice and the payload.
pub type MutationHandler = Arc<dyn Fn(&mut Value, &Value) + Send + Sync>;

/// Runs an action. Every action resolves through a boxed future, even one
/// written synchronously.
pub type ActionHandler =
    Arc<dyn Fn(ActionContext, Value) -> BoxFuture<'static, Result<Value, ActionError>> + Send + Sync>;

/// Derives a value from state and other getters.
pub type GetterHandler = Arc<dyn Fn(&GetterArgs) -> Value + Send + Sync>;

/// An action handler plus its namespacing preference.
#[derive(Clone)]
pub struct ActionDef {
    pub(crate) handler: ActionHandler,
    /// Registered under the bare key even inside a namespaced module.
    pub(crate) root: bool,
}

/// Initial state of a module.
#[derive(Clone)]
pub enum ModuleState {
    Value(Value),
    /// Called once per instantiation, so one definition can be registered
    /// several times without sharing state.
    Factory(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl ModuleState {
    pub(crate) fn instantiate(&self) -> Value {
        match self {
            ModuleState::Value(value) => value.clone(),
            ModuleState::Factory(factory) => factory(),
        }
    }
}

/// A raw module definition.
///
/// Handler tables are optional: a table that was never declared is left
/// untouched by a hot update, while a declared one replaces the old table.
#[derive(Clone, Default)]
pub struct Module {
    pub(crate) namespaced: bool,
    pub(crate) state: Option<ModuleState>,
    pub(crate) mutations: Option<IndexMap<String, MutationHandler>>,
    pub(crate) actions: Option<IndexMap<String, ActionDef>>,
    pub(crate) getters: Option<IndexMap<String, GetterHandler>>,
    pub(crate) modules: IndexMap<String, Module>,
}

impl Module {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn namespaced(mut self, namespaced: bool) -> Self {
        self.namespaced = namespaced;
        self
    }

    pub fn state(mut self, state: Value) -> Self {
        self.state = Some(ModuleState::Value(state));
        self
    }

    pub fn state_fn<F>(mut self, factory: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.state = Some(ModuleState::Factory(Arc::new(factory)));
        self
    }

    pub fn mutation<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Value, &Value) + Send + Sync + 'static,
    {
        self.mutations
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), Arc::new(handler));
        self
    }

    pub fn action<F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        self.insert_action(name.into(), boxed_action(handler), false)
    }

    /// An action whose body runs to completion synchronously. Dispatching it
    /// still yields a future.
    pub fn action_sync<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> Result<Value, ActionError> + Send + Sync + 'static,
    {
        let handler: ActionHandler =
            Arc::new(move |ctx, payload| future::ready(handler(ctx, payload)).boxed());
        self.insert_action(name.into(), handler, false)
    }

    /// An action registered under its bare name even when the module is
    /// namespaced.
    pub fn root_action<F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(ActionContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
    {
        self.insert_action(name.into(), boxed_action(handler), true)
    }

    pub fn getter<F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&GetterArgs) -> Value + Send + Sync + 'static,
    {
        self.getters
            .get_or_insert_with(IndexMap::new)
            .insert(name.into(), Arc::new(handler));
        self
    }

    pub fn module(mut self, name: impl Into<String>, module: Module) -> Self {
        self.modules.insert(name.into(), module);
        self
    }

    pub fn is_namespaced(&self) -> bool {
        self.namespaced
    }

    pub(crate) fn initial_state(&self) -> Value {
        self.state
            .as_ref()
            .map(ModuleState::instantiate)
            .unwrap_or_else(empty_object)
    }

    fn insert_action(mut self, name: String, handler: ActionHandler, root: bool) -> Self {
        self.actions
            .get_or_insert_with(IndexMap::new)
            .insert(name, ActionDef { handler, root });
        self
    }
}

fn boxed_action<F, Fut>(handler: F) -> ActionHandler
where
    F: Fn(ActionContext, Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, ActionError>> + Send + 'static,
{
    Arc::new(move |ctx, payload| handler(ctx, payload).boxed())
}

fn table_keys<V>(table: &Option<IndexMap<String, V>>) -> Vec<&str> {
    table
        .iter()
        .flat_map(|table| table.keys().map(String::as_str))
        .collect()
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("namespaced", &self.namespaced)
            .field("mutations", &table_keys(&self.mutations))
            .field("actions", &table_keys(&self.actions))
            .field("getters", &table_keys(&self.getters))
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .finish()
    }
}
