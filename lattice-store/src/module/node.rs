//! A single node of the module tree.

use indexmap::IndexMap;
use serde_json::Value;

use super::definition::{ActionDef, GetterHandler, Module, MutationHandler};

/// A registered module.
///
/// The node separates what can be hot-swapped (the handler tables in `raw`)
/// from what must survive a swap (the state slice, which lives in the store's
/// state tree once the node is installed).
pub struct ModuleNode {
    runtime: bool,
    raw: Module,
    state: Value,
    children: IndexMap<String, ModuleNode>,
}

impl ModuleNode {
    /// Build a node and its whole subtree from a raw definition.
    pub(crate) fn new(mut raw: Module, runtime: bool) -> Self {
        let state = raw.initial_state();
        let children = std::mem::take(&mut raw.modules)
            .into_iter()
            .map(|(key, child)| (key, ModuleNode::new(child, runtime)))
            .collect();

        Self {
            runtime,
            raw,
            state,
            children,
        }
    }

    pub fn is_namespaced(&self) -> bool {
        self.raw.namespaced
    }

    /// Whether the node was registered dynamically and may be unregistered.
    pub fn is_runtime(&self) -> bool {
        self.runtime
    }

    /// The state this node contributes when it is spliced into the tree.
    pub fn initial_state(&self) -> &Value {
        &self.state
    }

    pub fn child(&self, key: &str) -> Option<&ModuleNode> {
        self.children.get(key)
    }

    pub(crate) fn child_mut(&mut self, key: &str) -> Option<&mut ModuleNode> {
        self.children.get_mut(key)
    }

    pub fn has_child(&self, key: &str) -> bool {
        self.children.contains_key(key)
    }

    pub(crate) fn add_child(&mut self, key: String, node: ModuleNode) -> Option<ModuleNode> {
        self.children.insert(key, node)
    }

    pub(crate) fn remove_child(&mut self, key: &str) -> Option<ModuleNode> {
        self.children.shift_remove(key)
    }

    pub fn children(&self) -> impl Iterator<Item = (&str, &ModuleNode)> {
        self.children.iter().map(|(key, node)| (key.as_str(), node))
    }

    pub fn mutations(&self) -> impl Iterator<Item = (&str, &MutationHandler)> {
        self.raw
            .mutations
            .iter()
            .flat_map(|table| table.iter().map(|(key, handler)| (key.as_str(), handler)))
    }

    pub fn actions(&self) -> impl Iterator<Item = (&str, &ActionDef)> {
        self.raw
            .actions
            .iter()
            .flat_map(|table| table.iter().map(|(key, action)| (key.as_str(), action)))
    }

    pub fn getters(&self) -> impl Iterator<Item = (&str, &GetterHandler)> {
        self.raw
            .getters
            .iter()
            .flat_map(|table| table.iter().map(|(key, getter)| (key.as_str(), getter)))
    }

    /// Swap in new handler definitions. State and children are untouched.
    pub(crate) fn update(&mut self, raw: &Module) {
        self.raw.namespaced = raw.namespaced;
        if let Some(mutations) = &raw.mutations {
            self.raw.mutations = Some(mutations.clone());
        }
        if let Some(actions) = &raw.actions {
            self.raw.actions = Some(actions.clone());
        }
        if let Some(getters) = &raw.getters {
            self.raw.getters = Some(getters.clone());
        }
    }
}

impl std::fmt::Debug for ModuleNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleNode")
            .field("runtime", &self.runtime)
            .field("raw", &self.raw)
            .field("children", &self.children.keys().collect::<Vec<_>>())
            .finish()
    }
}
