//! The module tree: owns the root node, resolves paths and namespaces, and
//! applies structural changes.

use tracing::warn;

use super::definition::Module;
use super::node::ModuleNode;
use crate::error::StoreError;
use crate::path::Path;

/// Separator appended after each namespaced module's key.
pub const NAMESPACE_SEPARATOR: char = '/';

pub struct ModuleTree {
    root: ModuleNode,
}

impl ModuleTree {
    /// Build the static tree. Nodes declared here are never `runtime`.
    pub fn new(root: Module) -> Self {
        Self {
            root: ModuleNode::new(root, false),
        }
    }

    pub fn root(&self) -> &ModuleNode {
        &self.root
    }

    pub fn get(&self, path: &Path) -> Option<&ModuleNode> {
        path.segments()
            .iter()
            .try_fold(&self.root, |node, key| node.child(key))
    }

    fn get_mut(&mut self, path: &Path) -> Option<&mut ModuleNode> {
        path.segments()
            .iter()
            .try_fold(&mut self.root, |node, key| node.child_mut(key))
    }

    /// The namespace prefix of the module at `path`.
    ///
    /// Only namespaced nodes contribute their key; a plain node inherits its
    /// parent's prefix. Walking stops at the first missing segment.
    pub fn namespace(&self, path: &Path) -> String {
        let mut namespace = String::new();
        let mut node = &self.root;
        for key in path.segments() {
            let Some(child) = node.child(key) else {
                break;
            };
            if child.is_namespaced() {
                namespace.push_str(key);
                namespace.push(NAMESPACE_SEPARATOR);
            }
            node = child;
        }
        namespace
    }

    /// Attach `raw` (and its nested modules) at `path`.
    ///
    /// The parent of `path` must already be registered. An existing module
    /// under the same key is replaced.
    pub fn register(&mut self, path: &Path, raw: Module, runtime: bool) -> Result<(), StoreError> {
        let (Some(parent_path), Some(key)) = (path.parent(), path.last()) else {
            self.root = ModuleNode::new(raw, runtime);
            return Ok(());
        };

        let parent = self
            .get_mut(&parent_path)
            .ok_or_else(|| StoreError::InvalidModulePath { path: path.clone() })?;

        if parent.add_child(key.to_owned(), ModuleNode::new(raw, runtime)).is_some() {
            warn!(module = %path, "a module was already registered at this path, replacing it");
        }
        Ok(())
    }

    /// Detach the module at `path`. Only runtime-registered modules can be
    /// removed.
    pub fn unregister(&mut self, path: &Path) -> Result<ModuleNode, StoreError> {
        let (Some(parent_path), Some(key)) = (path.parent(), path.last()) else {
            return Err(StoreError::StaticModule { path: path.clone() });
        };

        let parent = self
            .get_mut(&parent_path)
            .ok_or_else(|| StoreError::ModuleNotRegistered { path: path.clone() })?;

        match parent.child(key).map(ModuleNode::is_runtime) {
            None => Err(StoreError::ModuleNotRegistered { path: path.clone() }),
            Some(false) => Err(StoreError::StaticModule { path: path.clone() }),
            Some(true) => parent
                .remove_child(key)
                .ok_or_else(|| StoreError::ModuleNotRegistered { path: path.clone() }),
        }
    }

    /// Whether a module is registered at `path`. Never fails: a path through
    /// plain state fields is simply not registered.
    pub fn is_registered(&self, path: &Path) -> bool {
        self.get(path).is_some()
    }

    /// Swap handler definitions in place, walking `raw` in lockstep with the
    /// tree.
    ///
    /// A module present in `raw` but absent from the tree is a structural
    /// change that hot update cannot perform; it is skipped and the first
    /// such path is returned as an error after the rest has been applied.
    pub fn update(&mut self, raw: &Module) -> Result<(), StoreError> {
        let mut mismatches = Vec::new();
        update_node(&Path::root(), &mut self.root, raw, &mut mismatches);

        for mismatch in &mismatches {
            warn!(error = %mismatch, "hot update skipped a module");
        }
        match mismatches.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(()),
        }
    }
}

fn update_node(path: &Path, node: &mut ModuleNode, raw: &Module, mismatches: &mut Vec<StoreError>) {
    node.update(raw);

    for (key, child_raw) in &raw.modules {
        let child_path = path.child(key.as_str());
        match node.child_mut(key) {
            Some(child) => update_node(&child_path, child, child_raw, mismatches),
            None => mismatches.push(StoreError::HotUpdateMismatch { path: child_path }),
        }
    }
}
