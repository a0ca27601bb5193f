//! Module Tree
//!
//! Feature code is split into modules, each with its own state slice and
//! handler tables, nested to any depth. A namespaced module prefixes the
//! types of its handlers with its key, so independently written modules can
//! use the same names without colliding.

mod definition;
mod node;
mod tree;

pub use definition::{ActionDef, ActionHandler, GetterHandler, Module, ModuleState, MutationHandler};
pub use node::ModuleNode;
pub use tree::{ModuleTree, NAMESPACE_SEPARATOR};
