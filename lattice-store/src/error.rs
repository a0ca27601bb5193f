//! Error types.
//!
//! Configuration errors are reported and returned, never raised: an unknown
//! mutation is a no-op for the state tree. Action failures travel through the
//! dispatch future to the caller.

use serde_json::Value;
use thiserror::Error;

use crate::path::Path;

/// Misuse of the store's registration or dispatch surface.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("unknown mutation type: {kind}")]
    UnknownMutation { kind: String },

    #[error("unknown action type: {kind}")]
    UnknownAction { kind: String },

    #[error("unknown local mutation type: {local}, global type: {global}")]
    UnknownLocalMutation { local: String, global: String },

    #[error("unknown local action type: {local}, global type: {global}")]
    UnknownLocalAction { local: String, global: String },

    #[error("duplicate getter key: {key}")]
    DuplicateGetter { key: String },

    #[error("duplicate namespace {namespace} for the namespaced module {path}")]
    DuplicateNamespace { namespace: String, path: Path },

    #[error("no module can be attached at '{path}': its parent is not registered")]
    InvalidModulePath { path: Path },

    #[error("cannot register the root module by using register_module")]
    RootRegistration,

    #[error("trying to unregister module '{path}', which is not registered")]
    ModuleNotRegistered { path: Path },

    #[error("module '{path}' was declared statically and cannot be unregistered")]
    StaticModule { path: Path },

    #[error("trying to add a new module '{path}' on hot reloading, manual reload is needed")]
    HotUpdateMismatch { path: Path },

    #[error("expects an object with a string \"type\" field, but found {found}")]
    InvalidCall { found: String },

    #[error("no state slice at '{path}'")]
    StatePathNotFound { path: Path },

    #[error("the store has been dropped")]
    StoreDropped,
}

/// Why an action's completion signal rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    #[error("action rejected: {0}")]
    Rejected(String),

    #[error("action rejected with {0}")]
    Value(Value),

    /// The runtime shut down before the handlers settled.
    #[error("action aborted before it settled")]
    Aborted,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ActionError {
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self::Rejected(reason.into())
    }
}
