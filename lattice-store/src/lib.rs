//! Lattice Store
//!
//! A centralized state store for the Lattice reactive UI framework. All
//! shared application state lives in one tree, and the tree changes only
//! through named, synchronous mutations. It provides:
//!
//! - A reactive state tree with path-level dependency tracking
//! - Nested, optionally namespaced modules
//! - Synchronous mutations and future-returning actions
//! - Cached getters that recompute only when what they read changes
//! - Mutation and action subscribers, watchers and plugins
//! - Dynamic module registration and hot update
//! - An optional inspector bridge with time travel
//!
//! # Architecture
//!
//! - `reactive`: state tree, memos, effects and the runtime that links them
//! - `module`: raw module definitions and the registered module tree
//! - `store`: the store, its pipelines and its module-local contexts
//! - `devtools`: the inspector bridge
//! - `host`: process-wide installation
//! - `plugins`: bundled plugins
//!
//! # Example
//!
//! ```rust,ignore
//! use lattice_store::{host, Module, Store};
//! use serde_json::json;
//!
//! let host = host::install(Default::default());
//!
//! let store = Store::builder(
//!     Module::new()
//!         .state(json!({ "count": 0 }))
//!         .mutation("increment", |state, _| {
//!             state["count"] = json!(state["count"].as_i64().unwrap_or(0) + 1);
//!         })
//!         .action("incrementAsync", |ctx, _| async move {
//!             ctx.commit("increment")?;
//!             Ok(serde_json::Value::Null)
//!         }),
//! )
//! .build(host);
//!
//! store.dispatch("incrementAsync").await?;
//! assert_eq!(store.snapshot(), json!({ "count": 1 }));
//! ```

pub mod devtools;
pub mod error;
pub mod host;
pub mod module;
pub mod path;
pub mod plugins;
pub mod reactive;
pub mod store;

pub use devtools::{Inspector, InspectorEvent, TimeTravel};
pub use error::{ActionError, StoreError};
pub use host::{Host, HostConfig};
pub use module::Module;
pub use path::Path;
pub use reactive::{StateTree, StateView};
pub use store::{
    ActionContext, ActionRecord, ActionSubscriber, Call, CommitOptions, DispatchFuture,
    DispatchOptions, GetterArgs, Getters, LocalContext, MutationRecord, Plugin, RegisterOptions,
    Store, StoreBuilder, SubscribeOptions, Subscription, WatchHandle, WatchOptions,
};
