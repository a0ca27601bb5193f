//! Logs every mutation and action through `tracing`.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::info;

use crate::path::Path;
use crate::reactive::StateTree;
use crate::store::{ActionRecord, MutationRecord, Store};

/// Decides whether a mutation is logged. Receives the mutation and the
/// state before and after it.
pub type MutationFilter = Arc<dyn Fn(&MutationRecord, &Value, &Value) -> bool + Send + Sync>;

/// Decides whether an action is logged.
pub type ActionFilter = Arc<dyn Fn(&ActionRecord, &Value) -> bool + Send + Sync>;

#[derive(Clone)]
pub struct LoggerOptions {
    pub log_mutations: bool,
    pub log_actions: bool,
    pub filter: Option<MutationFilter>,
    pub action_filter: Option<ActionFilter>,
}

impl Default for LoggerOptions {
    fn default() -> Self {
        Self {
            log_mutations: true,
            log_actions: true,
            filter: None,
            action_filter: None,
        }
    }
}

/// Build the logger plugin.
///
/// ```rust,ignore
/// let store = Store::builder(root)
///     .plugin(plugins::logger(LoggerOptions::default()))
///     .build(host);
/// ```
pub fn logger(options: LoggerOptions) -> impl Fn(&Store) + Send + Sync + 'static {
    move |store: &Store| {
        if options.log_mutations {
            let previous = Mutex::new(store.snapshot());
            let filter = options.filter.clone();
            store.subscribe(move |mutation, state| {
                let next = snapshot(state);
                let prev = std::mem::replace(&mut *previous.lock(), next.clone());
                if filter.as_ref().map_or(true, |keep| keep(mutation, &prev, &next)) {
                    info!(
                        target: "lattice_store::logger",
                        mutation = %mutation.kind,
                        payload = %mutation.payload,
                        prev_state = %prev,
                        next_state = %next,
                        "mutation"
                    );
                }
            });
        }

        if options.log_actions {
            let filter = options.action_filter.clone();
            store.subscribe_action(move |action: &ActionRecord, state: &StateTree| {
                let current = snapshot(state);
                if filter.as_ref().map_or(true, |keep| keep(action, &current)) {
                    info!(
                        target: "lattice_store::logger",
                        action = %action.kind,
                        payload = %action.payload,
                        "action"
                    );
                }
            });
        }
    }
}

fn snapshot(state: &StateTree) -> Value {
    state.get_untracked(&Path::root()).unwrap_or(Value::Null)
}
