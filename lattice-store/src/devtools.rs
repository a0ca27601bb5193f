//! Inspector Bridge
//!
//! An inspector is an external observer (a debugging panel, a recorder, a
//! test probe) that sees every mutation and action along with the state that
//! followed. It can also travel back to a recorded state.
//!
//! The bridge subscribes with `prepend`, so the inspector observes each event
//! before any application subscriber does.

use std::sync::{Arc, Weak};

use serde_json::Value;
use tracing::debug;

use crate::error::ActionError;
use crate::path::Path;
use crate::reactive::StateTree;
use crate::store::{ActionRecord, MutationRecord, Store, StoreInner, SubscribeOptions};

/// Something the inspector is told about.
#[derive(Debug, Clone, Copy)]
pub enum InspectorEvent<'a> {
    /// The store was built. Sent once, with the initial state.
    Init,
    Mutation(&'a MutationRecord),
    Action(&'a ActionRecord),
    /// One action handler rejected.
    Error(&'a ActionError),
}

impl InspectorEvent<'_> {
    /// Event name, as an inspector would label it.
    pub fn name(&self) -> &'static str {
        match self {
            InspectorEvent::Init => "store:init",
            InspectorEvent::Mutation(_) => "store:mutation",
            InspectorEvent::Action(_) => "store:action",
            InspectorEvent::Error(_) => "store:error",
        }
    }
}

pub trait Inspector: Send + Sync {
    /// Receive an event with the current state.
    fn emit(&self, event: InspectorEvent<'_>, state: &Value);

    /// Called once after `Init`, with a handle for replacing state.
    fn attached(&self, _travel: TimeTravel) {}
}

/// Lets an inspector move the store to a recorded state.
#[derive(Clone)]
pub struct TimeTravel {
    store: Weak<StoreInner>,
}

impl TimeTravel {
    /// Replace the whole state. Returns `false` if the store is gone.
    pub fn travel_to_state(&self, state: Value) -> bool {
        match self.store.upgrade() {
            Some(inner) => {
                Store::from_inner(inner).replace_state(state);
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for TimeTravel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimeTravel")
            .field("alive", &(self.store.strong_count() > 0))
            .finish()
    }
}

/// Connect `inspector` to `store`. A store takes one inspector; later calls
/// are ignored.
pub(crate) fn attach(store: &Store, inspector: Arc<dyn Inspector>) {
    if store.inner.inspector.set(Arc::clone(&inspector)).is_err() {
        debug!("an inspector is already attached");
        return;
    }

    inspector.emit(InspectorEvent::Init, &store.snapshot());
    inspector.attached(TimeTravel {
        store: Arc::downgrade(&store.inner),
    });

    let prepend = SubscribeOptions { prepend: true };

    let sink = Arc::clone(&inspector);
    store.subscribe_with(
        move |mutation, state| sink.emit(InspectorEvent::Mutation(mutation), &current(state)),
        prepend,
    );

    let sink = inspector;
    store.subscribe_action_with(
        move |action: &ActionRecord, state: &StateTree| {
            sink.emit(InspectorEvent::Action(action), &current(state))
        },
        prepend,
    );

    debug!("inspector attached");
}

fn current(state: &StateTree) -> Value {
    state.get_untracked(&Path::root()).unwrap_or(Value::Null)
}
