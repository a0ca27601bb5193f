//! The commit pipeline.

use serde_json::Value;
use tracing::trace;

use super::call::{Call, MutationRecord};
use super::{Store, StoreInner};
use crate::error::StoreError;

impl StoreInner {
    /// Run every handler registered under the call's type, then notify
    /// mutation subscribers in order.
    ///
    /// Handlers run synchronously, all of them under one write guard. An
    /// unknown type is reported and nothing runs.
    pub(crate) fn commit(&self, call: Call) -> Result<(), StoreError> {
        let (kind, payload) = self.normalize(call)?;

        let handlers = self.tables.read().mutations.get(&kind).cloned();
        let Some(handlers) = handlers else {
            return Err(self.report(StoreError::UnknownMutation { kind }));
        };

        trace!(mutation = %kind, handlers = handlers.len(), "commit");
        self.state.with_commit(|| {
            for handler in &handlers {
                if !handler.invoke(&self.state, &payload) {
                    self.report(StoreError::StatePathNotFound {
                        path: handler.path().clone(),
                    });
                }
            }
        });

        let record = MutationRecord { kind, payload };
        for subscriber in self.subscribers.snapshot() {
            subscriber(&record, &self.state);
        }
        Ok(())
    }

    pub(crate) fn normalize(&self, call: Call) -> Result<(String, Value), StoreError> {
        call.normalize().map_err(|err| self.report(err))
    }
}

impl Store {
    /// Commit a mutation.
    ///
    /// ```rust,ignore
    /// store.commit("increment")?;
    /// store.commit(("add", json!({ "amount": 2 })))?;
    /// store.commit(json!({ "type": "add", "amount": 2 }))?;
    /// ```
    pub fn commit(&self, call: impl Into<Call>) -> Result<(), StoreError> {
        self.inner.commit(call.into())
    }
}
