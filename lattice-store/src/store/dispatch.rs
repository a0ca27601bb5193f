//! The dispatch pipeline.
//!
//! Every dispatch yields a boxed future. `before` hooks run synchronously
//! while dispatch is called; `after` or `error` hooks run once the handlers
//! settle. A panicking hook is logged and skipped, it never fails the
//! dispatch.
//!
//! Inside a tokio runtime the handlers are spawned as soon as dispatch is
//! called, so a dispatch that is never awaited still runs to completion.
//! Outside one, the returned future drives the handlers itself.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};
use serde_json::Value;
use tokio::runtime::Handle;
use tracing::{trace, warn};

use super::call::{ActionRecord, Call};
use super::{Store, StoreInner};
use crate::devtools::InspectorEvent;
use crate::error::{ActionError, StoreError};

/// The eventual result of a dispatch.
///
/// With one handler, its value. With several, an array of their values in
/// registration order, or the first rejection in registration order. Several
/// handlers always all settle before the future does.
pub type DispatchFuture = BoxFuture<'static, Result<Value, ActionError>>;

impl StoreInner {
    pub(crate) fn dispatch(self: &Arc<Self>, call: Call) -> DispatchFuture {
        let Ok((kind, payload)) = self.normalize(call) else {
            return resolved();
        };

        let handlers = self.tables.read().actions.get(&kind).cloned();
        let Some(handlers) = handlers else {
            self.report(StoreError::UnknownAction { kind });
            return resolved();
        };

        let record = ActionRecord {
            kind,
            payload: payload.clone(),
        };
        for subscriber in self.action_subscribers.snapshot() {
            if let Some(before) = &subscriber.before {
                isolate("before", &record.kind, || before(&record, &self.state));
            }
        }

        trace!(action = %record.kind, handlers = handlers.len(), "dispatch");
        let pending = match handlers.as_slice() {
            [handler] => handler.invoke(payload),
            _ => future::join_all(handlers.iter().map(|handler| handler.invoke(payload.clone())))
                .map(|results| results.into_iter().collect::<Result<Vec<_>, _>>().map(Value::Array))
                .boxed(),
        };

        let store = Arc::clone(self);
        let settle = async move {
            let result = pending.await;
            let subscribers = store.action_subscribers.snapshot();
            match &result {
                Ok(_) => {
                    for after in subscribers.iter().filter_map(|s| s.after.as_ref()) {
                        isolate("after", &record.kind, || after(&record, &store.state));
                    }
                }
                Err(error) => {
                    for hook in subscribers.iter().filter_map(|s| s.error.as_ref()) {
                        isolate("error", &record.kind, || hook(&record, &store.state, error));
                    }
                }
            }
            result
        };

        match Handle::try_current() {
            Ok(runtime) => {
                let task = runtime.spawn(settle);
                async move {
                    match task.await {
                        Ok(result) => result,
                        Err(err) if err.is_panic() => panic::resume_unwind(err.into_panic()),
                        Err(_) => Err(ActionError::Aborted),
                    }
                }
                .boxed()
            }
            Err(_) => settle.boxed(),
        }
    }

    /// Tell an attached inspector that one handler rejected.
    pub(crate) fn forward_action_error(&self, error: &ActionError) {
        if let Some(inspector) = self.inspector.get() {
            inspector.emit(InspectorEvent::Error(error), &self.snapshot());
        }
    }
}

fn resolved() -> DispatchFuture {
    future::ready(Ok(Value::Null)).boxed()
}

fn isolate(stage: &'static str, action: &str, hook: impl FnOnce()) {
    if let Err(panic) = panic::catch_unwind(AssertUnwindSafe(hook)) {
        let message = panic
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| panic.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        warn!(action, stage, %message, "action subscriber panicked");
    }
}

impl Store {
    /// Dispatch an action.
    ///
    /// An unknown type is reported and resolves to `Null`; no hooks run.
    pub fn dispatch(&self, call: impl Into<Call>) -> DispatchFuture {
        self.inner.dispatch(call.into())
    }
}
