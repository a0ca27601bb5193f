//! Cached getters.
//!
//! Every registered getter is backed by a memo over the state tree. A getter
//! is computed on first read and again only after one of the paths it read
//! has changed.

use std::sync::Arc;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::trace;

use super::StoreInner;
use crate::path::Path;
use crate::reactive::Memo;

/// Maps namespaced getter names to their memos.
#[derive(Default)]
pub(crate) struct GetterRegistry {
    memos: IndexMap<String, Memo<Value>>,
}

impl GetterRegistry {
    pub(crate) fn len(&self) -> usize {
        self.memos.len()
    }
}

/// Local name to global name, for one namespace.
pub(crate) type LocalProjection = IndexMap<String, String>;

impl StoreInner {
    /// Rebuild the memo registry from the wrapped getters in the tables.
    ///
    /// Old memos are dropped with the old registry, which unregisters them
    /// from the runtime. With `hot` set every reactive computation is
    /// invalidated as well.
    pub(crate) fn reset_getters(self: &Arc<Self>, hot: bool) {
        let wrapped: Vec<_> = self
            .tables
            .read()
            .getters
            .iter()
            .map(|(key, getter)| (key.clone(), getter.clone()))
            .collect();

        let memos = wrapped
            .into_iter()
            .map(|(key, getter)| {
                let memo = Memo::new(self.state.runtime(), move || getter.evaluate());
                (key, memo)
            })
            .collect();

        *self.getters.write() = GetterRegistry { memos };
        self.local_getters_cache.clear();
        trace!(getters = self.getters.read().len(), "reset getters");

        if hot {
            self.state.runtime().notify(&[Path::root()]);
        }
    }

    /// Read a getter by its global name.
    pub(crate) fn getter(&self, key: &str) -> Option<Value> {
        // Clone the memo out so the registry lock is not held while it computes.
        let memo = self.getters.read().memos.get(key).cloned();
        memo.map(|memo| memo.get())
    }

    pub(crate) fn getter_keys(&self) -> Vec<String> {
        self.getters.read().memos.keys().cloned().collect()
    }

    /// The local view of `namespace`, built on first use and cached until
    /// the getters are rebuilt.
    pub(crate) fn local_getters(&self, namespace: &str) -> Arc<LocalProjection> {
        if let Some(projection) = self.local_getters_cache.get(namespace) {
            return Arc::clone(projection.value());
        }

        let projection: LocalProjection = self
            .getters
            .read()
            .memos
            .keys()
            .filter_map(|global| {
                global
                    .strip_prefix(namespace)
                    .map(|local| (local.to_owned(), global.clone()))
            })
            .collect();

        let projection = Arc::new(projection);
        self.local_getters_cache
            .insert(namespace.to_owned(), Arc::clone(&projection));
        projection
    }
}
