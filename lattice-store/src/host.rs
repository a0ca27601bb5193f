//! Process-wide installation.
//!
//! The host carries settings shared by every store in the process. It is set
//! up once with [`install`]; the returned handle is passed to
//! [`StoreBuilder::build`](crate::StoreBuilder::build).

use std::sync::{Arc, OnceLock};

use tracing::{debug, error};

use crate::devtools::Inspector;

static HOST: OnceLock<Host> = OnceLock::new();

#[derive(Clone, Default)]
pub struct HostConfig {
    /// Attach the inspector to stores by default.
    pub devtools: bool,
    /// The default inspector for stores that do not bring their own.
    pub inspector: Option<Arc<dyn Inspector>>,
}

pub struct Host {
    devtools: bool,
    inspector: Option<Arc<dyn Inspector>>,
}

impl Host {
    pub fn devtools(&self) -> bool {
        self.devtools
    }

    pub fn inspector(&self) -> Option<Arc<dyn Inspector>> {
        self.inspector.clone()
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("devtools", &self.devtools)
            .field("inspector", &self.inspector.is_some())
            .finish()
    }
}

/// Install the host. Only the first call takes effect; later calls log an
/// error and return the existing host unchanged.
pub fn install(config: HostConfig) -> &'static Host {
    let mut fresh = false;
    let host = HOST.get_or_init(|| {
        fresh = true;
        Host {
            devtools: config.devtools,
            inspector: config.inspector.clone(),
        }
    });

    if fresh {
        debug!(devtools = host.devtools, "host installed");
    } else {
        error!("[lattice-store] already installed. install() should be called only once.");
    }
    host
}

/// The installed host, if any.
pub fn installed() -> Option<&'static Host> {
    HOST.get()
}
