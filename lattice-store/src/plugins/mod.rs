//! Bundled plugins.

mod logger;

pub use logger::{logger, ActionFilter, LoggerOptions, MutationFilter};
