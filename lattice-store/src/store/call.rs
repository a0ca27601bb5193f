//! Call signatures accepted by `commit` and `dispatch`.
//!
//! Callers either name a type and pass a payload, or hand over one envelope
//! object carrying a `"type"` field. Both shapes are resolved here, once, at
//! the entry point.

use serde::Serialize;
use serde_json::Value;

use crate::error::StoreError;

/// A commit or dispatch request.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    /// A type name plus payload.
    Typed { kind: String, payload: Value },
    /// An object with a string `"type"` field; the whole object is the
    /// payload.
    Envelope(Value),
}

impl Call {
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Call::Typed {
            kind: kind.into(),
            payload,
        }
    }

    /// Resolve to `(type, payload)`.
    pub fn normalize(self) -> Result<(String, Value), StoreError> {
        match self {
            Call::Typed { kind, payload } => Ok((kind, payload)),
            Call::Envelope(Value::String(kind)) => Ok((kind, Value::Null)),
            Call::Envelope(envelope) => match envelope.get("type").and_then(Value::as_str) {
                Some(kind) => Ok((kind.to_owned(), envelope)),
                None => Err(StoreError::InvalidCall {
                    found: describe(&envelope).to_owned(),
                }),
            },
        }
    }
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object without a string type",
    }
}

impl From<&str> for Call {
    fn from(kind: &str) -> Self {
        Call::new(kind, Value::Null)
    }
}

impl From<String> for Call {
    fn from(kind: String) -> Self {
        Call::new(kind, Value::Null)
    }
}

impl From<(&str, Value)> for Call {
    fn from((kind, payload): (&str, Value)) -> Self {
        Call::new(kind, payload)
    }
}

impl From<(String, Value)> for Call {
    fn from((kind, payload): (String, Value)) -> Self {
        Call::new(kind, payload)
    }
}

impl From<Value> for Call {
    fn from(envelope: Value) -> Self {
        Call::Envelope(envelope)
    }
}

/// A committed mutation, as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MutationRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
}

/// A dispatched action, as seen by action subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRecord {
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: Value,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitOptions {
    /// From a namespaced context, commit the type as given instead of
    /// prefixing it.
    pub root: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchOptions {
    /// From a namespaced context, dispatch the type as given instead of
    /// prefixing it.
    pub root: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegisterOptions {
    /// Keep whatever state already sits at the module's path instead of
    /// splicing in the module's initial state.
    pub preserve_state: bool,
}
