//! Unwrapping the validated value out of an argument or result.

use crate::error::LookupError;
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

pub type KeyFn = Arc<dyn Fn(&Value) -> anyhow::Result<Value> + Send + Sync>;

/// Where inside an argument (or result) the table to validate lives.
///
/// Resolved on every call; nothing is cached between calls.
#[derive(Clone, Default)]
pub enum Key {
    /// Validate the value as-is.
    #[default]
    Identity,
    /// Map entry, or column of a frame (yields a single-column frame).
    Name(String),
    /// List element.
    Index(usize),
    /// Arbitrary projection.
    Func(KeyFn),
}

impl Key {
    pub fn func<F>(f: F) -> Self
    where
        F: Fn(&Value) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Key::Func(Arc::new(f))
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, Key::Identity)
    }

    pub fn resolve(&self, raw: &Value) -> Result<Value, LookupError> {
        match self {
            Key::Identity => Ok(raw.clone()),
            Key::Name(name) => match raw {
                Value::Map(entries) => entries
                    .get(name)
                    .cloned()
                    .ok_or_else(|| LookupError::MissingName(name.clone())),
                Value::Frame(frame) => frame
                    .select_column(name)
                    .map(Value::from)
                    .ok_or_else(|| LookupError::MissingName(name.clone())),
                other => Err(LookupError::NotSubscriptable { kind: other.kind() }),
            },
            Key::Index(index) => match raw {
                Value::List(items) => items.get(*index).cloned().ok_or(LookupError::IndexOutOfRange {
                    index: *index,
                    len: items.len(),
                }),
                other => Err(LookupError::NotSubscriptable { kind: other.kind() }),
            },
            Key::Func(f) => f(raw).map_err(LookupError::Custom),
        }
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Identity => write!(f, "Identity"),
            Key::Name(name) => f.debug_tuple("Name").field(name).finish(),
            Key::Index(index) => f.debug_tuple("Index").field(index).finish(),
            Key::Func(_) => write!(f, "Func(..)"),
        }
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::Name(name.to_string())
    }
}

impl From<String> for Key {
    fn from(name: String) -> Self {
        Key::Name(name)
    }
}

impl From<usize> for Key {
    fn from(index: usize) -> Self {
        Key::Index(index)
    }
}
