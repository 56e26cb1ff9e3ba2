//! Dynamic argument and result values.

use crate::frame::Frame;
use std::collections::BTreeMap;
use std::sync::Arc;

/// A value passed to, or returned from, a contracted function.
///
/// Lists, maps and frames are shared through `Arc`. Cloning them is cheap
/// and keeps object identity, which is what [`Value::is_same`] compares.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Arc<Vec<Value>>),
    Map(Arc<BTreeMap<String, Value>>),
    Frame(Arc<Frame>),
}

impl Value {
    pub fn list<I, T>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        Value::List(Arc::new(items.into_iter().map(Into::into).collect()))
    }

    pub fn map<I, K, T>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, T)>,
        K: Into<String>,
        T: Into<Value>,
    {
        Value::Map(Arc::new(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        ))
    }

    /// Short type name used in messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Frame(_) => "frame",
        }
    }

    pub fn as_frame(&self) -> Option<&Frame> {
        match self {
            Value::Frame(frame) => Some(&**frame),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(&**entries),
            _ => None,
        }
    }

    /// Number of rows, items or entries; `None` for scalars.
    pub fn len(&self) -> Option<usize> {
        match self {
            Value::Frame(frame) => Some(frame.len()),
            Value::List(items) => Some(items.len()),
            Value::Map(entries) => Some(entries.len()),
            _ => None,
        }
    }

    /// Object identity: both values share the same allocation.
    ///
    /// Scalars have no identity and are never the same object.
    pub fn is_same(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Frame(a), Value::Frame(b)) => Arc::ptr_eq(a, b),
            (Value::List(a), Value::List(b)) => Arc::ptr_eq(a, b),
            (Value::Map(a), Value::Map(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v.into())
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Frame> for Value {
    fn from(v: Frame) -> Self {
        Value::Frame(Arc::new(v))
    }
}

impl From<Arc<Frame>> for Value {
    fn from(v: Arc<Frame>) -> Self {
        Value::Frame(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::list(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_follows_clones() {
        let frame: Value = Frame::empty(1).unwrap().into();
        let alias = frame.clone();
        let copy: Value = Frame::empty(1).unwrap().into();

        assert!(frame.is_same(&alias));
        assert!(!frame.is_same(&copy));
        assert_eq!(frame, copy);
    }

    #[test]
    fn test_scalars_have_no_identity() {
        let a = Value::from(1);
        assert!(!a.is_same(&a.clone()));
    }

    #[test]
    fn test_len() {
        assert_eq!(Value::list(vec!["a", "b"]).len(), Some(2));
        assert_eq!(Value::map(vec![("k", 1)]).len(), Some(1));
        assert_eq!(Value::from("abc").len(), None);
    }
}
