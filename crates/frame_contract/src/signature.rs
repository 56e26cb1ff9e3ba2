//! Function signatures and argument binding.
//!
//! A [`Signature`] is declared once, next to the function body, and every
//! contract refers to parameters by name. Calls are mapped onto the
//! signature by [`Signature::bind`], which applies defaults and collects
//! variadic arguments.

use crate::error::{ConfigurationError, TargetResolutionError};
use crate::frame::Frame;
use crate::value::Value;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    PositionalOnly,
    PositionalOrKeyword,
    KeywordOnly,
    VarPositional,
    VarKeyword,
}

impl ParamKind {
    pub fn is_variadic(self) -> bool {
        matches!(self, ParamKind::VarPositional | ParamKind::VarKeyword)
    }

    fn accepts_positional(self) -> bool {
        matches!(self, ParamKind::PositionalOnly | ParamKind::PositionalOrKeyword)
    }

    fn accepts_keyword(self) -> bool {
        matches!(self, ParamKind::PositionalOrKeyword | ParamKind::KeywordOnly)
    }

    fn rank(self) -> u8 {
        match self {
            ParamKind::PositionalOnly => 0,
            ParamKind::PositionalOrKeyword => 1,
            ParamKind::VarPositional => 2,
            ParamKind::KeywordOnly => 3,
            ParamKind::VarKeyword => 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<Value>,
}

/// Parameter list of a contracted function.
#[derive(Debug, Clone)]
pub struct Signature {
    name: String,
    params: Vec<Param>,
}

impl Signature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Vec::new(),
        }
    }

    /// Required positional-or-keyword parameter.
    pub fn param(self, name: impl Into<String>) -> Self {
        self.push(name, ParamKind::PositionalOrKeyword, None)
    }

    pub fn param_with_default(self, name: impl Into<String>, default: impl Into<Value>) -> Self {
        self.push(name, ParamKind::PositionalOrKeyword, Some(default.into()))
    }

    pub fn positional_only(self, name: impl Into<String>) -> Self {
        self.push(name, ParamKind::PositionalOnly, None)
    }

    pub fn keyword_only(self, name: impl Into<String>) -> Self {
        self.push(name, ParamKind::KeywordOnly, None)
    }

    pub fn keyword_only_with_default(
        self,
        name: impl Into<String>,
        default: impl Into<Value>,
    ) -> Self {
        self.push(name, ParamKind::KeywordOnly, Some(default.into()))
    }

    /// Collects surplus positional arguments into a list.
    pub fn var_positional(self, name: impl Into<String>) -> Self {
        self.push(name, ParamKind::VarPositional, None)
    }

    /// Collects surplus keyword arguments into a map.
    pub fn var_keyword(self, name: impl Into<String>) -> Self {
        self.push(name, ParamKind::VarKeyword, None)
    }

    fn push(mut self, name: impl Into<String>, kind: ParamKind, default: Option<Value>) -> Self {
        self.params.push(Param {
            name: name.into(),
            kind,
            default,
        });
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    /// Whether a contract may refer to `name`. Variadic collectors are not
    /// addressable by name.
    pub fn has_param(&self, name: &str) -> bool {
        self.params
            .iter()
            .any(|p| p.name == name && !p.kind.is_variadic())
    }

    /// Check that the parameter list is well formed.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let invalid = |reason: String| ConfigurationError::InvalidSignature {
            function: self.name.clone(),
            reason,
        };

        let mut seen_default = false;
        for (i, param) in self.params.iter().enumerate() {
            if self.params[..i].iter().any(|p| p.name == param.name) {
                return Err(invalid(format!("duplicate parameter '{}'", param.name)));
            }
            if i > 0 && self.params[i - 1].kind.rank() > param.kind.rank() {
                return Err(invalid(format!("parameter '{}' is out of order", param.name)));
            }
            if param.kind.is_variadic() {
                if param.default.is_some() {
                    return Err(invalid(format!(
                        "variadic parameter '{}' cannot have a default",
                        param.name
                    )));
                }
                if i > 0 && self.params[i - 1].kind == param.kind {
                    return Err(invalid(format!("more than one {:?} parameter", param.kind)));
                }
            }
            if param.kind.accepts_positional() {
                if param.default.is_some() {
                    seen_default = true;
                } else if seen_default {
                    return Err(invalid(format!(
                        "non-default parameter '{}' follows default parameter",
                        param.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// Map call arguments onto parameters.
    pub fn bind(&self, call: &CallArgs) -> Result<BoundArguments, TargetResolutionError> {
        let fail = |reason: String| TargetResolutionError::Binding {
            function: self.name.clone(),
            reason,
        };

        let mut slots: Vec<Option<Value>> = vec![None; self.params.len()];
        let mut positional = call.positional.iter();

        for (slot, param) in self.params.iter().enumerate() {
            if param.kind.accepts_positional() {
                if let Some(value) = positional.next() {
                    slots[slot] = Some(value.clone());
                }
            } else if param.kind == ParamKind::VarPositional {
                slots[slot] = Some(Value::list(positional.by_ref().cloned()));
            }
        }

        let surplus = positional.count();
        if surplus > 0 {
            let accepted = self
                .params
                .iter()
                .filter(|p| p.kind.accepts_positional())
                .count();
            return Err(fail(format!(
                "takes {} positional arguments but {} were given",
                accepted,
                accepted + surplus
            )));
        }

        let mut extra_keywords = BTreeMap::new();
        for (name, value) in &call.keyword {
            let target = self
                .params
                .iter()
                .position(|p| p.name == *name && p.kind.accepts_keyword());
            match target {
                Some(slot) if slots[slot].is_some() => {
                    return Err(fail(format!("got multiple values for argument '{}'", name)));
                }
                Some(slot) => slots[slot] = Some(value.clone()),
                None if self.params.iter().any(|p| p.kind == ParamKind::VarKeyword) => {
                    if extra_keywords.insert(name.clone(), value.clone()).is_some() {
                        return Err(fail(format!(
                            "got multiple values for keyword argument '{}'",
                            name
                        )));
                    }
                }
                None => {
                    return Err(fail(format!("got an unexpected keyword argument '{}'", name)));
                }
            }
        }

        let mut extra_keywords = Some(extra_keywords);
        let mut entries = Vec::with_capacity(self.params.len());
        for (param, slot) in self.params.iter().zip(slots) {
            let value = match (slot, param.kind) {
                (Some(value), _) => value,
                (None, ParamKind::VarKeyword) => {
                    Value::Map(std::sync::Arc::new(extra_keywords.take().unwrap_or_default()))
                }
                (None, _) => match &param.default {
                    Some(default) => default.clone(),
                    None => {
                        return Err(fail(format!(
                            "missing required argument '{}'",
                            param.name
                        )))
                    }
                },
            };
            entries.push((param.name.clone(), value));
        }

        Ok(BoundArguments {
            function: self.name.clone(),
            entries,
        })
    }
}

/// Arguments of one call, before binding.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    positional: Vec<Value>,
    keyword: Vec<(String, Value)>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.positional.push(value.into());
        self
    }

    pub fn kwarg(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.keyword.push((name.into(), value.into()));
        self
    }

    pub fn positional(&self) -> &[Value] {
        &self.positional
    }

    pub fn keyword(&self) -> &[(String, Value)] {
        &self.keyword
    }
}

/// Parameter name to value, in signature order, with defaults applied.
#[derive(Debug, Clone)]
pub struct BoundArguments {
    function: String,
    entries: Vec<(String, Value)>,
}

impl BoundArguments {
    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn require(&self, name: &str) -> Result<&Value, TargetResolutionError> {
        self.get(name)
            .ok_or_else(|| TargetResolutionError::MissingArgument {
                function: self.function.clone(),
                argument: name.to_string(),
            })
    }

    pub fn frame(&self, name: &str) -> Option<&Frame> {
        self.get(name).and_then(Value::as_frame)
    }

    pub fn str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sig() -> Signature {
        Signature::new("my_fn")
            .param("df")
            .param_with_default("col", "x")
            .keyword_only_with_default("flag", false)
    }

    #[test]
    fn test_bind_positional_and_defaults() {
        let bound = sig().bind(&CallArgs::new().arg(1)).unwrap();
        assert_eq!(bound.get("df"), Some(&Value::Int(1)));
        assert_eq!(bound.str("col"), Some("x"));
        assert_eq!(bound.get("flag"), Some(&Value::Bool(false)));
    }

    #[test]
    fn test_bind_keywords() {
        let bound = sig()
            .bind(&CallArgs::new().kwarg("col", "y").kwarg("df", 2).kwarg("flag", true))
            .unwrap();
        assert_eq!(bound.get("df"), Some(&Value::Int(2)));
        assert_eq!(bound.str("col"), Some("y"));
        assert_eq!(bound.get("flag"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_bind_errors() {
        let err = sig().bind(&CallArgs::new()).unwrap_err();
        assert!(err.to_string().contains("missing required argument 'df'"));

        let err = sig()
            .bind(&CallArgs::new().arg(1).arg("a").arg(3))
            .unwrap_err();
        assert!(err.to_string().contains("takes 2 positional arguments but 3 were given"));

        let err = sig()
            .bind(&CallArgs::new().arg(1).kwarg("df", 2))
            .unwrap_err();
        assert!(err.to_string().contains("multiple values for argument 'df'"));

        let err = sig()
            .bind(&CallArgs::new().arg(1).kwarg("nope", 2))
            .unwrap_err();
        assert!(err.to_string().contains("unexpected keyword argument 'nope'"));
    }

    #[test]
    fn test_positional_only_rejects_keyword() {
        let sig = Signature::new("f").positional_only("df");
        assert!(sig.bind(&CallArgs::new().kwarg("df", 1)).is_err());
        assert!(sig.bind(&CallArgs::new().arg(1)).is_ok());
    }

    #[test]
    fn test_bind_variadics() {
        let sig = Signature::new("f")
            .param("a")
            .var_positional("args")
            .keyword_only("k")
            .var_keyword("kwargs");
        let bound = sig
            .bind(
                &CallArgs::new()
                    .arg(1)
                    .arg(2)
                    .arg(3)
                    .kwarg("k", "v")
                    .kwarg("extra", 4),
            )
            .unwrap();
        assert_eq!(bound.get("args").and_then(Value::len), Some(2));
        let kwargs = bound.get("kwargs").and_then(Value::as_map).unwrap();
        assert_eq!(kwargs.get("extra"), Some(&Value::Int(4)));
        assert!(!sig.has_param("args"));
        assert!(!sig.has_param("kwargs"));
        assert!(sig.has_param("k"));
    }

    #[test]
    fn test_validate() {
        assert!(sig().validate().is_ok());

        let dup = Signature::new("f").param("a").param("a");
        assert!(matches!(
            dup.validate(),
            Err(ConfigurationError::InvalidSignature { .. })
        ));

        let order = Signature::new("f").param_with_default("a", 1).param("b");
        assert!(order.validate().is_err());

        let kinds = Signature::new("f").keyword_only("a").param("b");
        assert!(kinds.validate().is_err());
    }
}
