//! Call-time materialization of dynamic schemas.

use crate::error::TargetResolutionError;
use crate::schema::{ColumnKey, ResolvedSchema, Schema};
use crate::signature::BoundArguments;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;

/// Resolves [`from_arg`](crate::schema::from_arg) placeholders against one
/// call's arguments.
///
/// A resolver lives for a single contract evaluation. Placeholder lookups
/// are memoized for that evaluation only, so checks sharing a placeholder
/// see the same column list.
pub struct SchemaResolver<'a> {
    arguments: &'a BoundArguments,
    cache: RefCell<HashMap<String, Vec<String>>>,
}

impl<'a> SchemaResolver<'a> {
    pub fn new(arguments: &'a BoundArguments) -> Self {
        Self {
            arguments,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Column names supplied by argument `name`.
    pub fn placeholder(&self, name: &str) -> Result<Vec<String>, TargetResolutionError> {
        if let Some(cached) = self.cache.borrow().get(name) {
            return Ok(cached.clone());
        }

        let value = self.arguments.require(name)?;
        let columns = match value {
            Value::Str(column) => vec![column.clone()],
            Value::List(items) => items
                .iter()
                .map(|item| item.as_str().map(str::to_string))
                .collect::<Option<Vec<_>>>()
                .ok_or_else(|| self.placeholder_error(name, "list with non-string items"))?,
            other => return Err(self.placeholder_error(name, other.kind())),
        };

        self.cache
            .borrow_mut()
            .insert(name.to_string(), columns.clone());
        Ok(columns)
    }

    /// Concrete names for one key. Placeholders may fan out to many names.
    pub fn resolve_key(&self, key: &ColumnKey) -> Result<Vec<String>, TargetResolutionError> {
        match key {
            ColumnKey::Name(name) => Ok(vec![name.clone()]),
            ColumnKey::FromArg(arg) => self.placeholder(arg),
        }
    }

    pub fn resolve_columns(&self, keys: &[ColumnKey]) -> Result<Vec<String>, TargetResolutionError> {
        let mut names: Vec<String> = Vec::new();
        for key in keys {
            for name in self.resolve_key(key)? {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        Ok(names)
    }

    /// Replace every placeholder with the columns its argument names.
    ///
    /// Each fanned-out column carries the placeholder's column requirements. When two
    /// entries produce the same name, the later one wins.
    pub fn resolve(&self, schema: &Schema) -> Result<ResolvedSchema, TargetResolutionError> {
        let mut resolved = ResolvedSchema {
            columns: Vec::with_capacity(schema.columns().len()),
            strict: schema.is_strict(),
        };
        for (key, column) in schema.columns() {
            for name in self.resolve_key(key)? {
                resolved.set(name, column.clone());
            }
        }
        Ok(resolved)
    }

    fn placeholder_error(&self, argument: &str, got: &'static str) -> TargetResolutionError {
        TargetResolutionError::Placeholder {
            function: self.arguments.function().to_string(),
            argument: argument.to_string(),
            got,
        }
    }
}
