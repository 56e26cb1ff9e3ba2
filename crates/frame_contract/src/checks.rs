//! Checks relating a contract's target to other arguments.
//!
//! Built-in checks are variants of [`BuiltinCheck`]. Anything implementing
//! [`Check`] can be attached to a contract as well; [`custom`] wraps a
//! closure.
//!
//! Argument names may be given as a single name, a comma-separated string
//! (`"df, df2"`) or a list. A check built from an empty name list is
//! inactive and is dropped when the contract is built.

use crate::error::TargetResolutionError;
use crate::frame::Frame;
use crate::resolver::SchemaResolver;
use crate::schema::{ColumnKey, Schema};
use crate::signature::BoundArguments;
use crate::validate::{SchemaValidator, ValidateOptions};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;

/// Name under which a result contract's checks see the return value.
pub const RESULT_ARGUMENT: &str = "<return>";

/// Everything a check may look at during one call.
pub struct CheckContext<'a> {
    target: &'a Value,
    arguments: &'a BoundArguments,
    result: Option<&'a Value>,
    resolver: &'a SchemaResolver<'a>,
    validator: &'a dyn SchemaValidator,
    options: &'a ValidateOptions,
}

impl<'a> CheckContext<'a> {
    pub(crate) fn new(
        target: &'a Value,
        arguments: &'a BoundArguments,
        result: Option<&'a Value>,
        resolver: &'a SchemaResolver<'a>,
        validator: &'a dyn SchemaValidator,
        options: &'a ValidateOptions,
    ) -> Self {
        Self {
            target,
            arguments,
            result,
            resolver,
            validator,
            options,
        }
    }

    /// The key-resolved value under validation.
    pub fn target(&self) -> &'a Value {
        self.target
    }

    /// A bound argument, or the result under [`RESULT_ARGUMENT`].
    pub fn argument(&self, name: &str) -> Result<&'a Value, TargetResolutionError> {
        match (name, self.result) {
            (RESULT_ARGUMENT, Some(result)) => Ok(result),
            _ => self.arguments.require(name),
        }
    }

    pub fn arguments(&self) -> &'a BoundArguments {
        self.arguments
    }

    pub fn resolver(&self) -> &'a SchemaResolver<'a> {
        self.resolver
    }

    pub fn validator(&self) -> &'a dyn SchemaValidator {
        self.validator
    }

    pub fn options(&self) -> &'a ValidateOptions {
        self.options
    }
}

/// A check on a contract's target.
///
/// Checks are built once, when the contract is declared, and evaluated on
/// every call. `evaluate` returns the failure description, or `None` when the
/// check passes. A check fails at most once per call; several mismatches are
/// folded into one message.
pub trait Check: Send + Sync {
    fn name(&self) -> String;

    /// Arguments this check reads. Validated against the signature when the
    /// contract is attached.
    fn referenced_arguments(&self) -> Vec<String> {
        Vec::new()
    }

    fn is_active(&self) -> bool {
        true
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Result<Option<String>, TargetResolutionError>;
}

pub type CheckRef = Arc<dyn Check>;

impl<C: Check + ?Sized> Check for Arc<C> {
    fn name(&self) -> String {
        (**self).name()
    }

    fn referenced_arguments(&self) -> Vec<String> {
        (**self).referenced_arguments()
    }

    fn is_active(&self) -> bool {
        (**self).is_active()
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Result<Option<String>, TargetResolutionError> {
        (**self).evaluate(ctx)
    }
}

/// Argument names given as one name, a comma-separated string or a list.
pub trait IntoArgNames {
    fn into_arg_names(self) -> Vec<String>;
}

fn split_names(raw: &str) -> impl Iterator<Item = String> + '_ {
    raw.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// First occurrence of each name, in order.
fn unique_names(names: impl Iterator<Item = String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::new();
    for name in names {
        if !unique.contains(&name) {
            unique.push(name);
        }
    }
    unique
}

impl IntoArgNames for &str {
    fn into_arg_names(self) -> Vec<String> {
        unique_names(split_names(self))
    }
}

impl IntoArgNames for String {
    fn into_arg_names(self) -> Vec<String> {
        unique_names(split_names(&self))
    }
}

impl IntoArgNames for Vec<&str> {
    fn into_arg_names(self) -> Vec<String> {
        unique_names(self.into_iter().flat_map(split_names))
    }
}

impl IntoArgNames for Vec<String> {
    fn into_arg_names(self) -> Vec<String> {
        unique_names(self.iter().flat_map(|name| split_names(name)))
    }
}

impl<const N: usize> IntoArgNames for [&str; N] {
    fn into_arg_names(self) -> Vec<String> {
        unique_names(self.into_iter().flat_map(split_names))
    }
}

impl IntoArgNames for &[&str] {
    fn into_arg_names(self) -> Vec<String> {
        unique_names(self.iter().flat_map(|name| split_names(name)))
    }
}

/// The checks shipped with the crate.
#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinCheck {
    /// Target is `base` plus or minus the columns of `modified`; every
    /// other column is unchanged.
    Extends { base: String, modified: Schema },
    /// Target's row index equals each argument's index, in order.
    SameIndexAs(Vec<String>),
    /// Target has as many rows as each argument.
    SameLengthAs(Vec<String>),
    /// Target is the very object passed as the argument.
    Is(String),
    /// Target is none of the objects passed as the arguments.
    IsNot(Vec<String>),
    /// None of the columns are present in the target.
    Removed(Vec<ColumnKey>),
}

pub fn extends(base: impl Into<String>, modified: Schema) -> BuiltinCheck {
    let base: String = base.into();
    BuiltinCheck::Extends {
        base: base.trim().to_string(),
        modified,
    }
}

pub fn same_index_as(names: impl IntoArgNames) -> BuiltinCheck {
    BuiltinCheck::SameIndexAs(names.into_arg_names())
}

pub fn same_length_as(names: impl IntoArgNames) -> BuiltinCheck {
    BuiltinCheck::SameLengthAs(names.into_arg_names())
}

pub fn is_(name: impl Into<String>) -> BuiltinCheck {
    let name: String = name.into();
    BuiltinCheck::Is(name.trim().to_string())
}

pub fn is_not(names: impl IntoArgNames) -> BuiltinCheck {
    BuiltinCheck::IsNot(names.into_arg_names())
}

pub fn removed<I, K>(columns: I) -> BuiltinCheck
where
    I: IntoIterator<Item = K>,
    K: Into<ColumnKey>,
{
    let mut keys: Vec<ColumnKey> = Vec::new();
    for key in columns {
        let key: ColumnKey = key.into();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    BuiltinCheck::Removed(keys)
}

impl Check for BuiltinCheck {
    fn name(&self) -> String {
        match self {
            BuiltinCheck::Extends { base, .. } => format!("extends {}", base),
            BuiltinCheck::SameIndexAs(_) => "same_index_as".to_string(),
            BuiltinCheck::SameLengthAs(_) => "same_length_as".to_string(),
            BuiltinCheck::Is(_) => "is".to_string(),
            BuiltinCheck::IsNot(_) => "is_not".to_string(),
            BuiltinCheck::Removed(_) => "removed".to_string(),
        }
    }

    fn referenced_arguments(&self) -> Vec<String> {
        match self {
            BuiltinCheck::Extends { base, modified } => std::iter::once(base.clone())
                .chain(modified.referenced_arguments().into_iter().map(str::to_string))
                .collect(),
            BuiltinCheck::SameIndexAs(names)
            | BuiltinCheck::SameLengthAs(names)
            | BuiltinCheck::IsNot(names) => names.clone(),
            BuiltinCheck::Is(name) => vec![name.clone()],
            BuiltinCheck::Removed(keys) => keys
                .iter()
                .filter_map(|key| key.argument().map(str::to_string))
                .collect(),
        }
    }

    fn is_active(&self) -> bool {
        match self {
            BuiltinCheck::Extends { base, .. } | BuiltinCheck::Is(base) => !base.is_empty(),
            BuiltinCheck::SameIndexAs(names)
            | BuiltinCheck::SameLengthAs(names)
            | BuiltinCheck::IsNot(names) => !names.is_empty(),
            BuiltinCheck::Removed(keys) => !keys.is_empty(),
        }
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Result<Option<String>, TargetResolutionError> {
        let target = ctx.target();
        let failures = match self {
            BuiltinCheck::Extends { base, modified } => {
                extends_failures(ctx, base, modified)?
            }
            BuiltinCheck::SameIndexAs(names) => {
                let mut failures = Vec::new();
                for name in names {
                    let same = match (target.as_frame(), ctx.argument(name)?.as_frame()) {
                        (Some(a), Some(b)) => a.index_equals(b),
                        _ => false,
                    };
                    if !same {
                        failures.push(format!("Index not equal to index of {}.", name));
                    }
                }
                failures
            }
            BuiltinCheck::SameLengthAs(names) => {
                let len = target.len();
                let mut failures = Vec::new();
                for name in names {
                    let other = ctx.argument(name)?;
                    match (len, other.len()) {
                        (Some(len), Some(other_len)) if len == other_len => {}
                        (Some(len), Some(other_len)) => failures
                            .push(format!("Length of {} = {} != {}.", name, other_len, len)),
                        (None, _) => failures.push(format!(
                            "Length of {} undefined for target of type {}.",
                            name,
                            target.kind()
                        )),
                        (Some(_), None) => failures.push(format!(
                            "Length of {} undefined for type {}.",
                            name,
                            other.kind()
                        )),
                    }
                }
                failures
            }
            BuiltinCheck::Is(name) => {
                if target.is_same(ctx.argument(name)?) {
                    Vec::new()
                } else {
                    vec![format!("is not {}", name)]
                }
            }
            BuiltinCheck::IsNot(names) => {
                let mut failures = Vec::new();
                for name in names {
                    if target.is_same(ctx.argument(name)?) {
                        failures.push(format!("is {}", name));
                    }
                }
                failures
            }
            BuiltinCheck::Removed(keys) => {
                let columns = ctx.resolver().resolve_columns(keys)?;
                match target.as_frame() {
                    Some(frame) => columns
                        .iter()
                        .filter(|column| frame.has_column(column))
                        .map(|column| format!("Column '{}' still exists in DataFrame", column))
                        .collect(),
                    None => vec![format!("not a DataFrame, got {}.", target.kind())],
                }
            }
        };

        Ok(join_failures(failures))
    }
}

fn join_failures(failures: Vec<String>) -> Option<String> {
    if failures.is_empty() {
        None
    } else {
        Some(failures.join(", "))
    }
}

fn extends_failures(
    ctx: &CheckContext<'_>,
    base_name: &str,
    modified: &Schema,
) -> Result<Vec<String>, TargetResolutionError> {
    let target = ctx.target();
    let base = ctx.argument(base_name)?;
    let resolved = ctx.resolver().resolve(modified)?;

    let mut failures: Vec<String> = ctx
        .validator()
        .validate(target, &resolved, ctx.options())
        .into_iter()
        .map(|failure| failure.message)
        .collect();

    let (target_frame, base_frame) = match (target.as_frame(), base.as_frame()) {
        (Some(t), Some(b)) => (t, b),
        (t, b) => {
            if t.is_none() {
                failures.push(format!("<input> not a DataFrame, got {}.", target.kind()));
            }
            if b.is_none() {
                failures.push(format!("{} not a DataFrame, got {}.", base_name, base.kind()));
            }
            return Ok(failures);
        }
    };

    let unmodified = |frame: &Frame| -> Vec<String> {
        frame
            .column_names()
            .into_iter()
            .filter(|name| !resolved.contains(name))
            .collect()
    };

    if !target_frame.index_equals(base_frame) {
        failures.push("index differ".to_string());
    }

    let target_columns = unmodified(target_frame);
    let base_columns = unmodified(base_frame);
    if target_columns != base_columns {
        failures.push(format!(
            "Columns differ: {} != {}",
            column_list(&target_columns),
            column_list(&base_columns)
        ));
    }

    for name in target_columns.iter().filter(|name| base_columns.contains(name)) {
        if !target_frame.column_equals(base_frame, name) {
            failures.push(format!("Column '{}' was changed.", name));
        }
    }

    Ok(failures)
}

fn column_list(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("'{}'", n)).collect();
    format!("[{}]", quoted.join(", "))
}

type CheckFn = dyn Fn(&CheckContext<'_>) -> Result<Option<String>, TargetResolutionError>
    + Send
    + Sync;

/// A check backed by a closure.
pub struct FnCheck {
    name: String,
    arguments: Vec<String>,
    check: Box<CheckFn>,
}

impl FnCheck {
    /// Declare the arguments the closure reads, so they are validated
    /// against the signature.
    pub fn reads(mut self, names: impl IntoArgNames) -> Self {
        self.arguments.extend(names.into_arg_names());
        self
    }
}

impl fmt::Debug for FnCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnCheck")
            .field("name", &self.name)
            .field("arguments", &self.arguments)
            .finish()
    }
}

impl Check for FnCheck {
    fn name(&self) -> String {
        self.name.clone()
    }

    fn referenced_arguments(&self) -> Vec<String> {
        self.arguments.clone()
    }

    fn evaluate(&self, ctx: &CheckContext<'_>) -> Result<Option<String>, TargetResolutionError> {
        (self.check)(ctx)
    }
}

/// A user-defined check.
pub fn custom<F>(name: impl Into<String>, check: F) -> FnCheck
where
    F: Fn(&CheckContext<'_>) -> Result<Option<String>, TargetResolutionError>
        + Send
        + Sync
        + 'static,
{
    FnCheck {
        name: name.into(),
        arguments: Vec::new(),
        check: Box::new(check),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{from_arg, Column, DataType};
    use crate::signature::{CallArgs, Signature};
    use crate::validate::ArrowSchemaValidator;
    use arrow::array::{ArrayRef, Int64Array};

    fn ints(values: &[i64]) -> ArrayRef {
        Arc::new(Int64Array::from(values.to_vec()))
    }

    fn frame(columns: &[(&str, &[i64])]) -> Value {
        Frame::from_columns(columns.iter().map(|(n, v)| (*n, ints(v))))
            .unwrap()
            .into()
    }

    fn bind(df: Value, df2: Value) -> BoundArguments {
        Signature::new("f")
            .param("df")
            .param("df2")
            .param_with_default("cols", Value::list(vec!["a"]))
            .bind(&CallArgs::new().arg(df).arg(df2))
            .unwrap()
    }

    fn run(check: &BuiltinCheck, target: &Value, args: &BoundArguments) -> Option<String> {
        let resolver = SchemaResolver::new(args);
        let options = ValidateOptions::default();
        let ctx = CheckContext::new(
            target,
            args,
            Some(target),
            &resolver,
            &ArrowSchemaValidator,
            &options,
        );
        check.evaluate(&ctx).unwrap()
    }

    #[test]
    fn test_arg_names() {
        assert_eq!("df, df2".into_arg_names(), vec!["df", "df2"]);
        assert_eq!(vec!["a", " b "].into_arg_names(), vec!["a", "b"]);
        assert!("".into_arg_names().is_empty());
        assert!(!same_index_as(Vec::<String>::new()).is_active());
        assert!(!removed(Vec::<&str>::new()).is_active());
        assert!(is_not(["df"]).is_active());
    }

    #[test]
    fn test_same_index_as() {
        let df = frame(&[("a", &[1, 2])]);
        let shifted = Frame::from_columns(vec![("a", ints(&[1, 2]))])
            .unwrap()
            .with_index(ints(&[5, 6]))
            .unwrap();
        let args = bind(df.clone(), shifted.into());

        assert_eq!(run(&same_index_as("df"), &df, &args), None);
        assert_eq!(
            run(&same_index_as("df, df2"), &df, &args),
            Some("Index not equal to index of df2.".to_string())
        );
    }

    #[test]
    fn test_same_length_as() {
        let df = frame(&[("a", &[1, 2])]);
        let args = bind(df.clone(), frame(&[("a", &[1])]));
        assert_eq!(
            run(&same_length_as(["df", "df2"]), &df, &args),
            Some("Length of df2 = 1 != 2.".to_string())
        );
    }

    #[test]
    fn test_identity() {
        let df = frame(&[("a", &[1])]);
        let args = bind(df.clone(), df.clone());
        let copy = frame(&[("a", &[1])]);

        assert_eq!(run(&is_("df"), &df, &args), None);
        assert_eq!(run(&is_("df"), &copy, &args), Some("is not df".to_string()));
        assert_eq!(
            run(&is_not("df, df2"), &df, &args),
            Some("is df, is df2".to_string())
        );
        assert_eq!(run(&is_not("df"), &copy, &args), None);
    }

    #[test]
    fn test_duplicate_names_collapse() {
        let df = frame(&[("a", &[1])]);
        let args = bind(df.clone(), Value::Null);
        assert_eq!(is_not("df, df"), is_not("df"));
        assert_eq!(same_index_as(vec!["df", "df2, df"]), same_index_as(["df", "df2"]));
        assert_eq!(run(&is_not(["df", " df "]), &df, &args), Some("is df".to_string()));
    }

    #[test]
    fn test_removed_with_placeholder() {
        let df = frame(&[("a", &[1]), ("b", &[2])]);
        let args = bind(df.clone(), Value::Null);
        let check = removed(vec![from_arg("cols"), ColumnKey::from("b"), ColumnKey::from("z")]);
        assert_eq!(check.referenced_arguments(), vec!["cols"]);
        assert_eq!(
            run(&check, &df, &args),
            Some(
                "Column 'a' still exists in DataFrame, Column 'b' still exists in DataFrame"
                    .to_string()
            )
        );
    }

    #[test]
    fn test_extends() {
        let base = frame(&[("a", &[1, 2]), ("b", &[3, 4])]);
        let modified = Schema::new()
            .column("b", Column::of(DataType::Int64))
            .column("c", Column::of(DataType::Int64));
        let check = extends("df", modified);
        let args = bind(base.clone(), Value::Null);
        assert_eq!(check.name(), "extends df");

        let ok = frame(&[("a", &[1, 2]), ("b", &[3, 4]), ("c", &[5, 6])]);
        assert_eq!(run(&check, &ok, &args), None);

        let missing_a = frame(&[("b", &[3, 4]), ("c", &[5, 6])]);
        let msg = run(&check, &missing_a, &args).unwrap();
        assert_eq!(msg, "Columns differ: [] != ['a']");

        let changed_a = frame(&[("a", &[9, 2]), ("b", &[3, 4]), ("c", &[5, 6])]);
        let msg = run(&check, &changed_a, &args).unwrap();
        assert_eq!(msg, "Column 'a' was changed.");

        let no_c = frame(&[("a", &[1, 2]), ("b", &[3, 4])]);
        let msg = run(&check, &no_c, &args).unwrap();
        assert_eq!(msg, "column 'c' not in dataframe");
    }

    #[test]
    fn test_extends_not_a_table() {
        let args = bind(Value::Int(1), Value::Null);
        let check = extends("df", Schema::new());
        let msg = run(&check, &Value::from("x"), &args).unwrap();
        assert!(msg.contains("<input> not a DataFrame, got str."));
        assert!(msg.contains("df not a DataFrame, got int."));
    }

    #[test]
    fn test_missing_argument_is_resolution_error() {
        let df = frame(&[("a", &[1])]);
        let args = bind(df.clone(), Value::Null);
        let resolver = SchemaResolver::new(&args);
        let options = ValidateOptions::default();
        let ctx = CheckContext::new(&df, &args, None, &resolver, &ArrowSchemaValidator, &options);
        assert!(is_("nope").evaluate(&ctx).is_err());
        assert!(ctx.argument(RESULT_ARGUMENT).is_err());
    }

    #[test]
    fn test_custom() {
        let check = custom("has_rows", |ctx| {
            Ok(match ctx.target().len() {
                Some(0) => Some("no rows".to_string()),
                _ => None,
            })
        })
        .reads("df");
        assert_eq!(check.referenced_arguments(), vec!["df"]);

        let empty: Value = Frame::empty(0).unwrap().into();
        let args = bind(empty.clone(), Value::Null);
        let resolver = SchemaResolver::new(&args);
        let options = ValidateOptions::default();
        let ctx = CheckContext::new(&empty, &args, None, &resolver, &ArrowSchemaValidator, &options);
        assert_eq!(check.evaluate(&ctx).unwrap(), Some("no rows".to_string()));
    }
}
