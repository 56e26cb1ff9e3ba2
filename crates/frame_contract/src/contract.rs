//! Attaching contracts to functions.
//!
//! ```ignore
//! let add_total = FnDef::new(Signature::new("add_total").param("df"), |args| { ... })
//!     .with(argument("df").schema(Schema::new().column("a", Column::of(DataType::Int64))))?
//!     .with(result().extends("df", Schema::new().column("total", Column::any())))?;
//! add_total.call(CallArgs::new().arg(df))?;
//! ```
//!
//! Contracts stacked on one function share a single wrapper. On each call the
//! mode is read once; argument contracts are checked before the function runs
//! (outermost first) and result contracts after it returns (innermost first).
//! All violations of one phase are reported together.

use crate::checks::{self, BuiltinCheck, Check, CheckContext, CheckRef, IntoArgNames, RESULT_ARGUMENT};
use crate::error::{ConfigurationError, Error, Result, TargetResolutionError};
use crate::key::Key;
use crate::mode::{effective_mode, Mode};
use crate::report::{report, Violation};
use crate::resolver::SchemaResolver;
use crate::schema::Schema;
use crate::signature::{BoundArguments, CallArgs, Signature};
use crate::validate::{ArrowSchemaValidator, SchemaValidator, ValidateOptions};
use crate::value::Value;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// A callable with a declared signature.
pub trait Function {
    fn signature(&self) -> &Signature;

    fn invoke(&self, args: &BoundArguments) -> Result<Value>;

    /// Bind `call` against the signature, then invoke.
    fn call(&self, call: CallArgs) -> Result<Value> {
        let bound = self.signature().bind(&call)?;
        self.invoke(&bound)
    }
}

impl<F: Function + ?Sized> Function for Arc<F> {
    fn signature(&self) -> &Signature {
        (**self).signature()
    }

    fn invoke(&self, args: &BoundArguments) -> Result<Value> {
        (**self).invoke(args)
    }
}

/// A plain function body with its signature.
pub struct FnDef<F> {
    signature: Signature,
    body: F,
}

impl<F> FnDef<F>
where
    F: Fn(&BoundArguments) -> anyhow::Result<Value>,
{
    pub fn new(signature: Signature, body: F) -> Self {
        Self { signature, body }
    }
}

impl<F> Function for FnDef<F>
where
    F: Fn(&BoundArguments) -> anyhow::Result<Value>,
{
    fn signature(&self) -> &Signature {
        &self.signature
    }

    fn invoke(&self, args: &BoundArguments) -> Result<Value> {
        (self.body)(args).map_err(Error::Function)
    }
}

impl<F> fmt::Debug for FnDef<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnDef")
            .field("signature", &self.signature)
            .finish()
    }
}

/// Something that turns into a [`Contract`] once it sees the signature.
pub trait Decorator: Sized {
    fn into_contract(self, signature: &Signature) -> Result<Contract, ConfigurationError>;

    fn decorate<F: Function>(self, function: F) -> Result<Contracted<F>, ConfigurationError> {
        Contracted::new(function).with(self)
    }
}

pub trait FunctionExt: Function + Sized {
    /// Attach a contract. The last contract attached is the outermost.
    fn with<D: Decorator>(self, decorator: D) -> Result<Contracted<Self>, ConfigurationError> {
        decorator.decorate(self)
    }
}

impl<F: Function> FunctionExt for F {}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Argument(String),
    Result,
}

/// A validated contract, ready to attach.
pub struct Contract {
    label: String,
    target: Target,
    schema: Option<Schema>,
    checks: Vec<CheckRef>,
    key: Key,
    options: ValidateOptions,
    validator: Arc<dyn SchemaValidator>,
}

impl Contract {
    /// Contract identity used as the prefix of every violation.
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_result(&self) -> bool {
        self.target == Target::Result
    }

    fn build(
        signature: &Signature,
        target: Target,
        parts: ContractParts,
    ) -> Result<Self, ConfigurationError> {
        signature.validate()?;

        let (label, decorator) = match &target {
            Target::Argument(name) => (
                format!("{}: Argument {}: ", signature.name(), name),
                format!("@argument({:?})", name),
            ),
            Target::Result => (format!("{}: Output: ", signature.name()), "@result".to_string()),
        };

        let mut referenced: Vec<String> = Vec::new();
        if let Target::Argument(name) = &target {
            referenced.push(name.clone());
        }
        if let Some(schema) = &parts.schema {
            referenced.extend(schema.referenced_arguments().into_iter().map(str::to_string));
        }
        for check in &parts.checks {
            referenced.extend(check.referenced_arguments());
        }

        let mut unknown: Vec<String> = Vec::new();
        for name in referenced {
            let known = signature.has_param(&name)
                || (name == RESULT_ARGUMENT && target == Target::Result);
            if !known && !unknown.contains(&name) {
                unknown.push(name);
            }
        }
        if !unknown.is_empty() {
            return Err(ConfigurationError::UnknownArgument {
                function: signature.name().to_string(),
                contract: decorator,
                arguments: unknown,
            });
        }

        let checks: Vec<CheckRef> = parts
            .checks
            .into_iter()
            .filter(|check| check.is_active())
            .collect();

        Ok(Self {
            label,
            target,
            schema: parts.schema,
            checks,
            key: parts.key,
            options: parts.options,
            validator: parts
                .validator
                .unwrap_or_else(|| Arc::new(ArrowSchemaValidator) as Arc<dyn SchemaValidator>),
        })
    }

    /// All violations of this contract for one call.
    fn evaluate(
        &self,
        raw: &Value,
        args: &BoundArguments,
    ) -> Result<Vec<Violation>, TargetResolutionError> {
        let target = self
            .key
            .resolve(raw)
            .map_err(|source| TargetResolutionError::Key {
                contract: self.label.clone(),
                source,
            })?;
        let resolver = SchemaResolver::new(args);
        let mut violations = Vec::new();

        if let Some(schema) = &self.schema {
            let resolved = resolver.resolve(schema)?;
            for failure in self.validator.validate(&target, &resolved, &self.options) {
                violations.push(Violation::new(&self.label, "schema", failure.message));
            }
        }

        // Checks see the key-resolved result under RESULT_ARGUMENT.
        let result = self.is_result().then_some(&target);
        let ctx = CheckContext::new(
            &target,
            args,
            result,
            &resolver,
            self.validator.as_ref(),
            &self.options,
        );
        for check in &self.checks {
            if let Some(message) = check.evaluate(&ctx)? {
                violations.push(Violation::new(&self.label, check.name(), message));
            }
        }

        Ok(violations)
    }
}

impl fmt::Debug for Contract {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let checks: Vec<String> = self.checks.iter().map(|c| c.name()).collect();
        f.debug_struct("Contract")
            .field("label", &self.label)
            .field("schema", &self.schema)
            .field("checks", &checks)
            .field("key", &self.key)
            .field("options", &self.options)
            .finish()
    }
}

/// A function with contracts attached.
///
/// Calls pass through unchanged apart from validation: arguments and the
/// return value are never altered. In [`Mode::Raise`] a violating call
/// returns [`Error::Contract`] instead of its value; result contracts are
/// checked after the function has run.
pub struct Contracted<F> {
    inner: F,
    contracts: Vec<Contract>,
}

impl<F: Function> Contracted<F> {
    fn new(inner: F) -> Self {
        Self {
            inner,
            contracts: Vec::new(),
        }
    }

    /// Attach another contract to this wrapper.
    ///
    /// A contract attached while the effective mode is [`Mode::Skip`] is
    /// validated but never evaluated, whatever the mode is at call time.
    pub fn with<D: Decorator>(mut self, decorator: D) -> Result<Self, ConfigurationError> {
        let contract = decorator.into_contract(self.inner.signature())?;
        if effective_mode() == Mode::Skip {
            debug!(
                contract = contract.label(),
                "Mode is skip, contract not registered"
            );
        } else {
            self.contracts.push(contract);
        }
        Ok(self)
    }

    /// The undecorated function.
    pub fn original(&self) -> &F {
        &self.inner
    }

    pub fn contracts(&self) -> &[Contract] {
        &self.contracts
    }

    fn check_arguments(
        &self,
        args: &BoundArguments,
    ) -> Result<Vec<Violation>, TargetResolutionError> {
        let mut violations = Vec::new();
        for contract in self.contracts.iter().rev() {
            if let Target::Argument(name) = &contract.target {
                let raw = args.require(name)?;
                violations.extend(contract.evaluate(raw, args)?);
            }
        }
        Ok(violations)
    }

    fn check_result(
        &self,
        output: &Value,
        args: &BoundArguments,
    ) -> Result<Vec<Violation>, TargetResolutionError> {
        let mut violations = Vec::new();
        for contract in self.contracts.iter().filter(|c| c.is_result()) {
            violations.extend(contract.evaluate(output, args)?);
        }
        Ok(violations)
    }
}

impl<F: Function> Function for Contracted<F> {
    fn signature(&self) -> &Signature {
        self.inner.signature()
    }

    fn invoke(&self, args: &BoundArguments) -> Result<Value> {
        let mode = effective_mode();
        if mode.no_handling() || self.contracts.is_empty() {
            return self.inner.invoke(args);
        }

        trace!(
            function = self.signature().name(),
            contracts = self.contracts.len(),
            %mode,
            "Checking contracts"
        );

        let violations = self.check_arguments(args)?;
        report(&violations, mode)?;

        let output = self.inner.invoke(args)?;

        let violations = self.check_result(&output, args)?;
        report(&violations, mode)?;

        Ok(output)
    }
}

impl<F> fmt::Debug for Contracted<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contracted")
            .field("contracts", &self.contracts)
            .finish()
    }
}

struct ContractParts {
    schema: Option<Schema>,
    checks: Vec<CheckRef>,
    key: Key,
    options: ValidateOptions,
    validator: Option<Arc<dyn SchemaValidator>>,
}

impl Default for ContractParts {
    fn default() -> Self {
        Self {
            schema: None,
            checks: Vec::new(),
            key: Key::Identity,
            options: ValidateOptions::default(),
            validator: None,
        }
    }
}

/// Contract on one argument. Built by [`argument`].
pub struct ArgumentContract {
    name: String,
    parts: ContractParts,
}

/// Declare a contract on argument `name`.
pub fn argument(name: impl Into<String>) -> ArgumentContract {
    ArgumentContract {
        name: name.into(),
        parts: ContractParts::default(),
    }
}

impl ArgumentContract {
    pub fn schema(mut self, schema: Schema) -> Self {
        self.parts.schema = Some(schema);
        self
    }

    pub fn check(mut self, check: impl Check + 'static) -> Self {
        self.parts.checks.push(Arc::new(check));
        self
    }

    /// Validate `raw[key]` (or `key(raw)`) instead of the argument itself.
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.parts.key = key.into();
        self
    }

    pub fn validate_options(mut self, options: ValidateOptions) -> Self {
        self.parts.options = options;
        self
    }

    /// Replace the default [`ArrowSchemaValidator`].
    pub fn validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.parts.validator = Some(validator);
        self
    }
}

impl Decorator for ArgumentContract {
    fn into_contract(self, signature: &Signature) -> Result<Contract, ConfigurationError> {
        Contract::build(signature, Target::Argument(self.name), self.parts)
    }
}

/// Shorthand checks of a result contract, appended after explicit checks
/// in a fixed order.
#[derive(Default)]
struct NamedChecks {
    extends: Option<(String, Schema)>,
    same_index_as: Vec<String>,
    same_size_as: Vec<String>,
    is: Option<String>,
    is_not: Vec<String>,
}

impl NamedChecks {
    fn expand(self) -> Vec<BuiltinCheck> {
        let mut expanded = Vec::new();
        if let Some((base, modified)) = self.extends {
            expanded.push(checks::extends(base, modified));
        }
        if !self.same_index_as.is_empty() {
            expanded.push(BuiltinCheck::SameIndexAs(self.same_index_as));
        }
        if !self.same_size_as.is_empty() {
            expanded.push(BuiltinCheck::SameLengthAs(self.same_size_as));
        }
        if let Some(name) = self.is {
            expanded.push(checks::is_(name));
        }
        if !self.is_not.is_empty() {
            expanded.push(BuiltinCheck::IsNot(self.is_not));
        }
        expanded
    }
}

/// Contract on the return value. Built by [`result`].
pub struct ResultContract {
    parts: ContractParts,
    named: NamedChecks,
}

/// Declare a contract on the return value.
pub fn result() -> ResultContract {
    ResultContract {
        parts: ContractParts::default(),
        named: NamedChecks::default(),
    }
}

impl ResultContract {
    pub fn schema(mut self, schema: Schema) -> Self {
        self.parts.schema = Some(schema);
        self
    }

    pub fn check(mut self, check: impl Check + 'static) -> Self {
        self.parts.checks.push(Arc::new(check));
        self
    }

    /// Validate `result[key]` (or `key(result)`) instead of the result itself.
    pub fn key(mut self, key: impl Into<Key>) -> Self {
        self.parts.key = key.into();
        self
    }

    pub fn validate_options(mut self, options: ValidateOptions) -> Self {
        self.parts.options = options;
        self
    }

    /// Replace the default [`ArrowSchemaValidator`].
    pub fn validator(mut self, validator: Arc<dyn SchemaValidator>) -> Self {
        self.parts.validator = Some(validator);
        self
    }

    /// Shorthand for [`checks::extends`].
    pub fn extends(mut self, base: impl Into<String>, modified: Schema) -> Self {
        self.named.extends = Some((base.into(), modified));
        self
    }

    /// Shorthand for [`checks::same_index_as`].
    pub fn same_index_as(mut self, names: impl IntoArgNames) -> Self {
        self.named.same_index_as.extend(names.into_arg_names());
        self
    }

    /// Shorthand for [`checks::same_length_as`].
    pub fn same_size_as(mut self, names: impl IntoArgNames) -> Self {
        self.named.same_size_as.extend(names.into_arg_names());
        self
    }

    /// Shorthand for [`checks::is_`].
    pub fn is_(mut self, name: impl Into<String>) -> Self {
        self.named.is = Some(name.into());
        self
    }

    /// Shorthand for [`checks::is_not`].
    pub fn is_not(mut self, names: impl IntoArgNames) -> Self {
        self.named.is_not.extend(names.into_arg_names());
        self
    }
}

impl Decorator for ResultContract {
    fn into_contract(self, signature: &Signature) -> Result<Contract, ConfigurationError> {
        let mut parts = self.parts;
        parts.checks.extend(
            self.named
                .expand()
                .into_iter()
                .map(|check| Arc::new(check) as CheckRef),
        );
        Contract::build(signature, Target::Result, parts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::same_length_as;
    use crate::frame::Frame;
    use crate::mode::{as_mode, raises};
    use crate::schema::{Column, DataType};
    use arrow::array::{ArrayRef, Int64Array};

    fn df(values: &[i64]) -> Value {
        Frame::from_columns(vec![(
            "a",
            Arc::new(Int64Array::from(values.to_vec())) as ArrayRef,
        )])
        .unwrap()
        .into()
    }

    fn identity() -> FnDef<impl Fn(&BoundArguments) -> anyhow::Result<Value>> {
        FnDef::new(Signature::new("my_fn").param("df").param_with_default("df2", Value::Null), |args| {
            Ok(args.get("df").cloned().unwrap_or_default())
        })
    }

    #[test]
    fn test_unknown_argument() {
        let err = identity()
            .with(argument("nope").check(same_length_as("df2, other")))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "my_fn @argument(\"nope\") requires argument(s) 'nope', 'other' in function signature"
        );

        let err = identity().with(result().is_not("x")).unwrap_err();
        assert!(matches!(err, ConfigurationError::UnknownArgument { .. }));
    }

    #[test]
    fn test_named_checks_follow_explicit_checks() {
        let contract = result()
            .is_not("df")
            .same_size_as("df")
            .check(same_length_as("df2"))
            .into_contract(identity().signature())
            .unwrap();
        let names: Vec<String> = contract.checks.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["same_length_as", "same_length_as", "is_not"]);
    }

    #[test]
    fn test_inactive_checks_dropped() {
        let contract = argument("df")
            .check(checks::is_not(""))
            .into_contract(identity().signature())
            .unwrap();
        assert!(contract.checks.is_empty());
        assert_eq!(contract.label(), "my_fn: Argument df: ");
    }

    #[test]
    fn test_raise_on_argument_skips_call() {
        let _guard = raises();
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let f = FnDef::new(Signature::new("f").param("df"), |_| {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(Value::Null)
        })
        .with(argument("df").schema(Schema::new().column("b", Column::of(DataType::Int64))))
        .unwrap();

        let err = f.call(CallArgs::new().arg(df(&[1]))).unwrap_err();
        assert_eq!(
            err.as_contract().unwrap().to_string(),
            "f: Argument df: schema: column 'b' not in dataframe"
        );
        assert_eq!(calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[test]
    fn test_result_checked_after_call() {
        let _guard = raises();
        let f = identity().with(result().is_not("df")).unwrap();
        let input = df(&[1]);
        let err = f.call(CallArgs::new().arg(input)).unwrap_err();
        assert_eq!(err.to_string(), "my_fn: Output: is_not: is df");
    }

    #[test]
    fn test_skip_at_decoration_is_permanent() {
        let f = {
            let _guard = as_mode(Mode::Skip).unwrap();
            identity().with(result().is_not("df")).unwrap()
        };
        assert!(f.contracts().is_empty());
        let _guard = raises();
        assert!(f.call(CallArgs::new().arg(df(&[1]))).is_ok());
    }

    #[test]
    fn test_function_error_passes_through() {
        let _guard = raises();
        let f = FnDef::new(Signature::new("f").param("df"), |_| Err(anyhow::anyhow!("boom")))
            .with(result().is_not("df"))
            .unwrap();
        let err = f.call(CallArgs::new().arg(df(&[1]))).unwrap_err();
        assert!(matches!(err, Error::Function(_)));
        assert_eq!(err.to_string(), "boom");
    }
}
