//! Error taxonomy.
//!
//! - [`ConfigurationError`]: a malformed contract, raised while decorating.
//! - [`TargetResolutionError`]: the call cannot be mapped onto the contract.
//! - [`AggregateContractError`]: every violation of one call, raised only in
//!   [`Mode::Raise`](crate::mode::Mode::Raise).
//!
//! Individual violations are never errors on their own; see
//! [`Violation`](crate::report::Violation).

use crate::report::Violation;
use thiserror::Error;

/// Errors in how a contract was declared. Never downgraded by the mode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    #[error("{function} {contract} requires argument(s) {} in function signature", quoted(.arguments))]
    UnknownArgument {
        function: String,
        contract: String,
        arguments: Vec<String>,
    },

    #[error("Invalid mode: '{0}'. Expected one of: skip, silent, trace, debug, info, warn, error, critical, raise")]
    InvalidMode(String),

    #[error("Invalid signature for {function}: {reason}")]
    InvalidSignature { function: String, reason: String },

    #[error("Invalid schema definition: {0}")]
    InvalidSchema(String),
}

/// Failure to look up a value inside an argument or result.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("no entry named '{0}'")]
    MissingName(String),

    #[error("index {index} out of range for length {len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("cannot subscript a {kind} value")]
    NotSubscriptable { kind: &'static str },

    #[error(transparent)]
    Custom(#[from] anyhow::Error),
}

/// The declared target of a contract could not be resolved for this call.
#[derive(Debug, Error)]
pub enum TargetResolutionError {
    #[error("{function}: cannot bind call arguments: {reason}")]
    Binding { function: String, reason: String },

    #[error("{function}: argument '{argument}' is not bound")]
    MissingArgument { function: String, argument: String },

    #[error("{contract}key lookup failed: {source}")]
    Key {
        contract: String,
        #[source]
        source: LookupError,
    },

    #[error("{function}: placeholder argument '{argument}' must be a string or a list of strings, got {got}")]
    Placeholder {
        function: String,
        argument: String,
        got: &'static str,
    },
}

/// All violations of a single call, raised as one error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", render(.violations))]
pub struct AggregateContractError {
    violations: Vec<Violation>,
}

impl AggregateContractError {
    pub fn new(violations: Vec<Violation>) -> Self {
        Self { violations }
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn into_violations(self) -> Vec<Violation> {
        self.violations
    }
}

/// Umbrella error returned by contracted functions.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    #[error(transparent)]
    TargetResolution(#[from] TargetResolutionError),

    #[error(transparent)]
    Contract(#[from] AggregateContractError),

    /// The wrapped function itself failed; passed through untouched.
    #[error(transparent)]
    Function(anyhow::Error),
}

impl Error {
    /// The aggregate contract error, if this is one.
    pub fn as_contract(&self) -> Option<&AggregateContractError> {
        match self {
            Error::Contract(err) => Some(err),
            _ => None,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

fn quoted(names: &[String]) -> String {
    names
        .iter()
        .map(|n| format!("'{}'", n))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
