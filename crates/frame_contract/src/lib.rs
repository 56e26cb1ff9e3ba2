//! Call-time contracts for functions over tables.
//!
//! A function declares what its table arguments and its result look like
//! (columns, types, nullability) and how they relate to each other (the
//! result extends an input, keeps its index, is or is not the same object).
//! Contracts are checked on every call; the [`Mode`] decides whether
//! violations are dropped, logged or returned as an error.
//!
//! # Modules
//!
//! - [`mode`]: process-wide and scoped severity modes
//! - [`report`]: [`Violation`] and mode-dependent dispatch
//! - [`checks`]: the [`Check`] trait and built-in checks
//! - [`signature`] / [`key`]: binding calls and unwrapping the validated value
//! - [`schema`] / [`resolver`]: schemas with [`from_arg`] placeholders
//! - [`validate`]: the schema validation collaborator
//! - [`contract`]: [`argument`] / [`result`] and the wrapper they build
//! - [`frame`] / [`value`]: Arrow-backed tables and dynamic values

pub mod checks;
pub mod contract;
pub mod error;
pub mod frame;
pub mod key;
pub mod mode;
pub mod report;
pub mod resolver;
pub mod schema;
pub mod signature;
pub mod validate;
pub mod value;

pub use checks::{BuiltinCheck, Check, CheckContext, CheckRef, RESULT_ARGUMENT};
pub use contract::{
    argument, result, ArgumentContract, Contract, Contracted, Decorator, FnDef, Function,
    FunctionExt, ResultContract,
};
pub use error::{
    AggregateContractError, ConfigurationError, Error, LookupError, Result, TargetResolutionError,
};
pub use frame::Frame;
pub use key::Key;
pub use mode::{
    as_mode, effective_mode, get_mode, global_mode, pop_context, push_context, raises, set_mode,
    silent, with_mode, Mode, ModeGuard, FRAME_CONTRACT_MODE_ENV,
};
pub use report::{report, Violation};
pub use schema::{from_arg, Column, ColumnKey, DataType, ResolvedSchema, Schema};
pub use signature::{BoundArguments, CallArgs, Signature};
pub use validate::{ArrowSchemaValidator, SchemaFailure, SchemaValidator, ValidateOptions};
pub use value::Value;
