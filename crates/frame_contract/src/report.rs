//! Dispatching violations according to the mode.

use crate::error::AggregateContractError;
use crate::mode::Mode;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, error, info, trace, warn};

/// One failed schema rule or check for one call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    /// Contract identity, e.g. `"my_fn: Argument df: "`.
    pub source: String,
    /// Name of the failed check, or `"schema"`.
    pub check: String,
    pub message: String,
}

impl Violation {
    pub fn new(
        source: impl Into<String>,
        check: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            check: check.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}: {}", self.source, self.check, self.message)
    }
}

/// Act on the violations of one call.
///
/// Nothing happens for an empty list. `Skip` and `Silent` drop everything,
/// log modes emit one event per violation, and `Raise` returns all of them
/// as a single error.
pub fn report(violations: &[Violation], mode: Mode) -> Result<(), AggregateContractError> {
    if violations.is_empty() || mode.no_handling() {
        return Ok(());
    }
    if mode == Mode::Raise {
        return Err(AggregateContractError::new(violations.to_vec()));
    }

    for v in violations {
        let contract = v.source.trim_end_matches([':', ' ']);
        match mode {
            Mode::Trace => trace!(contract, check = %v.check, "{}", v),
            Mode::Debug => debug!(contract, check = %v.check, "{}", v),
            Mode::Info => info!(contract, check = %v.check, "{}", v),
            Mode::Warn => warn!(contract, check = %v.check, "{}", v),
            Mode::Error => error!(contract, check = %v.check, "{}", v),
            Mode::Critical => error!(contract, check = %v.check, critical = true, "{}", v),
            Mode::Skip | Mode::Silent | Mode::Raise => {}
        }
    }
    Ok(())
}
