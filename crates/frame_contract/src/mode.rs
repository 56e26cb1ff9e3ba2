//! Severity modes.
//!
//! The effective mode is the innermost scoped override on the current thread,
//! falling back to the process-wide mode. The process-wide mode is read from
//! `FRAME_CONTRACT_MODE` on first access and may be changed with [`set_mode`].
//! Scoped overrides ([`as_mode`], [`raises`], [`silent`], [`with_mode`]) live
//! on a thread-local stack and are popped when their guard drops, including
//! during unwinding.

use crate::error::ConfigurationError;
use serde::{Deserialize, Serialize};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::OnceLock;
use tracing::{debug, warn};

/// Environment variable holding the initial process-wide mode.
pub const FRAME_CONTRACT_MODE_ENV: &str = "FRAME_CONTRACT_MODE";

/// What happens to contract violations, in increasing severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Mode {
    /// Contracts are not evaluated at all.
    Skip = 0,
    /// Contracts are evaluated, violations are dropped.
    Silent = 1,
    Trace = 2,
    Debug = 3,
    Info = 4,
    Warn = 5,
    Error = 6,
    /// Logged at error level, tagged `critical`.
    Critical = 7,
    /// Violations are returned as an [`AggregateContractError`](crate::error::AggregateContractError).
    Raise = 8,
}

impl Mode {
    pub const ALL: [Mode; 9] = [
        Mode::Skip,
        Mode::Silent,
        Mode::Trace,
        Mode::Debug,
        Mode::Info,
        Mode::Warn,
        Mode::Error,
        Mode::Critical,
        Mode::Raise,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Skip => "skip",
            Mode::Silent => "silent",
            Mode::Trace => "trace",
            Mode::Debug => "debug",
            Mode::Info => "info",
            Mode::Warn => "warn",
            Mode::Error => "error",
            Mode::Critical => "critical",
            Mode::Raise => "raise",
        }
    }

    /// Violations are dropped without any output.
    pub fn no_handling(&self) -> bool {
        matches!(self, Mode::Skip | Mode::Silent)
    }

    fn from_u8(raw: u8) -> Mode {
        Mode::ALL
            .get(raw as usize)
            .copied()
            .unwrap_or(Mode::Silent)
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ConfigurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        if lower == "warning" {
            return Ok(Mode::Warn);
        }
        Mode::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == lower)
            .ok_or_else(|| ConfigurationError::InvalidMode(s.to_string()))
    }
}

/// Anything that names a mode: a [`Mode`] or its name.
pub trait IntoMode {
    fn into_mode(self) -> Result<Mode, ConfigurationError>;
}

impl IntoMode for Mode {
    fn into_mode(self) -> Result<Mode, ConfigurationError> {
        Ok(self)
    }
}

impl IntoMode for &str {
    fn into_mode(self) -> Result<Mode, ConfigurationError> {
        self.parse()
    }
}

impl IntoMode for String {
    fn into_mode(self) -> Result<Mode, ConfigurationError> {
        self.parse()
    }
}

impl IntoMode for &String {
    fn into_mode(self) -> Result<Mode, ConfigurationError> {
        self.parse()
    }
}

static GLOBAL_MODE: OnceLock<AtomicU8> = OnceLock::new();

/// One scoped override. `token` is set for guard-owned entries and `None`
/// for bare [`push_context`] calls.
#[derive(Debug, Clone, Copy)]
struct ContextEntry {
    mode: Mode,
    token: Option<u64>,
}

thread_local! {
    static CONTEXT_MODES: RefCell<Vec<ContextEntry>> = const { RefCell::new(Vec::new()) };
    static NEXT_TOKEN: Cell<u64> = const { Cell::new(0) };
}

fn global() -> &'static AtomicU8 {
    GLOBAL_MODE.get_or_init(|| {
        let raw = std::env::var(FRAME_CONTRACT_MODE_ENV).ok();
        AtomicU8::new(parse_env_mode(raw.as_deref()) as u8)
    })
}

/// Initial mode for an environment value. Never fails: unset or unknown
/// values fall back to [`Mode::Silent`].
pub(crate) fn parse_env_mode(raw: Option<&str>) -> Mode {
    match raw {
        None => {
            debug!("{} not set, using mode {}", FRAME_CONTRACT_MODE_ENV, Mode::Silent);
            Mode::Silent
        }
        Some(value) => match value.parse::<Mode>() {
            Ok(mode) => {
                debug!("Mode {} from {}", mode, FRAME_CONTRACT_MODE_ENV);
                mode
            }
            Err(_) => {
                warn!(
                    value,
                    "Invalid {} value, falling back to {}",
                    FRAME_CONTRACT_MODE_ENV,
                    Mode::Silent
                );
                Mode::Silent
            }
        },
    }
}

/// Set the process-wide mode. Visible to every thread immediately; scoped
/// overrides still take precedence on threads that hold them.
///
/// Returns the previous process-wide mode.
pub fn set_mode(mode: impl IntoMode) -> Result<Mode, ConfigurationError> {
    let mode = mode.into_mode()?;
    let previous = global().swap(mode as u8, Ordering::Relaxed);
    Ok(Mode::from_u8(previous))
}

/// The process-wide mode, ignoring scoped overrides.
pub fn global_mode() -> Mode {
    Mode::from_u8(global().load(Ordering::Relaxed))
}

/// The mode in force on this thread.
pub fn effective_mode() -> Mode {
    CONTEXT_MODES
        .with(|stack| stack.borrow().last().map(|entry| entry.mode))
        .unwrap_or_else(global_mode)
}

/// Alias of [`effective_mode`].
pub fn get_mode() -> Mode {
    effective_mode()
}

/// Push a scoped override onto this thread's stack.
///
/// Prefer [`as_mode`]; a bare push must be matched by [`pop_context`].
pub fn push_context(mode: impl IntoMode) -> Result<(), ConfigurationError> {
    let mode = mode.into_mode()?;
    CONTEXT_MODES.with(|stack| stack.borrow_mut().push(ContextEntry { mode, token: None }));
    Ok(())
}

/// Pop the innermost scoped override, if any.
pub fn pop_context() -> Option<Mode> {
    CONTEXT_MODES.with(|stack| stack.borrow_mut().pop().map(|entry| entry.mode))
}

#[cfg(test)]
fn context_depth() -> usize {
    CONTEXT_MODES.with(|stack| stack.borrow().len())
}

fn push_guarded(mode: Mode) -> ModeGuard {
    let token = NEXT_TOKEN.with(|next| {
        let token = next.get();
        next.set(token.wrapping_add(1));
        token
    });
    CONTEXT_MODES.with(|stack| {
        stack.borrow_mut().push(ContextEntry {
            mode,
            token: Some(token),
        })
    });
    ModeGuard {
        token,
        mode,
        _not_send: PhantomData,
    }
}

/// Restores this thread's override stack when dropped.
///
/// Not `Send`: the stack it guards belongs to the creating thread.
#[must_use = "the override is popped as soon as the guard is dropped"]
pub struct ModeGuard {
    token: u64,
    mode: Mode,
    _not_send: PhantomData<*const ()>,
}

impl ModeGuard {
    pub fn mode(&self) -> Mode {
        self.mode
    }
}

impl fmt::Debug for ModeGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModeGuard")
            .field("token", &self.token)
            .field("mode", &self.mode)
            .finish()
    }
}

impl Drop for ModeGuard {
    fn drop(&mut self) {
        let _ = CONTEXT_MODES.try_with(|stack| {
            let mut stack = stack.borrow_mut();
            let Some(pos) = stack
                .iter()
                .rposition(|entry| entry.token == Some(self.token))
            else {
                return;
            };
            // Bare pushes above the innermost guard belong to its scope.
            if stack[pos + 1..].iter().all(|entry| entry.token.is_none()) {
                stack.truncate(pos);
            } else {
                stack.remove(pos);
            }
        });
    }
}

/// Override the mode on this thread until the guard is dropped.
pub fn as_mode(mode: impl IntoMode) -> Result<ModeGuard, ConfigurationError> {
    let mode = mode.into_mode()?;
    Ok(push_guarded(mode))
}

/// Scoped [`Mode::Raise`].
pub fn raises() -> ModeGuard {
    push_guarded(Mode::Raise)
}

/// Scoped [`Mode::Silent`].
pub fn silent() -> ModeGuard {
    push_guarded(Mode::Silent)
}

/// Run `f` with `mode` in force on this thread.
pub fn with_mode<T>(mode: impl IntoMode, f: impl FnOnce() -> T) -> Result<T, ConfigurationError> {
    let _guard = as_mode(mode)?;
    Ok(f())
}
