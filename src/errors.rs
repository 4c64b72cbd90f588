//! Error handling for the harness.
//!
//! Every failure the harness produces or observes is a [`HarnessError`]. The
//! variants separate the channels the runner cares about:
//!
//! - **Registration**: a test or hook declared outside a suite definition.
//! - **Assertion**: an expectation that did not hold. Converted into a failing
//!   test result by the runner, never propagated past one test.
//! - **Usage**: a matcher or mock applied to a subject it cannot inspect.
//! - **Thrown**: a failure raised by user code or by a mock behavior.
//! - **Panicked**: a panic caught while running a hook or test body.
//! - **Hook**: a before-all/after-all failure. Fatal to the whole run.
//!
//! Use [`err_msg!`](crate::err_msg) for message-only variants:
//! `err_msg!(Usage, "to_contain needs a List or String, got {}", ty)`.

use std::fmt;
use std::panic::Location;

use miette::Diagnostic;
use thiserror::Error;

use crate::Value;

pub type Result<T, E = HarnessError> = std::result::Result<T, E>;

/// The lifecycle point a hook runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    BeforeAll,
    BeforeEach,
    AfterEach,
    AfterAll,
}

impl HookPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookPhase::BeforeAll => "before_all",
            HookPhase::BeforeEach => "before_each",
            HookPhase::AfterEach => "after_each",
            HookPhase::AfterAll => "after_all",
        }
    }
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Payload of a failed expectation.
#[derive(Debug, Clone)]
pub struct AssertionFailure {
    pub message: String,
    pub expected: Value,
    pub actual: Value,
    /// Where the `expect` call that produced this failure was written.
    pub location: &'static Location<'static>,
}

#[derive(Debug, Clone, Error)]
pub enum HarnessError {
    #[error("{message}")]
    Registration { message: String },

    #[error("{}", .0.message)]
    Assertion(Box<AssertionFailure>),

    #[error("Usage error: {message}")]
    Usage { message: String },

    #[error("{message}")]
    Thrown {
        kind: String,
        message: String,
        /// Where the error was constructed, when known.
        location: Option<&'static Location<'static>>,
    },

    #[error("panicked: {message}")]
    Panicked { message: String },

    #[error("{phase} hook failed in suite '{suite}': {source}")]
    Hook {
        phase: HookPhase,
        suite: String,
        #[source]
        source: Box<HarnessError>,
    },
}

impl HarnessError {
    /// A plain user failure with the default `Error` kind.
    #[track_caller]
    pub fn msg(message: impl Into<String>) -> Self {
        HarnessError::typed("Error", message)
    }

    /// A user failure with an explicit kind name, the analog of an error class.
    #[track_caller]
    pub fn typed(kind: impl Into<String>, message: impl Into<String>) -> Self {
        HarnessError::Thrown {
            kind: kind.into(),
            message: message.into(),
            location: Some(Location::caller()),
        }
    }

    /// Wraps any std error as a thrown failure carrying its display text.
    #[track_caller]
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        HarnessError::msg(err.to_string())
    }

    /// Fills in the location of a thrown failure that has none.
    pub fn located_at(mut self, at: &'static Location<'static>) -> Self {
        if let HarnessError::Thrown { location, .. } = &mut self {
            location.get_or_insert(at);
        }
        self
    }

    /// Converts a caught panic payload into a failure.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        HarnessError::Panicked { message }
    }

    pub fn is_assertion(&self) -> bool {
        matches!(self, HarnessError::Assertion(_))
    }

    pub fn is_usage(&self) -> bool {
        matches!(self, HarnessError::Usage { .. })
    }

    /// The human-readable message without variant prefixes.
    pub fn message(&self) -> String {
        match self {
            HarnessError::Registration { message }
            | HarnessError::Usage { message }
            | HarnessError::Thrown { message, .. }
            | HarnessError::Panicked { message } => message.clone(),
            HarnessError::Assertion(failure) => failure.message.clone(),
            HarnessError::Hook { .. } => self.to_string(),
        }
    }

    /// The runtime kind of this failure, compared by `to_throw_matching`.
    pub fn kind_name(&self) -> &str {
        match self {
            HarnessError::Registration { .. } => "RegistrationError",
            HarnessError::Assertion(_) => "AssertionError",
            HarnessError::Usage { .. } => "UsageError",
            HarnessError::Thrown { kind, .. } => kind,
            HarnessError::Panicked { .. } => "Panic",
            HarnessError::Hook { .. } => "HookError",
        }
    }

    /// Trace lines for reports: the origin of the failure, outermost first.
    pub fn trace(&self) -> Vec<String> {
        match self {
            HarnessError::Assertion(failure) => vec![format!("at {}", failure.location)],
            HarnessError::Thrown {
                location: Some(location),
                ..
            } => vec![format!("at {}", location)],
            HarnessError::Hook {
                phase,
                suite,
                source,
            } => {
                let mut lines = vec![format!("in {} of '{}'", phase, suite)];
                lines.extend(source.trace());
                lines
            }
            _ => Vec::new(),
        }
    }
}

impl Diagnostic for HarnessError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let code = match self {
            HarnessError::Registration { .. } => "harness::registration",
            HarnessError::Assertion(_) => "harness::assertion",
            HarnessError::Usage { .. } => "harness::usage",
            HarnessError::Thrown { .. } => "harness::thrown",
            HarnessError::Panicked { .. } => "harness::panicked",
            HarnessError::Hook { .. } => "harness::hook",
        };
        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match self {
            HarnessError::Registration { .. } => {
                "declare tests and hooks inside the body passed to describe()"
            }
            HarnessError::Usage { .. } => {
                "check that the matcher fits the expect_* entry point used"
            }
            HarnessError::Hook { .. } => "before_all/after_all failures abort the whole run",
            _ => return None,
        };
        Some(Box::new(help))
    }
}

// `Into::into` does not forward the caller, so conversions leave the location
// empty for `located_at` to fill.
impl From<&str> for HarnessError {
    fn from(message: &str) -> Self {
        HarnessError::from(message.to_string())
    }
}

impl From<String> for HarnessError {
    fn from(message: String) -> Self {
        HarnessError::Thrown {
            kind: "Error".to_string(),
            message,
            location: None,
        }
    }
}

/// Constructs a message-only `HarnessError` variant with a formatted message.
///
/// ```rust
/// use mcp_harness::{err_msg, HarnessError};
/// let err: HarnessError = err_msg!(Usage, "bad subject {}", 3);
/// assert!(err.is_usage());
/// ```
#[macro_export]
macro_rules! err_msg {
    ($variant:ident, $($arg:tt)+) => {
        $crate::HarnessError::$variant {
            message: format!($($arg)+),
        }
    };
}
