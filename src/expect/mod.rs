//! Chained matchers over a captured subject.
//!
//! ```rust
//! use mcp_harness::{expect, Value};
//! expect(2 + 2).to_be(4).unwrap();
//! expect(5).not().to_be(6).unwrap();
//! assert!(expect(2 + 2).to_be(5).is_err());
//! ```
//!
//! Each matcher returns `Ok(())` when the expectation holds and
//! [`HarnessError::Assertion`] when it does not, so test bodies chain them
//! with `?`. A matcher applied to a subject it cannot inspect (a call count on
//! a plain value, a substring check on a number) returns
//! [`HarnessError::Usage`] instead.

mod format;
mod record;

pub use record::AssertionRecord;
pub(crate) use record::{begin as begin_recording, finish as finish_recording};

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe, Location};
use std::rc::Rc;

use futures_util::future::{FutureExt, LocalBoxFuture};
use regex::Regex;

use crate::errors::AssertionFailure;
use crate::mock::Mock;
use crate::{err_msg, HarnessError, Result, Value};

use format::{args_list, plural, structural_diff};

pub type Callable = Rc<dyn Fn() -> Result<Value>>;

/// What an expectation was taken on.
pub enum Subject {
    Value(Value),
    Callable(Callable),
    Pending(LocalBoxFuture<'static, Result<Value>>),
    Recorder(Mock),
}

impl Subject {
    pub fn type_name(&self) -> &'static str {
        match self {
            Subject::Value(v) => v.type_name(),
            Subject::Callable(_) => "Callable",
            Subject::Pending(_) => "Pending",
            Subject::Recorder(_) => "Mock",
        }
    }
}

impl fmt::Debug for Subject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Value(v) => f.debug_tuple("Value").field(v).finish(),
            Subject::Recorder(m) => f.debug_tuple("Recorder").field(m).finish(),
            Subject::Callable(_) => f.write_str("Callable(..)"),
            Subject::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

/// How a raised error is matched by `to_throw_matching` and `rejects_with`.
#[derive(Debug, Clone)]
pub enum ErrorPattern {
    Substring(String),
    Regex(Regex),
    /// The error's [`kind_name`](HarnessError::kind_name) must equal this.
    Kind(String),
}

impl ErrorPattern {
    pub fn kind(name: impl Into<String>) -> Self {
        ErrorPattern::Kind(name.into())
    }

    pub fn matches(&self, err: &HarnessError) -> bool {
        match self {
            ErrorPattern::Substring(s) => err.message().contains(s.as_str()),
            ErrorPattern::Regex(re) => re.is_match(&err.message()),
            ErrorPattern::Kind(kind) => err.kind_name() == kind,
        }
    }

    fn describe(&self) -> String {
        match self {
            ErrorPattern::Substring(s) => format!("containing {:?}", s),
            ErrorPattern::Regex(re) => format!("matching /{}/", re.as_str()),
            ErrorPattern::Kind(kind) => format!("of kind {}", kind),
        }
    }
}

impl From<&str> for ErrorPattern {
    fn from(s: &str) -> Self {
        ErrorPattern::Substring(s.to_string())
    }
}

impl From<String> for ErrorPattern {
    fn from(s: String) -> Self {
        ErrorPattern::Substring(s)
    }
}

impl From<Regex> for ErrorPattern {
    fn from(re: Regex) -> Self {
        ErrorPattern::Regex(re)
    }
}

/// Matches errors of the same kind as the given instance.
impl From<HarnessError> for ErrorPattern {
    fn from(err: HarnessError) -> Self {
        ErrorPattern::Kind(err.kind_name().to_string())
    }
}

/// A captured subject plus the polarity of the matchers applied to it.
#[derive(Debug)]
pub struct Expectation {
    subject: Subject,
    negated: bool,
    location: &'static Location<'static>,
}

fn into_value<T: Into<Value>>(v: T) -> Value {
    v.into()
}

#[track_caller]
pub fn expect(value: impl Into<Value>) -> Expectation {
    Expectation::new(Subject::Value(value.into()), Location::caller())
}

/// Expectation over a zero-argument callable, for `to_throw`.
#[track_caller]
pub fn expect_fn<F, T>(f: F) -> Expectation
where
    F: Fn() -> Result<T> + 'static,
    T: Into<Value>,
{
    let callable: Callable = Rc::new(move || f().map(into_value));
    Expectation::new(Subject::Callable(callable), Location::caller())
}

/// Expectation over a pending value, for `resolves` and `rejects`.
#[track_caller]
pub fn expect_future<Fut, T>(fut: Fut) -> Expectation
where
    Fut: Future<Output = Result<T>> + 'static,
    T: Into<Value>,
{
    let pending = fut.map(|r| r.map(into_value)).boxed_local();
    Expectation::new(Subject::Pending(pending), Location::caller())
}

/// Expectation over a call recorder, for the `to_have_been_called*` matchers.
#[track_caller]
pub fn expect_mock(mock: &Mock) -> Expectation {
    Expectation::new(Subject::Recorder(mock.clone()), Location::caller())
}

impl Expectation {
    pub fn new(subject: Subject, location: &'static Location<'static>) -> Self {
        Expectation {
            subject,
            negated: false,
            location,
        }
    }

    pub fn subject(&self) -> &Subject {
        &self.subject
    }

    pub fn is_negated(&self) -> bool {
        self.negated
    }

    /// Inverts every matcher applied after this call.
    #[allow(clippy::should_implement_trait)]
    pub fn not(mut self) -> Self {
        self.negated = !self.negated;
        self
    }

    // ------------------------------------------------------------------------
    // Equality and presence
    // ------------------------------------------------------------------------

    pub fn to_be(&self, expected: impl Into<Value>) -> Result<()> {
        let actual = self.value("to_be")?;
        let expected = expected.into();
        let message = format!("Expected {} {}to be {}", actual, self.not_str(), expected);
        self.check("to_be", actual.same_value(&expected), expected, actual.clone(), message)
    }

    pub fn to_equal(&self, expected: impl Into<Value>) -> Result<()> {
        let actual = self.value("to_equal")?;
        let expected = expected.into();
        let mut message = format!("Expected {} {}to equal {}", actual, self.not_str(), expected);
        if let Some(diff) = structural_diff(&expected, actual) {
            message.push_str(&diff);
        }
        self.check("to_equal", actual.deep_equal(&expected), expected, actual.clone(), message)
    }

    pub fn to_be_null(&self) -> Result<()> {
        let actual = self.value("to_be_null")?;
        let message = format!("Expected {} {}to be null", actual, self.not_str());
        self.check("to_be_null", actual.is_null(), Value::Null, actual.clone(), message)
    }

    pub fn to_be_undefined(&self) -> Result<()> {
        let actual = self.value("to_be_undefined")?;
        let message = format!("Expected {} {}to be undefined", actual, self.not_str());
        self.check(
            "to_be_undefined",
            actual.is_undefined(),
            Value::Undefined,
            actual.clone(),
            message,
        )
    }

    pub fn to_be_defined(&self) -> Result<()> {
        let actual = self.value("to_be_defined")?;
        let message = format!("Expected {} {}to be defined", actual, self.not_str());
        self.check(
            "to_be_defined",
            !actual.is_undefined(),
            Value::Undefined,
            actual.clone(),
            message,
        )
    }

    pub fn to_be_truthy(&self) -> Result<()> {
        let actual = self.value("to_be_truthy")?;
        let message = format!("Expected {} {}to be truthy", actual, self.not_str());
        self.check("to_be_truthy", actual.is_truthy(), Value::Bool(true), actual.clone(), message)
    }

    pub fn to_be_falsy(&self) -> Result<()> {
        let actual = self.value("to_be_falsy")?;
        let message = format!("Expected {} {}to be falsy", actual, self.not_str());
        self.check("to_be_falsy", !actual.is_truthy(), Value::Bool(false), actual.clone(), message)
    }

    // ------------------------------------------------------------------------
    // Collections and strings
    // ------------------------------------------------------------------------

    /// List membership by identity, or substring containment for strings.
    pub fn to_contain(&self, item: impl Into<Value>) -> Result<()> {
        let actual = self.value("to_contain")?;
        let item = item.into();
        let pass = match (actual, &item) {
            (Value::List(items), _) => items.iter().any(|v| v.same_value(&item)),
            (Value::String(s), Value::String(needle)) => s.contains(needle.as_str()),
            (Value::String(_), other) => {
                return Err(err_msg!(
                    Usage,
                    "to_contain on a String needs a String item, got {}",
                    other.type_name()
                ))
            }
            (other, _) => {
                return Err(err_msg!(
                    Usage,
                    "to_contain expects a List or String subject, got {}",
                    other.type_name()
                ))
            }
        };
        let message = format!("Expected {} {}to contain {}", actual, self.not_str(), item);
        self.check("to_contain", pass, item, actual.clone(), message)
    }

    pub fn to_have_length(&self, expected: usize) -> Result<()> {
        let actual = self.value("to_have_length")?;
        let length = actual.length();
        let got = length.map_or(Value::Undefined, Value::Number);
        let message = format!(
            "Expected {} {}to have length {}, but its length is {}",
            actual,
            self.not_str(),
            expected,
            got
        );
        let pass = length == Some(expected as f64);
        self.check("to_have_length", pass, Value::from(expected), got, message)
    }

    pub fn to_match(&self, pattern: &str) -> Result<()> {
        let actual = self.value("to_match")?;
        let re = Regex::new(pattern)
            .map_err(|e| err_msg!(Usage, "to_match got an invalid pattern: {}", e))?;
        let Some(s) = actual.as_str() else {
            return Err(err_msg!(
                Usage,
                "to_match expects a String subject, got {}",
                actual.type_name()
            ));
        };
        let message = format!("Expected {} {}to match /{}/", actual, self.not_str(), pattern);
        self.check("to_match", re.is_match(s), Value::from(pattern), actual.clone(), message)
    }

    /// Partial structural match: every key of `pattern` must be present in the
    /// subject with a deep-equal value. Extra subject keys are ignored.
    pub fn to_match_object(&self, pattern: impl Into<Value>) -> Result<()> {
        let actual = self.value("to_match_object")?;
        let pattern = pattern.into();
        let Some(wanted) = pattern.as_map() else {
            return Err(err_msg!(
                Usage,
                "to_match_object expects a Map pattern, got {}",
                pattern.type_name()
            ));
        };
        let pass = actual.as_map().is_some_and(|have| {
            wanted
                .iter()
                .all(|(k, v)| have.get(k).is_some_and(|w| w.deep_equal(v)))
        });
        let mut message = format!(
            "Expected {} {}to match object {}",
            actual,
            self.not_str(),
            pattern
        );
        if let Some(diff) = structural_diff(&pattern, actual) {
            message.push_str(&diff);
        }
        self.check("to_match_object", pass, pattern, actual.clone(), message)
    }

    // ------------------------------------------------------------------------
    // Numbers
    // ------------------------------------------------------------------------

    pub fn to_be_greater_than(&self, bound: f64) -> Result<()> {
        let n = self.number("to_be_greater_than")?;
        let message = format!(
            "Expected {} {}to be greater than {}",
            Value::Number(n),
            self.not_str(),
            Value::Number(bound)
        );
        self.check("to_be_greater_than", n > bound, Value::Number(bound), Value::Number(n), message)
    }

    pub fn to_be_less_than(&self, bound: f64) -> Result<()> {
        let n = self.number("to_be_less_than")?;
        let message = format!(
            "Expected {} {}to be less than {}",
            Value::Number(n),
            self.not_str(),
            Value::Number(bound)
        );
        self.check("to_be_less_than", n < bound, Value::Number(bound), Value::Number(n), message)
    }

    // ------------------------------------------------------------------------
    // Callables
    // ------------------------------------------------------------------------

    pub fn to_throw(&self) -> Result<()> {
        self.throw_check("to_throw", None)
    }

    /// Like [`to_throw`](Self::to_throw), with the raised error checked
    /// against a substring, a regex, or the kind of an error instance.
    pub fn to_throw_matching(&self, pattern: impl Into<ErrorPattern>) -> Result<()> {
        self.throw_check("to_throw_matching", Some(pattern.into()))
    }

    fn throw_check(&self, matcher: &'static str, pattern: Option<ErrorPattern>) -> Result<()> {
        let Subject::Callable(f) = &self.subject else {
            return Err(self.wrong_subject(matcher, "a callable (use expect_fn)"));
        };
        let raised = match panic::catch_unwind(AssertUnwindSafe(|| f())) {
            Ok(Ok(_)) => None,
            Ok(Err(err)) => Some(err),
            Err(payload) => Some(HarnessError::from_panic(payload)),
        };
        self.raised_check(matcher, "function", "throw", raised, pattern)
    }

    // ------------------------------------------------------------------------
    // Pending values
    // ------------------------------------------------------------------------

    /// Awaits a pending subject and continues with its resolved value.
    ///
    /// A failure of the pending value itself is returned unchanged.
    pub async fn resolves(self) -> Result<Expectation> {
        let Expectation {
            subject,
            negated,
            location,
        } = self;
        match subject {
            Subject::Pending(pending) => Ok(Expectation {
                subject: Subject::Value(pending.await?),
                negated,
                location,
            }),
            other => Err(Self::not_pending("resolves", other, location)),
        }
    }

    /// Awaits a pending subject and expects it to fail.
    pub async fn rejects(self) -> Result<()> {
        self.settle_rejection("rejects", None).await
    }

    /// Awaits a pending subject and expects it to fail with a matching error.
    pub async fn rejects_with(self, pattern: impl Into<ErrorPattern>) -> Result<()> {
        self.settle_rejection("rejects_with", Some(pattern.into())).await
    }

    async fn settle_rejection(
        mut self,
        matcher: &'static str,
        pattern: Option<ErrorPattern>,
    ) -> Result<()> {
        let subject = std::mem::replace(&mut self.subject, Subject::Value(Value::Undefined));
        let pending = match subject {
            Subject::Pending(pending) => pending,
            other => return Err(Self::not_pending(matcher, other, self.location)),
        };
        let raised = pending.await.err();
        self.raised_check(matcher, "promise", "reject", raised, pattern)
    }

    // ------------------------------------------------------------------------
    // Call recorders
    // ------------------------------------------------------------------------

    pub fn to_have_been_called(&self) -> Result<()> {
        let mock = self.recorder("to_have_been_called")?;
        let count = mock.call_count();
        let message = format!(
            "Expected mock '{}' {}to have been called, but it was called {}",
            mock.name(),
            self.not_str(),
            plural(count, "time")
        );
        self.check("to_have_been_called", count > 0, Value::Bool(true), Value::from(count), message)
    }

    pub fn to_have_been_called_times(&self, expected: usize) -> Result<()> {
        let mock = self.recorder("to_have_been_called_times")?;
        let count = mock.call_count();
        let message = format!(
            "Expected mock '{}' {}to have been called {}, but it was called {}",
            mock.name(),
            self.not_str(),
            plural(expected, "time"),
            plural(count, "time")
        );
        self.check(
            "to_have_been_called_times",
            count == expected,
            Value::from(expected),
            Value::from(count),
            message,
        )
    }

    /// Passes when some recorded call had exactly these arguments, each
    /// compared structurally.
    pub fn to_have_been_called_with<I, T>(&self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        let mock = self.recorder("to_have_been_called_with")?;
        let expected: Vec<Value> = args.into_iter().map(Into::into).collect();
        let calls = mock.calls();
        let pass = calls.iter().any(|call| {
            call.args.len() == expected.len()
                && call.args.iter().zip(&expected).all(|(a, e)| a.deep_equal(e))
        });

        let mut message = format!(
            "Expected mock '{}' {}to have been called with {}",
            mock.name(),
            self.not_str(),
            args_list(&expected)
        );
        if calls.is_empty() {
            message.push_str(", but it was never called");
        } else {
            message.push_str("\nReceived calls:");
            for call in &calls {
                message.push_str("\n  ");
                message.push_str(&args_list(&call.args));
            }
        }
        let received: Value = calls.iter().map(|c| Value::list(c.args.clone())).collect();
        self.check(
            "to_have_been_called_with",
            pass,
            Value::list(expected),
            received,
            message,
        )
    }

    // ------------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------------

    fn not_str(&self) -> &'static str {
        if self.negated {
            "not "
        } else {
            ""
        }
    }

    /// Applies polarity, logs the evaluation, and builds the failure.
    fn check(
        &self,
        matcher: &'static str,
        pass: bool,
        expected: Value,
        actual: Value,
        message: String,
    ) -> Result<()> {
        let holds = pass != self.negated;
        record::push(AssertionRecord {
            matcher,
            passed: holds,
            message: message.clone(),
        });
        if holds {
            return Ok(());
        }
        Err(HarnessError::Assertion(Box::new(AssertionFailure {
            message,
            expected,
            actual,
            location: self.location,
        })))
    }

    /// Shared tail of `to_throw*` and `rejects*`.
    fn raised_check(
        &self,
        matcher: &'static str,
        noun: &str,
        verb: &str,
        raised: Option<HarnessError>,
        pattern: Option<ErrorPattern>,
    ) -> Result<()> {
        let matched = raised
            .as_ref()
            .is_some_and(|err| pattern.as_ref().map_or(true, |p| p.matches(err)));
        let wanted = pattern
            .as_ref()
            .map(|p| format!(" an error {}", p.describe()))
            .unwrap_or_default();
        let message = match (&raised, self.negated) {
            (None, false) if verb == "reject" => {
                "Expected promise to reject, but it resolved".to_string()
            }
            (None, false) => format!("Expected {} to {}{}, but it did not", noun, verb, wanted),
            (Some(err), false) => format!(
                "Expected {} to {}{}, but it raised {}: {}",
                noun,
                verb,
                wanted,
                err.kind_name(),
                err.message()
            ),
            (Some(err), true) => format!(
                "Expected {} not to {}{}, but it raised {}: {}",
                noun,
                verb,
                wanted,
                err.kind_name(),
                err.message()
            ),
            (None, true) => format!("Expected {} not to {}{}", noun, verb, wanted),
        };
        let expected = pattern.map_or(Value::Undefined, |p| Value::from(p.describe()));
        let actual = raised.map_or(Value::Undefined, |e| Value::from(e.message()));
        self.check(matcher, matched, expected, actual, message)
    }

    fn value(&self, matcher: &str) -> Result<&Value> {
        match &self.subject {
            Subject::Value(v) => Ok(v),
            _ => Err(self.wrong_subject(matcher, "a value (use expect)")),
        }
    }

    fn number(&self, matcher: &str) -> Result<f64> {
        let v = self.value(matcher)?;
        v.as_number().ok_or_else(|| {
            err_msg!(Usage, "{} expects a Number subject, got {}", matcher, v.type_name())
        })
    }

    fn recorder(&self, matcher: &str) -> Result<&Mock> {
        match &self.subject {
            Subject::Recorder(m) => Ok(m),
            _ => Err(self.wrong_subject(matcher, "a mock (use expect_mock)")),
        }
    }

    fn wrong_subject(&self, matcher: &str, wanted: &str) -> HarnessError {
        err_msg!(
            Usage,
            "{} expects {}, got {}",
            matcher,
            wanted,
            self.subject.type_name()
        )
    }

    fn not_pending(
        matcher: &'static str,
        subject: Subject,
        location: &'static Location<'static>,
    ) -> HarnessError {
        let message = "Expected value to be a pending asynchronous value".to_string();
        record::push(AssertionRecord {
            matcher,
            passed: false,
            message: message.clone(),
        });
        let actual = match subject {
            Subject::Value(v) => v,
            other => Value::from(other.type_name()),
        };
        HarnessError::Assertion(Box::new(AssertionFailure {
            message,
            expected: Value::from("Pending"),
            actual,
            location,
        }))
    }
}
