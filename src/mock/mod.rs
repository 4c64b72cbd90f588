//! Call-recording stand-ins for protocol handlers.
//!
//! A [`Mock`] is a cheap, cloneable handle to shared recorder state. Code under
//! test calls it through [`Mock::invoke`] (directly, or through a [`Handlers`]
//! table); tests configure its behavior and inspect what it saw.
//!
//! ```rust
//! use mcp_harness::{mock_tool, MockBehavior, Value};
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let search = mock_tool("search", MockBehavior::return_value("hit"));
//! let out = search.invoke(vec![Value::from("query")]).await.unwrap();
//! assert_eq!(out.as_str(), Some("hit"));
//! assert_eq!(search.call_count(), 1);
//! # });
//! ```
//!
//! Spies ([`spy_on`]) and server mocks ([`mock_server`]) are built on the same
//! recorder.
//!
//! The recorder is `!Send`; it is meant for the single-threaded runner.

mod server;
mod spy;

pub use server::{mock_server, MockServer, ServerConfig};
pub use spy::{spy_on, Handlers, Spy};

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::panic::Location;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use futures_util::future::{self, FutureExt, LocalBoxFuture};

use crate::{HarnessError, Result, Value};

pub type MockFuture = LocalBoxFuture<'static, Result<Value>>;

/// A callable taking positional arguments and producing a possibly pending result.
#[derive(Clone)]
pub struct Implementation(Rc<dyn Fn(Vec<Value>) -> MockFuture>);

impl Implementation {
    /// Wraps a synchronous function.
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        Implementation(Rc::new(move |args| future::ready(f(&args)).boxed_local()))
    }

    /// Wraps a function returning a future.
    pub fn new_async<F, Fut>(f: F) -> Self
    where
        F: Fn(Vec<Value>) -> Fut + 'static,
        Fut: Future<Output = Result<Value>> + 'static,
    {
        Implementation(Rc::new(move |args| f(args).boxed_local()))
    }

    pub fn call(&self, args: Vec<Value>) -> MockFuture {
        (self.0)(args)
    }

    /// True when both handles wrap the same function.
    pub fn ptr_eq(&self, other: &Implementation) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Implementation").finish_non_exhaustive()
    }
}

/// What kind of handler a mock stands in for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockKind {
    Tool,
    Resource,
    Prompt,
    Function,
}

/// Initial behavior of a mock. Exactly one option governs it.
#[derive(Debug, Clone, Default)]
pub enum MockBehavior {
    /// Calls resolve to `Value::Undefined`.
    #[default]
    None,
    ReturnValue(Value),
    ThrowError(HarnessError),
    Implementation(Implementation),
}

impl MockBehavior {
    pub fn return_value(value: impl Into<Value>) -> Self {
        MockBehavior::ReturnValue(value.into())
    }

    /// Accepts a message (wrapped into an `Error`) or a ready-made error.
    #[track_caller]
    pub fn throw_error(error: impl Into<HarnessError>) -> Self {
        MockBehavior::ThrowError(error.into().located_at(Location::caller()))
    }

    pub fn implementation<F>(f: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        MockBehavior::Implementation(Implementation::new(f))
    }
}

/// One recorded invocation.
#[derive(Debug, Clone)]
pub struct CallRecord {
    pub args: Vec<Value>,
    pub timestamp: DateTime<Utc>,
    /// `None` until the behavior settles.
    pub outcome: Option<Result<Value>>,
}

impl CallRecord {
    pub fn is_pending(&self) -> bool {
        self.outcome.is_none()
    }

    pub fn result(&self) -> Option<&Value> {
        self.outcome.as_ref()?.as_ref().ok()
    }

    pub fn error(&self) -> Option<&HarnessError> {
        self.outcome.as_ref()?.as_ref().err()
    }
}

#[derive(Clone)]
enum Behavior {
    Return(Value),
    Throw(HarnessError),
    Resolve(Value),
    Reject(HarnessError),
    Custom(Implementation),
    /// Fires once, then hands over to `fallback`.
    Once {
        value: Value,
        fallback: Option<Box<Behavior>>,
    },
}

impl Behavior {
    fn from_initial(initial: MockBehavior) -> Option<Self> {
        match initial {
            MockBehavior::None => None,
            MockBehavior::ReturnValue(v) => Some(Behavior::Return(v)),
            MockBehavior::ThrowError(e) => Some(Behavior::Throw(e)),
            MockBehavior::Implementation(f) => Some(Behavior::Custom(f)),
        }
    }

    fn outcome(&self, args: &[Value]) -> MockFuture {
        match self {
            Behavior::Return(v) => future::ready(Ok(v.clone())).boxed_local(),
            Behavior::Throw(e) => future::ready(Err(e.clone())).boxed_local(),
            Behavior::Resolve(v) => {
                let v = v.clone();
                async move { Ok(v) }.boxed_local()
            }
            Behavior::Reject(e) => {
                let e = e.clone();
                async move { Err(e) }.boxed_local()
            }
            Behavior::Custom(f) => f.call(args.to_vec()),
            Behavior::Once { value, .. } => future::ready(Ok(value.clone())).boxed_local(),
        }
    }
}

struct MockState {
    name: String,
    kind: MockKind,
    behavior: Option<Behavior>,
    calls: Vec<CallRecord>,
    results: Vec<Value>,
    errors: Vec<HarnessError>,
    /// Bumped by `mock_clear`; calls started before a clear settle unrecorded.
    generation: u64,
}

impl MockState {
    /// The behavior for the next call, consuming a pending one-shot.
    fn next_behavior(&mut self) -> Option<Behavior> {
        match self.behavior.take() {
            Some(Behavior::Once { value, fallback }) => {
                self.behavior = fallback.map(|b| *b);
                Some(Behavior::Return(value))
            }
            other => {
                self.behavior = other.clone();
                other
            }
        }
    }
}

/// A recording stand-in callable.
#[derive(Clone)]
pub struct Mock {
    state: Rc<RefCell<MockState>>,
}

impl fmt::Debug for Mock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("Mock")
            .field("name", &state.name)
            .field("kind", &state.kind)
            .field("calls", &state.calls.len())
            .finish_non_exhaustive()
    }
}

impl Mock {
    pub fn new(name: impl Into<String>, behavior: MockBehavior) -> Self {
        Self::with_kind(MockKind::Function, name, behavior)
    }

    pub fn with_kind(kind: MockKind, name: impl Into<String>, behavior: MockBehavior) -> Self {
        Mock {
            state: Rc::new(RefCell::new(MockState {
                name: name.into(),
                kind,
                behavior: Behavior::from_initial(behavior),
                calls: Vec::new(),
                results: Vec::new(),
                errors: Vec::new(),
                generation: 0,
            })),
        }
    }

    /// Calls the mock.
    ///
    /// The call is recorded with its arguments and timestamp before the
    /// behavior runs, so nested calls keep call order and a call that is
    /// never awaited to completion stays in the history as pending. Once the
    /// behavior settles, the record's outcome is filled in and the value or
    /// error is appended to the matching history; a failure is also returned
    /// to the caller.
    pub async fn invoke(&self, args: Vec<Value>) -> Result<Value> {
        // The borrow ends with this block so behaviors may call back into
        // this mock.
        let (index, generation, behavior) = {
            let mut state = self.state.borrow_mut();
            state.calls.push(CallRecord {
                args: args.clone(),
                timestamp: Utc::now(),
                outcome: None,
            });
            let behavior = state.next_behavior();
            (state.calls.len() - 1, state.generation, behavior)
        };
        let outcome = match behavior {
            Some(behavior) => behavior.outcome(&args).await,
            None => Ok(Value::Undefined),
        };

        let mut state = self.state.borrow_mut();
        if state.generation == generation {
            match &outcome {
                Ok(value) => state.results.push(value.clone()),
                Err(err) => state.errors.push(err.clone()),
            }
            if let Some(call) = state.calls.get_mut(index) {
                call.outcome = Some(outcome.clone());
            }
        }
        outcome
    }

    /// An [`Implementation`] that delegates to this mock.
    pub fn as_implementation(&self) -> Implementation {
        let mock = self.clone();
        Implementation::new_async(move |args| {
            let mock = mock.clone();
            async move { mock.invoke(args).await }
        })
    }

    // ------------------------------------------------------------------------
    // Behavior
    // ------------------------------------------------------------------------

    pub fn mock_return_value(&self, value: impl Into<Value>) -> &Self {
        self.set_behavior(Some(Behavior::Return(value.into())))
    }

    /// Returns `value` from the next call only, then falls back to the
    /// behavior configured before. Stacked one-shots fire most recent first.
    pub fn mock_return_value_once(&self, value: impl Into<Value>) -> &Self {
        let mut state = self.state.borrow_mut();
        let fallback = state.behavior.take().map(Box::new);
        state.behavior = Some(Behavior::Once {
            value: value.into(),
            fallback,
        });
        drop(state);
        self
    }

    pub fn mock_resolved_value(&self, value: impl Into<Value>) -> &Self {
        self.set_behavior(Some(Behavior::Resolve(value.into())))
    }

    #[track_caller]
    pub fn mock_rejected_value(&self, error: impl Into<HarnessError>) -> &Self {
        let error = error.into().located_at(Location::caller());
        self.set_behavior(Some(Behavior::Reject(error)))
    }

    pub fn mock_implementation<F>(&self, f: F) -> &Self
    where
        F: Fn(&[Value]) -> Result<Value> + 'static,
    {
        self.set_behavior(Some(Behavior::Custom(Implementation::new(f))))
    }

    pub fn mock_implementation_async<F, Fut>(&self, f: F) -> &Self
    where
        F: Fn(Vec<Value>) -> Fut + 'static,
        Fut: Future<Output = Result<Value>> + 'static,
    {
        self.set_behavior(Some(Behavior::Custom(Implementation::new_async(f))))
    }

    pub(crate) fn set_implementation(&self, f: Implementation) -> &Self {
        self.set_behavior(Some(Behavior::Custom(f)))
    }

    /// Forgets recorded calls, results and errors. Behavior is kept.
    pub fn mock_clear(&self) -> &Self {
        let mut state = self.state.borrow_mut();
        state.calls.clear();
        state.results.clear();
        state.errors.clear();
        state.generation += 1;
        drop(state);
        self
    }

    /// Clears history and removes the behavior.
    pub fn mock_reset(&self) -> &Self {
        self.mock_clear();
        self.set_behavior(None)
    }

    fn set_behavior(&self, behavior: Option<Behavior>) -> &Self {
        self.state.borrow_mut().behavior = behavior;
        self
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn name(&self) -> String {
        self.state.borrow().name.clone()
    }

    pub fn kind(&self) -> MockKind {
        self.state.borrow().kind
    }

    pub fn has_behavior(&self) -> bool {
        self.state.borrow().behavior.is_some()
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        self.state.borrow().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.state.borrow().calls.len()
    }

    pub fn last_call(&self) -> Option<CallRecord> {
        self.state.borrow().calls.last().cloned()
    }

    pub fn results(&self) -> Vec<Value> {
        self.state.borrow().results.clone()
    }

    pub fn errors(&self) -> Vec<HarnessError> {
        self.state.borrow().errors.clone()
    }
}

pub fn mock_fn(name: impl Into<String>, behavior: MockBehavior) -> Mock {
    Mock::with_kind(MockKind::Function, name, behavior)
}

pub fn mock_tool(name: impl Into<String>, behavior: MockBehavior) -> Mock {
    Mock::with_kind(MockKind::Tool, name, behavior)
}

pub fn mock_resource(name: impl Into<String>, behavior: MockBehavior) -> Mock {
    Mock::with_kind(MockKind::Resource, name, behavior)
}

pub fn mock_prompt(name: impl Into<String>, behavior: MockBehavior) -> Mock {
    Mock::with_kind(MockKind::Prompt, name, behavior)
}
