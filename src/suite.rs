//! Suite registration.
//!
//! Suites are declared by calling [`describe`] with a body; inside the body,
//! [`test`], the hook registrars, and nested [`describe`] calls attach to the
//! suite being defined. The suite being defined is tracked on a per-thread
//! stack, and a guard restores the previous one when the body returns, fails
//! or panics.
//!
//! ```rust
//! use mcp_harness::{clear_registry, describe, expect, registered_suites, test};
//!
//! clear_registry();
//! describe("Math", || {
//!     test("adds", || async { expect(2 + 2).to_be(4) })?;
//!     Ok(())
//! })
//! .unwrap();
//! assert_eq!(registered_suites()[0].tests().len(), 1);
//! ```

use std::cell::RefCell;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures_util::future::{FutureExt, LocalBoxFuture};

use crate::{err_msg, HookPhase, Result};

/// A zero-argument, possibly suspending action: a test body or a hook.
pub type Action = Rc<dyn Fn() -> LocalBoxFuture<'static, Result<()>>>;

fn action<F, Fut>(f: F) -> Action
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<()>> + 'static,
{
    Rc::new(move || f().boxed_local())
}

/// One `test()` declaration.
#[derive(Clone)]
pub struct Test {
    pub(crate) name: String,
    pub(crate) action: Action,
    pub(crate) skip: bool,
    pub(crate) only: bool,
}

impl Test {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_skipped(&self) -> bool {
        self.skip
    }

    pub fn is_only(&self) -> bool {
        self.only
    }
}

impl fmt::Debug for Test {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Test")
            .field("name", &self.name)
            .field("skip", &self.skip)
            .field("only", &self.only)
            .finish_non_exhaustive()
    }
}

/// One `describe()` block.
#[derive(Clone, Default)]
pub struct Suite {
    pub(crate) name: String,
    pub(crate) tests: Vec<Test>,
    pub(crate) suites: Vec<Suite>,
    pub(crate) before_each: Vec<Action>,
    pub(crate) after_each: Vec<Action>,
    pub(crate) before_all: Vec<Action>,
    pub(crate) after_all: Vec<Action>,
    pub(crate) skip: bool,
    pub(crate) only: bool,
}

impl Suite {
    fn new(name: String, skip: bool, only: bool) -> Self {
        Suite {
            name,
            skip,
            only,
            ..Suite::default()
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tests(&self) -> &[Test] {
        &self.tests
    }

    pub fn suites(&self) -> &[Suite] {
        &self.suites
    }

    pub fn is_skipped(&self) -> bool {
        self.skip
    }

    pub fn is_only(&self) -> bool {
        self.only
    }

    pub fn hooks(&self, phase: HookPhase) -> &[Action] {
        match phase {
            HookPhase::BeforeAll => &self.before_all,
            HookPhase::BeforeEach => &self.before_each,
            HookPhase::AfterEach => &self.after_each,
            HookPhase::AfterAll => &self.after_all,
        }
    }

    fn hooks_mut(&mut self, phase: HookPhase) -> &mut Vec<Action> {
        match phase {
            HookPhase::BeforeAll => &mut self.before_all,
            HookPhase::BeforeEach => &mut self.before_each,
            HookPhase::AfterEach => &mut self.after_each,
            HookPhase::AfterAll => &mut self.after_all,
        }
    }
}

impl fmt::Debug for Suite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Suite")
            .field("name", &self.name)
            .field("tests", &self.tests)
            .field("suites", &self.suites)
            .field("skip", &self.skip)
            .field("only", &self.only)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// REGISTRY
// ============================================================================

#[derive(Default)]
struct Registry {
    roots: Vec<Suite>,
    /// Suites whose bodies are currently executing, innermost last.
    defining: Vec<Suite>,
}

thread_local! {
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::default());
}

/// Pops the innermost suite being defined and attaches it to its parent.
struct DefiningGuard;

impl Drop for DefiningGuard {
    fn drop(&mut self) {
        let _ = REGISTRY.try_with(|registry| {
            let mut registry = registry.borrow_mut();
            if let Some(suite) = registry.defining.pop() {
                match registry.defining.last_mut() {
                    Some(parent) => parent.suites.push(suite),
                    None => registry.roots.push(suite),
                }
            }
        });
    }
}

fn define<F>(name: &str, skip: bool, only: bool, body: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    REGISTRY.with(|registry| {
        registry
            .borrow_mut()
            .defining
            .push(Suite::new(name.to_string(), skip, only))
    });
    let _guard = DefiningGuard;
    body()
}

fn with_current<R>(what: &str, f: impl FnOnce(&mut Suite) -> R) -> Result<R> {
    REGISTRY.with(|registry| match registry.borrow_mut().defining.last_mut() {
        Some(suite) => Ok(f(suite)),
        None => Err(err_msg!(
            Registration,
            "{}() must be called inside a suite definition",
            what
        )),
    })
}

fn declare_test<F, Fut>(what: &str, name: &str, skip: bool, only: bool, f: F) -> Result<()>
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<()>> + 'static,
{
    with_current(what, |suite| {
        tracing::trace!(suite = %suite.name, test = name, skip, only, "registered test");
        suite.tests.push(Test {
            name: name.to_string(),
            action: action(f),
            skip,
            only,
        })
    })
}

fn declare_hook<F, Fut>(phase: HookPhase, f: F) -> Result<()>
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<()>> + 'static,
{
    with_current(phase.as_str(), |suite| suite.hooks_mut(phase).push(action(f)))
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Defines a suite. The body's error is returned after the previous suite has
/// been restored; whatever the body registered before failing is kept.
pub fn describe<F>(name: &str, body: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    define(name, false, false, body)
}

/// Defines a suite that is registered but never run.
pub fn describe_skip<F>(name: &str, body: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    define(name, true, false, body)
}

/// Defines a suite that restricts its parent to `only` children.
pub fn describe_only<F>(name: &str, body: F) -> Result<()>
where
    F: FnOnce() -> Result<()>,
{
    define(name, false, true, body)
}

pub fn test<F, Fut>(name: &str, f: F) -> Result<()>
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<()>> + 'static,
{
    declare_test("test", name, false, false, f)
}

pub fn test_skip<F, Fut>(name: &str, f: F) -> Result<()>
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<()>> + 'static,
{
    declare_test("test_skip", name, true, false, f)
}

pub fn test_only<F, Fut>(name: &str, f: F) -> Result<()>
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<()>> + 'static,
{
    declare_test("test_only", name, false, true, f)
}

pub fn it<F, Fut>(name: &str, f: F) -> Result<()>
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<()>> + 'static,
{
    declare_test("it", name, false, false, f)
}

pub fn it_skip<F, Fut>(name: &str, f: F) -> Result<()>
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<()>> + 'static,
{
    declare_test("it_skip", name, true, false, f)
}

pub fn it_only<F, Fut>(name: &str, f: F) -> Result<()>
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<()>> + 'static,
{
    declare_test("it_only", name, false, true, f)
}

pub fn before_each<F, Fut>(f: F) -> Result<()>
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<()>> + 'static,
{
    declare_hook(HookPhase::BeforeEach, f)
}

pub fn after_each<F, Fut>(f: F) -> Result<()>
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<()>> + 'static,
{
    declare_hook(HookPhase::AfterEach, f)
}

pub fn before_all<F, Fut>(f: F) -> Result<()>
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<()>> + 'static,
{
    declare_hook(HookPhase::BeforeAll, f)
}

pub fn after_all<F, Fut>(f: F) -> Result<()>
where
    F: Fn() -> Fut + 'static,
    Fut: Future<Output = Result<()>> + 'static,
{
    declare_hook(HookPhase::AfterAll, f)
}

/// Empties the root registry and forgets any suite being defined.
pub fn clear_registry() {
    REGISTRY.with(|registry| *registry.borrow_mut() = Registry::default());
}

/// A snapshot of the top-level suites registered on this thread.
pub fn registered_suites() -> Vec<Suite> {
    REGISTRY.with(|registry| registry.borrow().roots.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HarnessError;

    async fn pass() -> Result<()> {
        Ok(())
    }

    #[test]
    fn nested_declarations_keep_order() {
        clear_registry();
        describe("outer", || {
            test("a", pass)?;
            describe("inner", || {
                test("x", pass)?;
                test("y", pass)
            })?;
            test("b", pass)?;
            before_each(pass)?;
            after_all(pass)
        })
        .unwrap();

        let suites = registered_suites();
        assert_eq!(suites.len(), 1);
        let outer = &suites[0];
        let names: Vec<_> = outer.tests().iter().map(Test::name).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(outer.suites()[0].name(), "inner");
        assert_eq!(outer.suites()[0].tests().len(), 2);
        assert_eq!(outer.hooks(HookPhase::BeforeEach).len(), 1);
        assert_eq!(outer.hooks(HookPhase::AfterAll).len(), 1);
    }

    #[test]
    fn declaring_outside_a_suite_is_a_registration_error() {
        clear_registry();
        let err = test("stray", pass).unwrap_err();
        assert!(matches!(err, HarnessError::Registration { .. }));
        assert!(err.to_string().contains("must be called inside a suite definition"));
        assert!(before_all(pass).is_err());
    }

    #[test]
    fn failing_body_restores_the_current_suite() {
        clear_registry();
        let result = describe("broken", || {
            test("kept", pass)?;
            Err(HarnessError::msg("definition failed"))
        });
        assert!(result.is_err());
        describe("next", || test("t", pass)).unwrap();

        let suites = registered_suites();
        assert_eq!(suites.len(), 2);
        assert_eq!(suites[0].tests().len(), 1);
        assert_eq!(suites[1].name(), "next");
        assert!(test("stray", pass).is_err());
    }

    #[test]
    fn panicking_body_restores_the_current_suite() {
        clear_registry();
        let outcome = std::panic::catch_unwind(|| {
            describe("panics", || -> Result<()> { panic!("boom") })
        });
        assert!(outcome.is_err());
        assert!(test("stray", pass).is_err());
        assert_eq!(registered_suites().len(), 1);
    }

    #[test]
    fn modifiers_set_flags() {
        clear_registry();
        describe_only("focused", || {
            test_skip("s", pass)?;
            it_only("o", pass)?;
            describe_skip("later", || Ok(()))
        })
        .unwrap();
        let suite = &registered_suites()[0];
        assert!(suite.is_only());
        assert!(suite.tests()[0].is_skipped());
        assert!(suite.tests()[1].is_only());
        assert!(suite.suites()[0].is_skipped());
    }

    #[test]
    fn clear_empties_the_registry() {
        describe("any", || Ok(())).unwrap();
        clear_registry();
        assert!(registered_suites().is_empty());
    }
}
