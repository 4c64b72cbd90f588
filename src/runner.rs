//! Sequential suite execution.
//!
//! The runner walks registered suites depth-first in declaration order and
//! runs one hook or test body at a time. Per suite:
//!
//! 1. before_all hooks run; a failure aborts the whole run.
//! 2. Direct child tests run in order. Skipped tests are recorded without
//!    running anything. When any direct child (test or suite) is marked
//!    `only`, unmarked siblings are left out of the results entirely.
//! 3. Direct child suites run in order, their results spliced into the
//!    parent's flat list.
//! 4. after_all hooks run; a failure aborts the whole run.
//!
//! With a filter set, a suite whose subtree has no selected test skips its
//! before_all and after_all hooks. Its skip records are still reported.
//!
//! Each test runs its suite's before_each hooks, the body, then the
//! after_each hooks. When a before_each hook or the body fails, after_each
//! hooks still run but their failures are only logged, so the test keeps
//! its original failure.

use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use futures_util::future::{FutureExt, LocalBoxFuture};
use serde::{Serialize, Serializer};

use crate::expect::{self, AssertionRecord};
use crate::suite::{registered_suites, Action, Suite, Test};
use crate::{HarnessError, HookPhase, Result};

/// Run-wide options.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Only tests whose name contains this (case-insensitively) run.
    /// Skipped tests are still recorded. Suites left with nothing to run
    /// do not run their before_all/after_all hooks.
    pub filter: Option<String>,
}

impl RunConfig {
    fn selects(&self, test_name: &str) -> bool {
        match &self.filter {
            Some(filter) => test_name.to_lowercase().contains(&filter.to_lowercase()),
            None => true,
        }
    }

    /// True when some test in `suite` or its descendants would run.
    fn selects_any(&self, suite: &Suite) -> bool {
        let only_mode = in_only_mode(suite);
        suite
            .tests
            .iter()
            .any(|t| !t.skip && (!only_mode || t.only) && self.selects(&t.name))
            || suite
                .suites
                .iter()
                .any(|c| !c.skip && (!only_mode || c.only) && self.selects_any(c))
    }
}

/// A suite is in only-mode when any direct child test or suite is marked `only`.
fn in_only_mode(suite: &Suite) -> bool {
    suite.tests.iter().any(|t| t.only) || suite.suites.iter().any(|s| s.only)
}

/// Outcome of one test.
#[derive(Debug, Clone, Serialize)]
pub struct TestResult {
    pub name: String,
    /// `parent > child` path of the suite that declared the test.
    pub suite: String,
    pub passed: bool,
    pub skipped: bool,
    #[serde(serialize_with = "serialize_failure")]
    pub error: Option<HarnessError>,
    /// Where a failure came from, outermost first. Starts with the test's
    /// own path, so even failures without a source location are traceable.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trace: Vec<String>,
    pub duration_ms: f64,
    pub assertions: Vec<AssertionRecord>,
}

impl TestResult {
    fn skipped(test: &Test, suite: &str) -> Self {
        TestResult {
            name: test.name.clone(),
            suite: suite.to_string(),
            passed: true,
            skipped: true,
            error: None,
            trace: Vec::new(),
            duration_ms: 0.0,
            assertions: Vec::new(),
        }
    }
}

/// Outcome of one top-level suite, nested suites flattened in.
#[derive(Debug, Clone, Serialize)]
pub struct SuiteResult {
    pub name: String,
    pub tests: Vec<TestResult>,
    /// Entries with `passed`, skip records included.
    pub passed: usize,
    pub failed: usize,
    /// Skip records among this suite's own tests.
    pub skipped: usize,
    pub duration_ms: f64,
}

#[derive(Serialize)]
struct FailureView<'a> {
    kind: &'a str,
    message: String,
}

fn serialize_failure<S: Serializer>(
    error: &Option<HarnessError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    error
        .as_ref()
        .map(|err| FailureView {
            kind: err.kind_name(),
            message: err.message(),
        })
        .serialize(serializer)
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Runs every suite registered on this thread.
///
/// Returns one result per non-skipped top-level suite, in registration order,
/// or the first before_all/after_all failure.
pub async fn run_all() -> Result<Vec<SuiteResult>> {
    run_all_with(&RunConfig::default()).await
}

pub async fn run_all_with(config: &RunConfig) -> Result<Vec<SuiteResult>> {
    let suites = registered_suites();
    run_suites(&suites, config).await
}

/// Runs the given suites as if they were the registered top-level suites.
pub async fn run_suites(suites: &[Suite], config: &RunConfig) -> Result<Vec<SuiteResult>> {
    let mut results = Vec::with_capacity(suites.len());
    for suite in suites.iter().filter(|s| !s.skip) {
        results.push(run_suite(suite, suite.name.clone(), config).await?);
    }
    Ok(results)
}

// ============================================================================
// EXECUTION
// ============================================================================

fn run_suite<'a>(
    suite: &'a Suite,
    name: String,
    config: &'a RunConfig,
) -> LocalBoxFuture<'a, Result<SuiteResult>> {
    async move {
        let started = Instant::now();
        tracing::debug!(suite = %name, "running suite");

        let active = config.filter.is_none() || config.selects_any(suite);
        if active {
            run_hooks(&suite.before_all)
                .await
                .map_err(|e| hook_failure(HookPhase::BeforeAll, &name, e))?;
        } else {
            tracing::debug!(suite = %name, "no test selected, suite hooks skipped");
        }

        let only_mode = in_only_mode(suite);

        let mut tests = Vec::new();
        let mut skipped = 0;
        for test in &suite.tests {
            if test.skip {
                skipped += 1;
                tests.push(TestResult::skipped(test, &name));
                continue;
            }
            if (only_mode && !test.only) || !config.selects(&test.name) {
                continue;
            }
            tests.push(run_test(suite, test, &name).await);
        }

        for child in &suite.suites {
            if child.skip || (only_mode && !child.only) {
                continue;
            }
            let nested = run_suite(child, format!("{} > {}", name, child.name), config).await?;
            tests.extend(nested.tests);
        }

        if active {
            run_hooks(&suite.after_all)
                .await
                .map_err(|e| hook_failure(HookPhase::AfterAll, &name, e))?;
        }

        let passed = tests.iter().filter(|t| t.passed).count();
        let failed = tests.len() - passed;
        tracing::debug!(suite = %name, passed, failed, skipped, "suite finished");
        Ok(SuiteResult {
            name,
            tests,
            passed,
            failed,
            skipped,
            duration_ms: elapsed_ms(started),
        })
    }
    .boxed_local()
}

async fn run_test(suite: &Suite, test: &Test, suite_name: &str) -> TestResult {
    expect::begin_recording();
    let started = Instant::now();
    let outcome = execute(suite, test).await;
    let duration_ms = elapsed_ms(started);
    let assertions = expect::finish_recording();

    let trace = match &outcome {
        Ok(()) => {
            tracing::trace!(suite = suite_name, test = %test.name, duration_ms, "passed");
            Vec::new()
        }
        Err(err) => {
            tracing::trace!(suite = suite_name, test = %test.name, error = %err, "failed");
            let mut trace = vec![format!("in test '{} > {}'", suite_name, test.name)];
            trace.extend(err.trace());
            trace
        }
    };
    TestResult {
        name: test.name.clone(),
        suite: suite_name.to_string(),
        passed: outcome.is_ok(),
        skipped: false,
        error: outcome.err(),
        trace,
        duration_ms,
        assertions,
    }
}

async fn execute(suite: &Suite, test: &Test) -> Result<()> {
    let primary = match run_hooks(&suite.before_each).await {
        Ok(()) => run_action(&test.action).await,
        Err(err) => Err(err),
    };
    match primary {
        Ok(()) => run_hooks(&suite.after_each).await,
        Err(err) => {
            cleanup(&suite.after_each, &test.name).await;
            Err(err)
        }
    }
}

/// Runs every hook once after a failure; their own failures are dropped.
async fn cleanup(hooks: &[Action], test_name: &str) {
    for hook in hooks {
        if let Err(err) = run_action(hook).await {
            tracing::warn!(
                test = test_name,
                error = %err,
                "after_each failed during cleanup, discarded"
            );
        }
    }
}

/// Runs hooks in order, stopping at the first failure.
async fn run_hooks(hooks: &[Action]) -> Result<()> {
    for hook in hooks {
        run_action(hook).await?;
    }
    Ok(())
}

/// Runs one action, turning panics into failures.
async fn run_action(action: &Action) -> Result<()> {
    let pending = match panic::catch_unwind(AssertUnwindSafe(|| action())) {
        Ok(pending) => pending,
        Err(payload) => return Err(HarnessError::from_panic(payload)),
    };
    AssertUnwindSafe(pending)
        .catch_unwind()
        .await
        .unwrap_or_else(|payload| Err(HarnessError::from_panic(payload)))
}

fn hook_failure(phase: HookPhase, suite: &str, source: HarnessError) -> HarnessError {
    tracing::error!(suite, %phase, error = %source, "hook failed, aborting run");
    HarnessError::Hook {
        phase,
        suite: suite.to_string(),
        source: Box::new(source),
    }
}

fn elapsed_ms(started: Instant) -> f64 {
    started.elapsed().as_secs_f64() * 1000.0
}
