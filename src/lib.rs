//! A unit-testing harness for protocol servers: suites with hooks, a
//! sequential runner, chained matchers, and call-recording mocks.

pub mod errors;
pub mod expect;
pub mod mock;
pub mod report;
pub mod runner;
pub mod suite;
pub mod value;

pub use crate::errors::{AssertionFailure, HarnessError, HookPhase, Result};
pub use crate::expect::{
    expect, expect_fn, expect_future, expect_mock, AssertionRecord, ErrorPattern, Expectation,
    Subject,
};
pub use crate::mock::{
    mock_fn, mock_prompt, mock_resource, mock_server, mock_tool, spy_on, CallRecord, Handlers,
    Implementation, Mock, MockBehavior, MockKind, MockServer, ServerConfig, Spy,
};
pub use crate::report::{
    print_report, render_report, summarize, write_report, ReportConfig, RunSummary,
};
pub use crate::runner::{run_all, run_all_with, run_suites, RunConfig, SuiteResult, TestResult};
pub use crate::suite::{
    after_all, after_each, before_all, before_each, clear_registry, describe, describe_only,
    describe_skip, it, it_only, it_skip, registered_suites, test, test_only, test_skip, Action,
    Suite, Test,
};
pub use crate::value::Value;
