//! Shared helpers for the integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use futures_util::future::{ready, Ready};
use mcp_harness::{HarnessError, Result, SuiteResult};

/// An ordered log that hooks and test bodies append to.
#[derive(Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    /// An action that appends `entry` and succeeds.
    pub fn step(&self, entry: &str) -> impl Fn() -> Ready<Result<()>> + 'static {
        let journal = self.clone();
        let entry = entry.to_string();
        move || {
            journal.push(entry.clone());
            ready(Ok(()))
        }
    }

    /// An action that appends `entry` and fails with `message`.
    pub fn failing_step(
        &self,
        entry: &str,
        message: &str,
    ) -> impl Fn() -> Ready<Result<()>> + 'static {
        let journal = self.clone();
        let entry = entry.to_string();
        let message = message.to_string();
        move || {
            journal.push(entry.clone());
            ready(Err(HarnessError::msg(message.clone())))
        }
    }
}

pub async fn pass() -> Result<()> {
    Ok(())
}

/// Test names of a suite result, in order.
pub fn names(result: &SuiteResult) -> Vec<&str> {
    result.tests.iter().map(|t| t.name.as_str()).collect()
}
