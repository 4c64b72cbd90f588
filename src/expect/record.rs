use std::cell::RefCell;

use serde::Serialize;

/// One matcher evaluation observed while a test was running.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssertionRecord {
    pub matcher: &'static str,
    pub passed: bool,
    pub message: String,
}

thread_local! {
    // `None` while no test is running, so stray expectations are not kept.
    static LOG: RefCell<Option<Vec<AssertionRecord>>> = const { RefCell::new(None) };
}

pub(crate) fn push(record: AssertionRecord) {
    LOG.with(|log| {
        if let Some(records) = log.borrow_mut().as_mut() {
            records.push(record);
        }
    });
}

/// Starts collecting for one test, dropping anything left from before.
pub(crate) fn begin() {
    LOG.with(|log| *log.borrow_mut() = Some(Vec::new()));
}

/// Stops collecting and returns what the test produced.
pub(crate) fn finish() -> Vec<AssertionRecord> {
    LOG.with(|log| log.borrow_mut().take().unwrap_or_default())
}
