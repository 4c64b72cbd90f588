//! Human-readable run reports.
//!
//! All output goes through [`termcolor::WriteColor`], so the same code prints
//! colored text to a terminal and plain text into a buffer.

use std::io::{self, Write};

use serde::Serialize;
use termcolor::{Buffer, Color, ColorChoice, ColorSpec, StandardStream, WriteColor};

use crate::runner::{SuiteResult, TestResult};

/// Report appearance.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    pub use_colors: bool,
    /// Trace lines shown under each failure.
    pub trace_lines: usize,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            use_colors: atty::is(atty::Stream::Stdout),
            trace_lines: 3,
        }
    }
}

impl ReportConfig {
    fn color_choice(&self) -> ColorChoice {
        if self.use_colors {
            ColorChoice::Always
        } else {
            ColorChoice::Never
        }
    }
}

/// Totals over every flat test entry of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Rounded percentage of executed tests that passed.
    pub pass_rate: u32,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

pub fn summarize(results: &[SuiteResult]) -> RunSummary {
    let entries = results.iter().flat_map(|suite| suite.tests.iter());
    let (mut total, mut passed, mut failed, mut skipped) = (0, 0, 0, 0);
    for entry in entries {
        total += 1;
        if entry.skipped {
            skipped += 1;
        } else if entry.passed {
            passed += 1;
        } else {
            failed += 1;
        }
    }
    let executed = passed + failed;
    let pass_rate = if executed == 0 {
        100
    } else {
        (passed as f64 * 100.0 / executed as f64).round() as u32
    };
    RunSummary {
        total,
        passed,
        failed,
        skipped,
        pass_rate,
    }
}

// ============================================================================
// WRITERS
// ============================================================================

/// Writes the full report: one block per suite, then the tally.
pub fn write_report(
    writer: &mut impl WriteColor,
    results: &[SuiteResult],
    config: &ReportConfig,
) -> io::Result<()> {
    for suite in results {
        writer.set_color(ColorSpec::new().set_bold(true))?;
        write!(writer, "{}", suite.name)?;
        writer.reset()?;
        writeln!(writer, " ({:.1}ms)", suite.duration_ms)?;

        let mut current = suite.name.as_str();
        for test in &suite.tests {
            if test.suite != current {
                current = &test.suite;
                writeln!(writer, "  {}", current)?;
            }
            write_test(writer, test, config)?;
        }
        writeln!(writer)?;
    }
    write_tally(writer, &summarize(results))
}

fn write_test(
    writer: &mut impl WriteColor,
    test: &TestResult,
    config: &ReportConfig,
) -> io::Result<()> {
    let (label, color) = if test.skipped {
        ("SKIP", Color::Yellow)
    } else if test.passed {
        ("PASS", Color::Green)
    } else {
        ("FAIL", Color::Red)
    };
    write!(writer, "  ")?;
    writer.set_color(ColorSpec::new().set_fg(Some(color)).set_bold(true))?;
    write!(writer, "{}", label)?;
    writer.reset()?;
    if test.skipped {
        writeln!(writer, " {}", test.name)?;
    } else {
        writeln!(writer, " {} ({:.1}ms)", test.name, test.duration_ms)?;
    }

    let Some(error) = &test.error else {
        return Ok(());
    };
    writer.set_color(ColorSpec::new().set_fg(Some(Color::Red)))?;
    for line in error.message().lines() {
        writeln!(writer, "      {}", line)?;
    }
    writer.reset()?;
    writer.set_color(ColorSpec::new().set_dimmed(true))?;
    for line in test.trace.iter().take(config.trace_lines) {
        writeln!(writer, "      {}", line)?;
    }
    writer.reset()
}

fn write_tally(writer: &mut impl WriteColor, summary: &RunSummary) -> io::Result<()> {
    write!(writer, "Tests: ")?;
    writer.set_color(ColorSpec::new().set_fg(Some(Color::Green)))?;
    write!(writer, "{} passed", summary.passed)?;
    writer.reset()?;
    write!(writer, ", ")?;
    if summary.failed > 0 {
        writer.set_color(ColorSpec::new().set_fg(Some(Color::Red)).set_bold(true))?;
    }
    write!(writer, "{} failed", summary.failed)?;
    writer.reset()?;
    write!(writer, ", ")?;
    writer.set_color(ColorSpec::new().set_fg(Some(Color::Yellow)))?;
    write!(writer, "{} skipped", summary.skipped)?;
    writer.reset()?;
    writeln!(
        writer,
        ", {} total ({}% passing)",
        summary.total, summary.pass_rate
    )
}

/// Renders the report into a string, with ANSI colors when configured.
pub fn render_report(results: &[SuiteResult], config: &ReportConfig) -> String {
    let mut buffer = if config.use_colors {
        Buffer::ansi()
    } else {
        Buffer::no_color()
    };
    if let Err(err) = write_report(&mut buffer, results, config) {
        tracing::warn!(error = %err, "report rendering stopped early");
    }
    String::from_utf8_lossy(buffer.as_slice()).into_owned()
}

/// Prints the report to stdout.
pub fn print_report(results: &[SuiteResult], config: &ReportConfig) -> io::Result<()> {
    let mut stdout = StandardStream::stdout(config.color_choice());
    write_report(&mut stdout, results, config)?;
    stdout.flush()
}
