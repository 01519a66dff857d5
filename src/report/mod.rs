//! Human-readable rendering of a finished run.

pub mod console;
pub mod theme;

use crate::aggregate::AggregatedReport;
use crate::models::{Expectation, SpecResult, SpecStatus, SuiteResult};
use crate::reporter::replay_url;

use console::Console;

const NO_REASON: &str = "no reason given";

pub struct ReportFormatter<'a> {
    base_url: &'a str,
    color: bool,
}

impl<'a> ReportFormatter<'a> {
    /// `base_url` is the harness address used to build the replay link.
    pub fn new(base_url: &'a str, color: bool) -> Self {
        Self { base_url, color }
    }

    pub fn render(&self, report: &AggregatedReport) -> String {
        let mut console = Console::new(self.color);

        console.line(theme::RESET, &self.summary_line(report.specs()));
        pending_section(&mut console, report.by_status(SpecStatus::Pending));
        failed_section(&mut console, report.by_status(SpecStatus::Failed));
        suite_section(&mut console, report.failed_suites());

        let details = report.details();
        console.line(
            theme::RESET,
            &format!(
                "{} spec(s), {} failure(s), {} pending spec(s)",
                report.specs().len(),
                report.by_status(SpecStatus::Failed).len(),
                report.by_status(SpecStatus::Pending).len(),
            ),
        );
        console.line(
            theme::RESET,
            &format!("Finished in {} second(s)", details.execution_secs()),
        );

        let seed = details.seed.as_deref();
        let replay = replay_url(self.base_url, details.random, seed);
        let order = if details.random {
            format!("Randomized with seed {} ( {replay} )", seed.unwrap_or("none"))
        } else {
            format!("Ran in declaration order ( {replay} )")
        };
        console.line(theme::RESET, &order);

        console.finish()
    }

    /// One glyph per spec in fetch order; excluded specs leave no mark.
    pub fn summary_line(&self, specs: &[SpecResult]) -> String {
        let console = Console::new(self.color);
        let mut line = String::new();
        for spec in specs {
            line.push_str(&console.paint(spec.status.color()));
            line.push_str(spec.status.symbol());
        }
        line.push_str(&console.paint(theme::RESET));
        line
    }
}

fn pending_section(console: &mut Console, pending: &[SpecResult]) {
    if pending.is_empty() {
        return;
    }
    console.line(theme::YELLOW, "Pending:");
    for (index, spec) in pending.iter().enumerate() {
        console.line(theme::RESET, &format!("{index}) {}", spec.full_name));
        console.group();
        console.line(theme::YELLOW, spec.pending_reason().unwrap_or(NO_REASON));
        console.group_end();
        console.blank();
    }
}

fn failed_section(console: &mut Console, failed: &[SpecResult]) {
    if failed.is_empty() {
        return;
    }
    console.line(theme::RED, "Failed:");
    for (index, spec) in failed.iter().enumerate() {
        console.line(theme::RESET, &format!("{index}) {}", spec.full_name));
        console.group();
        expectations(console, &spec.failed_expectations);
        console.group_end();
        console.blank();
    }
}

/// Errors raised in suite-level hooks, which no individual spec accounts for.
fn suite_section(console: &mut Console, suites: &[SuiteResult]) {
    if suites.is_empty() {
        return;
    }
    console.line(theme::RED, "Suite failures:");
    for (index, suite) in suites.iter().enumerate() {
        console.line(theme::RESET, &format!("{index}) {}", suite.full_name));
        console.group();
        expectations(console, &suite.failed_expectations);
        console.group_end();
        console.blank();
    }
}

fn expectations(console: &mut Console, expectations: &[Expectation]) {
    for expectation in expectations {
        console.line(theme::RESET, "Message:");
        console.group();
        console.line(theme::RED, &expectation.message);
        console.group_end();
        console.line(theme::RESET, "Stack:");
        console.group();
        console.line(theme::RED, expectation.stack.as_deref().unwrap_or_default());
        console.group_end();
    }
}
