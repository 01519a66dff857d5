//! Contract with the harness page.
//!
//! The page exposes a global `jsApiReporter`. Every call against it is a
//! [`ReporterQuery`] rendered into a script body, so the orchestration code
//! never assembles JavaScript itself.

pub mod fetch;
pub mod poll;

use crate::models::result::{CIRCULAR_ACTUAL, CIRCULAR_EXPECTED};

pub use fetch::{ReporterRecord, collect_all, collect_failed_suites, fetch_page, fetch_run_details};
pub use poll::await_completion;

/// Global the harness installs in the page.
pub const REPORTER_GLOBAL: &str = "jsApiReporter";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultKind {
    Spec,
    Suite,
}

impl ResultKind {
    fn method(&self) -> &'static str {
        match self {
            ResultKind::Spec => "specResults",
            ResultKind::Suite => "suiteResults",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultKind::Spec => "spec",
            ResultKind::Suite => "suite",
        }
    }
}

/// Calls against the in-page reporter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReporterQuery {
    /// Truthy once the run has completed.
    Finished,
    /// One page of results. Expectation values the page cannot serialize are
    /// replaced with a per-side sentinel before they leave the page.
    Results {
        kind: ResultKind,
        start: usize,
        count: usize,
    },
    /// Overall status, global failures, timing and ordering of the run.
    RunDetails,
}

impl ReporterQuery {
    pub fn to_script(&self) -> String {
        match self {
            ReporterQuery::Finished => format!(
                "return typeof {r} !== 'undefined' && !!{r}.finished;",
                r = REPORTER_GLOBAL
            ),
            ReporterQuery::Results { kind, start, count } => format!(
                "var results = {r}.{method}({start}, {count});\n\
                 for (var i = 0; i < results.length; i++) {{\n\
                 \x20 var expectations = results[i].failedExpectations || [];\n\
                 \x20 if (results[i].passedExpectations) {{\n\
                 \x20   expectations = expectations.concat(results[i].passedExpectations);\n\
                 \x20 }}\n\
                 \x20 for (var j = 0; j < expectations.length; j++) {{\n\
                 \x20   var expectation = expectations[j];\n\
                 \x20   try {{ JSON.stringify(expectation.expected); }} catch (e) {{ expectation.expected = '{expected}'; }}\n\
                 \x20   try {{ JSON.stringify(expectation.actual); }} catch (e) {{ expectation.actual = '{actual}'; }}\n\
                 \x20 }}\n\
                 }}\n\
                 return results;",
                r = REPORTER_GLOBAL,
                method = kind.method(),
                expected = CIRCULAR_EXPECTED,
                actual = CIRCULAR_ACTUAL,
            ),
            ReporterQuery::RunDetails => format!(
                "return {{\n\
                 \x20 overallStatus: {r}.runDetails.overallStatus,\n\
                 \x20 overallFailures: {r}.runDetails.failedExpectations,\n\
                 \x20 executionTime: {r}.executionTime(),\n\
                 \x20 random: {r}.runDetails.order.random,\n\
                 \x20 seed: {r}.runDetails.order.seed\n\
                 }};",
                r = REPORTER_GLOBAL
            ),
        }
    }
}

/// Harness URL that runs the whole suite in random order, optionally replaying `seed`.
pub fn harness_url(base_url: &str, seed: Option<&str>) -> String {
    let mut url = format!("{base_url}/?throwFailures=false&failFast=false&random=true");
    if let Some(seed) = seed {
        url.push_str("&seed=");
        url.push_str(seed);
    }
    url
}

/// URL that reproduces a finished run's ordering.
pub fn replay_url(base_url: &str, random: bool, seed: Option<&str>) -> String {
    match seed {
        Some(seed) => format!("{base_url}/?random={random}&seed={seed}"),
        None => format!("{base_url}/?random={random}"),
    }
}
