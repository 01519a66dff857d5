use std::io::{self, Write};

use crate::models::RunDetails;

/// Process outcome of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Failed,
}

impl Verdict {
    pub fn exit_code(&self) -> u8 {
        match self {
            Verdict::Passed => 0,
            Verdict::Failed => 1,
        }
    }

    pub fn passed(&self) -> bool {
        *self == Verdict::Passed
    }
}

impl From<Verdict> for std::process::ExitCode {
    fn from(verdict: Verdict) -> Self {
        std::process::ExitCode::from(verdict.exit_code())
    }
}

/// Only an overall status of exactly `"passed"` succeeds.
pub fn resolve(details: &RunDetails) -> Verdict {
    if details.passed() {
        Verdict::Passed
    } else {
        Verdict::Failed
    }
}

/// Write harness-level failures (load or syntax errors outside any spec) to
/// `err`. These do not change the verdict.
pub fn report_overall_failures<W: Write>(details: &RunDetails, err: &mut W) -> io::Result<()> {
    if details.overall_failures.is_empty() {
        return Ok(());
    }
    let json = serde_json::to_string_pretty(&details.overall_failures)?;
    writeln!(err, "Failures encountered during test run: {json}")
}
