use browser_ci::testing::{MockHost, MockSessionFactory};
use browser_ci::{Config, Pipeline, RunOutcome};

/// Captured output of one pipeline run.
pub struct Captured {
    pub outcome: RunOutcome,
    pub stdout: String,
    pub stderr: String,
}

pub async fn run(config: &Config, host: &MockHost, browsers: &MockSessionFactory) -> Captured {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let outcome = Pipeline::new(config, host, browsers)
        .with_color(false)
        .execute(&mut stdout, &mut stderr)
        .await;
    Captured {
        outcome,
        stdout: String::from_utf8(stdout).unwrap(),
        stderr: String::from_utf8(stderr).unwrap(),
    }
}
