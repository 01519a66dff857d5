use std::time::Duration;

use serde_json::Value;
use tokio::time::sleep;
use tracing::trace;

use super::ReporterQuery;
use crate::error::{CiError, Result};
use crate::session::BrowserSession;

/// Wait until the reporter signals the run has finished, checking every `interval`.
///
/// With no `timeout` this waits indefinitely.
pub async fn await_completion(
    session: &dyn BrowserSession,
    interval: Duration,
    timeout: Option<Duration>,
) -> Result<()> {
    let wait = poll_until_finished(session, interval);
    match timeout {
        Some(limit) => tokio::time::timeout(limit, wait)
            .await
            .map_err(|_| CiError::RunDidNotFinish(limit))?,
        None => wait.await,
    }
}

async fn poll_until_finished(session: &dyn BrowserSession, interval: Duration) -> Result<()> {
    let script = ReporterQuery::Finished.to_script();
    let mut checks = 0u64;
    loop {
        sleep(interval).await;
        checks += 1;
        let finished = session.execute_script(&script).await?;
        if is_truthy(&finished) {
            trace!(checks, "reporter finished");
            return Ok(());
        }
        trace!(checks, "reporter still running");
    }
}

/// JavaScript truthiness for a value returned from the page.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
