use tokio::task::JoinError;
use tracing::{debug, error};

use crate::error::{CiError, Result};
use crate::session::{BrowserSession, HostHandle};

/// Release the browser session and the harness server concurrently.
///
/// A missing resource counts as already released. Failures (including a
/// panicking close) are logged and returned, never raised.
pub async fn cleanup(
    session: Option<Box<dyn BrowserSession>>,
    host: Option<Box<dyn HostHandle>>,
) -> Vec<CiError> {
    let close_session = tokio::spawn(async move {
        match session {
            Some(session) => session.close().await,
            None => Ok(()),
        }
    });
    let close_host = tokio::spawn(async move {
        match host {
            Some(host) => host.close().await,
            None => Ok(()),
        }
    });

    let (session_result, host_result) = futures_util::future::join(close_session, close_host).await;

    let errors: Vec<CiError> = [
        flatten(session_result, CiError::SessionClose),
        flatten(host_result, CiError::HostClose),
    ]
    .into_iter()
    .filter_map(|r| r.err())
    .collect();

    if errors.is_empty() {
        debug!("cleanup complete");
    }
    for err in &errors {
        error!("cleanup: {err}");
    }
    errors
}

fn flatten(
    joined: std::result::Result<Result<()>, JoinError>,
    wrap: fn(String) -> CiError,
) -> Result<()> {
    joined.unwrap_or_else(|e| Err(wrap(format!("close task failed: {e}"))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::HarnessHost;
    use crate::testing::{MockHost, MockReporter, MockSession};
    use async_trait::async_trait;

    #[tokio::test]
    async fn test_absent_resources_are_already_closed() {
        assert!(cleanup(None, None).await.is_empty());
    }

    #[tokio::test]
    async fn test_closes_both_resources_once() {
        let session = MockSession::new(MockReporter::default());
        let host = MockHost::new(8888);
        let handle = host.start().await.ok();

        let errors = cleanup(Some(Box::new(session.clone())), handle).await;

        assert!(errors.is_empty());
        assert_eq!(session.close_count(), 1);
        assert_eq!(host.close_count(), 1);
    }

    #[tokio::test]
    async fn test_one_failure_does_not_stop_the_other_release() {
        let session = MockSession::new(MockReporter::default()).fail_close();
        let host = MockHost::new(8888);
        let handle = host.start().await.ok();

        let errors = cleanup(Some(Box::new(session.clone())), handle).await;

        assert_eq!(errors.len(), 1);
        assert!(matches!(errors[0], CiError::SessionClose(_)));
        assert_eq!(host.close_count(), 1);
    }

    struct PanickingSession;

    #[async_trait]
    impl BrowserSession for PanickingSession {
        async fn navigate(&self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn execute_script(&self, _script: &str) -> Result<serde_json::Value> {
            Ok(serde_json::Value::Null)
        }

        async fn close(self: Box<Self>) -> Result<()> {
            panic!("driver crashed");
        }
    }

    #[tokio::test]
    async fn test_panicking_close_is_reported_not_raised() {
        let host = MockHost::new(8888).fail_close();
        let handle = host.start().await.ok();

        let errors = cleanup(Some(Box::new(PanickingSession)), handle).await;

        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], CiError::SessionClose(_)));
        assert!(matches!(errors[1], CiError::HostClose(_)));
    }
}
