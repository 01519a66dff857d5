//! Collaborators owned by the session controller: the process hosting the
//! harness page and the remote-controlled browser that loads it.

pub mod host;
pub mod webdriver;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use host::CommandHost;
pub use webdriver::WebDriverFactory;

/// Starts the server that hosts the harness page.
#[async_trait]
pub trait HarnessHost: Send + Sync {
    async fn start(&self) -> Result<Box<dyn HostHandle>>;
}

/// A running harness server bound to one port.
#[async_trait]
pub trait HostHandle: Send + Sync {
    fn port(&self) -> u16;

    /// Base URL of the harness page.
    fn base_url(&self) -> String {
        format!("http://localhost:{}", self.port())
    }

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Builds a browser session, local or on a remote grid.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn BrowserSession>>;

    /// Whether sessions report their job result back to a cloud provider.
    fn is_cloud(&self) -> bool {
        false
    }
}

#[async_trait]
pub trait BrowserSession: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    /// Evaluate `script` as a function body in the page and return its value.
    async fn execute_script(&self, script: &str) -> Result<Value>;

    async fn close(self: Box<Self>) -> Result<()>;
}

/// Vendor directive a cloud grid interprets as the job's pass/fail mark.
pub fn job_result_script(passed: bool) -> String {
    format!("sauce:job-result={passed}")
}
