//! In-memory collaborators for deterministic pipeline tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::error::{CiError, Result};
use crate::session::{BrowserSession, HarnessHost, HostHandle, SessionFactory};

/// Scripted state of the in-page reporter.
#[derive(Debug, Clone)]
pub struct MockReporter {
    pub specs: Vec<Value>,
    pub suites: Vec<Value>,
    pub details: Value,
    /// The run reports finished on this completion check (1-based); 0 means immediately.
    pub finished_after: usize,
}

impl Default for MockReporter {
    fn default() -> Self {
        Self {
            specs: Vec::new(),
            suites: Vec::new(),
            details: details("passed"),
            finished_after: 1,
        }
    }
}

/// Builds a spec record in the reporter's shape.
pub fn spec(full_name: &str, status: &str) -> Value {
    json!({
        "id": full_name,
        "description": full_name,
        "fullName": full_name,
        "status": status,
        "failedExpectations": [],
        "passedExpectations": [],
        "pendingReason": ""
    })
}

/// Builds a suite record in the reporter's shape.
pub fn suite(full_name: &str, status: &str) -> Value {
    json!({
        "id": full_name,
        "description": full_name,
        "fullName": full_name,
        "status": status,
        "failedExpectations": []
    })
}

/// Builds run details with the given overall status.
pub fn details(overall_status: &str) -> Value {
    json!({
        "overallStatus": overall_status,
        "overallFailures": [],
        "executionTime": 1234,
        "random": true,
        "seed": "07730"
    })
}

#[derive(Debug, Default)]
struct SessionLog {
    scripts: Vec<String>,
    navigations: Vec<String>,
    finished_checks: usize,
}

/// Browser session that answers reporter scripts from a [`MockReporter`].
///
/// Clones share their log, so a test can keep one clone and inspect it after
/// the pipeline has consumed and closed the other.
#[derive(Debug, Clone)]
pub struct MockSession {
    reporter: Arc<MockReporter>,
    log: Arc<Mutex<SessionLog>>,
    closes: Arc<AtomicUsize>,
    fail_navigation: bool,
    fail_close: bool,
    fail_scripts: Option<String>,
}

impl MockSession {
    pub fn new(reporter: MockReporter) -> Self {
        Self {
            reporter: Arc::new(reporter),
            log: Arc::new(Mutex::new(SessionLog::default())),
            closes: Arc::new(AtomicUsize::new(0)),
            fail_navigation: false,
            fail_close: false,
            fail_scripts: None,
        }
    }

    pub fn fail_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    pub fn fail_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    /// Any script containing `needle` fails as if the page threw.
    pub fn fail_scripts_containing(mut self, needle: &str) -> Self {
        self.fail_scripts = Some(needle.to_string());
        self
    }

    pub fn scripts(&self) -> Vec<String> {
        self.log.lock().unwrap().scripts.clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.log.lock().unwrap().navigations.clone()
    }

    pub fn finished_checks(&self) -> usize {
        self.log.lock().unwrap().finished_checks
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// `(start, count)` of every page request, in order.
    pub fn result_requests(&self) -> Vec<(usize, usize)> {
        self.scripts()
            .iter()
            .filter_map(|s| {
                page_range(s, "specResults(").or_else(|| page_range(s, "suiteResults("))
            })
            .collect()
    }
}

fn page_range(script: &str, call: &str) -> Option<(usize, usize)> {
    let args = &script[script.find(call)? + call.len()..];
    let args = &args[..args.find(')')?];
    let (start, count) = args.split_once(',')?;
    Some((start.trim().parse().ok()?, count.trim().parse().ok()?))
}

fn page(records: &[Value], start: usize, count: usize) -> Value {
    Value::Array(records.iter().skip(start).take(count).cloned().collect())
}

#[async_trait]
impl BrowserSession for MockSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.log.lock().unwrap().navigations.push(url.to_string());
        if self.fail_navigation {
            return Err(CiError::Navigation {
                url: url.to_string(),
                message: "connection refused".into(),
            });
        }
        Ok(())
    }

    async fn execute_script(&self, script: &str) -> Result<Value> {
        let mut log = self.log.lock().unwrap();
        log.scripts.push(script.to_string());

        if let Some(needle) = &self.fail_scripts
            && script.contains(needle.as_str())
        {
            return Err(CiError::Script("ReferenceError: jsApiReporter is not defined".into()));
        }

        if script.starts_with("sauce:") {
            return Ok(Value::Null);
        }
        if script.contains(".finished") {
            log.finished_checks += 1;
            return Ok(Value::Bool(
                log.finished_checks >= self.reporter.finished_after,
            ));
        }
        if let Some((start, count)) = page_range(script, "specResults(") {
            return Ok(page(&self.reporter.specs, start, count));
        }
        if let Some((start, count)) = page_range(script, "suiteResults(") {
            return Ok(page(&self.reporter.suites, start, count));
        }
        if script.contains("runDetails") {
            return Ok(self.reporter.details.clone());
        }
        Err(CiError::Script(format!("unexpected script: {script}")))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(CiError::SessionClose("browser already gone".into()));
        }
        Ok(())
    }
}

/// Hands out clones of one [`MockSession`].
#[derive(Debug, Clone)]
pub struct MockSessionFactory {
    session: MockSession,
    connects: Arc<AtomicUsize>,
    fail_connect: bool,
    cloud: bool,
}

impl MockSessionFactory {
    pub fn new(session: MockSession) -> Self {
        Self {
            session,
            connects: Arc::new(AtomicUsize::new(0)),
            fail_connect: false,
            cloud: false,
        }
    }

    pub fn fail_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    pub fn cloud(mut self) -> Self {
        self.cloud = true;
        self
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionFactory for MockSessionFactory {
    async fn connect(&self) -> Result<Box<dyn BrowserSession>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(CiError::SessionStart("no WebDriver at localhost:4444".into()));
        }
        Ok(Box::new(self.session.clone()))
    }

    fn is_cloud(&self) -> bool {
        self.cloud
    }
}

/// Harness host that never binds a socket.
#[derive(Debug, Clone)]
pub struct MockHost {
    port: u16,
    starts: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
    fail_start: bool,
    fail_close: bool,
}

impl MockHost {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            starts: Arc::new(AtomicUsize::new(0)),
            closes: Arc::new(AtomicUsize::new(0)),
            fail_start: false,
            fail_close: false,
        }
    }

    pub fn fail_start(mut self) -> Self {
        self.fail_start = true;
        self
    }

    pub fn fail_close(mut self) -> Self {
        self.fail_close = true;
        self
    }

    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HarnessHost for MockHost {
    async fn start(&self) -> Result<Box<dyn HostHandle>> {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if self.fail_start {
            return Err(CiError::HostStart("address already in use".into()));
        }
        Ok(Box::new(MockHostHandle {
            port: self.port,
            closes: Arc::clone(&self.closes),
            fail_close: self.fail_close,
        }))
    }
}

struct MockHostHandle {
    port: u16,
    closes: Arc<AtomicUsize>,
    fail_close: bool,
}

#[async_trait]
impl HostHandle for MockHostHandle {
    fn port(&self) -> u16 {
        self.port
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(CiError::HostClose("server already stopped".into()));
        }
        Ok(())
    }
}
