use std::any::Any;
use std::io::Write;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tracing::{error, info, warn};

use crate::aggregate::AggregatedReport;
use crate::cleanup::cleanup;
use crate::config::Config;
use crate::error::{CiError, Result};
use crate::exit::{Verdict, report_overall_failures, resolve};
use crate::models::SpecResult;
use crate::report::ReportFormatter;
use crate::reporter::{
    await_completion, collect_all, collect_failed_suites, fetch_run_details, harness_url,
};
use crate::session::{BrowserSession, HarnessHost, HostHandle, SessionFactory, job_result_script};

/// Drives one run: host the harness, load it in a browser, wait, fetch, report.
pub struct Pipeline<'a> {
    config: &'a Config,
    host: &'a dyn HarnessHost,
    browsers: &'a dyn SessionFactory,
    color: bool,
}

/// Whatever has been acquired so far; cleanup releases exactly this.
#[derive(Default)]
struct Resources {
    host: Option<Box<dyn HostHandle>>,
    session: Option<Box<dyn BrowserSession>>,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub verdict: Verdict,
    /// Present when the run got as far as reporting.
    pub report: Option<AggregatedReport>,
    /// The error that aborted the run, if any.
    pub error: Option<CiError>,
    pub cleanup_errors: Vec<CiError>,
}

impl RunOutcome {
    pub fn exit_code(&self) -> u8 {
        self.verdict.exit_code()
    }
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a Config,
        host: &'a dyn HarnessHost,
        browsers: &'a dyn SessionFactory,
    ) -> Self {
        Self {
            config,
            host,
            browsers,
            color: true,
        }
    }

    pub fn with_color(mut self, color: bool) -> Self {
        self.color = color;
        self
    }

    /// Run once, writing the report to `out` and diagnostics to `err`.
    ///
    /// Cleanup always runs exactly once, whatever stage failed, and its
    /// failures never change the verdict.
    pub async fn execute<O: Write, E: Write>(&self, out: &mut O, err: &mut E) -> RunOutcome {
        let mut resources = Resources::default();

        let result = AssertUnwindSafe(self.run(&mut resources, out, err))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(CiError::Panic(panic_message(panic.as_ref()))));

        if let Err(e) = &result {
            error!("run aborted: {e}");
            let _ = writeln!(err, "{e}");
        }

        let cleanup_errors = cleanup(resources.session.take(), resources.host.take()).await;
        for e in &cleanup_errors {
            let _ = writeln!(err, "{e}");
        }

        match result {
            Ok((report, verdict)) => RunOutcome {
                verdict,
                report: Some(report),
                error: None,
                cleanup_errors,
            },
            Err(e) => RunOutcome {
                verdict: Verdict::Failed,
                report: None,
                error: Some(e),
                cleanup_errors,
            },
        }
    }

    async fn run<O: Write, E: Write>(
        &self,
        resources: &mut Resources,
        out: &mut O,
        err: &mut E,
    ) -> Result<(AggregatedReport, Verdict)> {
        let reporter = &self.config.reporter;

        let host = resources.host.insert(self.host.start().await?);
        let base_url = host.base_url();

        let session: &dyn BrowserSession =
            &**resources.session.insert(self.browsers.connect().await?);

        writeln!(out, "Running the tests in browser...")?;
        out.flush()?;

        let url = harness_url(&base_url, self.config.seed.as_deref());
        info!(%url, "loading harness");
        session.navigate(&url).await?;

        await_completion(session, reporter.poll_interval(), reporter.timeout()).await?;

        let specs = collect_all::<SpecResult>(session, reporter.batch_size).await?;
        let failed_suites = collect_failed_suites(session, reporter.batch_size).await?;
        let details = fetch_run_details(session).await?;
        info!(
            specs = specs.len(),
            failed_suites = failed_suites.len(),
            status = %details.overall_status,
            "run finished"
        );

        let report = AggregatedReport::new(specs, failed_suites, details);
        out.write_all(
            ReportFormatter::new(&base_url, self.color)
                .render(&report)
                .as_bytes(),
        )?;
        out.flush()?;

        let verdict = resolve(report.details());
        report_overall_failures(report.details(), err)?;

        if self.browsers.is_cloud()
            && let Err(e) = session
                .execute_script(&job_result_script(verdict.passed()))
                .await
        {
            warn!("failed to report job result to the grid: {e}");
        }

        Ok((report, verdict))
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockHost, MockReporter, MockSession, MockSessionFactory, spec};

    #[tokio::test(start_paused = true)]
    async fn test_navigation_uses_forced_seed() {
        let mut config = Config::default();
        config.seed = Some("98765".into());
        let session = MockSession::new(MockReporter::default());
        let host = MockHost::new(9876);
        let browsers = MockSessionFactory::new(session.clone());

        let outcome = Pipeline::new(&config, &host, &browsers)
            .execute(&mut Vec::<u8>::new(), &mut Vec::<u8>::new())
            .await;

        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(
            session.navigations(),
            vec!["http://localhost:9876/?throwFailures=false&failFast=false&random=true&seed=98765"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_pages_use_configured_batch_size() {
        let mut config = Config::default();
        config.reporter.batch_size = 2;
        let session = MockSession::new(MockReporter {
            specs: vec![spec("a", "passed"), spec("b", "passed"), spec("c", "passed")],
            ..MockReporter::default()
        });
        let host = MockHost::new(1);
        let browsers = MockSessionFactory::new(session.clone());

        let outcome = Pipeline::new(&config, &host, &browsers)
            .execute(&mut Vec::<u8>::new(), &mut Vec::<u8>::new())
            .await;

        assert_eq!(outcome.report.unwrap().specs().len(), 3);
        // specs (0,2) (2,2), then suites (0,2)
        assert_eq!(session.result_requests(), vec![(0, 2), (2, 2), (0, 2)]);
    }

    #[test]
    fn test_panic_message_extraction() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
