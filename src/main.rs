use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;

use browser_ci::session::{CommandHost, WebDriverFactory};
use browser_ci::{Config, Overrides, Pipeline};

/// Run a browser-hosted test suite and report the result for CI.
///
/// Starts the harness server, drives a browser (local WebDriver or a remote
/// grid) through the suite in random order, prints a summary and exits 0 only
/// when the run passed.
#[derive(Parser, Debug)]
#[command(name = "browser-ci")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./browser-ci.toml when present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Browser to drive: firefox, chrome, edge or safari
    #[arg(long, env = "JASMINE_BROWSER")]
    browser: Option<String>,

    /// Local WebDriver endpoint
    #[arg(long, env = "WEBDRIVER_URL")]
    webdriver_url: Option<String>,

    /// Run on the remote grid ("true" enables)
    #[arg(long, env = "USE_SAUCE", value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    cloud: Option<String>,

    /// Grid username
    #[arg(long, env = "SAUCE_USERNAME", hide_env_values = true)]
    username: Option<String>,

    /// Grid access key
    #[arg(long, env = "SAUCE_ACCESS_KEY", hide_env_values = true)]
    access_key: Option<String>,

    /// Platform requested from the grid
    #[arg(long, env = "SAUCE_OS")]
    platform: Option<String>,

    /// Browser version requested from the grid
    #[arg(long, env = "SAUCE_BROWSER_VERSION")]
    browser_version: Option<String>,

    /// Build identifier attached to the grid session
    #[arg(long, env = "TRAVIS_BUILD_NUMBER")]
    build: Option<String>,

    /// Tunnel identifier for the grid session
    #[arg(long, env = "TRAVIS_JOB_NUMBER")]
    tunnel_identifier: Option<String>,

    /// Replay a previous run's order
    #[arg(long)]
    seed: Option<String>,

    /// Give up if the suite has not finished after this many seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Show debug logs on stderr
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            browser: self.browser.clone(),
            webdriver_url: self.webdriver_url.clone(),
            cloud: self.cloud.as_deref().map(|v| v == "true"),
            username: self.username.clone(),
            access_key: self.access_key.clone(),
            platform: self.platform.clone(),
            browser_version: self.browser_version.clone(),
            build: self.build.clone(),
            tunnel_identifier: self.tunnel_identifier.clone(),
            seed: self.seed.clone(),
            timeout_secs: self.timeout,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose)?;

    let workspace = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let mut config = Config::load(&workspace, cli.config.as_deref())
        .context("failed to load configuration")?;
    config.apply(cli.overrides());
    config.validate()?;

    let host = CommandHost::new(&config.server)?;
    let browsers = WebDriverFactory::from_config(&config)?;

    let outcome = Pipeline::new(&config, &host, &browsers)
        .with_color(!cli.no_color)
        .execute(&mut io::stdout(), &mut io::stderr())
        .await;

    Ok(outcome.verdict.into())
}

/// Logs go to stderr, or to the file named by `BROWSER_CI_DEBUG`, so they
/// never interleave with the report on stdout.
fn init_logging(verbose: bool) -> Result<()> {
    let debug_log = std::env::var("BROWSER_CI_DEBUG").ok();
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        if verbose || debug_log.is_some() {
            "browser_ci=debug".to_string()
        } else {
            "warn".to_string()
        }
    });

    match debug_log {
        Some(path) => {
            let file = std::fs::File::create(&path)
                .with_context(|| format!("failed to create debug log {path}"))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::stderr)
                .init();
        }
    }
    Ok(())
}
