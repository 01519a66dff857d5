use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use tracing::warn;

use crate::error::{CiError, Result};

pub const CONFIG_FILE: &str = "browser-ci.toml";

/// Everything a run needs, resolved once at startup and threaded through.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub browser: BrowserConfig,
    pub reporter: ReporterConfig,
    pub cloud: CloudConfig,
    /// Forces the harness to replay a previous randomized order. Command line only.
    #[serde(skip)]
    pub seed: Option<String>,
}

/// How the harness page is hosted.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Command line launching the harness server. `{port}` is replaced with the
    /// ephemeral port, which is also exported as `PORT`.
    /// Example: "npx jasmine-browser-runner serve --config=spec/support/jasmine-browser.json --port={port}"
    pub command: String,
    pub startup_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            command: "npx jasmine-browser-runner serve --port={port}".into(),
            startup_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub name: String,
    pub webdriver_url: String,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            name: "firefox".into(),
            webdriver_url: "http://localhost:4444".into(),
        }
    }
}

impl BrowserConfig {
    pub fn kind(&self) -> Result<BrowserKind> {
        self.name.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowserKind {
    Firefox,
    Chrome,
    Edge,
    Safari,
}

impl BrowserKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BrowserKind::Firefox => "firefox",
            BrowserKind::Chrome => "chrome",
            BrowserKind::Edge => "MicrosoftEdge",
            BrowserKind::Safari => "safari",
        }
    }
}

impl std::str::FromStr for BrowserKind {
    type Err = CiError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "firefox" => Ok(BrowserKind::Firefox),
            "chrome" => Ok(BrowserKind::Chrome),
            "edge" | "microsoftedge" => Ok(BrowserKind::Edge),
            "safari" => Ok(BrowserKind::Safari),
            _ => Err(CiError::Config(format!("unknown browser '{s}'"))),
        }
    }
}

/// Controls how the in-page reporter is polled and paged.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ReporterConfig {
    pub batch_size: usize,
    pub poll_interval_ms: u64,
    /// Upper bound on waiting for the run to finish. Absent means wait forever.
    pub timeout_secs: Option<u64>,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            poll_interval_ms: 500,
            timeout_secs: None,
        }
    }
}

impl ReporterConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Remote grid settings. Only used when `enabled`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub enabled: bool,
    pub username: Option<String>,
    pub access_key: Option<String>,
    /// Host and path of the grid, without scheme or credentials.
    pub hub: String,
    pub platform: Option<String>,
    pub browser_version: Option<String>,
    pub build: Option<String>,
    pub tunnel_identifier: Option<String>,
    pub tags: Vec<String>,
    pub name_prefix: String,
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            username: None,
            access_key: None,
            hub: "localhost:4445/wd/hub".into(),
            platform: None,
            browser_version: None,
            build: None,
            tunnel_identifier: None,
            tags: vec!["Jasmine-Core".into()],
            name_prefix: "jasmine-core".into(),
        }
    }
}

/// Values taken from the command line or the environment. `None` keeps the file value.
#[derive(Debug, Default)]
pub struct Overrides {
    pub browser: Option<String>,
    pub webdriver_url: Option<String>,
    pub cloud: Option<bool>,
    pub username: Option<String>,
    pub access_key: Option<String>,
    pub platform: Option<String>,
    pub browser_version: Option<String>,
    pub build: Option<String>,
    pub tunnel_identifier: Option<String>,
    pub seed: Option<String>,
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Load `browser-ci.toml` from the workspace root, or `explicit` when given.
    ///
    /// A missing or invalid workspace file falls back to defaults; an explicit
    /// file must exist and parse.
    pub fn load(workspace: &Path, explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            let content = std::fs::read_to_string(path)
                .map_err(|e| CiError::Config(format!("cannot read {}: {e}", path.display())))?;
            return toml::from_str(&content)
                .map_err(|e| CiError::Config(format!("invalid {}: {e}", path.display())));
        }

        let path = workspace.join(CONFIG_FILE);
        let Ok(content) = std::fs::read_to_string(&path) else {
            return Ok(Self::default());
        };
        Ok(toml::from_str(&content).unwrap_or_else(|e| {
            warn!("Ignoring invalid {}: {}", path.display(), e);
            Self::default()
        }))
    }

    pub fn apply(&mut self, overrides: Overrides) {
        let Overrides {
            browser,
            webdriver_url,
            cloud,
            username,
            access_key,
            platform,
            browser_version,
            build,
            tunnel_identifier,
            seed,
            timeout_secs,
        } = overrides;

        if let Some(name) = browser {
            self.browser.name = name;
        }
        if let Some(url) = webdriver_url {
            self.browser.webdriver_url = url;
        }
        if let Some(enabled) = cloud {
            self.cloud.enabled = enabled;
        }
        self.cloud.username = username.or(self.cloud.username.take());
        self.cloud.access_key = access_key.or(self.cloud.access_key.take());
        self.cloud.platform = platform.or(self.cloud.platform.take());
        self.cloud.browser_version = browser_version.or(self.cloud.browser_version.take());
        self.cloud.build = build.or(self.cloud.build.take());
        self.cloud.tunnel_identifier = tunnel_identifier.or(self.cloud.tunnel_identifier.take());
        self.seed = seed.or(self.seed.take());
        self.reporter.timeout_secs = timeout_secs.or(self.reporter.timeout_secs);
    }

    /// Reject settings that would make the run meaningless before anything is started.
    pub fn validate(&self) -> Result<()> {
        if self.reporter.batch_size == 0 {
            return Err(CiError::Config("reporter.batch_size must be at least 1".into()));
        }
        if self.reporter.poll_interval_ms == 0 {
            return Err(CiError::Config(
                "reporter.poll_interval_ms must be at least 1".into(),
            ));
        }
        self.browser.kind()?;
        if let Some(seed) = &self.seed
            && (seed.is_empty() || !seed.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            return Err(CiError::Config(format!(
                "seed '{seed}' must be alphanumeric"
            )));
        }
        if self.cloud.enabled && (self.cloud.username.is_none() || self.cloud.access_key.is_none())
        {
            return Err(CiError::Config(
                "cloud mode requires a username and an access key".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_workspace_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path(), None).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.reporter.batch_size, 50);
        assert_eq!(config.reporter.poll_interval(), Duration::from_millis(500));
        assert_eq!(config.reporter.timeout(), None);
    }

    #[test]
    fn test_workspace_file_overrides_selected_fields() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
[server]
command = "node serve.js --port {port}"

[reporter]
batch_size = 20
timeout_secs = 600

[cloud]
tags = ["nightly"]
"#,
        )
        .unwrap();

        let config = Config::load(dir.path(), None).unwrap();
        assert_eq!(config.server.command, "node serve.js --port {port}");
        assert_eq!(config.server.startup_timeout_secs, 30);
        assert_eq!(config.reporter.batch_size, 20);
        assert_eq!(config.reporter.timeout(), Some(Duration::from_secs(600)));
        assert_eq!(config.cloud.tags, vec!["nightly".to_string()]);
        assert_eq!(config.browser.name, "firefox");
    }

    #[test]
    fn test_seed_in_file_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "seed = \"12345\"\n\n[reporter]\nbatch_size = 10\n",
        )
        .unwrap();

        let config = Config::load(dir.path(), None).unwrap();
        assert_eq!(config.seed, None);
        assert_eq!(config.reporter.batch_size, 10);
    }

    #[test]
    fn test_invalid_workspace_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "reporter = [").unwrap();
        assert_eq!(Config::load(dir.path(), None).unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_explicit_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[reporter]\nbatch_size = \"many\"").unwrap();

        let err = Config::load(Path::new("."), Some(file.path())).unwrap_err();
        assert!(matches!(err, CiError::Config(_)));
    }

    #[test]
    fn test_overrides_win_over_file_values() {
        let mut config = Config::default();
        config.cloud.build = Some("from-file".into());
        config.cloud.platform = Some("Linux".into());

        config.apply(Overrides {
            browser: Some("chrome".into()),
            cloud: Some(true),
            username: Some("ci".into()),
            access_key: Some("key".into()),
            build: Some("77".into()),
            seed: Some("12345".into()),
            ..Overrides::default()
        });

        assert_eq!(config.browser.kind().unwrap(), BrowserKind::Chrome);
        assert!(config.cloud.enabled);
        assert_eq!(config.cloud.build.as_deref(), Some("77"));
        assert_eq!(config.cloud.platform.as_deref(), Some("Linux"));
        assert_eq!(config.seed.as_deref(), Some("12345"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_batch_size() {
        let mut config = Config::default();
        config.reporter.batch_size = 0;
        assert!(matches!(config.validate(), Err(CiError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_unknown_browser_and_bad_seed() {
        let mut config = Config::default();
        config.browser.name = "netscape".into();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.seed = Some("12&random=false".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_cloud_without_credentials() {
        let mut config = Config::default();
        config.cloud.enabled = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_browser_names_are_case_insensitive() {
        assert_eq!("Firefox".parse::<BrowserKind>().unwrap(), BrowserKind::Firefox);
        assert_eq!("MicrosoftEdge".parse::<BrowserKind>().unwrap(), BrowserKind::Edge);
    }
}
