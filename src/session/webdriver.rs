use async_trait::async_trait;
use serde_json::{Map, Value, json};
use thirtyfour::{DesiredCapabilities, WebDriver};
use tracing::{debug, info};

use super::{BrowserSession, SessionFactory};
use crate::config::{BrowserKind, Config};
use crate::error::{CiError, Result};

/// Where and how to open the browser session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionTarget {
    /// A WebDriver server on this machine (geckodriver, chromedriver, ...).
    Local {
        browser: BrowserKind,
        webdriver_url: String,
    },
    /// A remote grid authenticated with a username and access key.
    Cloud {
        endpoint: String,
        capabilities: Map<String, Value>,
    },
}

pub struct WebDriverFactory {
    target: SessionTarget,
}

impl WebDriverFactory {
    pub fn new(target: SessionTarget) -> Self {
        Self { target }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(session_target(config, chrono::Utc::now())?))
    }
}

/// Resolve the session target. `now` stamps the cloud session name.
pub fn session_target(config: &Config, now: chrono::DateTime<chrono::Utc>) -> Result<SessionTarget> {
    let browser = config.browser.kind()?;
    if !config.cloud.enabled {
        return Ok(SessionTarget::Local {
            browser,
            webdriver_url: config.browser.webdriver_url.clone(),
        });
    }

    let cloud = &config.cloud;
    let (Some(username), Some(access_key)) = (&cloud.username, &cloud.access_key) else {
        return Err(CiError::Config(
            "cloud mode requires a username and an access key".into(),
        ));
    };

    let mut capabilities = Map::new();
    capabilities.insert(
        "name".into(),
        json!(format!("{} {}", cloud.name_prefix, now.to_rfc3339())),
    );
    capabilities.insert("browserName".into(), json!(browser.as_str()));
    if let Some(platform) = &cloud.platform {
        capabilities.insert("platform".into(), json!(platform));
    }
    if let Some(version) = &cloud.browser_version {
        capabilities.insert("version".into(), json!(version));
    }
    capabilities.insert(
        "build".into(),
        json!(format!(
            "Core {}",
            cloud.build.as_deref().unwrap_or("Ran locally")
        )),
    );
    capabilities.insert("tags".into(), json!(cloud.tags));
    if let Some(tunnel) = &cloud.tunnel_identifier {
        capabilities.insert("tunnel-identifier".into(), json!(tunnel));
    }

    Ok(SessionTarget::Cloud {
        endpoint: grid_endpoint(username, access_key, &cloud.hub),
        capabilities,
    })
}

/// Command URLs are joined relative to the endpoint, so it must end with `/`
/// or the last hub path segment is dropped.
fn grid_endpoint(username: &str, access_key: &str, hub: &str) -> String {
    format!(
        "http://{}:{}@{}/",
        urlencoding::encode(username),
        urlencoding::encode(access_key),
        hub.trim_end_matches('/')
    )
}

#[async_trait]
impl SessionFactory for WebDriverFactory {
    async fn connect(&self) -> Result<Box<dyn BrowserSession>> {
        let driver = match &self.target {
            SessionTarget::Local {
                browser,
                webdriver_url,
            } => {
                info!(browser = browser.as_str(), %webdriver_url, "building local browser session");
                let result = match browser {
                    BrowserKind::Firefox => {
                        WebDriver::new(webdriver_url.as_str(), DesiredCapabilities::firefox()).await
                    }
                    BrowserKind::Chrome => {
                        WebDriver::new(webdriver_url.as_str(), DesiredCapabilities::chrome()).await
                    }
                    BrowserKind::Edge => {
                        WebDriver::new(webdriver_url.as_str(), DesiredCapabilities::edge()).await
                    }
                    BrowserKind::Safari => {
                        WebDriver::new(webdriver_url.as_str(), DesiredCapabilities::safari()).await
                    }
                };
                result.map_err(|e| CiError::SessionStart(e.to_string()))?
            }
            SessionTarget::Cloud {
                endpoint,
                capabilities,
            } => {
                // The endpoint carries credentials; only the capabilities are logged.
                info!(?capabilities, "building remote grid session");
                WebDriver::new(endpoint.as_str(), capabilities.clone())
                    .await
                    .map_err(|e| CiError::SessionStart(e.to_string()))?
            }
        };
        Ok(Box::new(WebDriverSession { driver }))
    }

    fn is_cloud(&self) -> bool {
        matches!(self.target, SessionTarget::Cloud { .. })
    }
}

struct WebDriverSession {
    driver: WebDriver,
}

#[async_trait]
impl BrowserSession for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        debug!(url, "navigating");
        self.driver
            .goto(url)
            .await
            .map_err(|e| CiError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })
    }

    async fn execute_script(&self, script: &str) -> Result<Value> {
        self.driver
            .execute(script, Vec::<Value>::new())
            .await
            .map_err(|e| CiError::Script(e.to_string()))?
            .convert::<Value>()
            .map_err(|e| CiError::Script(e.to_string()))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.driver
            .quit()
            .await
            .map_err(|e| CiError::SessionClose(e.to_string()))
    }
}
