use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Failed to start harness server: {0}")]
    HostStart(String),

    #[error("Failed to stop harness server: {0}")]
    HostClose(String),

    #[error("Failed to start browser session: {0}")]
    SessionStart(String),

    #[error("Failed to close browser session: {0}")]
    SessionClose(String),

    #[error("Harness unreachable at {url}: {message}")]
    Navigation { url: String, message: String },

    #[error("Script error: {0}")]
    Script(String),

    #[error("Unexpected {what} payload from reporter: {source}")]
    Decode {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("Run did not finish within {} second(s)", .0.as_secs())]
    RunDidNotFinish(Duration),

    #[error("Run aborted by panic: {0}")]
    Panic(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CiError>;
