//! Runs a browser-hosted test suite end to end and turns the in-page
//! reporter's state into a CI report and exit status.

pub mod aggregate;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod exit;
pub mod models;
pub mod pipeline;
pub mod report;
pub mod reporter;
pub mod session;
pub mod testing;

pub use aggregate::{AggregatedReport, aggregate};
pub use config::{Config, Overrides};
pub use error::{CiError, Result};
pub use exit::{Verdict, resolve};
pub use pipeline::{Pipeline, RunOutcome};
