use serde::de::DeserializeOwned;
use tracing::debug;

use super::{ReporterQuery, ResultKind};
use crate::error::{CiError, Result};
use crate::models::{RunDetails, SpecResult, SuiteResult};
use crate::session::BrowserSession;

/// A record type the reporter hands out in pages.
pub trait ReporterRecord: DeserializeOwned + Send {
    const KIND: ResultKind;
}

impl ReporterRecord for SpecResult {
    const KIND: ResultKind = ResultKind::Spec;
}

impl ReporterRecord for SuiteResult {
    const KIND: ResultKind = ResultKind::Suite;
}

/// Fetch `count` records starting at `start`, with unserializable expectation
/// values already replaced by their sentinels in the page.
pub async fn fetch_page<T: ReporterRecord>(
    session: &dyn BrowserSession,
    start: usize,
    count: usize,
) -> Result<Vec<T>> {
    let script = ReporterQuery::Results {
        kind: T::KIND,
        start,
        count,
    }
    .to_script();
    let value = session.execute_script(&script).await?;
    let page: Vec<T> = serde_json::from_value(value).map_err(|source| CiError::Decode {
        what: T::KIND.as_str(),
        source,
    })?;
    debug!(kind = T::KIND.as_str(), start, len = page.len(), "fetched results page");
    Ok(page)
}

/// Fetch every record, one page at a time, preserving reporter order.
///
/// A page shorter than `page_size` (including an empty one) is the last.
pub async fn collect_all<T: ReporterRecord>(
    session: &dyn BrowserSession,
    page_size: usize,
) -> Result<Vec<T>> {
    if page_size == 0 {
        return Err(CiError::Config("page size must be at least 1".into()));
    }

    let mut results = Vec::new();
    let mut start = 0;
    loop {
        let page = fetch_page::<T>(session, start, page_size).await?;
        let len = page.len();
        results.extend(page);
        if len < page_size {
            break;
        }
        start += page_size;
    }
    Ok(results)
}

/// Failed suites are the only ones with diagnostic value; the rest are dropped here.
pub async fn collect_failed_suites(
    session: &dyn BrowserSession,
    page_size: usize,
) -> Result<Vec<SuiteResult>> {
    let suites = collect_all::<SuiteResult>(session, page_size).await?;
    Ok(suites.into_iter().filter(SuiteResult::is_failed).collect())
}

pub async fn fetch_run_details(session: &dyn BrowserSession) -> Result<RunDetails> {
    let value = session
        .execute_script(&ReporterQuery::RunDetails.to_script())
        .await?;
    serde_json::from_value(value).map_err(|source| CiError::Decode {
        what: "run details",
        source,
    })
}
