use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::status::SpecStatus;

/// Placeholder for an `expected` value the page could not serialize.
pub const CIRCULAR_EXPECTED: &str = "<circular expected>";
/// Placeholder for an `actual` value the page could not serialize.
pub const CIRCULAR_ACTUAL: &str = "<circular actual>";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpecResult {
    #[serde(default)]
    pub id: Option<String>,
    pub full_name: String,
    pub status: SpecStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub failed_expectations: Vec<Expectation>,
    #[serde(default)]
    pub passed_expectations: Option<Vec<Expectation>>,
    #[serde(default)]
    pub pending_reason: Option<String>,
}

impl SpecResult {
    /// The reporter sends an empty string when `pending()` was called without a reason.
    pub fn pending_reason(&self) -> Option<&str> {
        self.pending_reason.as_deref().filter(|r| !r.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuiteResult {
    #[serde(default)]
    pub id: Option<String>,
    pub full_name: String,
    pub status: SpecStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub failed_expectations: Vec<Expectation>,
}

impl SuiteResult {
    pub fn is_failed(&self) -> bool {
        self.status == SpecStatus::Failed
    }
}

/// One assertion. `expected`/`actual` are arbitrary JSON, or one of the
/// circular sentinels when the page could not serialize them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expectation {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default)]
    pub stack: Option<String>,
    #[serde(default)]
    pub expected: Value,
    #[serde(default)]
    pub actual: Value,
}

/// Overall outcome of the run, read once after completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDetails {
    pub overall_status: String,
    /// Harness-level failures outside any spec (load errors, afterAll at top level).
    #[serde(default, deserialize_with = "null_as_default")]
    pub overall_failures: Vec<Value>,
    /// Milliseconds.
    #[serde(default, deserialize_with = "null_as_default")]
    pub execution_time: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub random: bool,
    #[serde(default, deserialize_with = "seed_as_string")]
    pub seed: Option<String>,
}

impl RunDetails {
    pub fn passed(&self) -> bool {
        self.overall_status == "passed"
    }

    pub fn execution_secs(&self) -> f64 {
        self.execution_time / 1000.0
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Seeds are strings in the reporter but numeric when forced through the URL.
fn seed_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}
