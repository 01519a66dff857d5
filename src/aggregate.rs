use std::collections::HashMap;

use crate::models::{RunDetails, SpecResult, SpecStatus, SuiteResult};

/// Specs bucketed by status, each bucket in fetch order.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusBuckets(HashMap<SpecStatus, Vec<SpecResult>>);

impl StatusBuckets {
    pub fn get(&self, status: SpecStatus) -> &[SpecResult] {
        self.0.get(&status).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn count(&self, status: SpecStatus) -> usize {
        self.get(status).len()
    }

    pub fn total(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }
}

/// Partition `specs` by status. Every status gets a bucket, even when empty.
pub fn aggregate(specs: &[SpecResult]) -> StatusBuckets {
    let mut buckets: HashMap<SpecStatus, Vec<SpecResult>> =
        SpecStatus::ALL.iter().map(|s| (*s, Vec::new())).collect();
    for spec in specs {
        buckets.entry(spec.status).or_default().push(spec.clone());
    }
    StatusBuckets(buckets)
}

/// Everything the formatter and exit resolver need about one finished run.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedReport {
    specs: Vec<SpecResult>,
    buckets: StatusBuckets,
    failed_suites: Vec<SuiteResult>,
    details: RunDetails,
}

impl AggregatedReport {
    /// `failed_suites` is filtered again so only failed suites are ever retained.
    pub fn new(specs: Vec<SpecResult>, failed_suites: Vec<SuiteResult>, details: RunDetails) -> Self {
        let buckets = aggregate(&specs);
        Self {
            specs,
            buckets,
            failed_suites: failed_suites.into_iter().filter(SuiteResult::is_failed).collect(),
            details,
        }
    }

    /// All specs in fetch order.
    pub fn specs(&self) -> &[SpecResult] {
        &self.specs
    }

    pub fn by_status(&self, status: SpecStatus) -> &[SpecResult] {
        self.buckets.get(status)
    }

    pub fn buckets(&self) -> &StatusBuckets {
        &self.buckets
    }

    pub fn failed_suites(&self) -> &[SuiteResult] {
        &self.failed_suites
    }

    pub fn details(&self) -> &RunDetails {
        &self.details
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing;

    fn specs(statuses: &[&str]) -> Vec<SpecResult> {
        statuses
            .iter()
            .enumerate()
            .map(|(i, status)| {
                serde_json::from_value(testing::spec(&format!("s{i}"), status)).unwrap()
            })
            .collect()
    }

    #[test]
    fn test_every_status_is_seeded() {
        let buckets = aggregate(&[]);
        for status in SpecStatus::ALL {
            assert!(buckets.get(status).is_empty());
        }
        assert_eq!(buckets.total(), 0);
    }

    #[test]
    fn test_aggregate_is_a_partition() {
        let input = specs(&[
            "passed", "failed", "pending", "passed", "excluded", "none", "failed", "passed",
        ]);
        let buckets = aggregate(&input);

        assert_eq!(buckets.total(), input.len());
        for spec in &input {
            let homes: Vec<_> = SpecStatus::ALL
                .iter()
                .filter(|s| buckets.get(**s).iter().any(|b| b.full_name == spec.full_name))
                .collect();
            assert_eq!(homes, vec![&spec.status]);
        }
    }

    #[test]
    fn test_buckets_preserve_fetch_order() {
        let input = specs(&["failed", "passed", "failed", "failed"]);
        let buckets = aggregate(&input);

        let failed: Vec<_> = buckets
            .get(SpecStatus::Failed)
            .iter()
            .map(|s| s.full_name.as_str())
            .collect();
        assert_eq!(failed, vec!["s0", "s2", "s3"]);
        assert_eq!(buckets.count(SpecStatus::Passed), 1);
    }

    #[test]
    fn test_report_keeps_only_failed_suites() {
        let suites: Vec<SuiteResult> = vec![
            serde_json::from_value(testing::suite("ok", "passed")).unwrap(),
            serde_json::from_value(testing::suite("broken", "failed")).unwrap(),
        ];
        let details: RunDetails = serde_json::from_value(testing::details("failed")).unwrap();

        let report = AggregatedReport::new(specs(&["passed"]), suites, details);

        assert_eq!(report.failed_suites().len(), 1);
        assert_eq!(report.failed_suites()[0].full_name, "broken");
        assert_eq!(report.specs().len(), 1);
        assert_eq!(report.by_status(SpecStatus::Passed).len(), 1);
    }
}
