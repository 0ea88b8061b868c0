use std::collections::HashSet;

use serde::Serialize;

use crate::models::ScrapedJob;

/// A failed target and the classified message recorded against it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetError {
    pub target: String,
    pub message: String,
}

/// Counters for one orchestrator invocation.
///
/// Constructed at the start of a run and returned with its results; never
/// shared between runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScrapeRunStats {
    pub total_targets: usize,
    pub successful: usize,
    pub failed: usize,
    /// Postings inspected across all targets, before filtering and merging.
    pub total_jobs_seen: usize,
    /// Jobs kept after filtering and cross-target deduplication.
    pub remote_jobs_kept: usize,
    pub errors: Vec<TargetError>,
}

impl ScrapeRunStats {
    pub fn new(total_targets: usize) -> Self {
        Self {
            total_targets,
            ..Self::default()
        }
    }

    pub fn record_success(&mut self, jobs_seen: usize, jobs_kept: usize) {
        self.successful += 1;
        self.total_jobs_seen += jobs_seen;
        self.remote_jobs_kept += jobs_kept;
    }

    pub fn record_failure(&mut self, target: impl Into<String>, message: impl Into<String>) {
        self.failed += 1;
        self.errors.push(TargetError {
            target: target.into(),
            message: message.into(),
        });
    }

    /// Targets that reached a terminal status.
    pub fn processed(&self) -> usize {
        self.successful + self.failed
    }

    /// `successful / total * 100`; zero when there were no targets.
    pub fn success_rate(&self) -> f64 {
        if self.total_targets == 0 {
            return 0.0;
        }
        self.successful as f64 / self.total_targets as f64 * 100.0
    }

    /// The first `n` errors in the order they were recorded.
    pub fn top_errors(&self, n: usize) -> &[TargetError] {
        &self.errors[..n.min(self.errors.len())]
    }

    /// One-line human-readable summary.
    pub fn summary(&self) -> String {
        format!(
            "{}/{} targets succeeded ({:.1}%), {} failed, {} jobs seen, {} kept",
            self.successful,
            self.total_targets,
            self.success_rate(),
            self.failed,
            self.total_jobs_seen,
            self.remote_jobs_kept
        )
    }
}

/// Seen-set merge over `(platform, external_id)`.
///
/// The first occurrence of a key wins; later duplicates are dropped without
/// error. A caller can hold one merger across several runs to deduplicate
/// across adapters.
#[derive(Debug, Default)]
pub struct JobMerger {
    seen: HashSet<(String, String)>,
}

impl JobMerger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep the jobs whose key has not been seen yet, in input order.
    pub fn merge(&mut self, jobs: impl IntoIterator<Item = ScrapedJob>) -> Vec<ScrapedJob> {
        jobs.into_iter()
            .filter(|job| self.seen.insert(job.dedup_key()))
            .collect()
    }

    pub fn contains(&self, platform: &str, external_id: &str) -> bool {
        self.seen
            .contains(&(platform.to_string(), external_id.to_string()))
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}
