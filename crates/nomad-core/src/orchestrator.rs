use std::time::Duration;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::ScrapeConfig;
use crate::error::{AppError, ErrorKind};
use crate::models::{FetchedJobs, ScrapeTarget, ScrapedJob, TargetStatus};
use crate::stats::{JobMerger, ScrapeRunStats};
use crate::traits::{JobSource, TargetStore};

/// Events emitted by the orchestrator for monitoring/logging.
#[derive(Debug, Clone)]
pub enum RunEvent<'a> {
    RunStarted {
        source: &'a str,
        job_board_id: Uuid,
        targets: usize,
        batches: usize,
    },
    BatchStarted {
        index: usize,
        size: usize,
    },
    TargetStarted {
        target: &'a ScrapeTarget,
    },
    TargetSucceeded {
        target: &'a ScrapeTarget,
        jobs: usize,
        seen: usize,
    },
    TargetFailed {
        target: &'a ScrapeTarget,
        kind: ErrorKind,
        error: &'a str,
    },
    StatusWriteFailed {
        target_id: Uuid,
        status: TargetStatus,
        error: &'a str,
    },
    BatchDelay {
        after_batch: usize,
        delay: Duration,
    },
    Cancelled {
        remaining: usize,
    },
    RunFinished {
        source: &'a str,
        stats: &'a ScrapeRunStats,
    },
}

/// Trait for receiving run events (decoupled logging).
pub trait RunReporter: Send + Sync {
    fn report(&self, event: RunEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRunReporter;

impl RunReporter for TracingRunReporter {
    fn report(&self, event: RunEvent<'_>) {
        match event {
            RunEvent::RunStarted {
                source,
                job_board_id,
                targets,
                batches,
            } => {
                tracing::info!(%source, %job_board_id, %targets, %batches, "Run started");
            }
            RunEvent::BatchStarted { index, size } => {
                tracing::debug!(batch = index + 1, %size, "Processing batch");
            }
            RunEvent::TargetStarted { target } => {
                tracing::debug!(company = %target.label(), "Fetching target");
            }
            RunEvent::TargetSucceeded { target, jobs, seen } => {
                tracing::info!(company = %target.label(), %jobs, %seen, "Target succeeded");
            }
            RunEvent::TargetFailed {
                target,
                kind,
                error,
            } => match kind {
                ErrorKind::NotFound => {
                    tracing::info!(company = %target.label(), %error, "Target source not found");
                }
                ErrorKind::RateLimited => {
                    tracing::warn!(company = %target.label(), %error, "RATE LIMITED by source");
                }
                _ => {
                    tracing::warn!(company = %target.label(), %kind, %error, "Target failed");
                }
            },
            RunEvent::StatusWriteFailed {
                target_id,
                status,
                error,
            } => {
                tracing::error!(%target_id, %status, %error, "Failed to record target status");
            }
            RunEvent::BatchDelay { after_batch, delay } => {
                tracing::debug!(
                    batch = after_batch + 1,
                    delay_ms = %delay.as_millis(),
                    "Waiting before next batch"
                );
            }
            RunEvent::Cancelled { remaining } => {
                tracing::warn!(%remaining, "Run cancelled, remaining targets skipped");
            }
            RunEvent::RunFinished { source, stats } => {
                tracing::info!(
                    %source,
                    successful = stats.successful,
                    failed = stats.failed,
                    jobs_seen = stats.total_jobs_seen,
                    jobs_kept = stats.remote_jobs_kept,
                    success_rate = format!("{:.1}%", stats.success_rate()),
                    "Run finished"
                );
            }
        }
    }
}

/// Result of one orchestrator invocation.
#[derive(Debug, Clone, Default)]
pub struct ScrapeRun {
    /// Deduplicated jobs in the order they were first seen.
    pub jobs: Vec<ScrapedJob>,
    pub stats: ScrapeRunStats,
}

/// Drives one [`JobSource`] over a job board's enabled targets.
///
/// Targets are split into chunks of `max_concurrent`. Targets in a chunk run
/// concurrently; chunks run one after another with `inter_batch_delay`
/// between them. Every target ends the run as `success` or `error` unless the
/// run is cancelled before its chunk starts.
pub struct BatchOrchestrator<S, J>
where
    S: TargetStore,
    J: JobSource,
{
    store: S,
    source: J,
    config: ScrapeConfig,
}

impl<S, J> BatchOrchestrator<S, J>
where
    S: TargetStore,
    J: JobSource,
{
    pub fn new(store: S, source: J, config: ScrapeConfig) -> Self {
        Self {
            store,
            source,
            config,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn source(&self) -> &J {
        &self.source
    }

    /// Run every enabled target of a job board.
    ///
    /// Only a failure to list targets is returned as an error; per-target
    /// failures are recorded in the stats and the target store.
    pub async fn run<R: RunReporter>(
        &self,
        job_board_id: Uuid,
        cancel_token: &CancellationToken,
        reporter: &R,
    ) -> Result<ScrapeRun, AppError> {
        let mut merger = JobMerger::new();
        self.run_with_merger(job_board_id, &mut merger, cancel_token, reporter)
            .await
    }

    /// Like [`run`](Self::run), deduplicating against a caller-held merger
    /// so several runs can share one seen-set.
    pub async fn run_with_merger<R: RunReporter>(
        &self,
        job_board_id: Uuid,
        merger: &mut JobMerger,
        cancel_token: &CancellationToken,
        reporter: &R,
    ) -> Result<ScrapeRun, AppError> {
        let targets = self.store.enabled_targets_for(job_board_id).await?;
        Ok(self
            .run_targets(job_board_id, &targets, merger, cancel_token, reporter)
            .await)
    }

    /// Process an explicit target list.
    pub async fn run_targets<R: RunReporter>(
        &self,
        job_board_id: Uuid,
        targets: &[ScrapeTarget],
        merger: &mut JobMerger,
        cancel_token: &CancellationToken,
        reporter: &R,
    ) -> ScrapeRun {
        let chunk_size = self.config.max_concurrent.max(1);
        let mut stats = ScrapeRunStats::new(targets.len());
        let mut jobs = Vec::new();

        reporter.report(RunEvent::RunStarted {
            source: self.source.name(),
            job_board_id,
            targets: targets.len(),
            batches: targets.len().div_ceil(chunk_size),
        });

        for (index, chunk) in targets.chunks(chunk_size).enumerate() {
            if index > 0 && !self.config.inter_batch_delay.is_zero() {
                reporter.report(RunEvent::BatchDelay {
                    after_batch: index - 1,
                    delay: self.config.inter_batch_delay,
                });
                tokio::select! {
                    () = tokio::time::sleep(self.config.inter_batch_delay) => {}
                    () = cancel_token.cancelled() => {}
                }
            }

            if cancel_token.is_cancelled() {
                reporter.report(RunEvent::Cancelled {
                    remaining: targets.len() - index * chunk_size,
                });
                break;
            }

            reporter.report(RunEvent::BatchStarted {
                index,
                size: chunk.len(),
            });

            let outcomes = join_all(
                chunk
                    .iter()
                    .map(|target| self.process_target(target, reporter)),
            )
            .await;

            for (target, outcome) in chunk.iter().zip(outcomes) {
                match outcome {
                    Ok(fetched) => {
                        let kept = merger.merge(fetched.jobs);
                        stats.record_success(fetched.seen, kept.len());
                        jobs.extend(kept);
                    }
                    Err(message) => stats.record_failure(target.label(), message),
                }
            }
        }

        reporter.report(RunEvent::RunFinished {
            source: self.source.name(),
            stats: &stats,
        });

        ScrapeRun { jobs, stats }
    }

    /// Run one target: pending → adapter call → success | error.
    ///
    /// Never fails; adapter errors come back as the classified message.
    async fn process_target<R: RunReporter>(
        &self,
        target: &ScrapeTarget,
        reporter: &R,
    ) -> Result<FetchedJobs, String> {
        self.write_status(target, TargetStatus::Pending, None, reporter)
            .await;
        reporter.report(RunEvent::TargetStarted { target });

        let result =
            match tokio::time::timeout(self.config.target_timeout, self.source.fetch_jobs(target))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(AppError::Timeout(self.config.target_timeout.as_secs())),
            };

        match result {
            Ok(fetched) => {
                reporter.report(RunEvent::TargetSucceeded {
                    target,
                    jobs: fetched.jobs.len(),
                    seen: fetched.seen,
                });
                let message = format!("{} jobs", fetched.jobs.len());
                self.write_status(target, TargetStatus::Success, Some(&message), reporter)
                    .await;
                Ok(fetched)
            }
            Err(e) => {
                let message = e.classified_message();
                reporter.report(RunEvent::TargetFailed {
                    target,
                    kind: e.kind(),
                    error: &message,
                });
                self.write_status(target, TargetStatus::Error, Some(&message), reporter)
                    .await;
                Err(message)
            }
        }
    }

    async fn write_status<R: RunReporter>(
        &self,
        target: &ScrapeTarget,
        status: TargetStatus,
        message: Option<&str>,
        reporter: &R,
    ) {
        if let Err(e) = self.store.update_status(target.id, status, message).await {
            reporter.report(RunEvent::StatusWriteFailed {
                target_id: target.id,
                status,
                error: &e.to_string(),
            });
        }
    }
}
