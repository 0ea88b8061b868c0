//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{TimeZone, Utc};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{
    Company, EmploymentType, FetchedJobs, ScrapeTarget, ScrapedJob, Seniority, TargetStatus,
    compute_hash,
};
use crate::orchestrator::{RunEvent, RunReporter};
use crate::traits::{HttpClient, HttpResponse, JobSource, RequestOptions, TargetStore};

// ---------------------------------------------------------------------------
// MockHttpClient
// ---------------------------------------------------------------------------

/// Mock HTTP client with canned responses per URL.
///
/// Unknown URLs answer 404. Each URL holds a queue; the last queued response
/// is repeated once the queue would otherwise run dry.
#[derive(Clone, Default)]
pub struct MockHttpClient {
    responses: Arc<Mutex<HashMap<String, VecDeque<Result<HttpResponse, AppError>>>>>,
    pub requests: Arc<Mutex<Vec<(String, RequestOptions)>>>,
}

impl MockHttpClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `url` with `status` and `body`.
    pub fn with_response(self, url: &str, status: u16, body: &str) -> Self {
        self.push(url, Ok(HttpResponse::new(status, body)));
        self
    }

    pub fn with_error(self, url: &str, error: AppError) -> Self {
        self.push(url, Err(error));
        self
    }

    fn push(&self, url: &str, response: Result<HttpResponse, AppError>) {
        self.responses
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .push_back(response);
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }
}

impl HttpClient for MockHttpClient {
    async fn get(&self, url: &str, options: &RequestOptions) -> Result<HttpResponse, AppError> {
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), options.clone()));

        let mut responses = self.responses.lock().unwrap();
        match responses.get_mut(url) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(not_found),
            Some(queue) => match queue.front() {
                Some(Ok(resp)) => Ok(resp.clone()),
                Some(Err(_)) => queue.pop_front().unwrap_or_else(not_found),
                None => not_found(),
            },
            None => not_found(),
        }
    }
}

fn not_found() -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::new(404, "Not Found"))
}

// ---------------------------------------------------------------------------
// MockTargetStore
// ---------------------------------------------------------------------------

/// Recorded status write: (target_id, status, message).
pub type StatusRecord = (Uuid, TargetStatus, Option<String>);

/// Mock target store backed by an in-memory Vec.
#[derive(Clone)]
pub struct MockTargetStore {
    targets: Arc<Mutex<Vec<ScrapeTarget>>>,
    list_error: Arc<Mutex<Option<AppError>>>,
    fail_updates: bool,
    pub updates: Arc<Mutex<Vec<StatusRecord>>>,
}

impl MockTargetStore {
    pub fn with_targets(targets: Vec<ScrapeTarget>) -> Self {
        Self {
            targets: Arc::new(Mutex::new(targets)),
            list_error: Arc::new(Mutex::new(None)),
            fail_updates: false,
            updates: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_list_error(error: AppError) -> Self {
        Self {
            list_error: Arc::new(Mutex::new(Some(error))),
            ..Self::with_targets(Vec::new())
        }
    }

    /// Every `update_status` call returns an error.
    pub fn failing_updates(mut self) -> Self {
        self.fail_updates = true;
        self
    }

    /// Statuses written for a target, in order.
    pub fn history_for(&self, target_id: Uuid) -> Vec<TargetStatus> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .filter(|(id, _, _)| *id == target_id)
            .map(|(_, status, _)| *status)
            .collect()
    }

    pub fn final_status(&self, target_id: Uuid) -> Option<TargetStatus> {
        self.history_for(target_id).last().copied()
    }

    pub fn final_message(&self, target_id: Uuid) -> Option<String> {
        self.updates
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(id, _, _)| *id == target_id)
            .and_then(|(_, _, message)| message.clone())
    }
}

impl TargetStore for MockTargetStore {
    async fn enabled_targets_for(&self, _job_board_id: Uuid) -> Result<Vec<ScrapeTarget>, AppError> {
        if let Some(e) = self.list_error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(self.targets.lock().unwrap().clone())
    }

    async fn update_status(
        &self,
        target_id: Uuid,
        status: TargetStatus,
        message: Option<&str>,
    ) -> Result<(), AppError> {
        if self.fail_updates {
            return Err(AppError::Generic("status store unavailable".into()));
        }
        self.updates
            .lock()
            .unwrap()
            .push((target_id, status, message.map(String::from)));
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MockSource
// ---------------------------------------------------------------------------

/// Mock job source with canned outcomes per company slug.
///
/// Slugs without a configured outcome succeed with zero jobs.
#[derive(Clone, Default)]
pub struct MockSource {
    outcomes: Arc<Mutex<HashMap<String, Result<FetchedJobs, AppError>>>>,
    latency: Duration,
    in_flight: Arc<AtomicUsize>,
    max_in_flight: Arc<AtomicUsize>,
    calls: Arc<AtomicUsize>,
}

impl MockSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_jobs(self, slug: &str, jobs: Vec<ScrapedJob>) -> Self {
        let seen = jobs.len();
        self.outcomes
            .lock()
            .unwrap()
            .insert(slug.to_string(), Ok(FetchedJobs::new(jobs, seen)));
        self
    }

    pub fn with_error(self, slug: &str, error: AppError) -> Self {
        self.outcomes
            .lock()
            .unwrap()
            .insert(slug.to_string(), Err(error));
        self
    }

    /// Sleep this long inside every call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl JobSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    async fn fetch_jobs(&self, target: &ScrapeTarget) -> Result<FetchedJobs, AppError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.outcomes
            .lock()
            .unwrap()
            .remove(&target.company.slug)
            .unwrap_or_else(|| Ok(FetchedJobs::empty()))
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock run reporter that records event labels and batch sizes.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
    batches: Arc<Mutex<Vec<usize>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batch_sizes(&self) -> Vec<usize> {
        self.batches.lock().unwrap().clone()
    }

    pub fn count(&self, label: &str) -> usize {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| *e == label)
            .count()
    }
}

impl RunReporter for MockReporter {
    fn report(&self, event: RunEvent<'_>) {
        let label = match &event {
            RunEvent::RunStarted { .. } => "RunStarted",
            RunEvent::BatchStarted { size, .. } => {
                self.batches.lock().unwrap().push(*size);
                "BatchStarted"
            }
            RunEvent::TargetStarted { .. } => "TargetStarted",
            RunEvent::TargetSucceeded { .. } => "TargetSucceeded",
            RunEvent::TargetFailed { .. } => "TargetFailed",
            RunEvent::StatusWriteFailed { .. } => "StatusWriteFailed",
            RunEvent::BatchDelay { .. } => "BatchDelay",
            RunEvent::Cancelled { .. } => "Cancelled",
            RunEvent::RunFinished { .. } => "RunFinished",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// Fixed job board id shared by test targets.
pub fn test_board_id() -> Uuid {
    Uuid::from_u128(0x6e6f_6d61_645f_626f_6172_6400_0000_0001)
}

/// Deterministic target for a company slug: the same slug always yields the
/// same target id.
pub fn make_test_target(slug: &str) -> ScrapeTarget {
    let hash = compute_hash(slug);
    let id = u128::from_str_radix(&hash[..32], 16).unwrap_or_default();
    ScrapeTarget {
        id: Uuid::from_u128(id),
        job_board_id: test_board_id(),
        company: Company {
            slug: slug.to_string(),
            name: slug.to_uppercase(),
            metadata: serde_json::Value::Null,
        },
        source_url: None,
    }
}

/// A valid job on platform `"test"` with the given external id.
pub fn make_test_job(external_id: &str) -> ScrapedJob {
    ScrapedJob {
        external_id: external_id.to_string(),
        platform: "test".to_string(),
        company_slug: "acme".to_string(),
        title: "Backend Engineer".to_string(),
        description: "Build things remotely.".to_string(),
        location: "Remote".to_string(),
        salary: None,
        remote: true,
        countries: vec![],
        tags: vec![],
        seniority: Seniority::Mid,
        employment_type: EmploymentType::FullTime,
        requirements: vec![],
        benefits: vec![],
        external_url: format!("https://jobs.example.com/{external_id}"),
        published_at: Utc
            .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
            .single()
            .unwrap_or_else(Utc::now),
    }
}
