use std::future::Future;
use std::time::Duration;

use uuid::Uuid;

use crate::error::AppError;
use crate::models::{FetchedJobs, ScrapeTarget, TargetStatus};

/// Per-request options passed to an [`HttpClient`].
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Overrides the client's default timeout when set.
    pub timeout: Option<Duration>,
    /// Extra headers layered over the client's defaults.
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// `Accept` header for JSON APIs.
    pub fn json() -> Self {
        Self::new().with_header("Accept", "application/json")
    }

    /// `Accept` header for HTML pages.
    pub fn html() -> Self {
        Self::new().with_header(
            "Accept",
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
        )
    }

    /// `Accept` header for RSS/Atom feeds.
    pub fn feed() -> Self {
        Self::new().with_header(
            "Accept",
            "application/rss+xml,application/xml;q=0.9,text/xml;q=0.8,*/*;q=0.5",
        )
    }
}

/// Raw response from an [`HttpClient`]. Non-success statuses are returned,
/// not raised, so adapters can tell "not found" apart from other failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status_code: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status_code: u16, body: impl Into<String>) -> Self {
        Self {
            status_code,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Map a non-success status onto the error taxonomy.
    pub fn error_for_status(self, url: &str) -> Result<Self, AppError> {
        match self.status_code {
            200..=299 => Ok(self),
            404 | 410 => Err(AppError::NotFound(url.to_string())),
            401 | 403 | 429 => Err(AppError::RateLimited {
                status_code: self.status_code,
                url: url.to_string(),
            }),
            status_code => Err(AppError::HttpError {
                status_code,
                url: url.to_string(),
            }),
        }
    }

    /// Parse the body as JSON, classifying failures as malformed responses.
    pub fn json(&self) -> Result<serde_json::Value, AppError> {
        serde_json::from_str(&self.body)
            .map_err(|e| AppError::MalformedResponse(format!("invalid JSON body: {e}")))
    }
}

/// Issues HTTP GET requests.
pub trait HttpClient: Send + Sync + Clone {
    fn get(
        &self,
        url: &str,
        options: &RequestOptions,
    ) -> impl Future<Output = Result<HttpResponse, AppError>> + Send;
}

/// Reads enabled targets and records per-target status.
///
/// Must tolerate one `update_status` call per state transition, including
/// successful zero-result outcomes.
pub trait TargetStore: Send + Sync {
    fn enabled_targets_for(
        &self,
        job_board_id: Uuid,
    ) -> impl Future<Output = Result<Vec<ScrapeTarget>, AppError>> + Send;

    fn update_status(
        &self,
        target_id: Uuid,
        status: TargetStatus,
        message: Option<&str>,
    ) -> impl Future<Output = Result<(), AppError>> + Send;
}

/// Fetches and normalizes the jobs for one target.
///
/// An empty result is success. Implementations return only valid jobs.
pub trait JobSource: Send + Sync {
    /// Platform name, used as the `platform` of produced jobs and in logs.
    fn name(&self) -> &str;

    fn fetch_jobs(
        &self,
        target: &ScrapeTarget,
    ) -> impl Future<Output = Result<FetchedJobs, AppError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn status_mapping() {
        let ok = HttpResponse::new(200, "{}");
        assert!(ok.clone().error_for_status("u").is_ok());

        let kind = |code| {
            HttpResponse::new(code, "")
                .error_for_status("https://api.example.com/acme")
                .unwrap_err()
                .kind()
        };
        assert_eq!(kind(404), ErrorKind::NotFound);
        assert_eq!(kind(410), ErrorKind::NotFound);
        assert_eq!(kind(403), ErrorKind::RateLimited);
        assert_eq!(kind(429), ErrorKind::RateLimited);
        assert_eq!(kind(500), ErrorKind::Upstream);
    }

    #[test]
    fn json_body_errors_are_malformed() {
        let err = HttpResponse::new(200, "<html>").json().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
        assert_eq!(
            HttpResponse::new(200, r#"{"jobs":[]}"#).json().unwrap()["jobs"],
            serde_json::json!([])
        );
    }

    #[test]
    fn request_options_builders() {
        let opts = RequestOptions::json().with_timeout(Duration::from_secs(5));
        assert_eq!(opts.timeout, Some(Duration::from_secs(5)));
        assert_eq!(opts.headers[0].0, "Accept");
    }
}
