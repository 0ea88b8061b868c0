use std::time::Duration;

use nomad_core::error::AppError;
use nomad_core::models::{FetchedJobs, ScrapeTarget};
use nomad_core::normalize::{list_items, parse_timestamp, slugify};
use nomad_core::traits::{HttpClient, JobSource, RequestOptions};
use serde_json::Value;
use tracing::debug;

use super::{Normalizer, RawPosting, render_template};
use crate::payload::{collect_strings, first_bool, first_string, first_value, string_list};

/// Field mapping for one JSON API.
///
/// Each field lists paths tried in order (see [`crate::payload`]). An empty
/// list means the API never carries that field.
#[derive(Debug, Clone, Copy)]
pub struct RestJsonProfile {
    /// Listing URL. Placeholders: `{slug}`, `{source}`, `{meta:<key>}`.
    pub url_template: &'static str,
    /// Where the postings array lives; empty for a top-level array.
    pub jobs_path: &'static str,
    /// Metadata keys the target's company must carry.
    pub required_metadata: &'static [&'static str],
    pub id: &'static [&'static str],
    pub title: &'static [&'static str],
    pub description: &'static [&'static str],
    pub location: &'static [&'static str],
    pub url: &'static [&'static str],
    /// Posting URL built from `{slug}` and `{id}` when `url` finds nothing.
    pub url_fallback: Option<&'static str>,
    pub published_at: &'static [&'static str],
    pub remote: &'static [&'static str],
    pub employment_type: &'static [&'static str],
    pub salary: &'static [&'static str],
    pub countries: &'static [&'static str],
    pub tags: &'static [&'static str],
    pub requirements: &'static [&'static str],
    pub benefits: &'static [&'static str],
    /// When set, the company slug comes from this field instead of the target.
    pub company: &'static [&'static str],
    /// The API only returns remote postings.
    pub prefiltered_remote: bool,
    /// Treat a posting with no location as remote.
    pub empty_location_is_remote: bool,
}

impl RestJsonProfile {
    /// A profile with every field mapping empty.
    pub const fn new(url_template: &'static str, jobs_path: &'static str) -> Self {
        Self {
            url_template,
            jobs_path,
            required_metadata: &[],
            id: &["id"],
            title: &["title"],
            description: &["description"],
            location: &["location"],
            url: &["url"],
            url_fallback: None,
            published_at: &[],
            remote: &[],
            employment_type: &[],
            salary: &[],
            countries: &[],
            tags: &[],
            requirements: &[],
            benefits: &[],
            company: &[],
            prefiltered_remote: false,
            empty_location_is_remote: false,
        }
    }
}

/// Adapter for platforms that publish jobs through a JSON API.
#[derive(Clone)]
pub struct RestJsonAdapter<H: HttpClient> {
    http: H,
    platform: &'static str,
    profile: &'static RestJsonProfile,
    request_timeout: Option<Duration>,
}

impl<H: HttpClient> RestJsonAdapter<H> {
    pub fn new(http: H, platform: &'static str, profile: &'static RestJsonProfile) -> Self {
        Self {
            http,
            platform,
            profile,
            request_timeout: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    fn options(&self) -> RequestOptions {
        let options = RequestOptions::json();
        match self.request_timeout {
            Some(timeout) => options.with_timeout(timeout),
            None => options,
        }
    }

    fn raw_posting(&self, item: &Value, target: &ScrapeTarget) -> RawPosting {
        let p = self.profile;
        let external_id = first_string(item, p.id);
        let url = first_string(item, p.url).or_else(|| {
            let template = p.url_fallback?;
            render_template(template, target, external_id.as_deref()).ok()
        });

        RawPosting {
            title: first_string(item, p.title),
            company_slug: first_string(item, p.company)
                .map(|name| slugify(&name)),
            description: first_string(item, p.description).unwrap_or_default(),
            location: first_string(item, p.location).unwrap_or_default(),
            remote_flag: first_bool(item, p.remote),
            salary: first_value(item, p.salary).cloned(),
            employment_type: first_string(item, p.employment_type),
            published_at: first_value(item, p.published_at).and_then(parse_timestamp),
            countries: collect_strings(item, p.countries),
            tags: collect_strings(item, p.tags),
            requirements: list_field(item, p.requirements),
            benefits: list_field(item, p.benefits),
            external_id,
            url,
        }
    }
}

/// Requirements and benefits arrive either as an HTML blob or as a list.
fn list_field(item: &Value, paths: &[&str]) -> Vec<String> {
    match first_value(item, paths) {
        Some(Value::String(blob)) => list_items(blob),
        Some(other) => string_list(other),
        None => Vec::new(),
    }
}

/// Locate the postings array inside a payload.
fn postings<'a>(payload: &'a Value, jobs_path: &str) -> Result<&'a Vec<Value>, AppError> {
    let container = if jobs_path.is_empty() {
        Some(payload)
    } else {
        crate::payload::at(payload, jobs_path)
    };

    container.and_then(Value::as_array).ok_or_else(|| {
        let location = if jobs_path.is_empty() {
            "top-level array".to_string()
        } else {
            format!("'{jobs_path}' array")
        };
        AppError::MalformedResponse(format!("expected {location} of postings"))
    })
}

impl<H: HttpClient> JobSource for RestJsonAdapter<H> {
    fn name(&self) -> &str {
        self.platform
    }

    async fn fetch_jobs(&self, target: &ScrapeTarget) -> Result<FetchedJobs, AppError> {
        for key in self.profile.required_metadata {
            if target.company.metadata_str(key).is_none() {
                return Err(AppError::MissingMetadata(format!(
                    "{} requires metadata '{key}' for {}",
                    self.platform,
                    target.label()
                )));
            }
        }

        let url = render_template(self.profile.url_template, target, None)?;
        debug!(platform = self.platform, url = %url, "Fetching job listing");

        let response = self
            .http
            .get(&url, &self.options())
            .await?
            .error_for_status(&url)?;
        let payload = response.json()?;
        let items = postings(&payload, self.profile.jobs_path)?;

        let normalizer = Normalizer {
            platform: self.platform,
            target,
            prefiltered_remote: self.profile.prefiltered_remote,
            empty_location_is_remote: self.profile.empty_location_is_remote,
        };
        let jobs: Vec<_> = items
            .iter()
            .filter_map(|item| normalizer.build(self.raw_posting(item, target)))
            .collect();

        debug!(
            platform = self.platform,
            seen = items.len(),
            kept = jobs.len(),
            "Normalized postings"
        );
        Ok(FetchedJobs::new(jobs, items.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nomad_core::testutil::{MockHttpClient, make_test_target};
    use serde_json::json;

    static BOARD: RestJsonProfile = RestJsonProfile {
        location: &["/location/name"],
        url: &["absolute_url"],
        published_at: &["updated_at"],
        remote: &["remote"],
        tags: &["departments"],
        requirements: &["requirements"],
        salary: &["pay"],
        ..RestJsonProfile::new("https://api.test/boards/{slug}/jobs", "jobs")
    };

    static TOP_LEVEL: RestJsonProfile = RestJsonProfile {
        required_metadata: &["uid", "token"],
        url: &[],
        url_fallback: Some("https://jobs.test/{slug}/{id}"),
        prefiltered_remote: true,
        ..RestJsonProfile::new("https://api.test/{meta:uid}/positions?token={meta:token}", "")
    };

    const BOARD_URL: &str = "https://api.test/boards/acme/jobs";

    fn board_payload() -> String {
        json!({
            "jobs": [
                {
                    "id": 101,
                    "title": "Senior Rust Engineer",
                    "description": "<p>Build the engine</p>",
                    "location": {"name": "Remote, EU"},
                    "absolute_url": "https://jobs.test/101",
                    "updated_at": "2024-02-01T12:00:00Z",
                    "departments": [{"name": "Platform"}],
                    "requirements": "<ul><li>Rust</li><li>Tokio</li></ul>",
                    "pay": {"min": 90000, "max": 110000, "currency": "eur"}
                },
                {
                    "id": 102,
                    "title": "Office Manager",
                    "location": {"name": "Berlin"},
                    "absolute_url": "https://jobs.test/102"
                },
                {
                    "id": 103,
                    "title": "Support Engineer",
                    "remote": true,
                    "location": {"name": "Lisbon"},
                    "absolute_url": "https://jobs.test/103"
                },
                {
                    "id": 104,
                    "location": {"name": "Remote"},
                    "absolute_url": "https://jobs.test/104"
                }
            ]
        })
        .to_string()
    }

    #[tokio::test]
    async fn fetches_and_filters_remote_postings() {
        let http = MockHttpClient::new().with_response(BOARD_URL, 200, &board_payload());
        let adapter = RestJsonAdapter::new(http.clone(), "board", &BOARD);

        let fetched = adapter.fetch_jobs(&make_test_target("acme")).await.unwrap();

        assert_eq!(fetched.seen, 4);
        let ids: Vec<_> = fetched.jobs.iter().map(|j| j.external_id.as_str()).collect();
        assert_eq!(ids, vec!["101", "103"]);

        let job = &fetched.jobs[0];
        assert_eq!(job.platform, "board");
        assert_eq!(job.company_slug, "acme");
        assert_eq!(job.description, "Build the engine");
        assert_eq!(job.location, "Remote, EU");
        assert_eq!(job.tags, vec!["rust", "Platform"]);
        assert_eq!(job.requirements, vec!["Rust", "Tokio"]);
        assert_eq!(job.salary.as_deref(), Some("EUR 90,000 - 110,000"));
        assert_eq!(job.published_at.to_rfc3339(), "2024-02-01T12:00:00+00:00");

        assert_eq!(http.requested_urls(), vec![BOARD_URL.to_string()]);
    }

    #[tokio::test]
    async fn empty_listing_is_success() {
        let http = MockHttpClient::new().with_response(BOARD_URL, 200, r#"{"jobs": []}"#);
        let adapter = RestJsonAdapter::new(http, "board", &BOARD);

        let fetched = adapter.fetch_jobs(&make_test_target("acme")).await.unwrap();
        assert_eq!(fetched, FetchedJobs::empty());
    }

    #[tokio::test]
    async fn unknown_board_is_not_found() {
        let adapter = RestJsonAdapter::new(MockHttpClient::new(), "board", &BOARD);
        let err = adapter.fetch_jobs(&make_test_target("acme")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn throttled_and_malformed_responses() {
        let http = MockHttpClient::new().with_response(BOARD_URL, 429, "slow down");
        let adapter = RestJsonAdapter::new(http, "board", &BOARD);
        let err = adapter.fetch_jobs(&make_test_target("acme")).await.unwrap_err();
        assert!(matches!(err, AppError::RateLimited { status_code: 429, .. }));

        let http = MockHttpClient::new().with_response(BOARD_URL, 200, "<html>oops</html>");
        let adapter = RestJsonAdapter::new(http, "board", &BOARD);
        let err = adapter.fetch_jobs(&make_test_target("acme")).await.unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse(_)));

        let http = MockHttpClient::new().with_response(BOARD_URL, 200, r#"{"postings": []}"#);
        let adapter = RestJsonAdapter::new(http, "board", &BOARD);
        let err = adapter.fetch_jobs(&make_test_target("acme")).await.unwrap_err();
        assert!(err.to_string().contains("'jobs' array"));
    }

    #[tokio::test]
    async fn missing_metadata_short_circuits() {
        let http = MockHttpClient::new();
        let adapter = RestJsonAdapter::new(http.clone(), "positions", &TOP_LEVEL);

        let mut target = make_test_target("acme");
        target.company.metadata = json!({"uid": "C1"});

        let err = adapter.fetch_jobs(&target).await.unwrap_err();
        assert!(matches!(err, AppError::MissingMetadata(_)));
        assert!(err.to_string().contains("token"));
        assert!(http.requested_urls().is_empty());
    }

    #[tokio::test]
    async fn top_level_array_with_url_fallback() {
        let url = "https://api.test/C1/positions?token=t0k";
        let body = json!([
            {"id": "A1", "title": "Data Engineer", "location": "Porto"},
            {"id": "A2", "title": "Designer"}
        ])
        .to_string();
        let http = MockHttpClient::new().with_response(url, 200, &body);
        let adapter = RestJsonAdapter::new(http, "positions", &TOP_LEVEL)
            .with_request_timeout(Duration::from_secs(5));

        let mut target = make_test_target("acme");
        target.company.metadata = json!({"uid": "C1", "token": "t0k"});

        let fetched = adapter.fetch_jobs(&target).await.unwrap();
        assert_eq!(fetched.seen, 2);
        assert_eq!(fetched.jobs.len(), 2);
        assert_eq!(fetched.jobs[0].external_url, "https://jobs.test/acme/A1");
        assert_eq!(fetched.jobs[0].location, "Porto");
        assert_eq!(fetched.jobs[1].location, "Remote");
        assert!(fetched.jobs.iter().all(|j| j.remote));
    }

    #[tokio::test]
    async fn passes_request_timeout() {
        let http = MockHttpClient::new().with_response(BOARD_URL, 200, r#"{"jobs": []}"#);
        let adapter = RestJsonAdapter::new(http.clone(), "board", &BOARD)
            .with_request_timeout(Duration::from_secs(3));
        adapter.fetch_jobs(&make_test_target("acme")).await.unwrap();

        let requests = http.requests.lock().unwrap();
        assert_eq!(requests[0].1.timeout, Some(Duration::from_secs(3)));
    }
}
