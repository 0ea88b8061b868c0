use std::time::Duration;

use nomad_core::error::AppError;
use nomad_core::models::{FetchedJobs, ScrapeTarget};
use nomad_core::normalize::{parse_timestamp_str, slugify};
use nomad_core::traits::{HttpClient, JobSource, RequestOptions};
use tracing::debug;

use super::{Normalizer, RawPosting};
use crate::feed::{FeedItem, parse_feed};

/// Settings for a remote-jobs feed.
#[derive(Debug, Clone, Copy)]
pub struct FeedProfile {
    /// Feed used when the target's source URL does not point at a feed.
    pub default_url: Option<&'static str>,
}

/// Adapter for aggregator RSS/Atom feeds. Every entry is remote by the
/// aggregator's own convention.
#[derive(Clone)]
pub struct FeedAdapter<H: HttpClient> {
    http: H,
    platform: &'static str,
    profile: &'static FeedProfile,
    request_timeout: Option<Duration>,
}

impl<H: HttpClient> FeedAdapter<H> {
    pub fn new(http: H, platform: &'static str, profile: &'static FeedProfile) -> Self {
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

    /// The target's own feed wins; a plain page URL falls back to the default.
    fn feed_url(&self, target: &ScrapeTarget) -> Result<String, AppError> {
        let source = target.source_url.as_deref().map(str::trim).filter(|u| !u.is_empty());
        match (source, self.profile.default_url) {
            (Some(url), Some(_)) if looks_like_feed(url) => Ok(url.to_string()),
            (_, Some(default)) => Ok(default.to_string()),
            (Some(url), None) => Ok(url.to_string()),
            (None, None) => Err(AppError::MissingMetadata(format!(
                "{} needs a feed URL for {}",
                self.platform,
                target.label()
            ))),
        }
    }
}

fn looks_like_feed(url: &str) -> bool {
    let lower = url.to_lowercase();
    ["rss", "feed", "atom", ".xml"].iter().any(|hint| lower.contains(hint))
}

/// Aggregator titles read `Company: Job title`. Split on the first colon when
/// both halves are non-empty.
fn split_title(title: &str) -> (Option<&str>, &str) {
    match title.split_once(':') {
        Some((company, rest)) if !company.trim().is_empty() && !rest.trim().is_empty() => {
            (Some(company.trim()), rest.trim())
        }
        _ => (None, title.trim()),
    }
}

fn raw_posting(item: FeedItem) -> RawPosting {
    let (title_company, title) = split_title(&item.title);
    let company = item.company.as_deref().or(title_company);
    let title = if item.company.is_some() {
        item.title.trim()
    } else {
        title
    };

    RawPosting {
        external_id: item.identifier().map(String::from),
        title: Some(title.to_string()),
        company_slug: company.map(slugify),
        location: item.region.clone().unwrap_or_default(),
        remote_flag: Some(true),
        employment_type: item.job_type.clone(),
        published_at: parse_timestamp_str(&item.pub_date),
        url: [item.link.as_str(), item.guid.as_str()]
            .into_iter()
            .find(|u| u.starts_with("http"))
            .map(String::from),
        description: item.description.clone(),
        tags: item.categories.clone(),
        ..Default::default()
    }
}

impl<H: HttpClient> JobSource for FeedAdapter<H> {
    fn name(&self) -> &str {
        self.platform
    }

    async fn fetch_jobs(&self, target: &ScrapeTarget) -> Result<FetchedJobs, AppError> {
        let url = self.feed_url(target)?;
        debug!(platform = self.platform, url = %url, "Fetching feed");

        let mut options = RequestOptions::feed();
        if let Some(timeout) = self.request_timeout {
            options = options.with_timeout(timeout);
        }
        let response = self.http.get(&url, &options).await?.error_for_status(&url)?;
        let items = parse_feed(&response.body)?;
        let seen = items.len();

        let normalizer = Normalizer {
            platform: self.platform,
            target,
            prefiltered_remote: true,
            empty_location_is_remote: false,
        };
        let jobs: Vec<_> = items
            .into_iter()
            .filter_map(|item| normalizer.build(raw_posting(item)))
            .collect();

        debug!(platform = self.platform, seen, kept = jobs.len(), "Normalized feed items");
        Ok(FetchedJobs::new(jobs, seen))
    }
}
