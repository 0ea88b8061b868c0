use std::time::Duration;

use nomad_core::error::AppError;
use nomad_core::models::{FetchedJobs, ScrapeTarget, compute_hash};
use nomad_core::normalize::slugify;
use nomad_core::traits::{HttpClient, JobSource, RequestOptions};
use tracing::{debug, info};

use super::embedded::{JSON_LD, extract_jobs, parse_blocks};
use super::{EmbeddedAdapter, FeedAdapter, Normalizer, RawPosting, RestJsonAdapter};
use crate::html::{CardFields, scrape_cards, script_blocks};
use crate::registry::{PlatformDescriptor, PlatformRegistry, SourceFamily};

/// Platform name on jobs scraped from pages no descriptor matched.
const GENERIC: &str = "generic";

/// Detects each target's platform and delegates to the matching family.
///
/// A target no descriptor matches is scraped directly: JSON-LD postings
/// first, then heuristic job cards.
#[derive(Clone)]
pub struct GenericAdapter<H: HttpClient> {
    http: H,
    registry: PlatformRegistry,
    request_timeout: Option<Duration>,
}

impl<H: HttpClient> GenericAdapter<H> {
    pub fn new(http: H, registry: PlatformRegistry) -> Self {
        Self {
            http,
            registry,
            request_timeout: None,
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn registry(&self) -> &PlatformRegistry {
        &self.registry
    }

    async fn delegate(
        &self,
        descriptor: &PlatformDescriptor,
        target: &ScrapeTarget,
    ) -> Result<FetchedJobs, AppError> {
        let target = descriptor.retarget(target);
        let http = self.http.clone();
        let name = descriptor.name;

        // Concrete adapters, not `PlatformAdapter`: that enum contains this
        // adapter, and its future would then contain itself.
        match descriptor.family {
            SourceFamily::RestJson(profile) => {
                let mut adapter = RestJsonAdapter::new(http, name, profile);
                if let Some(timeout) = self.request_timeout {
                    adapter = adapter.with_request_timeout(timeout);
                }
                adapter.fetch_jobs(&target).await
            }
            SourceFamily::Embedded(profile) => {
                let mut adapter = EmbeddedAdapter::new(http, name, profile);
                if let Some(timeout) = self.request_timeout {
                    adapter = adapter.with_request_timeout(timeout);
                }
                adapter.fetch_jobs(&target).await
            }
            SourceFamily::Feed(profile) => {
                let mut adapter = FeedAdapter::new(http, name, profile);
                if let Some(timeout) = self.request_timeout {
                    adapter = adapter.with_request_timeout(timeout);
                }
                adapter.fetch_jobs(&target).await
            }
        }
    }

    async fn scrape_page(&self, target: &ScrapeTarget) -> Result<FetchedJobs, AppError> {
        let url = target
            .source_url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                AppError::MissingMetadata(format!(
                    "no known platform for {} and no source URL to scrape",
                    target.label()
                ))
            })?;

        let mut options = RequestOptions::html();
        if let Some(timeout) = self.request_timeout {
            options = options.with_timeout(timeout);
        }
        let page = self.http.get(url, &options).await?.error_for_status(url)?;

        let documents = parse_blocks(&script_blocks(&page.body, JSON_LD.anchors));
        let structured = extract_jobs(GENERIC, &JSON_LD, &documents, target, url);
        if structured.seen > 0 {
            debug!(url, seen = structured.seen, "Using JSON-LD postings");
            return Ok(structured);
        }

        let cards = scrape_cards(&page.body, url);
        debug!(url, cards = cards.len(), "Falling back to page job cards");
        Ok(jobs_from_cards(cards, target))
    }
}

fn jobs_from_cards(cards: Vec<CardFields>, target: &ScrapeTarget) -> FetchedJobs {
    let seen = cards.len();
    let normalizer = Normalizer {
        platform: GENERIC,
        target,
        prefiltered_remote: false,
        empty_location_is_remote: false,
    };

    let jobs = cards
        .into_iter()
        .filter_map(|card| {
            // Cards carry no id; hash what identifies the posting on the page.
            let key = format!(
                "{}|{}|{}",
                card.title.as_deref().unwrap_or_default(),
                card.company.as_deref().unwrap_or_default(),
                card.link.as_deref().unwrap_or_default()
            );
            normalizer.build(RawPosting {
                external_id: Some(compute_hash(&key)[..16].to_string()),
                company_slug: card.company.as_deref().map(slugify),
                description: card.description.unwrap_or_default(),
                location: card.location.unwrap_or_default(),
                salary: card.salary.map(serde_json::Value::String),
                url: card.link,
                title: card.title,
                ..Default::default()
            })
        })
        .collect();

    FetchedJobs::new(jobs, seen)
}

impl<H: HttpClient> JobSource for GenericAdapter<H> {
    fn name(&self) -> &str {
        GENERIC
    }

    async fn fetch_jobs(&self, target: &ScrapeTarget) -> Result<FetchedJobs, AppError> {
        match self
            .registry
            .detect(target.source_url.as_deref(), &target.company.slug)
        {
            Some(descriptor) => {
                info!(
                    company = target.label(),
                    platform = descriptor.name,
                    strategy = %descriptor.strategy(),
                    "Detected platform"
                );
                self.delegate(descriptor, target).await
            }
            None => {
                info!(company = target.label(), "No known platform, scraping page");
                self.scrape_page(target).await
            }
        }
    }
}
