//! Source adapters, one per protocol family.
//!
//! Every adapter maps its payload onto a [`RawPosting`] and hands it to
//! [`Normalizer::build`], so validation and remote filtering behave the same
//! whichever family produced the posting.

pub mod embedded;
pub mod generic;
pub mod rest_json;
pub mod rss;

use std::time::Duration;

use chrono::{DateTime, Utc};
use nomad_core::error::AppError;
use nomad_core::models::{FetchedJobs, PlatformStrategy, ScrapeTarget, ScrapedJob};
use nomad_core::normalize::{
    RemoteSignals, clean_text, extract_tags_from_title, infer_seniority, is_remote_job,
    is_valid_job, location_implies_remote, map_employment_type, merge_tags, parse_salary,
};
use nomad_core::traits::{HttpClient, JobSource};
use serde_json::Value;

pub use embedded::{EmbeddedAdapter, EmbeddedProfile};
pub use generic::GenericAdapter;
pub use rest_json::{RestJsonAdapter, RestJsonProfile};
pub use rss::{FeedAdapter, FeedProfile};

use crate::registry::{PlatformDescriptor, PlatformRegistry, SourceFamily};

/// Fields pulled from one posting, before normalization.
#[derive(Debug, Clone, Default)]
pub(crate) struct RawPosting {
    pub external_id: Option<String>,
    pub title: Option<String>,
    /// Overrides the target's company slug, for multi-company sources.
    pub company_slug: Option<String>,
    /// May contain markup and entities.
    pub description: String,
    pub location: String,
    pub remote_flag: Option<bool>,
    pub salary: Option<Value>,
    pub employment_type: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub url: Option<String>,
    pub countries: Vec<String>,
    pub tags: Vec<String>,
    pub requirements: Vec<String>,
    pub benefits: Vec<String>,
}

/// Turns [`RawPosting`]s into valid [`ScrapedJob`]s for one target.
pub(crate) struct Normalizer<'a> {
    pub platform: &'a str,
    pub target: &'a ScrapeTarget,
    /// The source only lists remote jobs, so no remote filter applies.
    pub prefiltered_remote: bool,
    /// Opt-in: an empty location counts as a remote signal.
    pub empty_location_is_remote: bool,
}

impl Normalizer<'_> {
    /// `None` when the posting is invalid or not remote.
    pub fn build(&self, raw: RawPosting) -> Option<ScrapedJob> {
        let title = clean_text(raw.title.as_deref()?);
        let description = clean_text(&raw.description);
        let location = clean_text(&raw.location);

        let remote = self.prefiltered_remote
            || is_remote_job(&RemoteSignals {
                explicit: raw.remote_flag,
                location: &location,
                title: &title,
                description: &description,
            })
            || (self.empty_location_is_remote && location_implies_remote(&location));
        if !remote {
            return None;
        }

        let external_url = raw.url.unwrap_or_default().trim().to_string();
        let external_id = raw
            .external_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| external_url.clone());
        if external_id.is_empty() {
            return None;
        }

        let job = ScrapedJob {
            external_id,
            platform: self.platform.to_string(),
            company_slug: raw
                .company_slug
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| self.target.company.slug.clone()),
            seniority: infer_seniority(&title),
            employment_type: map_employment_type(raw.employment_type.as_deref()),
            tags: merge_tags(extract_tags_from_title(&title), raw.tags),
            salary: raw.salary.as_ref().and_then(parse_salary),
            title,
            description,
            location: if location.is_empty() && self.prefiltered_remote {
                "Remote".to_string()
            } else {
                location
            },
            remote: true,
            countries: raw.countries,
            requirements: raw.requirements,
            benefits: raw.benefits,
            external_url,
            published_at: raw.published_at.unwrap_or_else(Utc::now),
        };

        is_valid_job(&job).then_some(job)
    }
}

/// Fill `{slug}`, `{id}`, `{source}` and `{meta:<key>}` placeholders.
///
/// Slug, id and metadata values are URL-encoded; `{source}` is the target's
/// source URL verbatim. A missing value is [`AppError::MissingMetadata`].
pub(crate) fn render_template(
    template: &str,
    target: &ScrapeTarget,
    id: Option<&str>,
) -> Result<String, AppError> {
    let mut out = String::with_capacity(template.len() + 32);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            return Err(AppError::ConfigError(format!(
                "unterminated placeholder in URL template '{template}'"
            )));
        };
        let key = &after[..close];

        let value = match key {
            "slug" => encode(&target.company.slug),
            "id" => encode(id.ok_or_else(|| {
                AppError::MissingMetadata(format!("no posting id for template '{template}'"))
            })?),
            "source" => target.source_url.clone().ok_or_else(|| {
                AppError::MissingMetadata(format!("{} has no source URL", target.label()))
            })?,
            _ => match key.strip_prefix("meta:") {
                Some(meta_key) => encode(&target.company.metadata_str(meta_key).ok_or_else(
                    || {
                        AppError::MissingMetadata(format!(
                            "{} is missing metadata '{meta_key}'",
                            target.label()
                        ))
                    },
                )?),
                None => {
                    return Err(AppError::ConfigError(format!(
                        "unknown placeholder '{{{key}}}' in URL template '{template}'"
                    )));
                }
            },
        };

        out.push_str(&value);
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    Ok(out)
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// A job source for one protocol family, or the detecting dispatcher.
#[derive(Clone)]
pub enum PlatformAdapter<H: HttpClient> {
    RestJson(RestJsonAdapter<H>),
    Embedded(EmbeddedAdapter<H>),
    Feed(FeedAdapter<H>),
    Generic(GenericAdapter<H>),
}

impl<H: HttpClient> PlatformAdapter<H> {
    /// Adapter for a known platform.
    pub fn for_descriptor(http: H, descriptor: &PlatformDescriptor) -> Self {
        match descriptor.family {
            SourceFamily::RestJson(profile) => {
                Self::RestJson(RestJsonAdapter::new(http, descriptor.name, profile))
            }
            SourceFamily::Embedded(profile) => {
                Self::Embedded(EmbeddedAdapter::new(http, descriptor.name, profile))
            }
            SourceFamily::Feed(profile) => {
                Self::Feed(FeedAdapter::new(http, descriptor.name, profile))
            }
        }
    }

    /// Adapter that detects the platform per target.
    pub fn generic(http: H, registry: PlatformRegistry) -> Self {
        Self::Generic(GenericAdapter::new(http, registry))
    }

    /// Per-request timeout passed to the HTTP client.
    pub fn with_request_timeout(self, timeout: Duration) -> Self {
        match self {
            Self::RestJson(a) => Self::RestJson(a.with_request_timeout(timeout)),
            Self::Embedded(a) => Self::Embedded(a.with_request_timeout(timeout)),
            Self::Feed(a) => Self::Feed(a.with_request_timeout(timeout)),
            Self::Generic(a) => Self::Generic(a.with_request_timeout(timeout)),
        }
    }

    pub fn strategy(&self) -> PlatformStrategy {
        match self {
            Self::RestJson(_) => PlatformStrategy::RestJson,
            Self::Embedded(_) => PlatformStrategy::EmbeddedStructuredHtml,
            Self::Feed(_) => PlatformStrategy::RssFeed,
            Self::Generic(_) => PlatformStrategy::GenericFallback,
        }
    }
}

impl<H: HttpClient> JobSource for PlatformAdapter<H> {
    fn name(&self) -> &str {
        match self {
            Self::RestJson(a) => a.name(),
            Self::Embedded(a) => a.name(),
            Self::Feed(a) => a.name(),
            Self::Generic(a) => a.name(),
        }
    }

    async fn fetch_jobs(&self, target: &ScrapeTarget) -> Result<FetchedJobs, AppError> {
        match self {
            Self::RestJson(a) => a.fetch_jobs(target).await,
            Self::Embedded(a) => a.fetch_jobs(target).await,
            Self::Feed(a) => a.fetch_jobs(target).await,
            Self::Generic(a) => a.fetch_jobs(target).await,
        }
    }
}
