use std::time::Duration;

use nomad_core::error::AppError;
use nomad_core::models::{FetchedJobs, ScrapeTarget};
use nomad_core::normalize::{list_items, parse_timestamp, slugify};
use nomad_core::traits::{HttpClient, JobSource, RequestOptions};
use serde_json::Value;
use tracing::{debug, warn};

use super::{Normalizer, RawPosting, render_template};
use crate::html::script_blocks;
use crate::payload::{at, collect_strings, first_bool, first_string, first_value, string_list};

/// Where to find structured data in a page, and what a posting looks like.
#[derive(Debug, Clone, Copy)]
pub struct EmbeddedProfile {
    /// Page URL. Placeholders: `{slug}`, `{source}`, `{meta:<key>}`.
    pub url_template: &'static str,
    /// CSS selectors for the `<script>` blocks holding JSON.
    pub anchors: &'static [&'static str],
    /// Type names (`@type`, `__typename`, or the `Type` of a `Type:ID` key)
    /// that identify a posting.
    pub type_tags: &'static [&'static str],
    /// Posting URL from `{slug}` and `{id}` when the item has none.
    pub url_fallback: Option<&'static str>,
    /// Take the company from `hiringOrganization` instead of the target.
    pub company_from_posting: bool,
    pub prefiltered_remote: bool,
    pub empty_location_is_remote: bool,
}

/// JSON-LD `JobPosting` blocks, as used by most career pages.
pub static JSON_LD: EmbeddedProfile = EmbeddedProfile {
    url_template: "{source}",
    anchors: &[r#"script[type="application/ld+json"]"#],
    type_tags: &["JobPosting"],
    url_fallback: None,
    company_from_posting: true,
    prefiltered_remote: false,
    empty_location_is_remote: false,
};

/// Adapter for pages that embed their listings as JSON in the markup.
#[derive(Clone)]
pub struct EmbeddedAdapter<H: HttpClient> {
    http: H,
    platform: &'static str,
    profile: &'static EmbeddedProfile,
    request_timeout: Option<Duration>,
}

impl<H: HttpClient> EmbeddedAdapter<H> {
    pub fn new(http: H, platform: &'static str, profile: &'static EmbeddedProfile) -> Self {
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
}

impl<H: HttpClient> JobSource for EmbeddedAdapter<H> {
    fn name(&self) -> &str {
        self.platform
    }

    async fn fetch_jobs(&self, target: &ScrapeTarget) -> Result<FetchedJobs, AppError> {
        let url = render_template(self.profile.url_template, target, None)?;
        debug!(platform = self.platform, url = %url, "Fetching page");

        let mut options = RequestOptions::html();
        if let Some(timeout) = self.request_timeout {
            options = options.with_timeout(timeout);
        }
        let page = self.http.get(&url, &options).await?.error_for_status(&url)?;

        let blocks = script_blocks(&page.body, self.profile.anchors);
        if blocks.is_empty() {
            return Err(AppError::MalformedResponse(format!(
                "no embedded data block in page {url}"
            )));
        }
        let documents = parse_blocks(&blocks);
        if documents.is_empty() {
            return Err(AppError::MalformedResponse(format!(
                "embedded data in {url} is not valid JSON"
            )));
        }

        let fetched = extract_jobs(self.platform, self.profile, &documents, target, &url);
        debug!(
            platform = self.platform,
            seen = fetched.seen,
            kept = fetched.jobs.len(),
            "Normalized postings"
        );
        Ok(fetched)
    }
}

/// Parse each block, skipping the ones that are not JSON.
pub(crate) fn parse_blocks(blocks: &[String]) -> Vec<Value> {
    blocks
        .iter()
        .filter_map(|block| match serde_json::from_str::<Value>(block.trim()) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "Skipping embedded block that is not valid JSON");
                None
            }
        })
        .collect()
}

/// Normalize every posting found in `documents`.
pub(crate) fn extract_jobs(
    platform: &str,
    profile: &EmbeddedProfile,
    documents: &[Value],
    target: &ScrapeTarget,
    page_url: &str,
) -> FetchedJobs {
    let mut postings = Vec::new();
    for doc in documents {
        collect_postings(doc, None, profile.type_tags, &mut postings);
    }

    let normalizer = Normalizer {
        platform,
        target,
        prefiltered_remote: profile.prefiltered_remote,
        empty_location_is_remote: profile.empty_location_is_remote,
    };
    let jobs = postings
        .iter()
        .filter_map(|item| normalizer.build(raw_posting(item, profile, target, page_url)))
        .collect();

    FetchedJobs::new(jobs, postings.len())
}

/// Walk a document for postings.
///
/// Handles flat lists, JSON-LD `@graph` wrappers and keyed graphs whose keys
/// look like `JobListing:123`. A matched posting is not descended into.
pub(crate) fn collect_postings<'a>(
    value: &'a Value,
    key: Option<&str>,
    type_tags: &[&str],
    out: &mut Vec<&'a Value>,
) {
    match value {
        Value::Object(obj) => {
            if is_posting(value, key, type_tags) {
                out.push(value);
                return;
            }
            for (child_key, child) in obj {
                collect_postings(child, Some(child_key), type_tags, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_postings(item, None, type_tags, out);
            }
        }
        _ => {}
    }
}

fn is_posting(value: &Value, key: Option<&str>, type_tags: &[&str]) -> bool {
    let tagged = |name: &str| type_tags.iter().any(|t| t.eq_ignore_ascii_case(name));

    let declared = ["@type", "__typename"]
        .iter()
        .filter_map(|field| value.get(*field))
        .flat_map(|t| match t {
            Value::String(s) => vec![s.as_str()],
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => Vec::new(),
        })
        .any(tagged);

    let keyed = key
        .and_then(|k| k.split_once(':'))
        .is_some_and(|(ty, id)| !id.is_empty() && tagged(ty));

    declared || keyed
}

fn raw_posting(
    item: &Value,
    profile: &EmbeddedProfile,
    target: &ScrapeTarget,
    page_url: &str,
) -> RawPosting {
    let external_id = first_string(item, &["/identifier/value", "identifier", "id", "slug"]);
    let url = first_string(item, &["url", "applyUrl", "jobUrl", "sameAs"])
        .or_else(|| {
            let template = profile.url_fallback?;
            render_template(template, target, external_id.as_deref()).ok()
        })
        .or_else(|| Some(page_url.to_string()));

    let telecommute = first_string(item, &["jobLocationType"])
        .map(|t| t.eq_ignore_ascii_case("telecommute"));
    let remote_flag = telecommute
        .filter(|t| *t)
        .or_else(|| first_bool(item, &["remote", "isRemote", "remoteOk"]));

    let mut countries = collect_strings(
        item,
        &["applicantLocationRequirements", "/jobLocation/address/addressCountry"],
    );
    if let Some(Value::Array(locations)) = at(item, "jobLocation") {
        for loc in locations {
            for country in collect_strings(loc, &["/address/addressCountry"]) {
                if !countries.contains(&country) {
                    countries.push(country);
                }
            }
        }
    }

    RawPosting {
        title: first_string(item, &["title", "name"]),
        company_slug: profile
            .company_from_posting
            .then(|| first_string(item, &["/hiringOrganization/name", "companyName"]))
            .flatten()
            .map(|name| slugify(&name)),
        description: first_string(item, &["description", "descriptionHtml", "descriptionSnippet"])
            .unwrap_or_default(),
        location: location_of(item),
        remote_flag,
        salary: first_value(item, &["baseSalary", "estimatedSalary", "compensation", "salary"])
            .cloned(),
        employment_type: first_string(item, &["employmentType", "jobType"]),
        published_at: first_value(item, &["datePosted", "liveStartAt", "publishedAt", "createdAt"])
            .and_then(parse_timestamp),
        countries,
        tags: collect_strings(item, &["skills", "occupationalCategory"]),
        requirements: blob_or_list(item, &["qualifications", "experienceRequirements"]),
        benefits: blob_or_list(item, &["jobBenefits", "benefits"]),
        external_id,
        url,
    }
}

/// JSON-LD `jobLocation` addresses, else the first plain location field.
fn location_of(item: &Value) -> String {
    let addresses: Vec<String> = match at(item, "jobLocation") {
        Some(Value::Array(locations)) => locations.iter().filter_map(address_line).collect(),
        Some(location) => address_line(location).into_iter().collect(),
        None => Vec::new(),
    };
    if !addresses.is_empty() {
        return addresses.join(" / ");
    }
    first_string(item, &["locationNames", "location", "/address/addressLocality"])
        .unwrap_or_default()
}

fn address_line(location: &Value) -> Option<String> {
    let address = at(location, "address")?;
    if let Value::String(s) = address {
        return Some(s.trim().to_string()).filter(|s| !s.is_empty());
    }
    let parts: Vec<String> = ["addressLocality", "addressRegion", "addressCountry"]
        .iter()
        .filter_map(|field| first_string(address, &[*field]))
        .collect();
    (!parts.is_empty()).then(|| parts.join(", "))
}

fn blob_or_list(item: &Value, paths: &[&str]) -> Vec<String> {
    match first_value(item, paths) {
        Some(Value::String(blob)) => list_items(blob),
        Some(other) => string_list(other),
        None => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nomad_core::testutil::{MockHttpClient, make_test_target};
    use serde_json::json;

    static GRAPH: EmbeddedProfile = EmbeddedProfile {
        url_template: "https://board.test/company/{slug}/jobs",
        anchors: &["script#__NEXT_DATA__"],
        type_tags: &["JobListing"],
        url_fallback: Some("https://board.test/jobs/{id}"),
        company_from_posting: false,
        prefiltered_remote: false,
        empty_location_is_remote: false,
    };

    fn page(script: &str) -> String {
        format!(
            r#"<html><head><script id="__NEXT_DATA__" type="application/json">{script}</script></head><body></body></html>"#
        )
    }

    #[test]
    fn walks_keyed_graphs() {
        let doc = json!({
            "props": {"apolloState": {
                "JobListing:1": {"id": "1", "title": "Rust Dev"},
                "JobListing:2": {"id": "2", "title": "Go Dev"},
                "Startup:9": {"name": "Acme"},
                "ROOT_QUERY": {"ref": {"type": "id", "id": "JobListing:1"}}
            }}
        });
        let mut found = Vec::new();
        collect_postings(&doc, None, &["JobListing"], &mut found);
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn walks_graph_wrappers_and_lists() {
        let doc = json!({
            "@context": "https://schema.org",
            "@graph": [
                {"@type": "Organization", "name": "Acme"},
                {"@type": ["JobPosting"], "title": "A"},
                {"@type": "JobPosting", "title": "B"}
            ]
        });
        let mut found = Vec::new();
        collect_postings(&doc, None, &["JobPosting"], &mut found);
        assert_eq!(found.len(), 2);

        let typed = json!([{"__typename": "JobListing", "title": "C"}]);
        let mut found = Vec::new();
        collect_postings(&typed, None, &["joblisting"], &mut found);
        assert_eq!(found.len(), 1);
    }

    #[tokio::test]
    async fn extracts_from_next_data() {
        let data = json!({
            "props": {"pageProps": {"apolloState": {"data": {
                "JobListing:11": {
                    "id": "11",
                    "title": "Senior Backend Engineer",
                    "description": "<p>APIs</p>",
                    "remote": true,
                    "locationNames": ["Berlin"],
                    "liveStartAt": 1704103200,
                    "jobType": "full_time",
                    "compensation": "$120k - $150k"
                },
                "JobListing:12": {"id": "12", "title": "Onsite Chef", "remote": false, "locationNames": ["Paris"]},
                "JobListing:13": {"id": "13", "remote": true}
            }}}}
        });
        let url = "https://board.test/company/acme/jobs";
        let http = MockHttpClient::new().with_response(url, 200, &page(&data.to_string()));
        let adapter = EmbeddedAdapter::new(http, "board", &GRAPH);

        let fetched = adapter.fetch_jobs(&make_test_target("acme")).await.unwrap();
        assert_eq!(fetched.seen, 3);
        assert_eq!(fetched.jobs.len(), 1);

        let job = &fetched.jobs[0];
        assert_eq!(job.external_id, "11");
        assert_eq!(job.external_url, "https://board.test/jobs/11");
        assert_eq!(job.location, "Berlin");
        assert_eq!(job.salary.as_deref(), Some("$120k - $150k"));
        assert_eq!(job.published_at.timestamp(), 1704103200);
        assert_eq!(job.company_slug, "acme");
    }

    #[test]
    fn reads_json_ld_postings() {
        let doc = json!({
            "@type": "JobPosting",
            "title": "Platform Engineer",
            "identifier": {"@type": "PropertyValue", "value": "PE-1"},
            "hiringOrganization": {"@type": "Organization", "name": "Globex Corp"},
            "jobLocationType": "TELECOMMUTE",
            "applicantLocationRequirements": [{"@type": "Country", "name": "Canada"}],
            "jobLocation": [{"address": {"addressLocality": "Toronto", "addressCountry": "CA"}}],
            "baseSalary": {"currency": "CAD", "value": {"minValue": 100000, "maxValue": 130000, "unitText": "YEAR"}},
            "employmentType": "CONTRACTOR",
            "datePosted": "2024-05-01",
            "qualifications": "<ul><li>Kubernetes</li></ul>"
        });
        let target = make_test_target("acme");
        let fetched = extract_jobs("generic", &JSON_LD, &[doc], &target, "https://globex.test/jobs/pe-1");

        assert_eq!(fetched.seen, 1);
        let job = &fetched.jobs[0];
        assert_eq!(job.external_id, "PE-1");
        assert_eq!(job.company_slug, "globex-corp");
        assert_eq!(job.external_url, "https://globex.test/jobs/pe-1");
        assert_eq!(job.location, "Toronto, CA");
        assert_eq!(job.countries, vec!["Canada", "CA"]);
        assert_eq!(job.salary.as_deref(), Some("CAD 100,000 - 130,000 / year"));
        assert_eq!(job.requirements, vec!["Kubernetes"]);
        assert!(job.remote);
    }

    #[tokio::test]
    async fn missing_or_broken_blocks_are_malformed() {
        let url = "https://board.test/company/acme/jobs";

        let http = MockHttpClient::new().with_response(url, 200, "<html><body>Hi</body></html>");
        let err = EmbeddedAdapter::new(http, "board", &GRAPH)
            .fetch_jobs(&make_test_target("acme"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::MalformedResponse(_)));

        let http = MockHttpClient::new().with_response(url, 200, &page("{not json"));
        let err = EmbeddedAdapter::new(http, "board", &GRAPH)
            .fetch_jobs(&make_test_target("acme"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not valid JSON"));
    }

    #[tokio::test]
    async fn page_without_postings_is_empty_success() {
        let url = "https://board.test/company/acme/jobs";
        let http = MockHttpClient::new().with_response(url, 200, &page(r#"{"props": {}}"#));
        let fetched = EmbeddedAdapter::new(http, "board", &GRAPH)
            .fetch_jobs(&make_test_target("acme"))
            .await
            .unwrap();
        assert_eq!(fetched, FetchedJobs::empty());
    }
}
