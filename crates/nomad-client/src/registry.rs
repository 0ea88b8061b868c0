//! Known platforms and URL-based detection.

use nomad_core::models::{PlatformStrategy, ScrapeTarget};
use url::Url;

use crate::adapters::{EmbeddedProfile, FeedProfile, RestJsonProfile};

/// Protocol family and its profile for one platform.
#[derive(Debug, Clone, Copy)]
pub enum SourceFamily {
    RestJson(&'static RestJsonProfile),
    Embedded(&'static EmbeddedProfile),
    Feed(&'static FeedProfile),
}

/// Where a matched URL carries the company's board slug.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugLocation {
    /// Zero-based path segment: `jobs.lever.co/<slug>` is segment 0.
    PathSegment(usize),
    /// Leftmost host label: `<slug>.recruitee.com`.
    Subdomain,
    /// Aggregators list many companies; there is no slug to extract.
    None,
}

#[derive(Debug, Clone, Copy)]
pub struct PlatformDescriptor {
    pub name: &'static str,
    /// Lowercase domains. A source URL matches when its host is one of them
    /// or a subdomain of one; a company slug matches on substring.
    pub patterns: &'static [&'static str],
    pub slug_location: SlugLocation,
    pub family: SourceFamily,
}

impl PlatformDescriptor {
    pub fn strategy(&self) -> PlatformStrategy {
        match self.family {
            SourceFamily::RestJson(_) => PlatformStrategy::RestJson,
            SourceFamily::Embedded(_) => PlatformStrategy::EmbeddedStructuredHtml,
            SourceFamily::Feed(_) => PlatformStrategy::RssFeed,
        }
    }

    fn matches_slug(&self, slug: &str) -> bool {
        let lower = slug.to_lowercase();
        self.patterns.iter().any(|p| lower.contains(p))
    }

    /// Whether the URL's host is one of this platform's domains or a
    /// subdomain of one. `clever.com` is not `lever.co`.
    pub fn matches_url(&self, url: &str) -> bool {
        let Some(host) = host_of(url) else {
            return false;
        };
        self.patterns.iter().any(|p| {
            host == *p
                || host
                    .strip_suffix(p)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    /// Board slug carried by a URL of this platform, if any.
    pub fn slug_from_url(&self, url: &str) -> Option<String> {
        let parsed = Url::parse(url.trim()).ok()?;
        let slug = match self.slug_location {
            SlugLocation::PathSegment(index) => parsed
                .path_segments()?
                .filter(|s| !s.is_empty())
                .nth(index)?
                .to_string(),
            SlugLocation::Subdomain => {
                let host = parsed.host_str()?;
                let (label, rest) = host.split_once('.')?;
                if label == "www" || !rest.contains('.') {
                    return None;
                }
                label.to_string()
            }
            SlugLocation::None => return None,
        };
        (!slug.is_empty()).then_some(slug)
    }

    /// Board slug for a target of this platform.
    ///
    /// Taken from the source URL when it points at this platform, otherwise
    /// from a company slug written as a platform address
    /// (`acme.workable.com`, `jobs.lever.co/acme`).
    pub fn board_slug(&self, source_url: Option<&str>, company_slug: &str) -> Option<String> {
        source_url
            .filter(|url| self.matches_url(url))
            .and_then(|url| self.slug_from_url(url))
            .or_else(|| self.board_from_slug(company_slug))
    }

    fn board_from_slug(&self, slug: &str) -> Option<String> {
        let slug = slug.trim().to_lowercase();
        if !self.matches_slug(&slug) {
            return None;
        }
        let url = if slug.contains("://") {
            slug
        } else {
            format!("https://{slug}")
        };
        if let Some(board) = self.slug_from_url(&url) {
            return Some(board);
        }

        // `<board>.<platform domain>`: the label right before the domain.
        let host = host_of(&url)?;
        self.patterns.iter().find_map(|p| {
            let prefix = host.strip_suffix(p)?.strip_suffix('.')?;
            let label = prefix.rsplit('.').next()?;
            (!label.is_empty() && !SHARED_LABELS.contains(&label)).then(|| label.to_string())
        })
    }

    /// Copy of `target` whose company slug is its board slug on this
    /// platform. The slug is left alone when none can be derived.
    pub fn retarget(&self, target: &ScrapeTarget) -> ScrapeTarget {
        let mut target = target.clone();
        if let Some(slug) = self.board_slug(target.source_url.as_deref(), &target.company.slug) {
            target.company.slug = slug;
        }
        target
    }
}

/// Host labels platforms use for their own pages rather than for a board.
const SHARED_LABELS: &[&str] = &["www", "jobs", "apply", "boards", "job-boards", "api", "careers"];

fn host_of(url: &str) -> Option<String> {
    let url = url.trim();
    let parsed = Url::parse(url)
        .ok()
        .filter(|u| u.has_host())
        .or_else(|| Url::parse(&format!("https://{url}")).ok())?;
    parsed.host_str().map(|h| h.trim_end_matches('.').to_lowercase())
}

/// Ordered platform list. Detection returns the first match.
#[derive(Debug, Clone)]
pub struct PlatformRegistry {
    platforms: Vec<PlatformDescriptor>,
}

impl Default for PlatformRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl PlatformRegistry {
    /// Registry with no platforms; everything falls through to the generic
    /// page scrape.
    pub fn empty() -> Self {
        Self {
            platforms: Vec::new(),
        }
    }

    /// Built-in platforms: ATS APIs first, then embedded-data pages, then
    /// aggregator feeds.
    pub fn builtin() -> Self {
        Self {
            platforms: BUILTIN.to_vec(),
        }
    }

    /// Append a platform after the existing ones.
    pub fn register(&mut self, descriptor: PlatformDescriptor) {
        self.platforms.push(descriptor);
    }

    pub fn get(&self, name: &str) -> Option<&PlatformDescriptor> {
        self.platforms
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(name))
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlatformDescriptor> {
        self.platforms.iter()
    }

    pub fn len(&self) -> usize {
        self.platforms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }

    /// First platform whose patterns match the source URL; failing that,
    /// the first whose patterns match the company slug.
    pub fn detect(&self, source_url: Option<&str>, company_slug: &str) -> Option<&PlatformDescriptor> {
        source_url
            .filter(|u| !u.trim().is_empty())
            .and_then(|url| self.platforms.iter().find(|d| d.matches_url(url)))
            .or_else(|| self.platforms.iter().find(|d| d.matches_slug(company_slug)))
    }
}

// ---------------------------------------------------------------------------
// Built-in profiles
// ---------------------------------------------------------------------------

static GREENHOUSE: RestJsonProfile = RestJsonProfile {
    description: &["content"],
    location: &["/location/name", "offices"],
    url: &["absolute_url"],
    published_at: &["first_published", "updated_at"],
    tags: &["departments"],
    ..RestJsonProfile::new(
        "https://boards-api.greenhouse.io/v1/boards/{slug}/jobs?content=true",
        "jobs",
    )
};

static LEVER: RestJsonProfile = RestJsonProfile {
    title: &["text"],
    description: &["descriptionPlain", "description"],
    location: &["/categories/location", "/categories/allLocations"],
    url: &["hostedUrl", "applyUrl"],
    published_at: &["createdAt"],
    remote: &["workplaceType"],
    employment_type: &["/categories/commitment"],
    salary: &["salaryRange"],
    countries: &["country"],
    tags: &["/categories/team", "/categories/department"],
    benefits: &["additionalPlain"],
    ..RestJsonProfile::new("https://api.lever.co/v0/postings/{slug}?mode=json", "")
};

static ASHBY: RestJsonProfile = RestJsonProfile {
    description: &["descriptionHtml", "descriptionPlain"],
    location: &["location", "/address/postalAddress/addressLocality"],
    url: &["jobUrl", "applyUrl"],
    published_at: &["publishedAt"],
    remote: &["isRemote", "workplaceType"],
    employment_type: &["employmentType"],
    salary: &["/compensation/compensationTierSummary", "/compensation/scrapeableCompensationSalarySummary"],
    countries: &["/address/postalAddress/addressCountry"],
    tags: &["department", "team"],
    ..RestJsonProfile::new(
        "https://api.ashbyhq.com/posting-api/job-board/{slug}?includeCompensation=true",
        "jobs",
    )
};

static WORKABLE: RestJsonProfile = RestJsonProfile {
    id: &["shortcode", "id"],
    location: &["/location/city", "city", "/location/country", "country"],
    url: &["url", "shortlink", "application_url"],
    url_fallback: Some("https://apply.workable.com/{slug}/j/{id}/"),
    published_at: &["published_on", "created_at"],
    remote: &["telecommuting", "remote"],
    employment_type: &["employment_type"],
    countries: &["country", "/location/country"],
    tags: &["department"],
    // The widget omits location entirely for fully remote roles.
    empty_location_is_remote: true,
    ..RestJsonProfile::new("https://apply.workable.com/api/v1/widget/accounts/{slug}", "jobs")
};

static RECRUITEE: RestJsonProfile = RestJsonProfile {
    id: &["id", "slug"],
    location: &["location", "city"],
    url: &["careers_url", "careers_apply_url"],
    published_at: &["published_at", "created_at"],
    remote: &["remote"],
    employment_type: &["employment_type_code"],
    salary: &["salary"],
    countries: &["country", "country_code"],
    tags: &["tags", "department"],
    requirements: &["requirements"],
    ..RestJsonProfile::new("https://{slug}.recruitee.com/api/offers/", "offers")
};

static SMARTRECRUITERS: RestJsonProfile = RestJsonProfile {
    title: &["name"],
    description: &[],
    location: &["/location/fullLocation", "/location/city"],
    url: &["postingUrl"],
    url_fallback: Some("https://jobs.smartrecruiters.com/{slug}/{id}"),
    published_at: &["releasedDate"],
    remote: &["/location/remote"],
    employment_type: &["/typeOfEmployment/label"],
    countries: &["/location/country"],
    tags: &["/department/label", "/function/label"],
    ..RestJsonProfile::new(
        "https://api.smartrecruiters.com/v1/companies/{slug}/postings",
        "content",
    )
};

static COMEET: RestJsonProfile = RestJsonProfile {
    required_metadata: &["uid", "token"],
    id: &["uid"],
    title: &["name"],
    description: &["/details/0/value", "description"],
    location: &["/location/name"],
    url: &["url_active_page", "url_comeet_hosted_page"],
    published_at: &["time_updated"],
    remote: &["/location/is_remote", "workplace_type"],
    employment_type: &["employment_type"],
    tags: &["department"],
    ..RestJsonProfile::new(
        "https://www.comeet.co/careers-api/2.0/company/{meta:uid}/positions?token={meta:token}&details=true",
        "",
    )
};

static WELLFOUND: EmbeddedProfile = EmbeddedProfile {
    url_template: "https://wellfound.com/company/{slug}/jobs",
    anchors: &["script#__NEXT_DATA__"],
    type_tags: &["JobListing", "JobListingSearchResult"],
    url_fallback: Some("https://wellfound.com/jobs/{id}"),
    company_from_posting: false,
    prefiltered_remote: false,
    empty_location_is_remote: false,
};

static WEWORKREMOTELY: FeedProfile = FeedProfile {
    default_url: Some("https://weworkremotely.com/remote-jobs.rss"),
};
static REMOTEOK: FeedProfile = FeedProfile {
    default_url: Some("https://remoteok.com/remote-jobs.rss"),
};
static REMOTIVE: FeedProfile = FeedProfile {
    default_url: Some("https://remotive.com/remote-jobs/feed"),
};
static JOBSPRESSO: FeedProfile = FeedProfile {
    default_url: Some("https://jobspresso.co/feed/?post_type=job_listing"),
};

static BUILTIN: [PlatformDescriptor; 12] = [
    PlatformDescriptor {
        name: "greenhouse",
        patterns: &["greenhouse.io"],
        slug_location: SlugLocation::PathSegment(0),
        family: SourceFamily::RestJson(&GREENHOUSE),
    },
    PlatformDescriptor {
        name: "lever",
        patterns: &["lever.co"],
        slug_location: SlugLocation::PathSegment(0),
        family: SourceFamily::RestJson(&LEVER),
    },
    PlatformDescriptor {
        name: "ashby",
        patterns: &["ashbyhq.com"],
        slug_location: SlugLocation::PathSegment(0),
        family: SourceFamily::RestJson(&ASHBY),
    },
    PlatformDescriptor {
        name: "workable",
        patterns: &["workable.com"],
        slug_location: SlugLocation::PathSegment(0),
        family: SourceFamily::RestJson(&WORKABLE),
    },
    PlatformDescriptor {
        name: "recruitee",
        patterns: &["recruitee.com"],
        slug_location: SlugLocation::Subdomain,
        family: SourceFamily::RestJson(&RECRUITEE),
    },
    PlatformDescriptor {
        name: "smartrecruiters",
        patterns: &["smartrecruiters.com"],
        slug_location: SlugLocation::PathSegment(0),
        family: SourceFamily::RestJson(&SMARTRECRUITERS),
    },
    PlatformDescriptor {
        name: "comeet",
        patterns: &["comeet.com", "comeet.co"],
        slug_location: SlugLocation::PathSegment(1),
        family: SourceFamily::RestJson(&COMEET),
    },
    PlatformDescriptor {
        name: "wellfound",
        patterns: &["wellfound.com", "angel.co"],
        slug_location: SlugLocation::PathSegment(1),
        family: SourceFamily::Embedded(&WELLFOUND),
    },
    PlatformDescriptor {
        name: "weworkremotely",
        patterns: &["weworkremotely.com"],
        slug_location: SlugLocation::None,
        family: SourceFamily::Feed(&WEWORKREMOTELY),
    },
    PlatformDescriptor {
        name: "remoteok",
        patterns: &["remoteok.com", "remoteok.io"],
        slug_location: SlugLocation::None,
        family: SourceFamily::Feed(&REMOTEOK),
    },
    PlatformDescriptor {
        name: "remotive",
        patterns: &["remotive.com", "remotive.io"],
        slug_location: SlugLocation::None,
        family: SourceFamily::Feed(&REMOTIVE),
    },
    PlatformDescriptor {
        name: "jobspresso",
        patterns: &["jobspresso.co"],
        slug_location: SlugLocation::None,
        family: SourceFamily::Feed(&JOBSPRESSO),
    },
];

#[cfg(test)]
mod tests {
    use super::*;
    use nomad_core::testutil::make_test_target;

    fn detect_name(url: Option<&str>, slug: &str) -> Option<&'static str> {
        PlatformRegistry::builtin().detect(url, slug).map(|d| d.name)
    }

    #[test]
    fn builtin_order() {
        let names: Vec<_> = PlatformRegistry::builtin().iter().map(|d| d.name).collect();
        assert_eq!(names.first(), Some(&"greenhouse"));
        assert_eq!(names.last(), Some(&"jobspresso"));

        let strategies: Vec<_> = PlatformRegistry::builtin()
            .iter()
            .map(|d| d.strategy())
            .collect();
        let first_feed = strategies
            .iter()
            .position(|s| *s == PlatformStrategy::RssFeed)
            .unwrap();
        assert!(strategies[..first_feed]
            .iter()
            .all(|s| *s != PlatformStrategy::RssFeed));
        assert!(strategies[first_feed..]
            .iter()
            .all(|s| *s == PlatformStrategy::RssFeed));
    }

    #[test]
    fn detects_from_url_then_slug() {
        assert_eq!(detect_name(Some("https://boards.greenhouse.io/acme"), "acme"), Some("greenhouse"));
        assert_eq!(detect_name(Some("https://jobs.LEVER.co/acme"), "acme"), Some("lever"));
        assert_eq!(detect_name(Some("https://acme.recruitee.com/"), "acme"), Some("recruitee"));
        assert_eq!(
            detect_name(Some("https://weworkremotely.com/categories/remote-programming-jobs.rss"), "wwr"),
            Some("weworkremotely")
        );
        assert_eq!(detect_name(None, "acme.workable.com"), Some("workable"));
        assert_eq!(detect_name(Some("https://careers.acme.test"), "remoteok.com"), Some("remoteok"));
        assert_eq!(detect_name(Some("https://careers.acme.test"), "acme"), None);
        assert_eq!(detect_name(Some("  "), "acme"), None);
    }

    #[test]
    fn url_detection_matches_hosts_not_substrings() {
        assert_eq!(detect_name(Some("https://clever.com/about/careers"), "clever"), None);
        assert_eq!(detect_name(Some("https://evangel.com/jobs"), "evangel"), None);
        assert_eq!(detect_name(Some("https://greenhouse.io.evil.test/acme"), "acme"), None);
        assert_eq!(detect_name(Some("https://lever.co/acme"), "acme"), Some("lever"));
        assert_eq!(detect_name(Some("boards.greenhouse.io/acme"), "acme"), Some("greenhouse"));

        // The slug fallback still runs when the URL matches nothing.
        assert_eq!(
            detect_name(Some("https://clever.com/about"), "jobs.lever.co/clever"),
            Some("lever")
        );
    }

    #[test]
    fn extracts_board_slugs() {
        let registry = PlatformRegistry::builtin();
        let slug = |name: &str, url: &str| registry.get(name).unwrap().slug_from_url(url);

        assert_eq!(slug("greenhouse", "https://job-boards.greenhouse.io/acme/jobs/1").as_deref(), Some("acme"));
        assert_eq!(slug("lever", "https://jobs.lever.co/acme/").as_deref(), Some("acme"));
        assert_eq!(slug("recruitee", "https://globex.recruitee.com/o/dev").as_deref(), Some("globex"));
        assert_eq!(slug("recruitee", "https://recruitee.com/").as_deref(), None);
        assert_eq!(slug("wellfound", "https://wellfound.com/company/initech/jobs").as_deref(), Some("initech"));
        assert_eq!(slug("lever", "https://jobs.lever.co/").as_deref(), None);
        assert_eq!(slug("remoteok", "https://remoteok.com/remote-dev-jobs").as_deref(), None);
        assert_eq!(slug("lever", "not a url"), None);
    }

    #[test]
    fn retargets_to_board_slug() {
        let registry = PlatformRegistry::builtin();
        let lever = registry.get("lever").unwrap();

        let mut target = make_test_target("acme-corp");
        target.source_url = Some("https://jobs.lever.co/acme".into());
        assert_eq!(lever.retarget(&target).company.slug, "acme");

        target.source_url = None;
        assert_eq!(lever.retarget(&target).company.slug, "acme-corp");
    }

    #[test]
    fn retargets_from_slug_written_as_address() {
        let registry = PlatformRegistry::builtin();
        let workable = registry.get("workable").unwrap();
        let lever = registry.get("lever").unwrap();

        let mut target = make_test_target("acme.workable.com");
        target.source_url = None;
        assert_eq!(workable.retarget(&target).company.slug, "acme");

        target.company.slug = "https://apply.workable.com/globex/".into();
        assert_eq!(workable.retarget(&target).company.slug, "globex");

        target.company.slug = "jobs.lever.co/initech".into();
        assert_eq!(lever.retarget(&target).company.slug, "initech");

        // A URL on some other host never supplies the board.
        target.company.slug = "acme.workable.com".into();
        target.source_url = Some("https://careers.acme.test/jobs".into());
        assert_eq!(workable.retarget(&target).company.slug, "acme");
    }

    #[test]
    fn custom_registries() {
        let mut registry = PlatformRegistry::empty();
        assert!(registry.is_empty());
        assert!(registry.detect(Some("https://boards.greenhouse.io/acme"), "acme").is_none());

        let greenhouse = *PlatformRegistry::builtin().get("GreenHouse").unwrap();
        registry.register(greenhouse);
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.detect(Some("https://boards.greenhouse.io/acme"), "acme").map(|d| d.name),
            Some("greenhouse")
        );
    }
}
