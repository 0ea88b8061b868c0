use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// Seniority bucket inferred from a job title.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Seniority {
    Entry,
    Junior,
    Mid,
    Senior,
}

impl Seniority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Seniority::Entry => "entry",
            Seniority::Junior => "junior",
            Seniority::Mid => "mid",
            Seniority::Senior => "senior",
        }
    }
}

impl fmt::Display for Seniority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EmploymentType {
    FullTime,
    PartTime,
    Contract,
    Internship,
}

impl EmploymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmploymentType::FullTime => "full-time",
            EmploymentType::PartTime => "part-time",
            EmploymentType::Contract => "contract",
            EmploymentType::Internship => "internship",
        }
    }
}

impl fmt::Display for EmploymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The canonical, normalized job record every adapter converges on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapedJob {
    /// Stable dedup key, unique within `platform`.
    pub external_id: String,
    pub platform: String,
    pub company_slug: String,
    pub title: String,
    pub description: String,
    pub location: String,
    pub salary: Option<String>,
    pub remote: bool,
    pub countries: Vec<String>,
    pub tags: Vec<String>,
    pub seniority: Seniority,
    pub employment_type: EmploymentType,
    pub requirements: Vec<String>,
    pub benefits: Vec<String>,
    pub external_url: String,
    pub published_at: DateTime<Utc>,
}

impl ScrapedJob {
    /// Key used to merge results across chunks and adapters.
    pub fn dedup_key(&self) -> (String, String) {
        (self.platform.clone(), self.external_id.clone())
    }
}

/// Company a target scrapes. `metadata` carries protocol-specific settings
/// (numeric ids, API tokens) the adapter may require.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Company {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

impl Company {
    /// Look up a metadata entry as a string. Numbers are rendered in decimal.
    pub fn metadata_str(&self, key: &str) -> Option<String> {
        match self.metadata.get(key)? {
            serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}

/// One unit of scraping work, owned by the target store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeTarget {
    pub id: Uuid,
    pub job_board_id: Uuid,
    pub company: Company,
    #[serde(default)]
    pub source_url: Option<String>,
}

impl ScrapeTarget {
    /// Human-readable label for logs and error reports.
    pub fn label(&self) -> &str {
        if self.company.name.is_empty() {
            &self.company.slug
        } else {
            &self.company.name
        }
    }
}

/// Status written back to the target store for every processed target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetStatus {
    Pending,
    Success,
    Error,
}

impl TargetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetStatus::Pending => "pending",
            TargetStatus::Success => "success",
            TargetStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TargetStatus::Success | TargetStatus::Error)
    }
}

impl fmt::Display for TargetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TargetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TargetStatus::Pending),
            "success" => Ok(TargetStatus::Success),
            "error" => Ok(TargetStatus::Error),
            _ => Err(format!("Unknown target status: {}", s)),
        }
    }
}

/// Adapter family that handles a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlatformStrategy {
    RestJson,
    EmbeddedStructuredHtml,
    RssFeed,
    GenericFallback,
}

impl PlatformStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformStrategy::RestJson => "rest-json",
            PlatformStrategy::EmbeddedStructuredHtml => "embedded-structured-html",
            PlatformStrategy::RssFeed => "rss-feed",
            PlatformStrategy::GenericFallback => "generic-fallback",
        }
    }
}

impl fmt::Display for PlatformStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one adapter call produced.
///
/// `seen` counts every posting inspected before filtering, `jobs` holds the
/// valid postings that were kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchedJobs {
    pub jobs: Vec<ScrapedJob>,
    pub seen: usize,
}

impl FetchedJobs {
    pub fn new(jobs: Vec<ScrapedJob>, seen: usize) -> Self {
        Self { jobs, seen }
    }

    pub fn empty() -> Self {
        Self::default()
    }
}

/// Compute a SHA-256 hash of a string, returned as 64-char hex.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
