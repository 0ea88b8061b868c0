//! Pure transforms shared by every source adapter.
//!
//! Nothing in this module performs I/O or logs. Adapters call these helpers
//! while mapping a third-party payload onto [`ScrapedJob`], which keeps the
//! decision rules (seniority, employment type, remote detection, salary
//! rendering) testable in isolation.

use std::collections::HashSet;
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::{Captures, Regex};
use serde_json::{Map, Value};

use crate::models::{EmploymentType, ScrapedJob, Seniority};

static SCRIPT_STYLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>").expect("valid regex")
});

static BLOCK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)</?(p|div|br|hr|li|ul|ol|h[1-6]|tr|td|th|table|section|article|header|footer|blockquote|pre)\b[^>]*>",
    )
    .expect("valid regex")
});

/// Tag-shaped spans and comments. A bare `<` is text.
static ANY_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<!--.*?-->|</?[A-Za-z][^<>]*>|<![^<>]*>").expect("valid regex")
});

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[a-zA-Z]+);").expect("valid regex"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<li\b[^>]*>(.*?)</li\s*>").expect("valid regex"));

/// Keywords that mark a posting as remote when found in its location,
/// title or description.
pub const REMOTE_KEYWORDS: &[&str] = &[
    "remote",
    "anywhere",
    "work from home",
    "wfh",
    "distributed",
    "virtual",
    "telecommute",
    "home office",
];

/// Title tokens recognised as skill tags, with the tag they map to.
const SKILL_VOCABULARY: &[(&str, &str)] = &[
    ("rust", "rust"),
    ("go", "go"),
    ("golang", "go"),
    ("python", "python"),
    ("django", "django"),
    ("flask", "flask"),
    ("java", "java"),
    ("kotlin", "kotlin"),
    ("scala", "scala"),
    ("javascript", "javascript"),
    ("js", "javascript"),
    ("typescript", "typescript"),
    ("ts", "typescript"),
    ("node", "node.js"),
    ("nodejs", "node.js"),
    ("node.js", "node.js"),
    ("react", "react"),
    ("reactjs", "react"),
    ("react.js", "react"),
    ("vue", "vue"),
    ("vue.js", "vue"),
    ("angular", "angular"),
    ("svelte", "svelte"),
    ("next.js", "next.js"),
    ("ruby", "ruby"),
    ("rails", "rails"),
    ("php", "php"),
    ("laravel", "laravel"),
    ("c++", "c++"),
    ("c#", "c#"),
    (".net", ".net"),
    ("swift", "swift"),
    ("ios", "ios"),
    ("android", "android"),
    ("flutter", "flutter"),
    ("elixir", "elixir"),
    ("haskell", "haskell"),
    ("clojure", "clojure"),
    ("sql", "sql"),
    ("postgres", "postgresql"),
    ("postgresql", "postgresql"),
    ("mysql", "mysql"),
    ("mongodb", "mongodb"),
    ("redis", "redis"),
    ("kafka", "kafka"),
    ("graphql", "graphql"),
    ("aws", "aws"),
    ("gcp", "gcp"),
    ("azure", "azure"),
    ("docker", "docker"),
    ("kubernetes", "kubernetes"),
    ("k8s", "kubernetes"),
    ("terraform", "terraform"),
    ("linux", "linux"),
    ("devops", "devops"),
    ("sre", "sre"),
    ("frontend", "frontend"),
    ("front-end", "frontend"),
    ("backend", "backend"),
    ("back-end", "backend"),
    ("fullstack", "fullstack"),
    ("full-stack", "fullstack"),
    ("ml", "machine-learning"),
    ("ai", "ai"),
    ("blockchain", "blockchain"),
    ("solidity", "solidity"),
    ("qa", "qa"),
    ("security", "security"),
    ("data", "data"),
];

/// Strip markup, decode common entities, and collapse whitespace.
///
/// Script and style blocks are dropped with their content. Block-level tags
/// become a single space so adjacent paragraphs don't run together.
pub fn clean_text(s: &str) -> String {
    let decoded = decode_entities(s);
    let without_scripts = SCRIPT_STYLE_RE.replace_all(&decoded, " ");
    let spaced = BLOCK_TAG_RE.replace_all(&without_scripts, " ");
    let stripped = ANY_TAG_RE.replace_all(&spaced, "");
    // Escaped markup may carry a second layer of entities (`&amp;amp;`).
    let text = decode_entities(&stripped);
    WHITESPACE_RE.replace_all(&text, " ").trim().to_string()
}

fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    ENTITY_RE
        .replace_all(s, |caps: &Captures<'_>| {
            let entity = &caps[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some(' '),
                "ndash" => Some('–'),
                "mdash" => Some('—'),
                "hellip" => Some('…'),
                "rsquo" | "lsquo" => Some('\''),
                "rdquo" | "ldquo" => Some('"'),
                _ if entity.starts_with("#x") || entity.starts_with("#X") => {
                    u32::from_str_radix(&entity[2..], 16)
                        .ok()
                        .and_then(char::from_u32)
                }
                _ if entity.starts_with('#') => {
                    entity[1..].parse::<u32>().ok().and_then(char::from_u32)
                }
                _ => None,
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn title_words(title: &str) -> Vec<String> {
    title
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}

/// Infer seniority from a job title. The first matching rule wins:
///
/// 1. `senior`, `sr` → senior
/// 2. `lead`, `principal`, `staff`, `architect` → senior
/// 3. `junior`, `jr` → junior
/// 4. `intern`, `internship`, `trainee`, `entry` → entry
/// 5. otherwise → mid
pub fn infer_seniority(title: &str) -> Seniority {
    let words = title_words(title);
    let has = |candidates: &[&str]| words.iter().any(|w| candidates.contains(&w.as_str()));

    if has(&["senior", "sr"]) {
        Seniority::Senior
    } else if has(&["lead", "principal", "staff", "architect"]) {
        Seniority::Senior
    } else if has(&["junior", "jr"]) {
        Seniority::Junior
    } else if has(&["intern", "internship", "trainee", "entry"]) {
        Seniority::Entry
    } else {
        Seniority::Mid
    }
}

/// Map a free-form employment type onto the canonical enum.
///
/// Absent or unrecognised values fall back to full-time.
pub fn map_employment_type(raw: Option<&str>) -> EmploymentType {
    let Some(raw) = raw else {
        return EmploymentType::FullTime;
    };
    let lower = raw.to_lowercase();

    if lower.contains("part") {
        EmploymentType::PartTime
    } else if lower.contains("contract") || lower.contains("freelance") {
        EmploymentType::Contract
    } else if lower.contains("intern") {
        EmploymentType::Internship
    } else {
        // "full", "time" and anything unrecognised.
        EmploymentType::FullTime
    }
}

/// Inputs to remote detection, borrowed from the source payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct RemoteSignals<'a> {
    /// The source's own remote flag, if it publishes one.
    pub explicit: Option<bool>,
    pub location: &'a str,
    pub title: &'a str,
    pub description: &'a str,
}

/// Decide whether a posting is remote.
///
/// An explicit `true` flag short-circuits; text is only scanned otherwise.
pub fn is_remote_job(signals: &RemoteSignals<'_>) -> bool {
    if signals.explicit == Some(true) {
        return true;
    }
    let haystack = format!(
        "{} {} {}",
        signals.location, signals.title, signals.description
    )
    .to_lowercase();
    REMOTE_KEYWORDS.iter().any(|kw| haystack.contains(kw))
}

/// Treat an empty location as an implicit remote signal.
///
/// Unverified heuristic, prone to false positives. Only source profiles that
/// opt in call this; it is not part of [`is_remote_job`].
pub fn location_implies_remote(location: &str) -> bool {
    location.trim().is_empty()
}

/// Match title tokens against the skill vocabulary.
///
/// Returns deduplicated tags in the order they first appear in the title.
pub fn extract_tags_from_title(title: &str) -> Vec<String> {
    let lower = title.to_lowercase();
    let mut seen = HashSet::new();
    let mut tags = Vec::new();

    let tokens = lower
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '/' | '(' | ')' | '|' | ':' | ';' | '!' | '?' | '[' | ']'))
        .map(|t| t.trim_end_matches('.').trim_start_matches('-'))
        .filter(|t| !t.is_empty());

    for token in tokens {
        if let Some((_, tag)) = SKILL_VOCABULARY.iter().find(|(word, _)| *word == token)
            && seen.insert(*tag)
        {
            tags.push((*tag).to_string());
        }
    }
    tags
}

/// Merge two tag lists, keeping first-seen order and dropping duplicates.
pub fn merge_tags(primary: Vec<String>, extra: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut seen: HashSet<String> = primary.iter().map(|t| t.to_lowercase()).collect();
    let mut merged = primary;
    for tag in extra {
        let tag = tag.trim().to_string();
        if !tag.is_empty() && seen.insert(tag.to_lowercase()) {
            merged.push(tag);
        }
    }
    merged
}

/// Render a salary from a plain string, a number, or a structured amount.
///
/// Structured inputs may carry `value`, `min`/`max` (or `minValue`/`maxValue`),
/// `currency` and `unitText`, including the schema.org shape where `value` is a
/// nested `QuantitativeValue`. Anything unrecognised yields `None`.
pub fn parse_salary(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => n.as_f64().filter(|v| *v > 0.0).map(format_amount),
        Value::Object(obj) => salary_from_object(obj),
        _ => None,
    }
}

fn salary_from_object(obj: &Map<String, Value>) -> Option<String> {
    let currency = first_str(obj, &["currency", "currencyCode", "salaryCurrency"]);
    let mut unit = first_str(obj, &["unitText", "unit", "interval", "period"]);

    let (min, max, single) = match obj.get("value") {
        Some(Value::Object(inner)) => {
            if unit.is_none() {
                unit = first_str(inner, &["unitText", "unit"]);
            }
            (
                first_number(inner, &["minValue", "min"]),
                first_number(inner, &["maxValue", "max"]),
                first_number(inner, &["value"]),
            )
        }
        _ => (
            first_number(obj, &["min", "minValue", "minimum", "salaryMin"]),
            first_number(obj, &["max", "maxValue", "maximum", "salaryMax"]),
            first_number(obj, &["value", "amount"]),
        ),
    };

    let amount = match (min, max, single) {
        (Some(lo), Some(hi), _) if (lo - hi).abs() < f64::EPSILON => format_amount(lo),
        (Some(lo), Some(hi), _) => format!("{} - {}", format_amount(lo), format_amount(hi)),
        (Some(lo), None, None) => format!("{}+", format_amount(lo)),
        (None, Some(hi), None) => format!("up to {}", format_amount(hi)),
        (_, _, Some(v)) => format_amount(v),
        (None, None, None) => return None,
    };

    let mut rendered = match currency {
        Some(c) => format!("{} {}", c.to_uppercase(), amount),
        None => amount,
    };
    if let Some(unit) = unit {
        rendered.push_str(" / ");
        rendered.push_str(&unit.to_lowercase());
    }
    Some(rendered)
}

fn first_str<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn first_number(obj: &Map<String, Value>, keys: &[&str]) -> Option<f64> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(|v| match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    })
}

fn format_amount(value: f64) -> String {
    let cents = (value * 100.0).round() as i64;
    let negative = cents < 0;
    let cents = cents.unsigned_abs();
    let (whole, fraction) = (cents / 100, cents % 100);
    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if negative {
        grouped.insert(0, '-');
    }
    if fraction > 0 {
        format!("{grouped}.{fraction:02}")
    } else {
        grouped
    }
}

/// Parse a publish timestamp from the shapes sources actually send:
/// RFC 3339, RFC 2822, `YYYY-MM-DD`, naive datetimes, and epoch seconds or
/// milliseconds.
pub fn parse_timestamp(raw: &Value) -> Option<DateTime<Utc>> {
    match raw {
        Value::Number(n) => n.as_i64().and_then(from_epoch),
        Value::String(s) => parse_timestamp_str(s),
        _ => None,
    }
}

pub fn parse_timestamp_str(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|d| d.and_utc());
    }
    s.parse::<i64>().ok().and_then(from_epoch)
}

fn from_epoch(n: i64) -> Option<DateTime<Utc>> {
    if n.unsigned_abs() >= 100_000_000_000 {
        DateTime::from_timestamp_millis(n)
    } else {
        DateTime::from_timestamp(n, 0)
    }
}

/// Lowercase, ASCII-alphanumeric slug with single dashes.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_dash = false;
    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(ch);
            pending_dash = false;
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// Split a requirements/benefits blob into individual items.
///
/// `<li>` elements are used when present; otherwise lines and bullet
/// characters separate items.
pub fn list_items(html: &str) -> Vec<String> {
    let from_list: Vec<String> = LIST_ITEM_RE
        .captures_iter(html)
        .map(|c| clean_text(&c[1]))
        .filter(|s| !s.is_empty())
        .collect();
    if !from_list.is_empty() {
        return from_list;
    }

    html.split(['\n', '•'])
        .map(|line| clean_text(line.trim().trim_start_matches(['-', '*']).trim()))
        .filter(|s| !s.is_empty())
        .collect()
}

/// A job is valid only with a title, a company slug and an external URL.
pub fn is_valid_job(job: &ScrapedJob) -> bool {
    !job.title.trim().is_empty()
        && !job.company_slug.trim().is_empty()
        && !job.external_url.trim().is_empty()
}
