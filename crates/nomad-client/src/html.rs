//! HTML helpers built on scraper.
//!
//! `scraper::Html` is not `Send`, so everything here is synchronous and
//! returns owned data. Adapters call these after their last `.await`.

use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Selector groups tried, in order, to find job cards on an unknown page.
/// The first group that matches anything wins.
const CARD_SELECTORS: &[&str] = &[
    "[data-job-id]",
    ".job-listing",
    ".job-card",
    ".job-post",
    ".posting",
    ".opening",
    "li.job",
    "div.job",
    "li[class*='job']",
    "div[class*='job-']",
];

const TITLE_SELECTORS: &[&str] = &[
    "[data-field='title']",
    ".job-title",
    ".posting-title",
    ".title",
    "h2",
    "h3",
    "h4",
    "a",
];
const COMPANY_SELECTORS: &[&str] = &[
    "[data-field='company']",
    ".company-name",
    ".company",
    "[class*='company']",
];
const LOCATION_SELECTORS: &[&str] = &[
    "[data-field='location']",
    ".job-location",
    ".location",
    "[class*='location']",
];
const DESCRIPTION_SELECTORS: &[&str] = &[
    "[data-field='description']",
    ".job-description",
    ".description",
    ".summary",
    "p",
];
const SALARY_SELECTORS: &[&str] = &[".salary", ".compensation", "[class*='salary']"];

/// Fields lifted from one job card. `link` is absolute when the page URL
/// allowed resolving it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CardFields {
    pub title: Option<String>,
    pub company: Option<String>,
    pub location: Option<String>,
    pub description: Option<String>,
    pub salary: Option<String>,
    pub link: Option<String>,
}

/// Text content of every element matching one of `anchors`, in document order.
///
/// Used for `<script>` blocks carrying embedded JSON. Invalid selectors are
/// skipped.
pub fn script_blocks(html: &str, anchors: &[&str]) -> Vec<String> {
    let document = Html::parse_document(html);
    anchors
        .iter()
        .filter_map(|anchor| Selector::parse(anchor).ok())
        .flat_map(|selector| {
            document
                .select(&selector)
                .map(|el| el.text().collect::<String>())
                .filter(|text| !text.trim().is_empty())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Heuristic job-card extraction for pages with no structured data.
pub fn scrape_cards(html: &str, page_url: &str) -> Vec<CardFields> {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    for group in CARD_SELECTORS {
        let Ok(selector) = Selector::parse(group) else {
            continue;
        };
        let cards: Vec<CardFields> = document
            .select(&selector)
            .map(|card| read_card(card, base.as_ref()))
            .collect();
        if !cards.is_empty() {
            return cards;
        }
    }

    Vec::new()
}

fn read_card(card: ElementRef<'_>, base: Option<&Url>) -> CardFields {
    CardFields {
        title: first_text(card, TITLE_SELECTORS),
        company: first_text(card, COMPANY_SELECTORS),
        location: first_text(card, LOCATION_SELECTORS),
        description: first_text(card, DESCRIPTION_SELECTORS),
        salary: first_text(card, SALARY_SELECTORS),
        link: first_link(card, base),
    }
}

/// Text of the first non-empty match, trying each selector in turn.
fn first_text(scope: ElementRef<'_>, selectors: &[&str]) -> Option<String> {
    selectors
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .find_map(|selector| {
            scope
                .select(&selector)
                .map(|el| el.text().collect::<Vec<_>>().join(" "))
                .map(|text| text.split_whitespace().collect::<Vec<_>>().join(" "))
                .find(|text| !text.is_empty())
        })
}

fn first_link(card: ElementRef<'_>, base: Option<&Url>) -> Option<String> {
    let own = card.value().attr("href");
    let nested = || {
        let selector = Selector::parse("a[href]").ok()?;
        card.select(&selector)
            .find_map(|el| el.value().attr("href"))
    };
    let href = own.or_else(nested)?.trim();
    if href.is_empty() || href.starts_with('#') || href.starts_with("javascript:") {
        return None;
    }

    match base {
        Some(base) => base.join(href).ok().map(|u| u.to_string()),
        None => Url::parse(href).ok().map(|u| u.to_string()),
    }
}
