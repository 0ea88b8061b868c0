//! Minimal RSS 2.0 / Atom reader over quick-xml's event API.

use std::borrow::Cow;

use nomad_core::error::AppError;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

/// One `<item>` (RSS) or `<entry>` (Atom), fields as found in the document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    pub link: String,
    pub guid: String,
    pub description: String,
    pub pub_date: String,
    pub categories: Vec<String>,
    pub region: Option<String>,
    pub company: Option<String>,
    pub job_type: Option<String>,
}

impl FeedItem {
    fn set(&mut self, field: &str, value: String) {
        if value.is_empty() {
            return;
        }
        match field {
            "title" if self.title.is_empty() => self.title = value,
            "link" if self.link.is_empty() => self.link = value,
            "guid" | "id" if self.guid.is_empty() => self.guid = value,
            "encoded" | "content" => self.description = value,
            "description" | "summary" if self.description.is_empty() => self.description = value,
            "pubdate" | "published" | "updated" | "date" if self.pub_date.is_empty() => {
                self.pub_date = value
            }
            "category" => self.categories.push(value),
            "region" | "location" => self.region = Some(value),
            "company" | "company_name" => self.company = Some(value),
            "type" | "job_type" => self.job_type = Some(value),
            _ => {}
        }
    }

    /// Stable identifier: the guid, else the link.
    pub fn identifier(&self) -> Option<&str> {
        [self.guid.as_str(), self.link.as_str()]
            .into_iter()
            .find(|s| !s.is_empty())
    }
}

/// Parse every item of an RSS or Atom document.
///
/// A document whose root is not `rss`, `feed` or `RDF` is a malformed
/// response. A valid feed with no items yields an empty list.
pub fn parse_feed(xml: &str) -> Result<Vec<FeedItem>, AppError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<FeedItem> = None;
    let mut field: Option<String> = None;
    let mut text = String::new();
    let mut saw_root = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                let name = local_name(&e);
                if !saw_root {
                    check_root(&name)?;
                    saw_root = true;
                    continue;
                }
                match name.as_str() {
                    "item" | "entry" => {
                        current = Some(FeedItem::default());
                        field = None;
                    }
                    _ => {
                        if let Some(item) = current.as_mut() {
                            if name == "link"
                                && let Some(href) = attribute(&e, "href")
                            {
                                item.set("link", href);
                            }
                            // Nested markup inside a field keeps feeding the
                            // outer field's text.
                            if field.is_none() {
                                field = Some(name);
                                text.clear();
                            }
                        }
                    }
                }
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(&e);
                if !saw_root {
                    check_root(&name)?;
                    saw_root = true;
                    continue;
                }
                if name == "link"
                    && let Some(item) = current.as_mut()
                    && let Some(href) = attribute(&e, "href")
                {
                    item.set("link", href);
                }
            }
            Ok(Event::Text(t)) => {
                if field.is_some() {
                    // Feeds routinely carry HTML entities XML does not know;
                    // keep the raw text and let normalization decode it.
                    let chunk = t
                        .unescape()
                        .unwrap_or_else(|_| Cow::Owned(String::from_utf8_lossy(&t).into_owned()));
                    push_text(&mut text, &chunk);
                }
            }
            Ok(Event::CData(c)) => {
                if field.is_some() {
                    push_text(&mut text, &String::from_utf8_lossy(&c));
                }
            }
            Ok(Event::End(e)) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase();
                if name == "item" || name == "entry" {
                    if let Some(item) = current.take() {
                        items.push(item);
                    }
                    field = None;
                } else if field.as_deref() == Some(name.as_str()) {
                    if let Some(item) = current.as_mut() {
                        item.set(&name, text.trim().to_string());
                    }
                    field = None;
                    text.clear();
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(AppError::MalformedResponse(format!(
                    "invalid feed XML at byte {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }

    if !saw_root {
        return Err(AppError::MalformedResponse(
            "feed document is empty".to_string(),
        ));
    }

    Ok(items)
}

fn check_root(name: &str) -> Result<(), AppError> {
    match name {
        "rss" | "feed" | "rdf" => Ok(()),
        other => Err(AppError::MalformedResponse(format!(
            "expected an RSS or Atom document, found <{other}>"
        ))),
    }
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase()
}

fn attribute(e: &BytesStart<'_>, name: &str) -> Option<String> {
    let attr = e.try_get_attribute(name).ok()??;
    attr.unescape_value().ok().map(|v| v.trim().to_string())
}

fn push_text(buf: &mut String, chunk: &str) {
    if !buf.is_empty() {
        buf.push(' ');
    }
    buf.push_str(chunk);
}
