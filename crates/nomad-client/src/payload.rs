//! Optional-field access over untrusted JSON payloads.
//!
//! A path is either a bare key (`"title"`) or a JSON pointer
//! (`"/location/name"`). Every accessor takes a list of paths and returns the
//! first one that yields something usable, so a profile can name fallbacks.

use serde_json::Value;

/// Resolve one path against an item.
pub fn at<'a>(item: &'a Value, path: &str) -> Option<&'a Value> {
    let value = if path.starts_with('/') {
        item.pointer(path)
    } else {
        item.get(path)
    };
    value.filter(|v| !v.is_null())
}

/// First non-null value among `paths`.
pub fn first_value<'a>(item: &'a Value, paths: &[&str]) -> Option<&'a Value> {
    paths.iter().find_map(|p| at(item, p))
}

/// First value among `paths` that renders as a non-empty string.
///
/// Numbers render in decimal; arrays join their string-like entries with
/// `", "`; objects use their `name`, `label`, `text` or `value` field.
pub fn first_string(item: &Value, paths: &[&str]) -> Option<String> {
    paths
        .iter()
        .filter_map(|p| at(item, p))
        .find_map(value_to_string)
}

fn value_to_string(value: &Value) -> Option<String> {
    let rendered = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(value_to_string)
            .collect::<Vec<_>>()
            .join(", "),
        Value::Object(_) => return first_string(value, &["name", "label", "text", "value"]),
        _ => return None,
    };
    (!rendered.is_empty()).then_some(rendered)
}

/// First value among `paths` that reads as a boolean.
///
/// Strings are accepted: `"true"`, `"yes"`, `"remote"`, `"fully_remote"` and
/// `"telecommute"` are true; any other non-empty string is false.
pub fn first_bool(item: &Value, paths: &[&str]) -> Option<bool> {
    paths.iter().filter_map(|p| at(item, p)).find_map(|v| match v {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) if !s.trim().is_empty() => {
            let lower = s.trim().to_lowercase();
            Some(matches!(
                lower.as_str(),
                "true" | "yes" | "1" | "remote" | "fully_remote" | "telecommute"
            ))
        }
        _ => None,
    })
}

/// Flatten a value into a list of strings.
///
/// A string is split on commas, an array contributes each entry, an object
/// contributes its `name`/`label`/`text`/`value`.
pub fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        Value::Array(items) => items.iter().flat_map(string_list).collect(),
        Value::Object(_) => value_to_string(value).into_iter().collect(),
        Value::Number(n) => vec![n.to_string()],
        _ => Vec::new(),
    }
}

/// `string_list` over every path, concatenated and deduplicated.
pub fn collect_strings(item: &Value, paths: &[&str]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for value in paths.iter().filter_map(|p| at(item, p)) {
        for s in string_list(value) {
            if !out.iter().any(|existing| existing.eq_ignore_ascii_case(&s)) {
                out.push(s);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolves_keys_and_pointers() {
        let item = json!({"title": "Dev", "location": {"name": "Remote"}, "gone": null});
        assert_eq!(at(&item, "title"), Some(&json!("Dev")));
        assert_eq!(at(&item, "/location/name"), Some(&json!("Remote")));
        assert_eq!(at(&item, "gone"), None);
        assert_eq!(at(&item, "/missing/deep"), None);
    }

    #[test]
    fn first_string_falls_back() {
        let item = json!({"a": "  ", "b": 42, "offices": [{"name": "Berlin"}, {"name": "Remote"}]});
        assert_eq!(first_string(&item, &["a", "b"]).as_deref(), Some("42"));
        assert_eq!(
            first_string(&item, &["missing", "offices"]).as_deref(),
            Some("Berlin, Remote")
        );
        assert_eq!(first_string(&item, &["a"]), None);
    }

    #[test]
    fn bools_from_mixed_shapes() {
        let item = json!({"flag": true, "wp": "remote", "onsite": "on-site", "n": 0});
        assert_eq!(first_bool(&item, &["flag"]), Some(true));
        assert_eq!(first_bool(&item, &["wp"]), Some(true));
        assert_eq!(first_bool(&item, &["onsite"]), Some(false));
        assert_eq!(first_bool(&item, &["n"]), Some(false));
        assert_eq!(first_bool(&item, &["missing"]), None);
    }

    #[test]
    fn string_lists() {
        assert_eq!(string_list(&json!("rust, go ,")), vec!["rust", "go"]);
        assert_eq!(
            string_list(&json!([{"name": "US"}, "CA", {"other": 1}])),
            vec!["US", "CA"]
        );
        let item = json!({"tags": ["Rust", "go"], "dept": "rust"});
        assert_eq!(collect_strings(&item, &["tags", "dept"]), vec!["Rust", "go"]);
    }
}
