//! Counting collection sizes from pagination hints.
//!
//! Asking for a collection with `per_page=1` makes the page number of the `rel="last"`
//! link equal to the number of entries, which avoids downloading the collection.

use super::resilient_http::ApiResponse;
use reqwest::header::LINK;
use serde_json::Value;
use url::Url;

/// Extract the `page` query parameter of the `rel="last"` entry of a `Link` header.
#[must_use]
pub fn last_page(link_header: &str) -> Option<u64> {
    link_header
        .split(',')
        .find(|entry| entry.split(';').skip(1).any(|param| param.trim() == r#"rel="last""#))
        .and_then(|entry| {
            let target = entry.split(';').next()?.trim();
            let target = target.strip_prefix('<')?.strip_suffix('>')?;
            let url = Url::parse(target).ok()?;
            url.query_pairs()
                .find(|(key, _)| key == "page")
                .and_then(|(_, value)| value.parse::<u64>().ok())
        })
}

/// Derive a collection size from a `per_page=1` response.
///
/// Uses the last-page hint when the response carries one, otherwise counts the entries
/// of the JSON array body.
pub fn count_entries(response: &ApiResponse) -> crate::Result<u64> {
    let hint = response
        .headers()
        .get(LINK)
        .and_then(|h| h.to_str().ok())
        .and_then(last_page);

    if let Some(count) = hint {
        return Ok(count);
    }

    let body: Value = response.json()?;
    count_array(&body)
}

fn count_array(body: &Value) -> crate::Result<u64> {
    match body {
        Value::Array(entries) => Ok(entries.len() as u64),
        other => Err(ohno::app_err!("expected a JSON array, found {}", json_kind(other))),
    }
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
