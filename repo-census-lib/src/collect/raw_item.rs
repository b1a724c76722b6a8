//! Repository records as returned by the search API.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// One entry of a repository search page.
///
/// The fields the pipeline reads are typed. Everything else the API sends is kept verbatim
/// in [`RawItem::extra`] so it can be inspected or passed through without guessing at its shape.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawItem {
    pub full_name: String,

    #[serde(default)]
    pub stargazers_count: u64,

    #[serde(default)]
    pub created_at: Option<String>,

    #[serde(default)]
    pub updated_at: Option<String>,

    #[serde(default)]
    pub clone_url: Option<String>,

    #[serde(default)]
    pub html_url: Option<String>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub language: Option<String>,

    #[serde(default)]
    pub license: Option<License>,

    /// Remote fields the pipeline does not interpret.
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

/// License block attached to a repository.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct License {
    #[serde(default)]
    pub spdx_id: Option<String>,

    #[serde(default)]
    pub key: Option<String>,

    #[serde(default)]
    pub name: Option<String>,
}

/// Body of a `/search/repositories` response.
#[derive(Debug, Deserialize)]
pub struct SearchPage {
    #[serde(default)]
    pub total_count: u64,

    #[serde(default)]
    pub incomplete_results: bool,

    #[serde(default)]
    pub items: Vec<RawItem>,
}

/// Body of a `/search/issues` response, only the count is of interest.
#[derive(Debug, Deserialize)]
pub struct SearchCount {
    pub total_count: u64,
}
