use crate::collect::{EnrichedItem, round2};
use serde::{Deserialize, Serialize};

/// License column value for repositories without license information.
pub const NO_LICENSE: &str = "No License";

/// Column names of the output table, in order.
pub const FIELD_NAMES: [&str; 18] = [
    "name",
    "stars",
    "popularity",
    "loc",
    "loc_comments",
    "releases",
    "maturity_years",
    "cbo",
    "dit",
    "lcom",
    "contributors",
    "merged_pull_requests",
    "language",
    "license",
    "url",
    "description",
    "created_at",
    "updated_at",
];

/// One row of the output table.
///
/// Every record has the same fields in the same order; values missing upstream are
/// represented by `0`, an empty string, or [`NO_LICENSE`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub name: String,
    pub stars: u64,
    pub popularity: u64,
    pub loc: u64,
    pub loc_comments: u64,
    pub releases: u64,
    pub maturity_years: f64,
    pub cbo: f64,
    pub dit: f64,
    pub lcom: f64,
    pub contributors: u64,
    pub merged_pull_requests: u64,
    pub language: String,
    pub license: String,
    pub url: String,
    pub description: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Anything that can be projected onto a [`NormalizedRecord`].
pub trait Normalize {
    fn to_record(&self) -> NormalizedRecord;
}

impl Normalize for EnrichedItem {
    fn to_record(&self) -> NormalizedRecord {
        let item = &self.item;
        let e = &self.enrichment;

        let license = item
            .license
            .as_ref()
            .map_or_else(|| NO_LICENSE.to_string(), |l| l.spdx_id.clone().unwrap_or_default());

        NormalizedRecord {
            name: item.full_name.clone(),
            stars: item.stargazers_count,
            popularity: e.popularity,
            loc: e.loc,
            loc_comments: e.loc_comments,
            releases: e.release_count,
            maturity_years: round2(e.maturity_years),
            cbo: round2(e.cbo),
            dit: round2(e.dit),
            lcom: round2(e.lcom),
            contributors: e.contributors,
            merged_pull_requests: e.merged_pull_requests,
            language: item.language.clone().unwrap_or_default(),
            license,
            url: item.html_url.clone().unwrap_or_default(),
            description: item.description.clone().unwrap_or_default(),
            created_at: item.created_at.clone().unwrap_or_default(),
            updated_at: item.updated_at.clone().unwrap_or_default(),
        }
    }
}

impl Normalize for NormalizedRecord {
    fn to_record(&self) -> NormalizedRecord {
        Self {
            maturity_years: round2(self.maturity_years),
            cbo: round2(self.cbo),
            dit: round2(self.dit),
            lcom: round2(self.lcom),
            ..self.clone()
        }
    }
}

/// Project items onto the fixed output schema.
#[must_use]
pub fn normalize<T: Normalize>(items: &[T]) -> Vec<NormalizedRecord> {
    items.iter().map(Normalize::to_record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collect::{EnrichmentResult, QualityStatus, RawItem};
    use serde_json::json;

    fn item(value: serde_json::Value) -> RawItem {
        serde_json::from_value(value).unwrap()
    }

    fn enriched(raw: RawItem) -> EnrichedItem {
        EnrichedItem {
            item: raw,
            enrichment: EnrichmentResult {
                popularity: 1500,
                release_count: 7,
                maturity_years: 2.0,
                loc: 12_000,
                loc_comments: 1_300,
                cbo: 3.456,
                dit: 1.2,
                lcom: 40.0,
                contributors: 12,
                merged_pull_requests: 80,
                quality: QualityStatus::Measured { units: 100 },
            },
        }
    }

    #[test]
    fn test_full_item() {
        let raw = item(json!({
            "full_name": "octo/widget",
            "stargazers_count": 1500,
            "language": "Java",
            "license": { "spdx_id": "MIT", "key": "mit", "name": "MIT License" },
            "html_url": "https://github.com/octo/widget",
            "description": "Widgets",
            "created_at": "2020-01-01T00:00:00Z",
            "updated_at": "2024-01-01T00:00:00Z",
            "forks_count": 3
        }));

        let record = enriched(raw).to_record();
        assert_eq!(record.name, "octo/widget");
        assert_eq!(record.stars, 1500);
        assert_eq!(record.releases, 7);
        assert!((record.cbo - 3.46).abs() < f64::EPSILON);
        assert_eq!(record.license, "MIT");
        assert_eq!(record.url, "https://github.com/octo/widget");
        assert_eq!(record.created_at, "2020-01-01T00:00:00Z");
    }

    #[test]
    fn test_missing_optional_fields_get_defaults() {
        let record = enriched(item(json!({ "full_name": "bare/repo" }))).to_record();
        assert_eq!(record.license, NO_LICENSE);
        assert_eq!(record.language, "");
        assert_eq!(record.url, "");
        assert_eq!(record.description, "");
        assert_eq!(record.created_at, "");
        assert_eq!(record.updated_at, "");
    }

    #[test]
    fn test_license_without_spdx_id_is_empty() {
        let record = enriched(item(json!({ "full_name": "a/b", "license": { "key": "other" } }))).to_record();
        assert_eq!(record.license, "");
    }

    #[test]
    fn test_zeroed_quality_is_kept() {
        let mut raw = enriched(item(json!({ "full_name": "a/b" })));
        raw.enrichment = EnrichmentResult::without_quality("analyzer exited with exit status: 1");
        let record = raw.to_record();
        assert_eq!(record.loc, 0);
        assert_eq!(record.loc_comments, 0);
        assert!(record.cbo.abs() < f64::EPSILON);
        assert!(record.dit.abs() < f64::EPSILON);
        assert!(record.lcom.abs() < f64::EPSILON);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let items = vec![
            enriched(item(json!({ "full_name": "a/one", "license": { "spdx_id": "Apache-2.0" } }))),
            enriched(item(json!({ "full_name": "b/two" }))),
        ];

        let once = normalize(&items);
        let twice = normalize(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_normalize_preserves_order() {
        let items = vec![
            enriched(item(json!({ "full_name": "z/last" }))),
            enriched(item(json!({ "full_name": "a/first" }))),
        ];

        let names: Vec<_> = normalize(&items).into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["z/last", "a/first"]);
    }

    #[test]
    fn test_field_names_match_serialization_order() {
        let record = enriched(item(json!({ "full_name": "a/b" }))).to_record();
        let value = serde_json::to_value(&record).unwrap();
        let keys: Vec<_> = value.as_object().unwrap().keys().cloned().collect();

        // serde_json's map is sorted unless preserve_order is on, so compare as sets
        let mut expected: Vec<_> = FIELD_NAMES.iter().map(ToString::to_string).collect();
        let mut actual = keys;
        expected.sort();
        actual.sort();
        assert_eq!(actual, expected);
    }
}
