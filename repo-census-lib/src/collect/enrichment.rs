use super::analyzer::QualityMetrics;
use super::raw_item::RawItem;
use chrono::{DateTime, NaiveDateTime, Utc};

const CREATED_AT_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";
const DAYS_PER_YEAR: f64 = 365.0;

/// Whether the quality block of an [`EnrichmentResult`] was measured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QualityStatus {
    /// The analyzer ran and reported this many units.
    Measured { units: u64 },

    /// The analyzer could not produce metrics; the quality fields are zero and mean "unknown".
    Unavailable(String),
}

impl QualityStatus {
    #[must_use]
    pub const fn is_measured(&self) -> bool {
        matches!(self, Self::Measured { .. })
    }
}

/// Metrics derived for one repository.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentResult {
    pub popularity: u64,
    pub release_count: u64,
    pub maturity_years: f64,
    pub loc: u64,
    pub loc_comments: u64,
    pub cbo: f64,
    pub dit: f64,
    pub lcom: f64,
    pub contributors: u64,
    pub merged_pull_requests: u64,
    pub quality: QualityStatus,
}

impl EnrichmentResult {
    /// A result with process metrics only and a zeroed, unavailable quality block.
    #[must_use]
    pub fn without_quality(reason: impl Into<String>) -> Self {
        Self {
            popularity: 0,
            release_count: 0,
            maturity_years: 0.0,
            loc: 0,
            loc_comments: 0,
            cbo: 0.0,
            dit: 0.0,
            lcom: 0.0,
            contributors: 0,
            merged_pull_requests: 0,
            quality: QualityStatus::Unavailable(reason.into()),
        }
    }

    /// Fill the quality block from measured metrics.
    pub fn set_quality(&mut self, metrics: &QualityMetrics) {
        self.loc = metrics.loc;
        self.loc_comments = metrics.loc_comments;
        self.cbo = metrics.cbo;
        self.dit = metrics.dit;
        self.lcom = metrics.lcom;
        self.quality = QualityStatus::Measured { units: metrics.units };
    }
}

/// A listed repository together with what enrichment learned about it.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedItem {
    pub item: RawItem,
    pub enrichment: EnrichmentResult,
}

/// Round to two decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parse a `YYYY-MM-DDTHH:MM:SSZ` timestamp.
#[must_use]
pub fn parse_created_at(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value, CREATED_AT_FORMAT).ok().map(|naive| naive.and_utc())
}

/// Whole days elapsed since `created_at`, expressed in years with two decimals.
///
/// Timestamps in the future count as zero.
#[must_use]
pub fn maturity_years(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let days = (now - created_at).num_days().max(0);

    #[expect(clippy::cast_precision_loss, reason = "day counts are far below 2^52")]
    let days = days as f64;

    round2(days / DAYS_PER_YEAR)
}
