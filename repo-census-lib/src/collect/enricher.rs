//! Per-repository enrichment.
//!
//! Each listed repository is cloned into its own [`WorkingArea`], measured, and the area is
//! torn down again before the next repository starts. Nothing in here fails the run: a
//! repository whose content cannot be fetched is skipped, and every other failure only
//! zeroes the metric it affects.

use super::analyzer::QualityAnalyzer;
use super::enrichment::{EnrichedItem, EnrichmentResult, QualityStatus, maturity_years, parse_created_at};
use super::git::ContentFetcher;
use super::pagination::count_entries;
use super::progress::Progress;
use super::raw_item::{RawItem, SearchCount};
use super::resilient_http::Executor;
use super::working_area::WorkingArea;
use chrono::{DateTime, Utc};
use core::fmt::{Display, Formatter};
use core::time::Duration;
use ohno::app_err;
use std::path::{Path, PathBuf};

const LOG_TARGET: &str = "  enricher";

/// Knobs for the enrichment stage.
#[derive(Debug, Clone)]
pub struct EnricherSettings {
    /// Directory under which per-repository working areas are created.
    pub work_root: PathBuf,

    /// Pause between consecutive repositories.
    pub item_delay: Duration,

    /// Count contributors through the contributors endpoint.
    pub collect_contributors: bool,

    /// Count merged pull requests through the issue search endpoint.
    pub collect_merged_pull_requests: bool,
}

/// The step at which a repository was dropped from the sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipStage {
    Staging,
    ContentFetch,
}

impl Display for SkipStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Staging => write!(f, "staging"),
            Self::ContentFetch => write!(f, "content fetch"),
        }
    }
}

/// A repository that did not make it through enrichment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedItem {
    pub name: String,
    pub stage: SkipStage,
    pub reason: String,
}

/// Result of enriching one repository.
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Enriched(EnrichedItem),
    Skipped(SkippedItem),
}

/// Result of enriching a whole listing.
#[derive(Debug, Clone, Default)]
pub struct EnrichmentReport {
    pub enriched: Vec<EnrichedItem>,
    pub skipped: Vec<SkippedItem>,
}

impl EnrichmentReport {
    /// Number of enriched repositories whose quality metrics could not be measured.
    #[must_use]
    pub fn quality_unavailable(&self) -> usize {
        self.enriched.iter().filter(|e| !e.enrichment.quality.is_measured()).count()
    }
}

#[derive(Debug)]
pub struct Enricher<F, A> {
    executor: Executor,
    fetcher: F,
    analyzer: A,
    settings: EnricherSettings,
    now: DateTime<Utc>,
}

impl<F: ContentFetcher, A: QualityAnalyzer> Enricher<F, A> {
    #[must_use]
    pub const fn new(executor: Executor, fetcher: F, analyzer: A, settings: EnricherSettings, now: DateTime<Utc>) -> Self {
        Self {
            executor,
            fetcher,
            analyzer,
            settings,
            now,
        }
    }

    #[must_use]
    pub fn work_root(&self) -> &Path {
        &self.settings.work_root
    }

    /// Enrich every repository in order, pausing between repositories.
    pub async fn enrich_all(&self, items: Vec<RawItem>, progress: &dyn Progress) -> EnrichmentReport {
        let total = items.len();
        let mut report = EnrichmentReport::default();

        log::info!(target: LOG_TARGET, "Collecting detailed data for {total} repositories");
        progress.set_phase("Enriching");
        progress.set_total(total as u64);

        for (index, item) in items.into_iter().enumerate() {
            if index > 0 {
                tokio::time::sleep(self.settings.item_delay).await;
            }

            log::info!(target: LOG_TARGET, "Collecting details of '{}' ({}/{total})", item.full_name, index + 1);
            progress.advance(&item.full_name);

            match self.enrich(item).await {
                ItemOutcome::Enriched(enriched) => report.enriched.push(enriched),
                ItemOutcome::Skipped(skipped) => report.skipped.push(skipped),
            }
        }

        report
    }

    /// Enrich a single repository.
    ///
    /// The working area is gone by the time this returns, on every path.
    pub async fn enrich(&self, item: RawItem) -> ItemOutcome {
        let name = item.full_name.clone();

        let area = match WorkingArea::stage(&self.settings.work_root, &name) {
            Ok(area) => area,
            Err(e) => return Self::skip(name, SkipStage::Staging, &e),
        };

        if let Err(e) = self.fetcher.fetch(&item, area.content_dir()).await {
            return Self::skip(name, SkipStage::ContentFetch, &e);
        }

        let mut enrichment = EnrichmentResult::without_quality("not analyzed");
        enrichment.popularity = item.stargazers_count;
        enrichment.release_count = self.release_count(&name).await;
        enrichment.maturity_years = self.maturity(&item);

        if self.settings.collect_contributors {
            enrichment.contributors = self.contributor_count(&name).await;
        }

        if self.settings.collect_merged_pull_requests {
            enrichment.merged_pull_requests = self.merged_pull_request_count(&name).await;
        }

        match self.analyzer.analyze(area.content_dir(), area.output_dir()).await {
            Ok(metrics) => enrichment.set_quality(&metrics),
            Err(e) => {
                log::warn!(target: LOG_TARGET, "Analyzer failed for '{name}', quality metrics zeroed: {e:#}");
                enrichment.quality = QualityStatus::Unavailable(format!("{e:#}"));
            }
        }

        drop(area);

        ItemOutcome::Enriched(EnrichedItem { item, enrichment })
    }

    fn skip(name: String, stage: SkipStage, error: &ohno::AppError) -> ItemOutcome {
        log::warn!(target: LOG_TARGET, "Skipping '{name}', {stage} failed: {error:#}");
        ItemOutcome::Skipped(SkippedItem {
            name,
            stage,
            reason: format!("{error:#}"),
        })
    }

    fn maturity(&self, item: &RawItem) -> f64 {
        let Some(created_at) = item.created_at.as_deref() else {
            return 0.0;
        };

        parse_created_at(created_at).map_or_else(
            || {
                log::warn!(target: LOG_TARGET, "Unrecognized creation timestamp '{created_at}' for '{}'", item.full_name);
                0.0
            },
            |created| maturity_years(created, self.now),
        )
    }

    async fn release_count(&self, name: &str) -> u64 {
        let endpoint = format!("repos/{name}/releases");
        self.count_collection(&endpoint, &[]).await.unwrap_or_else(|e| {
            log::warn!(target: LOG_TARGET, "Could not count releases of '{name}': {e:#}");
            0
        })
    }

    async fn contributor_count(&self, name: &str) -> u64 {
        let endpoint = format!("repos/{name}/contributors");
        self.count_collection(&endpoint, &[("anon", "true".into())]).await.unwrap_or_else(|e| {
            log::warn!(target: LOG_TARGET, "Could not count contributors of '{name}': {e:#}");
            0
        })
    }

    async fn merged_pull_request_count(&self, name: &str) -> u64 {
        self.search_count(&format!("repo:{name} is:pr is:merged")).await.unwrap_or_else(|e| {
            log::warn!(target: LOG_TARGET, "Could not count merged pull requests of '{name}': {e:#}");
            0
        })
    }

    /// Total hit count of an issue search.
    async fn search_count(&self, filter: &str) -> crate::Result<u64> {
        let query = [("q", filter.to_string()), ("per_page", "1".to_string())];

        let response = self.executor.execute("search/issues", &query).await.map_err(|f| app_err!("{f}"))?;
        let body: SearchCount = response.json()?;
        Ok(body.total_count)
    }

    /// Size of a collection endpoint, fetched one entry per page.
    async fn count_collection(&self, endpoint: &str, params: &[(&str, String)]) -> crate::Result<u64> {
        let mut query = vec![("per_page", "1".to_string())];
        query.extend(params.iter().cloned());

        let response = self.executor.execute(endpoint, &query).await.map_err(|f| app_err!("{f}"))?;
        count_entries(&response)
    }
}
