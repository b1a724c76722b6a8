//! The end-to-end run: list, enrich, normalize, write.
//!
//! A run either produces an output table or fails with a [`RunFailure`] saying why. No
//! output is written unless at least one repository made it through enrichment.

use crate::collect::{ContentFetcher, Enricher, ListingError, Lister, Progress, QualityAnalyzer, SkippedItem, remove_root_if_empty};
use crate::reports::{RecordWriter, normalize};
use core::fmt::{Display, Formatter};
use std::path::PathBuf;

const LOG_TARGET: &str = "  pipeline";

/// How much to collect and where to put it.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Number of repositories to request from the search listing.
    pub target_count: u32,

    /// Repositories per search page.
    pub page_size: u32,

    /// Destination of the output table.
    pub output: PathBuf,
}

/// What a successful run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub listed: usize,
    pub enriched: usize,
    pub skipped: Vec<SkippedItem>,
    pub quality_unavailable: usize,
    pub output: PathBuf,
}

/// Why a run produced no output table.
#[derive(Debug)]
pub enum RunFailure {
    /// A search page could not be fetched or decoded.
    ListingFailed(ListingError),

    /// The listing succeeded but returned no repositories.
    NothingListed,

    /// Every listed repository was skipped during enrichment.
    NothingEnriched { listed: usize, skipped: Vec<SkippedItem> },

    /// The table could not be written.
    WriteFailed { output: PathBuf, error: ohno::AppError },
}

impl Display for RunFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ListingFailed(e) => write!(f, "listing failed: {e}"),
            Self::NothingListed => write!(f, "the search listing returned no repositories"),
            Self::NothingEnriched { listed, .. } => write!(f, "all {listed} listed repositories were skipped"),
            Self::WriteFailed { output, error } => write!(f, "could not write '{}': {error:#}", output.display()),
        }
    }
}

impl core::error::Error for RunFailure {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::ListingFailed(e) => Some(e),
            _ => None,
        }
    }
}

/// Wires the lister, the enricher and a writer into one run.
#[derive(Debug)]
pub struct Pipeline<F, A, W> {
    lister: Lister,
    enricher: Enricher<F, A>,
    writer: W,
    settings: PipelineSettings,
}

impl<F: ContentFetcher, A: QualityAnalyzer, W: RecordWriter> Pipeline<F, A, W> {
    #[must_use]
    pub const fn new(lister: Lister, enricher: Enricher<F, A>, writer: W, settings: PipelineSettings) -> Self {
        Self {
            lister,
            enricher,
            writer,
            settings,
        }
    }

    pub async fn run(&self, progress: &dyn Progress) -> Result<RunSummary, RunFailure> {
        let start_time = std::time::Instant::now();

        let items = self
            .lister
            .list(self.settings.target_count, self.settings.page_size, progress)
            .await
            .map_err(RunFailure::ListingFailed)?;

        let listed = items.len();
        if listed == 0 {
            return Err(RunFailure::NothingListed);
        }

        let report = self.enricher.enrich_all(items, progress).await;
        remove_root_if_empty(self.enricher.work_root());

        if report.enriched.is_empty() {
            return Err(RunFailure::NothingEnriched {
                listed,
                skipped: report.skipped,
            });
        }

        progress.set_phase("Writing");
        let records = normalize(&report.enriched);
        let output = self.settings.output.clone();
        self.writer.write(&records, &output).map_err(|error| RunFailure::WriteFailed {
            output: output.clone(),
            error,
        })?;

        log::info!(
            target: LOG_TARGET,
            "Run finished in {:.3}s: {listed} listed, {} enriched, {} skipped",
            start_time.elapsed().as_secs_f64(),
            report.enriched.len(),
            report.skipped.len()
        );

        Ok(RunSummary {
            listed,
            enriched: report.enriched.len(),
            quality_unavailable: report.quality_unavailable(),
            skipped: report.skipped,
            output,
        })
    }
}
