//! Paginated listing of the repository sample.

use super::progress::Progress;
use super::raw_item::{RawItem, SearchPage};
use super::resilient_http::{Executor, RequestFailure};
use core::fmt::{Display, Formatter};
use core::time::Duration;

const LOG_TARGET: &str = "   listing";
const SEARCH_ENDPOINT: &str = "search/repositories";

/// The search that defines the sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    /// Free-text filter, the `q` parameter.
    pub filter: String,

    /// Sort key, popularity by default.
    pub sort: String,

    /// Sort order.
    pub order: String,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            filter: "language:java stars:>1".into(),
            sort: "stars".into(),
            order: "desc".into(),
        }
    }
}

/// A listing that could not be completed.
///
/// Pagination is all-or-nothing: a gap in a popularity-sorted listing would bias the
/// sample, so any failing page discards the pages already collected.
#[derive(Debug)]
pub enum ListingError {
    /// The request for a page produced no response.
    Request { page: u32, total_pages: u32, failure: RequestFailure },

    /// A page was returned but its body could not be decoded.
    Decode { page: u32, total_pages: u32, reason: String },
}

impl ListingError {
    #[must_use]
    pub const fn page(&self) -> u32 {
        match self {
            Self::Request { page, .. } | Self::Decode { page, .. } => *page,
        }
    }
}

impl Display for ListingError {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Request { page, total_pages, failure } => {
                write!(f, "could not fetch listing page {page}/{total_pages}: {failure}")
            }
            Self::Decode { page, total_pages, reason } => {
                write!(f, "could not decode listing page {page}/{total_pages}: {reason}")
            }
        }
    }
}

impl core::error::Error for ListingError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Request { failure, .. } => Some(failure),
            Self::Decode { .. } => None,
        }
    }
}

/// Number of pages requested for a target count.
///
/// Integer division: a remainder smaller than a page is dropped.
#[must_use]
pub const fn page_count(target_count: u32, page_size: u32) -> u32 {
    if page_size == 0 { 0 } else { target_count / page_size }
}

#[derive(Debug, Clone)]
pub struct Lister {
    executor: Executor,
    query: SearchQuery,
    page_delay: Duration,
}

impl Lister {
    #[must_use]
    pub const fn new(executor: Executor, query: SearchQuery, page_delay: Duration) -> Self {
        Self {
            executor,
            query,
            page_delay,
        }
    }

    /// Fetch `target_count / page_size` pages of search results, in order.
    pub async fn list(&self, target_count: u32, page_size: u32, progress: &dyn Progress) -> Result<Vec<RawItem>, ListingError> {
        let total_pages = page_count(target_count, page_size);
        let remainder = target_count - total_pages * page_size;
        if remainder > 0 {
            log::warn!(
                target: LOG_TARGET,
                "Target of {target_count} is not a multiple of the page size {page_size}, the last {remainder} will not be fetched"
            );
        }

        log::info!(target: LOG_TARGET, "Listing {} repositories matching '{}'", total_pages * page_size, self.query.filter);
        progress.set_phase("Listing");
        progress.set_total(u64::from(total_pages));

        let mut items = Vec::with_capacity((total_pages * page_size) as usize);

        for page in 1..=total_pages {
            if page > 1 {
                tokio::time::sleep(self.page_delay).await;
            }

            let page_items = self.fetch_page(page, total_pages, page_size).await?;
            log::info!(target: LOG_TARGET, "Collected listing page {page}/{total_pages} ({} repositories)", page_items.len());
            items.extend(page_items);
            progress.advance(&format!("page {page}/{total_pages}"));
        }

        Ok(items)
    }

    async fn fetch_page(&self, page: u32, total_pages: u32, page_size: u32) -> Result<Vec<RawItem>, ListingError> {
        let params = [
            ("q", self.query.filter.clone()),
            ("sort", self.query.sort.clone()),
            ("order", self.query.order.clone()),
            ("per_page", page_size.to_string()),
            ("page", page.to_string()),
        ];

        let response = self
            .executor
            .execute(SEARCH_ENDPOINT, &params)
            .await
            .map_err(|failure| {
                log::error!(target: LOG_TARGET, "Could not fetch listing page {page}/{total_pages}: {failure}");
                ListingError::Request { page, total_pages, failure }
            })?;

        let body: SearchPage = response.json().map_err(|e| ListingError::Decode {
            page,
            total_pages,
            reason: format!("{e:#}"),
        })?;

        if body.incomplete_results {
            log::warn!(target: LOG_TARGET, "Listing page {page} was marked as incomplete by the server");
        }

        Ok(body.items)
    }
}
