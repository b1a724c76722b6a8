//! Data collection for the repository sample
//!
//! This module gathers everything the output table needs from two kinds of sources: the
//! hosting API (search listing, release, contributor and pull request counts) and an
//! external static-analysis tool run against a fresh shallow clone of each repository.
//!
//! # Implementation Model
//!
//! - [`Executor`] wraps every API call with bounded retry. Rate limits, server errors and
//!   transport failures are waited out; other failures are reported immediately.
//! - [`Lister`] walks the search pages in order. One failing page fails the whole listing.
//! - [`Enricher`] processes one repository at a time inside a [`WorkingArea`] that is
//!   removed when the repository is done, whether it succeeded or not. A failed clone
//!   skips the repository; any other failure zeroes only the affected metric.
//!
//! Everything runs sequentially. The pauses between pages and repositories are the only
//! rate control, so running repositories in parallel would need distinct working areas
//! and a shared limiter in front of the executor.

mod analyzer;
mod enricher;
mod enrichment;
mod git;
mod lister;
mod pagination;
mod path_utils;
mod progress;
mod raw_item;
mod resilient_http;
mod working_area;

pub use analyzer::{ExternalAnalyzer, QualityAnalyzer, QualityMetrics, parse_class_table};
pub use enricher::{Enricher, EnricherSettings, EnrichmentReport, ItemOutcome, SkipStage, SkippedItem};
pub use enrichment::{EnrichedItem, EnrichmentResult, QualityStatus, maturity_years, parse_created_at, round2};
pub use git::{ContentFetcher, GitFetcher};
pub use lister::{ListingError, Lister, SearchQuery, page_count};
pub use pagination::last_page;
pub use progress::{NoProgress, Progress};
pub use raw_item::{License, RawItem};
pub use resilient_http::{ApiResponse, Executor, RequestFailure, RetryPolicy};
pub use working_area::{WorkingArea, remove_root_if_empty};
