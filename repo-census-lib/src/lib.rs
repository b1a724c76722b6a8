#![doc(hidden)]

//! Core library for repo-census
//!
//! This library holds all functionality for the repo-census tool, which samples popular
//! repositories from a search API, measures process and quality metrics for each one,
//! and writes the results out as a single flat table.
//!
//! # Module Organization
//!
//! - [`commands`]: Command-line interface, configuration and logging
//! - [`collect`]: Remote listing, per-repository enrichment and the external analyzer
//! - [`reports`]: Projection into the fixed output schema and the table writers
//! - [`pipeline`]: The end-to-end run and its success/failure contract

pub type Result<T, E = ohno::AppError> = core::result::Result<T, E>;

pub mod collect;
pub mod commands;
pub mod pipeline;
pub mod reports;

pub use crate::commands::{Host, run};
