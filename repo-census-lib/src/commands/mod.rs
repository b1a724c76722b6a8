//! Command-line interface and orchestration for repo-census
//!
//! This module turns command-line arguments and the configuration file into the
//! settings each pipeline component is built with, runs the pipeline, and reports
//! the outcome.
//!
//! # Commands
//!
//! - **collect**: List repositories, enrich each one, and write the output table
//! - **init**: Generate a default configuration file
//!
//! Configuration comes from `repo-census.toml` (or `--config`), with a handful of
//! values overridable from the command line. Nothing is global: the loaded
//! [`Config`] is converted into explicit settings structs that are passed
//! to the executor, lister, enricher and pipeline at construction.

mod collect;
mod common;
mod config;
mod host;
mod init;
mod progress_reporter;
mod run;

pub use collect::{CollectArgs, RUN_FAILED_EXIT_CODE, process_collect};
pub use common::{ColorMode, LogLevel};
pub use config::{Config, DEFAULT_CONFIG_TOML};
pub use host::Host;
pub use init::{InitArgs, init_config};
pub use progress_reporter::ProgressReporter;
pub use run::run;
