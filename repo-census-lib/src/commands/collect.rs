use super::common::{ColorMode, LogLevel, init_logging};
use super::config::Config;
use super::{Host, ProgressReporter};
use crate::Result;
use crate::collect::{Enricher, Executor, ExternalAnalyzer, GitFetcher, Lister, Progress};
use crate::pipeline::{Pipeline, PipelineSettings, RunFailure, RunSummary};
use crate::reports::FileWriter;
use camino::Utf8PathBuf;
use chrono::Utc;
use clap::Args;
use core::time::Duration;
use directories::BaseDirs;
use ohno::IntoAppError;
use owo_colors::OwoColorize;
use std::io::Write;
use std::path::PathBuf;

const LOG_TARGET: &str = "   collect";

/// Exit code used when a run finishes without producing output.
pub const RUN_FAILED_EXIT_CODE: i32 = 2;

#[derive(Args, Debug)]
pub struct CollectArgs {
    /// GitHub personal access token
    #[arg(long, value_name = "TOKEN", env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Path to configuration file (default is `repo-census.toml` in the current directory)
    #[arg(long, short = 'c', value_name = "PATH")]
    pub config: Option<Utf8PathBuf>,

    /// Number of repositories to request from the search listing
    #[arg(long, short = 'n', value_name = "COUNT")]
    pub target_count: Option<u32>,

    /// Repositories per search page (1..=100)
    #[arg(long, value_name = "COUNT")]
    pub page_size: Option<u32>,

    /// Output table path; a `.json` extension selects JSON, anything else CSV
    #[arg(long, short = 'o', value_name = "PATH")]
    pub output: Option<Utf8PathBuf>,

    /// Directory holding the per-repository working areas
    #[arg(long, value_name = "PATH")]
    pub work_dir: Option<Utf8PathBuf>,

    /// Analyzer command as comma-separated words (e.g. `java,-jar,ck.jar`); the content and
    /// output directories are appended as its last two arguments
    #[arg(long, value_name = "COMMAND", value_delimiter = ',', allow_hyphen_values = true)]
    pub analyzer: Option<Vec<String>>,

    /// Control when to use colored output
    #[arg(long, value_name = "WHEN", default_value = "auto")]
    pub color: ColorMode,

    /// Set the logging level for diagnostic output
    #[arg(long, value_name = "LEVEL", default_value = "none")]
    pub log_level: LogLevel,
}

impl CollectArgs {
    /// Apply command-line overrides on top of the loaded configuration.
    fn apply_to(&self, config: &mut Config) -> Result<()> {
        if let Some(count) = self.target_count {
            config.target_count = count;
        }
        if let Some(size) = self.page_size {
            config.page_size = size;
        }
        if let Some(output) = &self.output {
            config.output.clone_from(output);
        }
        if let Some(work_dir) = &self.work_dir {
            config.work_dir = Some(work_dir.clone());
        }
        if let Some(analyzer) = &self.analyzer {
            config.analyzer.clone_from(analyzer);
        }

        config.validate()
    }
}

/// Resolve the work root, falling back to the platform cache directory.
fn work_root(config: &Config) -> Result<PathBuf> {
    if let Some(dir) = &config.work_dir {
        return Ok(dir.clone().into_std_path_buf());
    }

    Ok(BaseDirs::new()
        .into_app_err("could not determine cache directory")?
        .cache_dir()
        .join("repo-census")
        .join("work"))
}

pub async fn process_collect<H: Host>(host: &mut H, args: &CollectArgs) -> Result<()> {
    init_logging(args.log_level);

    let mut config = Config::load(args.config.as_deref())?;
    args.apply_to(&mut config)?;

    if args.github_token.is_none() {
        log::warn!(target: LOG_TARGET, "No GitHub token given, the API will only allow a handful of requests per minute");
    }

    let executor = Executor::new(
        config.api_base_url.clone(),
        args.github_token.as_deref(),
        config.request_timeout(),
        config.retry_policy(),
    )?;

    let lister = Lister::new(executor.clone(), config.search_query(), config.page_delay());
    let enricher = Enricher::new(
        executor,
        GitFetcher::new(config.clone_timeout()),
        ExternalAnalyzer::new(config.analyzer.clone(), config.analyzer_timeout()),
        config.enricher_settings(work_root(&config)?),
        Utc::now(),
    );

    let settings = PipelineSettings {
        target_count: config.target_count,
        page_size: config.page_size,
        output: config.output.clone().into_std_path_buf(),
    };

    let pipeline = Pipeline::new(lister, enricher, FileWriter, settings);

    let delay = if args.log_level == LogLevel::None {
        Duration::from_millis(300)
    } else {
        Duration::from_hours(365 * 24)
    };
    let progress = ProgressReporter::new(delay, args.color.enabled_for(&std::io::stderr()));

    let outcome = pipeline.run(&progress).await;
    progress.done();

    let use_colors = args.color.enabled_for(&std::io::stdout());
    match outcome {
        Ok(summary) => {
            print_summary(host, &summary, use_colors);
            Ok(())
        }
        Err(failure) => {
            print_failure(host, &failure, use_colors);
            host.exit(RUN_FAILED_EXIT_CODE);
            Ok(())
        }
    }
}

fn print_summary<H: Host>(host: &mut H, summary: &RunSummary, use_colors: bool) {
    let mut out = host.output();
    let heading = "Collection complete";
    if use_colors {
        let _ = writeln!(out, "{}", heading.green().bold());
    } else {
        let _ = writeln!(out, "{heading}");
    }

    let _ = writeln!(out, "  listed:              {}", summary.listed);
    let _ = writeln!(out, "  enriched:            {}", summary.enriched);
    let _ = writeln!(out, "  skipped:             {}", summary.skipped.len());
    let _ = writeln!(out, "  quality unavailable: {}", summary.quality_unavailable);
    let _ = writeln!(out, "  output:              {}", summary.output.display());

    for skipped in &summary.skipped {
        let line = format!("  skipped '{}' at {}: {}", skipped.name, skipped.stage, skipped.reason);
        if use_colors {
            let _ = writeln!(out, "{}", line.yellow());
        } else {
            let _ = writeln!(out, "{line}");
        }
    }
}

fn print_failure<H: Host>(host: &mut H, failure: &RunFailure, use_colors: bool) {
    let mut err = host.error();
    let message = format!("Collection failed: {failure}");
    if use_colors {
        let _ = writeln!(err, "{}", message.red().bold());
    } else {
        let _ = writeln!(err, "{message}");
    }

    if let RunFailure::NothingEnriched { skipped, .. } = failure {
        for item in skipped {
            let _ = writeln!(err, "  '{}' at {}: {}", item.name, item.stage, item.reason);
        }
    }

    let _ = writeln!(err, "No output was written.");
}
