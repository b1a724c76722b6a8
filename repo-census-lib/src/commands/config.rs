use crate::Result;
use crate::collect::{EnricherSettings, RetryPolicy, SearchQuery};
use camino::{Utf8Path, Utf8PathBuf};
use core::time::Duration;
use ohno::{EnrichableExt, IntoAppError, bail};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::PathBuf;

/// The default configuration TOML content, embedded from `default_config.toml`
pub const DEFAULT_CONFIG_TOML: &str = include_str!("../../default_config.toml");

/// File looked up in the current directory when no configuration path is given.
pub const DEFAULT_CONFIG_FILE: &str = "repo-census.toml";

const LOG_TARGET: &str = "    config";

/// Largest page size the search API accepts.
const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Base URL of a GitHub-compatible REST API
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Number of repositories to request from the search listing
    #[serde(default = "default_target_count")]
    pub target_count: u32,

    /// Repositories per search page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Destination of the output table
    #[serde(default = "default_output")]
    pub output: Utf8PathBuf,

    /// Root directory of the per-repository working areas
    #[serde(default)]
    pub work_dir: Option<Utf8PathBuf>,

    /// Analyzer program followed by its leading arguments
    #[serde(default = "default_analyzer")]
    pub analyzer: Vec<String>,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub delays: DelayConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SearchConfig {
    pub query: String,
    pub sort: String,
    pub order: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let query = SearchQuery::default();
        Self {
            query: query.filter,
            sort: query.sort,
            order: query.order,
        }
    }
}

/// Retry budget for API calls. Waits are in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub rate_limit_wait: u64,
    pub max_rate_limit_wait: u64,
    pub server_error_wait: u64,
    pub transport_error_wait: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts,
            rate_limit_wait: policy.rate_limit_wait.as_secs(),
            max_rate_limit_wait: policy.max_rate_limit_wait.as_secs(),
            server_error_wait: policy.server_error_wait.as_secs(),
            transport_error_wait: policy.transport_error_wait.as_secs(),
        }
    }
}

/// Courtesy pauses, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct DelayConfig {
    pub page: u64,
    pub item: u64,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self { page: 1, item: 1 }
    }
}

/// Timeouts, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct TimeoutConfig {
    pub request: u64,
    pub clone: u64,
    pub analyzer: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request: 60,
            clone: 600,
            analyzer: 1800,
        }
    }
}

/// Optional per-repository metrics that cost extra API calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct MetricsConfig {
    pub contributors: bool,
    pub merged_pull_requests: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            contributors: true,
            merged_pull_requests: true,
        }
    }
}

fn default_api_base_url() -> String {
    "https://api.github.com".to_string()
}

const fn default_target_count() -> u32 {
    1000
}

const fn default_page_size() -> u32 {
    MAX_PAGE_SIZE
}

fn default_output() -> Utf8PathBuf {
    Utf8PathBuf::from("repo-census.csv")
}

fn default_analyzer() -> Vec<String> {
    vec!["ck".to_string()]
}

impl Config {
    /// Load configuration from a file or use defaults
    ///
    /// Without an explicit path, `repo-census.toml` in the current directory is used if it
    /// exists. An explicit path that cannot be read is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or holds invalid values
    pub fn load(config_path: Option<&Utf8Path>) -> Result<Self> {
        let (final_path, text) = if let Some(path) = config_path {
            let text = fs::read_to_string(path).into_app_err_with(|| format!("reading configuration file '{path}'"))?;
            (path.to_path_buf(), text)
        } else {
            let path = Utf8PathBuf::from(DEFAULT_CONFIG_FILE);
            match fs::read_to_string(&path) {
                Ok(text) => (path, text),
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
                Err(e) => return Err(e).into_app_err_with(|| format!("reading configuration file '{path}'")),
            }
        };

        let config = Self::parse(&text).map_err(|e| e.enrich_with(|| format!("parsing configuration file '{final_path}'")))?;
        log::debug!(target: LOG_TARGET, "Loaded configuration from '{final_path}'");
        Ok(config)
    }

    /// Parse and validate configuration text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid TOML for this schema or holds invalid values
    pub fn parse(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Save the default configuration to a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written
    pub fn save_default(output_path: &Utf8Path) -> Result<()> {
        fs::write(output_path, DEFAULT_CONFIG_TOML).into_app_err_with(|| format!("writing default configuration to {output_path}"))?;
        Ok(())
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns an error naming the first out-of-range value
    pub fn validate(&self) -> Result<()> {
        if self.target_count == 0 {
            bail!("target_count must be at least 1");
        }

        if !(1..=MAX_PAGE_SIZE).contains(&self.page_size) {
            bail!("page_size must be between 1 and {MAX_PAGE_SIZE}, got {}", self.page_size);
        }

        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }

        if self.analyzer.first().is_none_or(|program| program.trim().is_empty()) {
            bail!("analyzer must name a program to run");
        }

        if self.api_base_url.trim().is_empty() {
            bail!("api_base_url must not be empty");
        }

        if self.search.query.trim().is_empty() {
            bail!("search.query must not be empty");
        }

        Ok(())
    }

    #[must_use]
    pub const fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry.max_attempts,
            rate_limit_wait: Duration::from_secs(self.retry.rate_limit_wait),
            max_rate_limit_wait: Duration::from_secs(self.retry.max_rate_limit_wait),
            server_error_wait: Duration::from_secs(self.retry.server_error_wait),
            transport_error_wait: Duration::from_secs(self.retry.transport_error_wait),
        }
    }

    #[must_use]
    pub fn search_query(&self) -> SearchQuery {
        SearchQuery {
            filter: self.search.query.clone(),
            sort: self.search.sort.clone(),
            order: self.search.order.clone(),
        }
    }

    #[must_use]
    pub fn enricher_settings(&self, work_root: PathBuf) -> EnricherSettings {
        EnricherSettings {
            work_root,
            item_delay: Duration::from_secs(self.delays.item),
            collect_contributors: self.metrics.contributors,
            collect_merged_pull_requests: self.metrics.merged_pull_requests,
        }
    }

    #[must_use]
    pub const fn page_delay(&self) -> Duration {
        Duration::from_secs(self.delays.page)
    }

    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.request)
    }

    #[must_use]
    pub const fn clone_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.clone)
    }

    #[must_use]
    pub const fn analyzer_timeout(&self) -> Duration {
        Duration::from_secs(self.timeouts.analyzer)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            target_count: default_target_count(),
            page_size: default_page_size(),
            output: default_output(),
            work_dir: None,
            analyzer: default_analyzer(),
            search: SearchConfig::default(),
            retry: RetryConfig::default(),
            delays: DelayConfig::default(),
            timeouts: TimeoutConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}
