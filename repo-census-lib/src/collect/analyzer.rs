//! Quality metrics from an external static-analysis tool.
//!
//! The tool is invoked as `<command...> <content_path> <output_path>` and is expected to
//! leave a per-class table at `<output_path>/class.csv`.

use super::enrichment::round2;
use crate::Result;
use core::time::Duration;
use ohno::{IntoAppError, app_err, bail};
use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

const LOG_TARGET: &str = "  analyzer";
const CLASS_TABLE: &str = "class.csv";
const STDERR_TAIL_LINES: usize = 5;

/// Aggregated quality metrics for one repository.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityMetrics {
    /// Number of analyzed units (rows of the table).
    pub units: u64,
    pub loc: u64,
    pub loc_comments: u64,
    pub cbo: f64,
    pub dit: f64,
    pub lcom: f64,
}

/// Measures the quality of a repository's content.
pub trait QualityAnalyzer: Send + Sync {
    /// Analyze `content`, using `output` as scratch space for the tool's results.
    fn analyze(&self, content: &Path, output: &Path) -> impl Future<Output = Result<QualityMetrics>> + Send;
}

/// Runs an external command and reads its class table.
#[derive(Debug, Clone)]
pub struct ExternalAnalyzer {
    command: Vec<String>,
    timeout: Duration,
}

impl ExternalAnalyzer {
    /// `command` is the program followed by any leading arguments, e.g. `["java", "-jar", "ck.jar"]`.
    #[must_use]
    pub const fn new(command: Vec<String>, timeout: Duration) -> Self {
        Self { command, timeout }
    }

    async fn run(&self, content: &Path, output: &Path) -> Result<()> {
        let Some((program, leading_args)) = self.command.split_first() else {
            bail!("no analyzer command configured");
        };

        let child = Command::new(program)
            .args(leading_args)
            .arg(content)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .into_app_err_with(|| format!("could not spawn analyzer '{program}'"))?;

        let result = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.into_app_err_with(|| format!("analyzer '{program}' failed to run"))?,
            Err(_) => bail!("analyzer timed out after {} seconds", self.timeout.as_secs()),
        };

        if !result.status.success() {
            let stderr = String::from_utf8_lossy(&result.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(STDERR_TAIL_LINES).collect();
            let tail: Vec<&str> = tail.into_iter().rev().collect();
            bail!("analyzer exited with {}: {}", result.status, tail.join(" | "));
        }

        Ok(())
    }
}

impl QualityAnalyzer for ExternalAnalyzer {
    async fn analyze(&self, content: &Path, output: &Path) -> Result<QualityMetrics> {
        let start_time = std::time::Instant::now();
        self.run(content, output).await?;
        log::debug!(target: LOG_TARGET, "Analyzer finished in {:.3}s", start_time.elapsed().as_secs_f64());

        let table_path = output.join(CLASS_TABLE);
        if !table_path.is_file() {
            bail!("analyzer produced no '{CLASS_TABLE}' in '{}'", output.display());
        }

        let file = std::fs::File::open(&table_path).into_app_err_with(|| format!("could not open '{}'", table_path.display()))?;
        parse_class_table(file).map_err(|e| app_err!("could not read '{}': {e}", table_path.display()))
    }
}

#[derive(Debug, Deserialize)]
struct ClassRow {
    loc: f64,
    #[serde(rename = "locComment")]
    loc_comment: f64,
    cbo: f64,
    dit: f64,
    lcom: f64,
}

/// Sum line counts and average the coupling, inheritance and cohesion columns of a class table.
///
/// Columns other than `loc`, `locComment`, `cbo`, `dit` and `lcom` are ignored. A table
/// without rows is an error since there is nothing to average.
pub fn parse_class_table(reader: impl Read) -> Result<QualityMetrics> {
    let mut csv_reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

    let mut units: u64 = 0;
    let (mut loc, mut loc_comments) = (0.0_f64, 0.0_f64);
    let (mut cbo, mut dit, mut lcom) = (0.0_f64, 0.0_f64, 0.0_f64);

    for (index, row) in csv_reader.deserialize::<ClassRow>().enumerate() {
        let row = row.into_app_err_with(|| format!("malformed row {}", index + 1))?;
        units += 1;
        loc += row.loc;
        loc_comments += row.loc_comment;
        cbo += row.cbo;
        dit += row.dit;
        lcom += row.lcom;
    }

    if units == 0 {
        bail!("the table lists no analyzed units");
    }

    #[expect(clippy::cast_precision_loss, reason = "unit counts are far below 2^52")]
    let n = units as f64;

    Ok(QualityMetrics {
        units,
        loc: to_count(loc),
        loc_comments: to_count(loc_comments),
        cbo: round2(cbo / n),
        dit: round2(dit / n),
        lcom: round2(lcom / n),
    })
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss, reason = "clamped to a non-negative whole number first")]
fn to_count(sum: f64) -> u64 {
    if sum.is_finite() { sum.max(0.0).round() as u64 } else { 0 }
}
