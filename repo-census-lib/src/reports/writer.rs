use super::record::NormalizedRecord;
use super::{csv, json};
use crate::Result;
use ohno::{IntoAppError, bail};
use std::fs;
use std::path::Path;

const LOG_TARGET: &str = "    writer";

/// File formats the output table can be written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Csv,
    Json,
}

impl OutputFormat {
    /// Pick the format from the destination's extension, case-insensitively.
    ///
    /// `.json` selects JSON; anything else, including no extension, selects CSV.
    #[must_use]
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Csv,
        }
    }
}

/// Persists the final table.
pub trait RecordWriter {
    fn write(&self, records: &[NormalizedRecord], destination: &Path) -> Result<()>;
}

/// Writes the table to a file, creating parent directories as needed.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileWriter;

impl RecordWriter for FileWriter {
    fn write(&self, records: &[NormalizedRecord], destination: &Path) -> Result<()> {
        if destination.is_dir() {
            bail!("output path '{}' is a directory", destination.display());
        }

        if let Some(parent) = destination.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).into_app_err_with(|| format!("could not create directory '{}'", parent.display()))?;
        }

        let format = OutputFormat::from_path(destination);
        let contents = match format {
            OutputFormat::Csv => {
                let mut output = Vec::new();
                csv::generate(records, &mut output)?;
                output
            }
            OutputFormat::Json => {
                let mut output = String::new();
                json::generate(records, &mut output)?;
                output.into_bytes()
            }
        };

        fs::write(destination, contents).into_app_err_with(|| format!("could not write '{}'", destination.display()))?;
        log::info!(target: LOG_TARGET, "Wrote {} records to '{}' as {format:?}", records.len(), destination.display());
        Ok(())
    }
}
