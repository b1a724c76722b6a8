use super::record::{FIELD_NAMES, NormalizedRecord};
use crate::Result;
use std::io::Write;

/// Write records as CSV, header first.
///
/// The header is written even when there are no records so the column set is always visible.
pub fn generate<W: Write>(records: &[NormalizedRecord], writer: W) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new().has_headers(false).from_writer(writer);

    csv_writer.write_record(FIELD_NAMES)?;
    for record in records {
        csv_writer.serialize(record)?;
    }

    csv_writer.flush()?;
    Ok(())
}
