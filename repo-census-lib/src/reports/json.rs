use super::record::NormalizedRecord;
use crate::Result;
use core::fmt::Write;

/// Write records as a pretty-printed JSON array of objects.
pub fn generate<W: Write>(records: &[NormalizedRecord], writer: &mut W) -> Result<()> {
    writeln!(writer, "{}", serde_json::to_string_pretty(records)?)?;
    Ok(())
}
