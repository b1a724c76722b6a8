//! The output table
//!
//! Enriched repositories are projected onto a fixed record shape by [`normalize`] and
//! handed to a [`RecordWriter`]. The record shape is the same for every row and every
//! format, so a repository that lost its quality metrics still appears with zeros
//! rather than with missing columns.
//!
//! Two encodings are supported, chosen by the destination's extension: CSV (the
//! default) and a JSON array of objects.

mod csv;
mod json;
mod record;
mod writer;

pub use record::{FIELD_NAMES, NO_LICENSE, Normalize, NormalizedRecord, normalize};
pub use writer::{FileWriter, OutputFormat, RecordWriter};
