//! Core reader for legacy schematic database files.
//!
//! A file is a fixed header, a directory of tables (three parallel arrays of IDs,
//! offsets and sizes), and the table regions themselves. Tables with a known layout
//! are decoded into [`DecodedRecord`]s; the rest are probed by the heuristic scanners
//! in [`scan`] and reported as unverified [`CandidateRecord`]s.

pub mod correlate;
pub mod cursor;
pub mod format;
pub mod reader;
pub mod scan;
pub mod sink;
pub mod types;

use std::path::Path;

pub use reader::OaReader;
pub use sink::{DecodeReport, RecordSink};
pub use types::error::{OaError, Result};
pub use types::models::{DecodeOptions, FileHeader, OffsetRegime, TableDescriptor, TableDirectory, TableKind};
pub use types::records::{CandidateKind, CandidateRecord, DecodedEntry, DecodedRecord, TableOutcome};

/// Runs a full decode pass over the file at `path`.
///
/// The file is closed before this returns, on success and on failure alike.
pub fn decode_file(path: impl AsRef<Path>, options: DecodeOptions) -> Result<DecodeReport> {
    let mut reader = OaReader::open(path, options)?;
    let mut report = DecodeReport::new(reader.header, reader.directory().clone());
    reader.decode(&mut report)?;
    Ok(report)
}
