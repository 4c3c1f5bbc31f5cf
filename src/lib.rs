//! # oa-reader
//!
//! A reader for legacy EDA schematic database files.
//! Decodes the file header, the table directory and every table with a known layout,
//! and scans the remaining tables for plausible records to verify by hand.
pub mod oadb;

// Re-export the main types for convenience
pub use oadb::{
    decode_file,
    DecodeOptions,
    DecodeReport,
    OaError,
    OaReader,
    RecordSink,
    correlate::{correlate, ResolvedNet},
    types::models::{FileHeader, TableDescriptor, TableDirectory},
    types::records::{CandidateKind, CandidateRecord, DecodedEntry, DecodedRecord},
};
