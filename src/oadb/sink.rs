//! Result sinks that receive records from a decode pass.

use serde::Serialize;

use super::types::models::{FileHeader, TableDirectory};
use super::types::records::{CandidateRecord, DecodedEntry, IndexProbeHit, TableReport};

/// Receiver for everything a pass produces.
///
/// The pass hands over owned values and never formats them; what happens next is up to
/// the implementation.
pub trait RecordSink {
    fn decoded(&mut self, entry: DecodedEntry);

    fn candidate(&mut self, candidate: CandidateRecord);

    fn probe_hit(&mut self, _hit: IndexProbeHit) {}

    /// Called once per table after it reaches a terminal state.
    fn table_visited(&mut self, _report: TableReport) {}
}

/// Sink that keeps everything in memory.
#[derive(Debug, Default, Serialize)]
pub struct DecodeReport {
    pub header: Option<FileHeader>,
    pub directory: TableDirectory,
    pub tables: Vec<TableReport>,
    pub decoded: Vec<DecodedEntry>,
    pub candidates: Vec<CandidateRecord>,
    pub probe_hits: Vec<IndexProbeHit>,
}

impl DecodeReport {
    pub fn new(header: FileHeader, directory: TableDirectory) -> Self {
        Self {
            header: Some(header),
            directory,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.decoded.is_empty() && self.candidates.is_empty() && self.probe_hits.is_empty()
    }

    /// Decoded entries of one table, in emission order.
    pub fn decoded_for(&self, table_index: usize) -> impl Iterator<Item = &DecodedEntry> {
        self.decoded
            .iter()
            .filter(move |e| e.provenance.table_index == table_index)
    }

    pub fn table(&self, table_index: usize) -> Option<&TableReport> {
        self.tables.iter().find(|t| t.descriptor.table_index == table_index)
    }
}

impl RecordSink for DecodeReport {
    fn decoded(&mut self, entry: DecodedEntry) {
        self.decoded.push(entry);
    }

    fn candidate(&mut self, candidate: CandidateRecord) {
        self.candidates.push(candidate);
    }

    fn probe_hit(&mut self, hit: IndexProbeHit) {
        self.probe_hits.push(hit);
    }

    fn table_visited(&mut self, report: TableReport) {
        self.tables.push(report);
    }
}
