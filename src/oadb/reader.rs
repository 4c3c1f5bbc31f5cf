use std::fs::File;
use std::io::{Read, Seek};
use std::path::Path;

use log::{debug, info, trace, warn};

use super::cursor::ByteCursor;
use super::format::{
    self,
    strings::StringPool,
    tables::{self, TableData},
};
use super::scan::{connectivity, pairs, probe, ConnectivityLimits};
use super::sink::RecordSink;
use super::types::error::{OaError, Result};
use super::types::models::*;
use super::types::records::{DecodedEntry, Provenance, TableOutcome, TableReport};

/// Table ID of the string table.
pub const STRING_TABLE_ID: u64 = 0x0a;

/// The main reader for schematic database files.
///
/// Owns the underlying source for its whole lifetime; dropping the reader releases it,
/// whichever way the pass ended.
#[derive(Debug)]
pub struct OaReader<R> {
    cursor: ByteCursor<R>,
    pub header: FileHeader,
    directory: TableDirectory,
    options: DecodeOptions,
    /// String pool of the first string table, with its directory index.
    strings: Option<(Option<usize>, StringPool)>,
}

impl OaReader<File> {
    /// Opens a file and reads its header and table directory.
    ///
    /// # Errors
    /// Returns an error if:
    /// - File cannot be opened
    /// - The header or the directory arrays are truncated
    pub fn open(path: impl AsRef<Path>, options: DecodeOptions) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening database file: {}", path.display());
        let file = File::open(path)?;
        Self::from_reader(file, options)
    }
}

impl<R: Read + Seek> OaReader<R> {
    pub fn from_reader(reader: R, options: DecodeOptions) -> Result<Self> {
        let mut cursor = ByteCursor::new(reader)?;
        let (header, directory) = format::header::parse(&mut cursor)?;
        Ok(Self {
            cursor,
            header,
            directory,
            options,
            strings: None,
        })
    }

    pub fn directory(&self) -> &TableDirectory {
        &self.directory
    }

    /// Runs the dispatch pass over the directory, in directory order.
    ///
    /// Table-scoped failures are recorded as `TableOutcome::Skipped` and the pass moves
    /// on. Any other failure aborts the pass.
    pub fn decode<S: RecordSink>(&mut self, sink: &mut S) -> Result<()> {
        info!("Decoding {} tables", self.directory.len());
        let mut skipped = 0usize;

        for descriptor in self.directory.iter() {
            let Some(kind) = TableKind::from_id(descriptor.id) else {
                trace!("Table [{}] id={:#x}: no decoder", descriptor.table_index, descriptor.id);
                sink.table_visited(TableReport {
                    descriptor: *descriptor,
                    regime: None,
                    resolved_offset: None,
                    outcome: TableOutcome::Unknown,
                });
                continue;
            };

            let regime = kind.regime();
            let offset = self.directory.resolve(descriptor, regime);
            trace!(
                "Table [{}] id={:#x}: Resolving({:?}) -> {:#x}",
                descriptor.table_index,
                descriptor.id,
                regime,
                offset
            );

            let outcome = match tables::decode(&mut self.cursor, kind, descriptor, offset, &self.options) {
                Ok(TableData::Records(records)) => {
                    let count = records.len();
                    for (file_offset, record) in records {
                        sink.decoded(DecodedEntry {
                            provenance: Provenance::new(descriptor, file_offset),
                            record,
                        });
                    }
                    TableOutcome::Decoded { records: count }
                }
                Ok(TableData::Strings(pool)) => {
                    let count = pool.len();
                    if self.strings.is_none() {
                        self.strings = Some((Some(descriptor.table_index), pool));
                    }
                    TableOutcome::Indexed { strings: count }
                }
                Ok(TableData::Misshapen { data_start, payload }) => {
                    let candidates = pairs::scan(descriptor, data_start, &payload);
                    let count = candidates.len();
                    candidates.into_iter().for_each(|c| sink.candidate(c));
                    TableOutcome::FellBackToHeuristic { candidates: count }
                }
                Err(e) if e.is_table_scoped() => {
                    warn!(
                        "Skipping table [{}] id={:#x}: {}",
                        descriptor.table_index, descriptor.id, e
                    );
                    skipped += 1;
                    TableOutcome::Skipped(e)
                }
                Err(e) => return Err(e),
            };
            debug!(
                "Table [{}] id={:#x} ({:?}) -> {:?}",
                descriptor.table_index, descriptor.id, kind, outcome
            );

            sink.table_visited(TableReport {
                descriptor: *descriptor,
                regime: Some(regime),
                resolved_offset: Some(offset),
                outcome,
            });
        }

        info!("Decode pass finished: {} tables, {} skipped", self.directory.len(), skipped);
        Ok(())
    }

    /// Runs the connectivity scan over every table except the string table.
    ///
    /// Offsets are taken from the directory as-is and the payload header is skipped.
    /// Without a string table nothing is emitted.
    pub fn scan_connectivity<S: RecordSink>(&mut self, sink: &mut S) -> Result<usize> {
        let (string_table, pool) = match self.strings.take() {
            Some(loaded) => loaded,
            None => self.load_string_pool()?,
        };
        let limits = ConnectivityLimits {
            plausibility_bound: self.options.plausibility_bound,
            max_values: self.options.max_trailing_values,
        };
        info!("Connectivity scan with {} pooled strings", pool.len());

        let mut total = 0usize;
        if !pool.is_empty() {
            for descriptor in self.directory.iter() {
                if Some(descriptor.table_index) == string_table {
                    continue;
                }
                let (data_start, payload) =
                    match read_payload(&mut self.cursor, descriptor, self.options.max_table_bytes) {
                        Ok(read) => read,
                        Err(e) if e.is_table_scoped() => {
                            warn!("Connectivity scan skips table [{}]: {}", descriptor.table_index, e);
                            continue;
                        }
                        Err(e) => return Err(e),
                    };
                let candidates = connectivity::scan(descriptor, data_start, &payload, &pool, limits);
                debug!(
                    "Table [{}] id={:#x}: {} connectivity candidates",
                    descriptor.table_index,
                    descriptor.id,
                    candidates.len()
                );
                total += candidates.len();
                candidates.into_iter().for_each(|c| sink.candidate(c));
            }
        }

        self.strings = Some((string_table, pool));
        info!("Connectivity scan finished: {} candidates", total);
        Ok(total)
    }

    /// Reports every exact occurrence of string index `target` in tables with `table_id`.
    pub fn probe_tables<S: RecordSink>(&mut self, table_id: u64, target: u16, sink: &mut S) -> Result<usize> {
        info!("Probing tables {:#x} for string index {}", table_id, target);
        let mut total = 0usize;
        for descriptor in self.directory.iter().filter(|d| d.id == table_id) {
            let (data_start, payload) = match read_payload(&mut self.cursor, descriptor, self.options.max_table_bytes) {
                Ok(read) => read,
                Err(e) if e.is_table_scoped() => {
                    warn!("Probe skips table [{}]: {}", descriptor.table_index, e);
                    continue;
                }
                Err(e) => return Err(e),
            };
            let hits = probe::probe_string_index(descriptor, data_start, &payload, target);
            debug!("Table [{}]: {} probe hits", descriptor.table_index, hits.len());
            total += hits.len();
            hits.into_iter().for_each(|h| sink.probe_hit(h));
        }
        Ok(total)
    }

    /// The string pool of the file's first string table, loading it if needed.
    pub fn string_pool(&mut self) -> Result<&StringPool> {
        let loaded = match self.strings.take() {
            Some(loaded) => loaded,
            None => self.load_string_pool()?,
        };
        Ok(&self.strings.insert(loaded).1)
    }

    fn load_string_pool(&mut self) -> Result<(Option<usize>, StringPool)> {
        let Some(descriptor) = self.directory.first_with_id(STRING_TABLE_ID).copied() else {
            warn!("No string table in directory");
            return Ok((None, StringPool::default()));
        };
        match read_payload(&mut self.cursor, &descriptor, self.options.max_table_bytes) {
            Ok((_, payload)) => Ok((Some(descriptor.table_index), StringPool::build(&payload))),
            Err(e) if e.is_table_scoped() => {
                warn!("String table [{}] unusable: {}", descriptor.table_index, e);
                Ok((Some(descriptor.table_index), StringPool::default()))
            }
            Err(e) => Err(e),
        }
    }
}

/// Reads the payload of a header-bearing table at its directory offset.
///
/// Returns the file offset the payload starts at and its bytes.
fn read_payload<R: Read + Seek>(
    cursor: &mut ByteCursor<R>,
    descriptor: &TableDescriptor,
    cap: u64,
) -> Result<(u64, Vec<u8>)> {
    if descriptor.byte_size < TablePayloadHeader::SIZE {
        return Err(OaError::TableTooSmall {
            table_id: descriptor.id,
            declared: descriptor.byte_size,
            required: TablePayloadHeader::SIZE,
        });
    }
    if descriptor.byte_size > cap {
        return Err(OaError::PayloadTooLarge {
            table_id: descriptor.id,
            declared: descriptor.byte_size,
            cap,
        });
    }
    let data_start = descriptor.file_offset.saturating_add(TablePayloadHeader::SIZE);
    let payload = cursor.read_at(data_start, descriptor.byte_size - TablePayloadHeader::SIZE)?;
    Ok((data_start, payload))
}
