//! Records produced by a decode pass.

use serde::Serialize;

use super::error::OaError;
use super::models::{OffsetRegime, TableDescriptor};

/// Where a record came from, sufficient to re-locate it in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub table_id: u64,
    pub table_index: usize,
    pub file_offset: u64,
}

impl Provenance {
    pub fn new(descriptor: &TableDescriptor, file_offset: u64) -> Self {
        Self {
            table_id: descriptor.id,
            table_index: descriptor.table_index,
            file_offset,
        }
    }
}

/// A record whose layout is known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum DecodedRecord {
    Flags {
        flags: u32,
    },
    TimeStamp {
        time_stamp: u32,
    },
    LastSavedTime {
        last_saved_time: u64,
    },
    DatabaseMap {
        resource_ids: Vec<u64>,
        resource_types: Vec<u32>,
        table_ids: Vec<u64>,
        table_types: Vec<u32>,
    },
    DatabaseMapD {
        ids: Vec<u64>,
        types: Vec<u32>,
    },
    CreateTime {
        create_time: u64,
    },
    BuildInfo {
        data_model_rev: u16,
        build_name: String,
    },
    AppInfo {
        app_rev: u16,
        kit_rev: u16,
        app_minor_rev: u16,
        kit_release: u16,
        app_build_name: String,
        kit_build_name: String,
        platform_name: String,
    },
    DatabaseMarker {
        bit_check: u32,
    },
    InstanceRecord {
        instance_id: u32,
        master_id: u32,
    },
}

/// A decoded record tagged with its provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedEntry {
    #[serde(flatten)]
    pub provenance: Provenance,
    pub record: DecodedRecord,
}

/// Which heuristic produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CandidateKind {
    /// Two adjacent 4-byte values from a mis-shaped instance-like table.
    PairHeuristic,
    /// A string index followed by plausible 4-byte values.
    ConnectivityHeuristic,
}

/// An unverified record found by pattern scanning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateRecord {
    pub table_id: u64,
    pub table_index: usize,
    pub file_offset: u64,
    pub kind: CandidateKind,
    pub fields: Vec<u64>,
    pub name: Option<String>,
}

/// One exact occurrence of a probed string index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IndexProbeHit {
    pub table_id: u64,
    pub table_index: usize,
    pub file_offset: u64,
    /// Offset of the match within the table payload.
    pub table_offset: u64,
    /// 2 for a bare u16 match, 4 for a zero-extended u32 match.
    pub match_width: u8,
    pub two_byte_indices: Vec<u16>,
    pub four_byte_values: Vec<u32>,
}

/// Terminal state of one table after dispatch.
#[derive(Debug)]
pub enum TableOutcome {
    /// Typed records were emitted.
    Decoded { records: usize },
    /// The string table was indexed into the string pool.
    Indexed { strings: usize },
    /// The expected shape did not hold and the heuristic scanner ran instead.
    FellBackToHeuristic { candidates: usize },
    /// The table could not be decoded.
    Skipped(OaError),
    /// No decoder exists for this table ID.
    Unknown,
}

impl TableOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, TableOutcome::Skipped(_))
    }
}

impl Serialize for TableOutcome {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;

        let mut s = serializer.serialize_struct("TableOutcome", 3)?;
        match self {
            TableOutcome::Decoded { records } => {
                s.serialize_field("state", "Decoded")?;
                s.serialize_field("count", records)?;
                s.serialize_field("reason", &None::<String>)?;
            }
            TableOutcome::Indexed { strings } => {
                s.serialize_field("state", "Indexed")?;
                s.serialize_field("count", strings)?;
                s.serialize_field("reason", &None::<String>)?;
            }
            TableOutcome::FellBackToHeuristic { candidates } => {
                s.serialize_field("state", "FellBackToHeuristic")?;
                s.serialize_field("count", candidates)?;
                s.serialize_field("reason", &None::<String>)?;
            }
            TableOutcome::Skipped(err) => {
                s.serialize_field("state", "Skipped")?;
                s.serialize_field("count", &0usize)?;
                s.serialize_field("reason", &Some(format!("{}: {}", err.kind(), err)))?;
            }
            TableOutcome::Unknown => {
                s.serialize_field("state", "Unknown")?;
                s.serialize_field("count", &0usize)?;
                s.serialize_field("reason", &None::<String>)?;
            }
        }
        s.end()
    }
}

/// Per-table dispatch summary.
#[derive(Debug, Serialize)]
pub struct TableReport {
    pub descriptor: TableDescriptor,
    pub regime: Option<OffsetRegime>,
    pub resolved_offset: Option<u64>,
    pub outcome: TableOutcome,
}
