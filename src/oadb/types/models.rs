//! Core data structures for the database container.
//!
//! This module defines the structural types produced while reading a file:
//! - The fixed file header and per-table payload header
//! - Table descriptors and the directory that owns them
//! - The table ID classification that decides each table's offset regime

use serde::Serialize;

/// Table ID of the index base marker. Its offset anchors every index-relative table.
pub const INDEX_BASE_TABLE_ID: u64 = 0x01;

/// Fixed header at byte 0 of every file.
///
/// ```text
/// [u16] test_bit   [u16] file_type   [u16] schema   [u16] offset
/// [u32] size       [u32] used_table_count
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FileHeader {
    pub test_bit: u16,
    pub file_type: u16,
    pub schema: u16,
    pub offset: u16,
    pub size: u32,
    /// Length of each of the three parallel directory arrays that follow the header.
    pub used_table_count: u32,
}

impl FileHeader {
    /// On-disk size of the header in bytes.
    pub const SIZE: u64 = 16;
}

/// The `{used, deleted, first}` record at the start of every absolute-regime table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TablePayloadHeader {
    pub used_count: u32,
    pub deleted_count: u16,
    pub first_free_slot: u16,
}

impl TablePayloadHeader {
    /// On-disk size of the payload header in bytes.
    pub const SIZE: u64 = 8;
}

/// One directory entry, as read from the three parallel arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TableDescriptor {
    /// Position in the directory arrays. Stable handle used for provenance.
    pub table_index: usize,
    pub id: u64,
    pub file_offset: u64,
    pub byte_size: u64,
}

/// Ordered table directory, built once per file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TableDirectory {
    entries: Vec<TableDescriptor>,
    index_base_offset: u64,
}

impl TableDirectory {
    /// Builds a directory from descriptors in directory order.
    ///
    /// The first descriptor with `id == 1` provides the index base offset; without one
    /// the base is zero.
    pub fn new(entries: Vec<TableDescriptor>) -> Self {
        let index_base_offset = entries
            .iter()
            .find(|d| d.id == INDEX_BASE_TABLE_ID)
            .map(|d| d.file_offset)
            .unwrap_or(0);
        Self {
            entries,
            index_base_offset,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn index_base_offset(&self) -> u64 {
        self.index_base_offset
    }

    /// Looks up a descriptor by its directory index.
    pub fn get(&self, table_index: usize) -> Option<&TableDescriptor> {
        self.entries.get(table_index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TableDescriptor> {
        self.entries.iter()
    }

    /// First descriptor carrying the given table ID.
    pub fn first_with_id(&self, id: u64) -> Option<&TableDescriptor> {
        self.entries.iter().find(|d| d.id == id)
    }

    /// Absolute file offset of a table under the given regime.
    ///
    /// An overflowing sum saturates, so the subsequent read fails as truncated.
    pub fn resolve(&self, descriptor: &TableDescriptor, regime: OffsetRegime) -> u64 {
        match regime {
            OffsetRegime::IndexRelative => descriptor.file_offset.saturating_add(self.index_base_offset),
            OffsetRegime::Absolute => descriptor.file_offset,
        }
    }
}

/// How a table's directory offset is turned into a file offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OffsetRegime {
    /// Directory offset plus the offset of the table with ID 1.
    IndexRelative,
    /// Directory offset used as-is.
    Absolute,
}

/// Every table ID this crate has a typed decoder for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TableKind {
    Flags,
    TimeStamp,
    LastSavedTime,
    DatabaseMap,
    CreateTime,
    BuildInfo,
    AppInfo,
    DatabaseMapD,
    DatabaseMarker,
    StringTable,
    Instances,
}

impl TableKind {
    /// Fixed classification of table IDs. Anything not listed is unknown.
    pub fn from_id(id: u64) -> Option<Self> {
        match id {
            0x04 => Some(TableKind::Flags),
            0x05 => Some(TableKind::TimeStamp),
            0x06 => Some(TableKind::LastSavedTime),
            0x07 => Some(TableKind::DatabaseMap),
            0x19 => Some(TableKind::CreateTime),
            0x1c => Some(TableKind::BuildInfo),
            0x1d => Some(TableKind::AppInfo),
            0x1f => Some(TableKind::DatabaseMapD),
            0x28 => Some(TableKind::DatabaseMarker),
            0x0a => Some(TableKind::StringTable),
            0x0b | 0x0101 | 0x0105 | 0x0107 => Some(TableKind::Instances),
            _ => None,
        }
    }

    pub fn regime(&self) -> OffsetRegime {
        match self {
            TableKind::StringTable | TableKind::Instances => OffsetRegime::Absolute,
            TableKind::Flags
            | TableKind::TimeStamp
            | TableKind::LastSavedTime
            | TableKind::DatabaseMap
            | TableKind::CreateTime
            | TableKind::BuildInfo
            | TableKind::AppInfo
            | TableKind::DatabaseMapD
            | TableKind::DatabaseMarker => OffsetRegime::IndexRelative,
        }
    }

    /// Smallest declared byte size the decoder for this kind can work with.
    pub fn min_size(&self) -> u64 {
        match self {
            TableKind::Flags | TableKind::TimeStamp | TableKind::DatabaseMarker => 4,
            TableKind::LastSavedTime | TableKind::CreateTime => 8,
            TableKind::DatabaseMap | TableKind::DatabaseMapD => 8,
            TableKind::BuildInfo => 2,
            TableKind::AppInfo => 8,
            TableKind::StringTable | TableKind::Instances => TablePayloadHeader::SIZE,
        }
    }
}

/// Default hard cap on a single table allocation (64 MiB).
pub const DEFAULT_MAX_TABLE_BYTES: u64 = 64 * 1024 * 1024;

/// Default upper bound for a plausible trailing value in the connectivity scan.
pub const DEFAULT_PLAUSIBILITY_BOUND: u32 = 1_000_000;

/// Default number of trailing 4-byte values the connectivity scan looks at.
pub const DEFAULT_MAX_TRAILING_VALUES: usize = 16;

/// Tunables for a decode pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Tables declaring more bytes than this are skipped instead of allocated.
    pub max_table_bytes: u64,
    pub plausibility_bound: u32,
    pub max_trailing_values: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_table_bytes: DEFAULT_MAX_TABLE_BYTES,
            plausibility_bound: DEFAULT_PLAUSIBILITY_BOUND,
            max_trailing_values: DEFAULT_MAX_TRAILING_VALUES,
        }
    }
}
