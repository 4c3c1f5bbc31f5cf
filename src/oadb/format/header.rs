//! File header and table directory parsing.
//!
//! # Layout
//! ```text
//! [16 bytes]     FileHeader (used_table_count = n)
//! [8 * n bytes]  table ids      (u64 LE)
//! [8 * n bytes]  table offsets  (u64 LE)
//! [8 * n bytes]  table sizes    (u64 LE)
//! ```

use std::io::{Read, Seek};

use log::{debug, info, trace, warn};

use crate::oadb::cursor::ByteCursor;
use crate::oadb::types::{
    error::{OaError, Result},
    models::{FileHeader, TableDescriptor, TableDirectory, INDEX_BASE_TABLE_ID},
};

/// Reads the file header and the table directory that follows it.
///
/// A header with `used_table_count == 0` yields an empty directory, not an error.
pub fn parse<R: Read + Seek>(cursor: &mut ByteCursor<R>) -> Result<(FileHeader, TableDirectory)> {
    info!("Parsing file header");

    let header: FileHeader = cursor.read_struct(0).map_err(|e| match e {
        OaError::TruncatedRead { available, .. } => OaError::HeaderTruncated {
            expected: FileHeader::SIZE,
            found: available,
        },
        other => other,
    })?;
    trace!("File header: {:?}", header);

    if header.used_table_count == 0 {
        info!("Header declares no tables");
        return Ok((header, TableDirectory::default()));
    }

    let count = header.used_table_count;
    let ids = read_directory_array(cursor, "table ids", count)?;
    let offsets = read_directory_array(cursor, "table offsets", count)?;
    let sizes = read_directory_array(cursor, "table sizes", count)?;

    let entries: Vec<TableDescriptor> = ids
        .into_iter()
        .zip(offsets)
        .zip(sizes)
        .enumerate()
        .map(|(table_index, ((id, file_offset), byte_size))| TableDescriptor {
            table_index,
            id,
            file_offset,
            byte_size,
        })
        .collect();

    let base_markers = entries.iter().filter(|d| d.id == INDEX_BASE_TABLE_ID).count();
    if base_markers > 1 {
        warn!(
            "Directory has {} tables with id {:#x}; using the first as index base",
            base_markers, INDEX_BASE_TABLE_ID
        );
    }

    for d in &entries {
        debug!(
            "Table [{}] id={:#x} offset={:#x} size={}",
            d.table_index, d.id, d.file_offset, d.byte_size
        );
    }

    let directory = TableDirectory::new(entries);
    info!(
        "Directory parsed: {} tables, index base offset {:#x}",
        directory.len(),
        directory.index_base_offset()
    );
    Ok((header, directory))
}

fn read_directory_array<R: Read + Seek>(
    cursor: &mut ByteCursor<R>,
    array: &'static str,
    entries: u32,
) -> Result<Vec<u64>> {
    cursor.read_u64_array(u64::from(entries)).map_err(|e| match e {
        OaError::TruncatedRead {
            requested, available, ..
        } => OaError::DirectoryTruncated {
            array,
            entries,
            expected: requested,
            found: available,
        },
        other => other,
    })
}
