//! Typed decoders for table IDs with a known layout.
//!
//! Each decoder reads exactly its own table region, bounded by the declared size and
//! the configured allocation cap, and never looks at sibling tables.

use std::io::{Read, Seek};

use byteorder::{ByteOrder, LittleEndian};
use log::{debug, trace};

use super::strings::{self, StringPool};
use crate::oadb::cursor::ByteCursor;
use crate::oadb::types::{
    error::{OaError, Result},
    models::{DecodeOptions, TableDescriptor, TableKind, TablePayloadHeader},
    records::DecodedRecord,
};

/// What a typed decoder produced for one table.
#[derive(Debug)]
pub enum TableData {
    /// Records with the absolute file offset each one starts at.
    Records(Vec<(u64, DecodedRecord)>),
    /// The string table, indexed by payload offset.
    Strings(StringPool),
    /// An instance-shaped table whose payload is not a whole number of 8-byte records.
    Misshapen { data_start: u64, payload: Vec<u8> },
}

/// Decodes one table of a known kind located at `offset`.
pub fn decode<R: Read + Seek>(
    cursor: &mut ByteCursor<R>,
    kind: TableKind,
    descriptor: &TableDescriptor,
    offset: u64,
    options: &DecodeOptions,
) -> Result<TableData> {
    let table_id = descriptor.id;
    let size = descriptor.byte_size;
    if size < kind.min_size() {
        return Err(OaError::TableTooSmall {
            table_id,
            declared: size,
            required: kind.min_size(),
        });
    }
    if size > options.max_table_bytes {
        return Err(OaError::PayloadTooLarge {
            table_id,
            declared: size,
            cap: options.max_table_bytes,
        });
    }

    match kind {
        TableKind::StringTable => read_string_table(cursor, offset, size),
        TableKind::Instances => read_instances(cursor, offset, size),
        TableKind::Flags => read_record(cursor, offset, size, |_, f| {
            Ok(DecodedRecord::Flags { flags: f.u32()? })
        }),
        TableKind::TimeStamp => read_record(cursor, offset, size, |_, f| {
            Ok(DecodedRecord::TimeStamp { time_stamp: f.u32()? })
        }),
        TableKind::LastSavedTime => read_record(cursor, offset, size, |_, f| {
            Ok(DecodedRecord::LastSavedTime { last_saved_time: f.u64()? })
        }),
        TableKind::CreateTime => read_record(cursor, offset, size, |_, f| {
            Ok(DecodedRecord::CreateTime { create_time: f.u64()? })
        }),
        TableKind::DatabaseMarker => read_record(cursor, offset, size, |_, f| {
            Ok(DecodedRecord::DatabaseMarker { bit_check: f.u32()? })
        }),
        TableKind::DatabaseMap => read_record(cursor, offset, size, |_, f| read_database_map(f, table_id)),
        TableKind::DatabaseMapD => read_record(cursor, offset, size, |_, f| read_database_map_d(f)),
        TableKind::BuildInfo => read_record(cursor, offset, size, |bytes, _| read_build_info(bytes, table_id)),
        TableKind::AppInfo => read_record(cursor, offset, size, |bytes, _| read_app_info(bytes, table_id)),
    }
}

/// Reads a single-record table region and hands it to `parse`.
fn read_record<R, F>(cursor: &mut ByteCursor<R>, offset: u64, size: u64, parse: F) -> Result<TableData>
where
    R: Read + Seek,
    F: FnOnce(&[u8], &mut Fields<'_>) -> Result<DecodedRecord>,
{
    let bytes = cursor.read_at(offset, size)?;
    let mut fields = Fields::new(&bytes, offset);
    let record = parse(&bytes, &mut fields)?;
    trace!("Record at {:#x}: {:?}", offset, record);
    Ok(TableData::Records(vec![(offset, record)]))
}

/// Resource/other partitioned map.
///
/// ```text
/// [u32] resource count r   [u32] total t
/// [u64 * r] resource ids   [u32 * r] resource types
/// [u64 * (t - r)] table ids   [u32 * (t - r)] table types
/// ```
fn read_database_map(fields: &mut Fields<'_>, table_id: u64) -> Result<DecodedRecord> {
    let resource_count = u64::from(fields.u32()?);
    let total = u64::from(fields.u32()?);
    let other_count = total
        .checked_sub(resource_count)
        .ok_or(OaError::NegativeDerivedCount {
            table_id,
            total,
            resource_count,
        })?;
    trace!(
        "Database map: {} resources, {} tables",
        resource_count,
        other_count
    );

    Ok(DecodedRecord::DatabaseMap {
        resource_ids: fields.u64_array(resource_count)?,
        resource_types: fields.u32_array(resource_count)?,
        table_ids: fields.u64_array(other_count)?,
        table_types: fields.u32_array(other_count)?,
    })
}

/// Single-partition map: `[u64] count`, `[u64 * count] ids`, `[u32 * count] types`.
fn read_database_map_d(fields: &mut Fields<'_>) -> Result<DecodedRecord> {
    let count = fields.u64()?;
    Ok(DecodedRecord::DatabaseMapD {
        ids: fields.u64_array(count)?,
        types: fields.u32_array(count)?,
    })
}

/// `[u16] data model revision` followed by a NUL-terminated build name.
fn read_build_info(bytes: &[u8], table_id: u64) -> Result<DecodedRecord> {
    let data_model_rev = LittleEndian::read_u16(&bytes[0..2]);
    let (build_name, _) = strings::read_c_string(bytes, 2).ok_or(OaError::MalformedStringBlock {
        table_id,
        field: "build name",
    })?;
    Ok(DecodedRecord::BuildInfo {
        data_model_rev,
        build_name,
    })
}

/// Four u16 revision fields, then three 8-byte aligned NUL-terminated strings.
fn read_app_info(bytes: &[u8], table_id: u64) -> Result<DecodedRecord> {
    let block = &bytes[8..];
    let mut at = 0usize;
    let app_build_name = next_aligned_string(block, &mut at, table_id, "app build name")?;
    let kit_build_name = next_aligned_string(block, &mut at, table_id, "kit build name")?;
    let platform_name = next_aligned_string(block, &mut at, table_id, "platform name")?;

    Ok(DecodedRecord::AppInfo {
        app_rev: LittleEndian::read_u16(&bytes[0..2]),
        kit_rev: LittleEndian::read_u16(&bytes[2..4]),
        app_minor_rev: LittleEndian::read_u16(&bytes[4..6]),
        kit_release: LittleEndian::read_u16(&bytes[6..8]),
        app_build_name,
        kit_build_name,
        platform_name,
    })
}

fn next_aligned_string(block: &[u8], at: &mut usize, table_id: u64, field: &'static str) -> Result<String> {
    let (text, len) =
        strings::read_c_string(block, *at).ok_or(OaError::MalformedStringBlock { table_id, field })?;
    *at += strings::align8_step(len);
    Ok(text)
}

fn read_string_table<R: Read + Seek>(cursor: &mut ByteCursor<R>, offset: u64, size: u64) -> Result<TableData> {
    let header: TablePayloadHeader = cursor.read_struct(offset)?;
    let payload = cursor.read_exact(size - TablePayloadHeader::SIZE)?;
    let pool = StringPool::build(&payload);
    debug!(
        "String table at {:#x}: used={} deleted={} -> {} strings",
        offset,
        header.used_count,
        header.deleted_count,
        pool.len()
    );
    Ok(TableData::Strings(pool))
}

/// Instance-shaped tables: payload header, then `(instance id, master id)` u32 pairs.
fn read_instances<R: Read + Seek>(cursor: &mut ByteCursor<R>, offset: u64, size: u64) -> Result<TableData> {
    let header: TablePayloadHeader = cursor.read_struct(offset)?;
    let data_start = offset + TablePayloadHeader::SIZE;
    let payload = cursor.read_exact(size - TablePayloadHeader::SIZE)?;
    debug!(
        "Instance table at {:#x}: size={} used={} deleted={} first={}",
        offset, size, header.used_count, header.deleted_count, header.first_free_slot
    );

    if log::log_enabled!(log::Level::Trace) {
        let runs: Vec<String> = strings::printable_runs(&payload, 3).map(|run| run.text).collect();
        trace!("Instance table strings: {}", runs.join("|"));
    }

    if payload.len() % 8 != 0 {
        debug!(
            "Payload of {} bytes is not a whole number of 8-byte records",
            payload.len()
        );
        return Ok(TableData::Misshapen { data_start, payload });
    }

    let records = payload
        .chunks_exact(8)
        .enumerate()
        .map(|(i, chunk)| {
            let instance_id = LittleEndian::read_u32(&chunk[0..4]);
            let master_id = LittleEndian::read_u32(&chunk[4..8]);
            trace!("  Record {}: instance {:#010x} -> master {:#010x}", i, instance_id, master_id);
            (
                data_start + (i as u64) * 8,
                DecodedRecord::InstanceRecord {
                    instance_id,
                    master_id,
                },
            )
        })
        .collect();
    Ok(TableData::Records(records))
}

/// Little-endian field reader over an in-memory table region.
///
/// Short reads report the absolute file offset they happened at.
struct Fields<'a> {
    bytes: &'a [u8],
    pos: usize,
    base: u64,
}

impl<'a> Fields<'a> {
    fn new(bytes: &'a [u8], base: u64) -> Self {
        Self { bytes, pos: 0, base }
    }

    fn take(&mut self, count: u64, width: u64) -> Result<&'a [u8]> {
        let available = (self.bytes.len() - self.pos) as u64;
        let requested = count.checked_mul(width).unwrap_or(u64::MAX);
        if requested > available {
            return Err(OaError::TruncatedRead {
                offset: self.base + self.pos as u64,
                requested,
                available,
            });
        }
        let start = self.pos;
        self.pos += requested as usize;
        Ok(&self.bytes[start..self.pos])
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(LittleEndian::read_u32(self.take(1, 4)?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(LittleEndian::read_u64(self.take(1, 8)?))
    }

    fn u32_array(&mut self, count: u64) -> Result<Vec<u32>> {
        Ok(self.take(count, 4)?.chunks_exact(4).map(LittleEndian::read_u32).collect())
    }

    fn u64_array(&mut self, count: u64) -> Result<Vec<u64>> {
        Ok(self.take(count, 8)?.chunks_exact(8).map(LittleEndian::read_u64).collect())
    }
}
