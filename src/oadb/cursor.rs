//! Random-access byte cursor over the underlying file.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{ByteOrder, LittleEndian};
use log::trace;

use super::types::error::{OaError, Result};
use super::types::models::{FileHeader, TablePayloadHeader};

/// A fixed-size on-disk record that can be read in one piece.
pub trait FixedRecord: Sized {
    /// Size of the record in bytes.
    const SIZE: u64;

    /// Decodes the record from exactly `SIZE` bytes.
    fn from_bytes(bytes: &[u8]) -> Self;
}

impl FixedRecord for FileHeader {
    const SIZE: u64 = FileHeader::SIZE;

    fn from_bytes(bytes: &[u8]) -> Self {
        FileHeader {
            test_bit: LittleEndian::read_u16(&bytes[0..2]),
            file_type: LittleEndian::read_u16(&bytes[2..4]),
            schema: LittleEndian::read_u16(&bytes[4..6]),
            offset: LittleEndian::read_u16(&bytes[6..8]),
            size: LittleEndian::read_u32(&bytes[8..12]),
            used_table_count: LittleEndian::read_u32(&bytes[12..16]),
        }
    }
}

impl FixedRecord for TablePayloadHeader {
    const SIZE: u64 = TablePayloadHeader::SIZE;

    fn from_bytes(bytes: &[u8]) -> Self {
        TablePayloadHeader {
            used_count: LittleEndian::read_u32(&bytes[0..4]),
            deleted_count: LittleEndian::read_u16(&bytes[4..6]),
            first_free_slot: LittleEndian::read_u16(&bytes[6..8]),
        }
    }
}

/// Seekable reader that never hands out partial data.
///
/// The source length is taken once at construction, so every read is checked against
/// it before a buffer is allocated. A shortfall is always `OaError::TruncatedRead`.
#[derive(Debug)]
pub struct ByteCursor<R> {
    inner: R,
    len: u64,
    pos: u64,
}

impl<R: Read + Seek> ByteCursor<R> {
    pub fn new(mut inner: R) -> Result<Self> {
        let len = inner.seek(SeekFrom::End(0))?;
        inner.seek(SeekFrom::Start(0))?;
        Ok(Self { inner, len, pos: 0 })
    }

    /// Total length of the source in bytes.
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Bytes left between the cursor and the end of the source.
    pub fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }

    /// Moves the cursor. Offsets past the end are accepted; the next read fails instead.
    pub fn seek(&mut self, offset: u64) -> Result<()> {
        if offset <= self.len {
            self.inner.seek(SeekFrom::Start(offset))?;
        }
        self.pos = offset;
        Ok(())
    }

    /// Reads exactly `n` bytes from the current position.
    pub fn read_exact(&mut self, n: u64) -> Result<Vec<u8>> {
        let available = self.remaining();
        if n > available {
            return Err(OaError::TruncatedRead {
                offset: self.pos,
                requested: n,
                available,
            });
        }

        trace!("Reading {} bytes at {:#x}", n, self.pos);
        let mut buf = vec![0u8; n as usize];
        self.inner.read_exact(&mut buf).map_err(|e| match e.kind() {
            std::io::ErrorKind::UnexpectedEof => OaError::TruncatedRead {
                offset: self.pos,
                requested: n,
                available,
            },
            _ => OaError::Io(e),
        })?;
        self.pos += n;
        Ok(buf)
    }

    /// Seeks to `offset` and reads exactly `n` bytes.
    pub fn read_at(&mut self, offset: u64, n: u64) -> Result<Vec<u8>> {
        self.seek(offset)?;
        self.read_exact(n)
    }

    /// Seeks to `offset` and reads one fixed-size record.
    pub fn read_struct<T: FixedRecord>(&mut self, offset: u64) -> Result<T> {
        let bytes = self.read_at(offset, T::SIZE)?;
        Ok(T::from_bytes(&bytes))
    }

    /// Reads `count` little-endian u64 values from the current position.
    pub fn read_u64_array(&mut self, count: u64) -> Result<Vec<u64>> {
        let requested = count.checked_mul(8).ok_or(OaError::TruncatedRead {
            offset: self.pos,
            requested: u64::MAX,
            available: self.remaining(),
        })?;
        let bytes = self.read_exact(requested)?;
        Ok(bytes.chunks_exact(8).map(LittleEndian::read_u64).collect())
    }
}
