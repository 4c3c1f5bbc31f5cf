//! Connectivity scan: string index followed by plausible object IDs.

use byteorder::{ByteOrder, LittleEndian};

use crate::oadb::format::strings::StringPool;
use crate::oadb::types::models::{TableDescriptor, DEFAULT_MAX_TRAILING_VALUES, DEFAULT_PLAUSIBILITY_BOUND};
use crate::oadb::types::records::{CandidateKind, CandidateRecord};

/// Limits applied to the trailing values of a connectivity candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectivityLimits {
    /// Values above this bound end the look-ahead.
    pub plausibility_bound: u32,
    pub max_values: usize,
}

impl Default for ConnectivityLimits {
    fn default() -> Self {
        Self {
            plausibility_bound: DEFAULT_PLAUSIBILITY_BOUND,
            max_values: DEFAULT_MAX_TRAILING_VALUES,
        }
    }
}

/// Scans `payload` byte by byte for a u16 string index followed by plausible u32 values.
///
/// A candidate is emitted when the index names a non-empty pooled string and at least
/// one value in `1..=plausibility_bound` follows it. Look-ahead stops at the first zero
/// or out-of-bound value.
pub fn scan(
    descriptor: &TableDescriptor,
    data_start: u64,
    payload: &[u8],
    pool: &StringPool,
    limits: ConnectivityLimits,
) -> Vec<CandidateRecord> {
    let mut candidates = Vec::new();
    if pool.is_empty() {
        return candidates;
    }

    for p in 0..payload.len().saturating_sub(1) {
        let index = LittleEndian::read_u16(&payload[p..p + 2]);
        let name = match pool.get(usize::from(index)) {
            Some(name) if !name.is_empty() => name,
            _ => continue,
        };

        let oids = trailing_values(&payload[p + 2..], limits);
        if oids.is_empty() {
            continue;
        }

        candidates.push(CandidateRecord {
            table_id: descriptor.id,
            table_index: descriptor.table_index,
            file_offset: data_start + p as u64,
            kind: CandidateKind::ConnectivityHeuristic,
            fields: oids,
            name: Some(name.to_string()),
        });
    }
    candidates
}

fn trailing_values(tail: &[u8], limits: ConnectivityLimits) -> Vec<u64> {
    tail.chunks_exact(4)
        .take(limits.max_values)
        .map(LittleEndian::read_u32)
        .take_while(|&v| v != 0 && v <= limits.plausibility_bound)
        .map(u64::from)
        .collect()
}
