//! Exact occurrences of one string-table index inside a payload.
//!
//! Unlike the connectivity scan this applies no plausibility filter: every exact
//! match is reported with the raw values that follow it, for manual inspection.

use byteorder::{ByteOrder, LittleEndian};

use crate::oadb::types::models::TableDescriptor;
use crate::oadb::types::records::IndexProbeHit;

const MAX_TWO_BYTE_VALUES: usize = 32;
const MAX_FOUR_BYTE_VALUES: usize = 16;

/// Finds `target` as a bare u16, then as a zero-extended u32, in two separate sweeps.
pub fn probe_string_index(
    descriptor: &TableDescriptor,
    data_start: u64,
    payload: &[u8],
    target: u16,
) -> Vec<IndexProbeHit> {
    let needle16 = target.to_le_bytes();
    let needle32 = u32::from(target).to_le_bytes();

    let narrow = payload
        .windows(2)
        .enumerate()
        .filter(|(_, w)| *w == needle16)
        .map(|(i, _)| hit(descriptor, data_start, payload, i, 2));
    let wide = payload
        .windows(4)
        .enumerate()
        .filter(|(_, w)| *w == needle32)
        .map(|(i, _)| hit(descriptor, data_start, payload, i, 4));

    narrow.chain(wide).collect()
}

fn hit(descriptor: &TableDescriptor, data_start: u64, payload: &[u8], at: usize, width: u8) -> IndexProbeHit {
    let tail = &payload[at..];
    IndexProbeHit {
        table_id: descriptor.id,
        table_index: descriptor.table_index,
        file_offset: data_start + at as u64,
        table_offset: at as u64,
        match_width: width,
        two_byte_indices: tail
            .chunks_exact(2)
            .take(MAX_TWO_BYTE_VALUES)
            .map(LittleEndian::read_u16)
            .collect(),
        four_byte_values: tail
            .chunks_exact(4)
            .take(MAX_FOUR_BYTE_VALUES)
            .map(LittleEndian::read_u32)
            .collect(),
    }
}
