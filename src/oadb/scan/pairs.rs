//! Pair scan for instance-like tables that fail the 8-byte shape check.

use byteorder::{ByteOrder, LittleEndian};

use crate::oadb::types::models::TableDescriptor;
use crate::oadb::types::records::{CandidateKind, CandidateRecord};

/// Step between successive windows. Half the window width, so windows overlap.
pub const PAIR_STEP: usize = 4;

/// Slides an 8-byte window over `payload` in 4-byte steps.
///
/// Every `(a, b)` window except the all-zero one becomes a candidate. Overlapping
/// windows are all kept.
pub fn scan(descriptor: &TableDescriptor, data_start: u64, payload: &[u8]) -> Vec<CandidateRecord> {
    let mut candidates = Vec::new();
    let mut p = 0usize;
    while p + 8 <= payload.len() {
        let a = LittleEndian::read_u32(&payload[p..p + 4]);
        let b = LittleEndian::read_u32(&payload[p + 4..p + 8]);
        if a != 0 || b != 0 {
            candidates.push(CandidateRecord {
                table_id: descriptor.id,
                table_index: descriptor.table_index,
                file_offset: data_start + p as u64,
                kind: CandidateKind::PairHeuristic,
                fields: vec![u64::from(a), u64::from(b)],
                name: None,
            });
        }
        p += PAIR_STEP;
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor() -> TableDescriptor {
        TableDescriptor {
            table_index: 2,
            id: 0x0101,
            file_offset: 100,
            byte_size: 0,
        }
    }

    fn words(values: &[u32]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    #[test]
    fn overlapping_windows_are_all_emitted() {
        let payload = words(&[1, 2, 3]);
        let found = scan(&descriptor(), 108, &payload);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].fields, vec![1, 2]);
        assert_eq!(found[0].file_offset, 108);
        assert_eq!(found[1].fields, vec![2, 3]);
        assert_eq!(found[1].file_offset, 112);
        assert!(found.iter().all(|c| c.kind == CandidateKind::PairHeuristic));
        assert!(found.iter().all(|c| c.table_index == 2 && c.table_id == 0x0101));
    }

    #[test]
    fn only_all_zero_window_is_filtered() {
        let payload = words(&[0, 0, 5, 0, 0]);
        let found: Vec<_> = scan(&descriptor(), 0, &payload)
            .into_iter()
            .map(|c| (c.file_offset, c.fields))
            .collect();
        assert_eq!(found, vec![(4, vec![0, 5]), (8, vec![5, 0])]);
    }

    #[test]
    fn trailing_partial_window_is_ignored() {
        let mut payload = words(&[7, 8]);
        payload.extend_from_slice(&[9, 9, 9]);
        let found = scan(&descriptor(), 0, &payload);
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn scan_is_deterministic() {
        let payload: Vec<u8> = (0u8..=60).collect();
        assert_eq!(scan(&descriptor(), 8, &payload), scan(&descriptor(), 8, &payload));
    }
}
