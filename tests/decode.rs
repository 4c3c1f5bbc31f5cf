use std::io::{Cursor, Write};

use byteorder::{LittleEndian, WriteBytesExt};
use oa_reader::oadb::types::records::TableOutcome;
use oa_reader::{
    correlate, decode_file, CandidateKind, DecodeOptions, DecodeReport, DecodedRecord, OaError, OaReader,
};

/// Directory entry: `(id, offset, size)`.
type Table = (u64, u64, u64);

/// Builds a file image: header, the three directory arrays, then each region written at
/// its absolute offset (gaps are zero-filled).
fn build_file(tables: &[Table], regions: &[(u64, Vec<u8>)]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.write_u16::<LittleEndian>(1).unwrap();
    buf.write_u16::<LittleEndian>(0x0505).unwrap();
    buf.write_u16::<LittleEndian>(4).unwrap();
    buf.write_u16::<LittleEndian>(0).unwrap();
    buf.write_u32::<LittleEndian>(0).unwrap();
    buf.write_u32::<LittleEndian>(tables.len() as u32).unwrap();
    for (id, _, _) in tables {
        buf.write_u64::<LittleEndian>(*id).unwrap();
    }
    for (_, offset, _) in tables {
        buf.write_u64::<LittleEndian>(*offset).unwrap();
    }
    for (_, _, size) in tables {
        buf.write_u64::<LittleEndian>(*size).unwrap();
    }

    for (at, bytes) in regions {
        let at = *at as usize;
        if buf.len() < at + bytes.len() {
            buf.resize(at + bytes.len(), 0);
        }
        buf[at..at + bytes.len()].copy_from_slice(bytes);
    }
    buf
}

/// Payload header followed by `body`.
fn with_payload_header(used: u32, body: &[u8]) -> Vec<u8> {
    let mut buf = Vec::new();
    buf.write_u32::<LittleEndian>(used).unwrap();
    buf.write_u16::<LittleEndian>(0).unwrap();
    buf.write_u16::<LittleEndian>(0).unwrap();
    buf.extend_from_slice(body);
    buf
}

fn u32s(values: &[u32]) -> Vec<u8> {
    let mut buf = Vec::new();
    for v in values {
        buf.write_u32::<LittleEndian>(*v).unwrap();
    }
    buf
}

fn decode_bytes(bytes: Vec<u8>) -> Result<DecodeReport, OaError> {
    decode_with(bytes, DecodeOptions::default())
}

fn decode_with(bytes: Vec<u8>, options: DecodeOptions) -> Result<DecodeReport, OaError> {
    let mut reader = OaReader::from_reader(Cursor::new(bytes), options)?;
    let mut report = DecodeReport::new(reader.header, reader.directory().clone());
    reader.decode(&mut report)?;
    Ok(report)
}

#[test]
fn empty_directory_decodes_to_empty_result() {
    let report = decode_bytes(build_file(&[], &[])).unwrap();
    assert!(report.directory.is_empty());
    assert!(report.tables.is_empty());
    assert!(report.is_empty());
    assert_eq!(report.header.map(|h| h.used_table_count), Some(0));
}

#[test]
fn instance_table_yields_records_at_eight_byte_strides() {
    let body = u32s(&[1, 100, 2, 100]);
    let bytes = build_file(&[(0x0b, 64, 24)], &[(64, with_payload_header(2, &body))]);
    let report = decode_bytes(bytes).unwrap();

    let records: Vec<_> = report.decoded_for(0).collect();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].provenance.file_offset, 72);
    assert_eq!(records[1].provenance.file_offset, 80);
    assert_eq!(
        records[0].record,
        DecodedRecord::InstanceRecord {
            instance_id: 1,
            master_id: 100
        }
    );
    assert_eq!(
        records[1].record,
        DecodedRecord::InstanceRecord {
            instance_id: 2,
            master_id: 100
        }
    );
    assert!(report.candidates.is_empty());
}

#[test]
fn alternate_instance_ids_decode_like_0x0b() {
    let bytes = build_file(
        &[(0x0101, 96, 16), (0x0105, 112, 16), (0x0107, 128, 8)],
        &[
            (96, with_payload_header(1, &u32s(&[5, 6]))),
            (112, with_payload_header(1, &u32s(&[7, 8]))),
            (128, with_payload_header(0, &[])),
        ],
    );
    let report = decode_bytes(bytes).unwrap();
    assert_eq!(report.decoded.len(), 2);
    assert_eq!(report.decoded[0].provenance.table_id, 0x0101);
    assert_eq!(report.decoded[1].provenance.table_id, 0x0105);
    assert!(matches!(
        report.table(2).map(|t| &t.outcome),
        Some(TableOutcome::Decoded { records: 0 })
    ));
}

#[test]
fn misshapen_instance_table_falls_back_to_pair_scan() {
    let body = u32s(&[1, 2, 3]);
    let bytes = build_file(&[(0x0b, 64, 8 + 12)], &[(64, with_payload_header(1, &body))]);
    let report = decode_bytes(bytes).unwrap();

    assert!(report.decoded.is_empty());
    assert_eq!(report.candidates.len(), 2);
    assert!(report.candidates.iter().all(|c| c.kind == CandidateKind::PairHeuristic));
    assert_eq!(report.candidates[0].file_offset, 72);
    assert_eq!(report.candidates[0].fields, vec![1, 2]);
    assert_eq!(report.candidates[1].file_offset, 76);
    assert_eq!(report.candidates[1].fields, vec![2, 3]);
    assert!(matches!(
        report.table(0).map(|t| &t.outcome),
        Some(TableOutcome::FellBackToHeuristic { candidates: 2 })
    ));
}

#[test]
fn index_relative_tables_add_the_base_offset() {
    let bytes = build_file(
        &[(0x01, 200, 0), (0x04, 16, 4)],
        &[(216, u32s(&[0xdead_beef]))],
    );
    let report = decode_bytes(bytes).unwrap();

    assert_eq!(report.directory.index_base_offset(), 200);
    assert_eq!(report.decoded.len(), 1);
    assert_eq!(report.decoded[0].provenance.file_offset, 216);
    assert_eq!(report.decoded[0].record, DecodedRecord::Flags { flags: 0xdead_beef });
    assert_eq!(report.table(1).and_then(|t| t.resolved_offset), Some(216));
    assert!(matches!(report.table(0).map(|t| &t.outcome), Some(TableOutcome::Unknown)));
}

#[test]
fn first_index_base_wins_when_duplicated() {
    let bytes = build_file(
        &[(0x01, 100, 0), (0x01, 300, 0), (0x04, 16, 4)],
        &[(116, u32s(&[1])), (316, u32s(&[2]))],
    );
    let report = decode_bytes(bytes).unwrap();

    assert_eq!(report.directory.index_base_offset(), 100);
    assert_eq!(report.decoded[0].provenance.file_offset, 116);
    assert_eq!(report.decoded[0].record, DecodedRecord::Flags { flags: 1 });
}

#[test]
fn missing_index_base_resolves_to_raw_offset() {
    let bytes = build_file(&[(0x28, 100, 4)], &[(100, u32s(&[0x1234]))]);
    let report = decode_bytes(bytes).unwrap();

    assert_eq!(report.directory.index_base_offset(), 0);
    assert_eq!(report.decoded[0].provenance.file_offset, 100);
    assert_eq!(report.decoded[0].record, DecodedRecord::DatabaseMarker { bit_check: 0x1234 });
}

#[test]
fn scalar_and_string_tables_decode() {
    let mut scalars = Vec::new();
    scalars.write_u32::<LittleEndian>(3).unwrap(); // flags @200
    scalars.write_u32::<LittleEndian>(44).unwrap(); // timestamp @204
    scalars.write_u64::<LittleEndian>(1_600_000_000).unwrap(); // last saved @208
    scalars.write_u64::<LittleEndian>(1_500_000_000).unwrap(); // create time @216

    let mut build_info = Vec::new();
    build_info.write_u16::<LittleEndian>(7).unwrap();
    build_info.write_all(b"build-1\0").unwrap();

    let mut app_info = Vec::new();
    for rev in [1u16, 2, 3, 4] {
        app_info.write_u16::<LittleEndian>(rev).unwrap();
    }
    app_info.write_all(b"app\0\0\0\0\0").unwrap();
    app_info.write_all(b"kit1.0\0\0").unwrap();
    app_info.write_all(b"linux\0\0\0").unwrap();

    let bytes = build_file(
        &[
            (0x01, 200, 0),
            (0x04, 0, 4),
            (0x05, 4, 4),
            (0x06, 8, 8),
            (0x19, 16, 8),
            (0x1c, 24, 16),
            (0x1d, 40, 32),
        ],
        &[(200, scalars), (224, build_info), (240, app_info)],
    );
    let report = decode_bytes(bytes).unwrap();

    let records: Vec<&DecodedRecord> = report.decoded.iter().map(|e| &e.record).collect();
    assert_eq!(
        records,
        vec![
            &DecodedRecord::Flags { flags: 3 },
            &DecodedRecord::TimeStamp { time_stamp: 44 },
            &DecodedRecord::LastSavedTime {
                last_saved_time: 1_600_000_000
            },
            &DecodedRecord::CreateTime {
                create_time: 1_500_000_000
            },
            &DecodedRecord::BuildInfo {
                data_model_rev: 7,
                build_name: "build-1".to_string()
            },
            &DecodedRecord::AppInfo {
                app_rev: 1,
                kit_rev: 2,
                app_minor_rev: 3,
                kit_release: 4,
                app_build_name: "app".to_string(),
                kit_build_name: "kit1.0".to_string(),
                platform_name: "linux".to_string(),
            },
        ]
    );
}

#[test]
fn database_maps_decode_both_partitions() {
    let mut map = Vec::new();
    map.write_u32::<LittleEndian>(1).unwrap();
    map.write_u32::<LittleEndian>(3).unwrap();
    map.write_u64::<LittleEndian>(10).unwrap();
    map.write_u32::<LittleEndian>(20).unwrap();
    map.write_u64::<LittleEndian>(30).unwrap();
    map.write_u64::<LittleEndian>(31).unwrap();
    map.write_u32::<LittleEndian>(40).unwrap();
    map.write_u32::<LittleEndian>(41).unwrap();
    let map_len = map.len() as u64;

    let mut map_d = Vec::new();
    map_d.write_u64::<LittleEndian>(2).unwrap();
    map_d.write_u64::<LittleEndian>(5).unwrap();
    map_d.write_u64::<LittleEndian>(6).unwrap();
    map_d.write_u32::<LittleEndian>(50).unwrap();
    map_d.write_u32::<LittleEndian>(60).unwrap();
    let map_d_len = map_d.len() as u64;

    let bytes = build_file(
        &[(0x07, 128, map_len), (0x1f, 192, map_d_len)],
        &[(128, map), (192, map_d)],
    );
    let report = decode_bytes(bytes).unwrap();

    assert_eq!(
        report.decoded[0].record,
        DecodedRecord::DatabaseMap {
            resource_ids: vec![10],
            resource_types: vec![20],
            table_ids: vec![30, 31],
            table_types: vec![40, 41],
        }
    );
    assert_eq!(
        report.decoded[1].record,
        DecodedRecord::DatabaseMapD {
            ids: vec![5, 6],
            types: vec![50, 60],
        }
    );
}

#[test]
fn bad_tables_are_skipped_and_the_pass_continues() {
    let mut bad_map = Vec::new();
    bad_map.write_u32::<LittleEndian>(3).unwrap();
    bad_map.write_u32::<LittleEndian>(1).unwrap();

    let bytes = build_file(
        &[
            (0x05, 256, 2),   // too small for a timestamp
            (0x07, 264, 8),   // total < resource count
            (0x1c, 272, 6),   // build name without terminator
            (0x0b, 4096, 24), // past end of file
            (0x04, 288, 4),
        ],
        &[
            (256, vec![0, 0]),
            (264, bad_map),
            (272, vec![1, 0, b'a', b'b', b'c', b'd']),
            (288, u32s(&[9])),
        ],
    );
    let report = decode_bytes(bytes).unwrap();

    assert_eq!(report.tables.len(), 5);
    let outcome = |i: usize| report.table(i).map(|t| &t.outcome);
    assert!(matches!(outcome(0), Some(TableOutcome::Skipped(OaError::TableTooSmall { required: 4, .. }))));
    assert!(matches!(
        outcome(1),
        Some(TableOutcome::Skipped(OaError::NegativeDerivedCount {
            total: 1,
            resource_count: 3,
            ..
        }))
    ));
    assert!(matches!(outcome(2), Some(TableOutcome::Skipped(OaError::MalformedStringBlock { .. }))));
    assert!(matches!(outcome(3), Some(TableOutcome::Skipped(OaError::TruncatedRead { .. }))));
    assert!(report.tables[..4].iter().all(|t| t.outcome.is_skipped()));
    assert!(!report.tables[4].outcome.is_skipped());

    assert_eq!(report.decoded.len(), 1);
    assert_eq!(report.decoded[0].provenance.table_index, 4);
    assert_eq!(report.decoded[0].record, DecodedRecord::Flags { flags: 9 });
}

#[test]
fn header_bearing_tables_below_the_payload_header_are_skipped() {
    let bytes = build_file(
        &[(0x0b, 128, 4), (0x0a, 136, 7), (0x28, 144, 4)],
        &[(128, vec![1, 0, 0, 0]), (136, vec![0; 7]), (144, u32s(&[5]))],
    );
    let report = decode_bytes(bytes).unwrap();

    let outcome = |i: usize| report.table(i).map(|t| &t.outcome);
    assert!(matches!(
        outcome(0),
        Some(TableOutcome::Skipped(OaError::TableTooSmall {
            declared: 4,
            required: 8,
            ..
        }))
    ));
    assert!(matches!(
        outcome(1),
        Some(TableOutcome::Skipped(OaError::TableTooSmall { declared: 7, .. }))
    ));
    assert!(matches!(outcome(2), Some(TableOutcome::Decoded { records: 1 })));
    assert_eq!(report.decoded[0].record, DecodedRecord::DatabaseMarker { bit_check: 5 });
}

#[test]
fn app_info_strings_step_past_aligned_names_and_need_terminators() {
    let app_info = |platform: &[u8]| {
        let mut buf = Vec::new();
        for rev in [1u16, 2, 3, 4] {
            buf.write_u16::<LittleEndian>(rev).unwrap();
        }
        // An 8-byte name steps a full 16 bytes to leave room for its terminator.
        buf.write_all(b"abcdefgh\0\0\0\0\0\0\0\0").unwrap();
        buf.write_all(b"kit\0\0\0\0\0").unwrap();
        buf.write_all(platform).unwrap();
        buf
    };

    let bytes = build_file(
        &[(0x1d, 128, 40), (0x1d, 168, 40)],
        &[(128, app_info(b"linux\0\0\0")), (168, app_info(b"linux!!!"))],
    );
    let report = decode_bytes(bytes).unwrap();

    assert_eq!(report.decoded.len(), 1);
    match &report.decoded[0].record {
        DecodedRecord::AppInfo {
            app_build_name,
            kit_build_name,
            platform_name,
            ..
        } => {
            assert_eq!(app_build_name, "abcdefgh");
            assert_eq!(kit_build_name, "kit");
            assert_eq!(platform_name, "linux");
        }
        other => panic!("unexpected record {:?}", other),
    }
    assert!(matches!(
        report.table(1).map(|t| &t.outcome),
        Some(TableOutcome::Skipped(OaError::MalformedStringBlock {
            field: "platform name",
            ..
        }))
    ));
}

#[test]
fn tables_above_the_cap_are_not_allocated() {
    let bytes = build_file(&[(0x0b, 64, 1 << 40)], &[]);
    let options = DecodeOptions {
        max_table_bytes: 1024,
        ..DecodeOptions::default()
    };
    let report = decode_with(bytes, options).unwrap();
    assert!(matches!(
        report.table(0).map(|t| &t.outcome),
        Some(TableOutcome::Skipped(OaError::PayloadTooLarge { cap: 1024, .. }))
    ));
}

#[test]
fn unknown_tables_emit_nothing() {
    let bytes = build_file(&[(0x0c, 64, 16), (0x3f, 80, 8)], &[(64, vec![0xff; 24])]);
    let report = decode_bytes(bytes).unwrap();
    assert!(report.is_empty());
    assert!(report
        .tables
        .iter()
        .all(|t| matches!(t.outcome, TableOutcome::Unknown) && t.resolved_offset.is_none()));
}

#[test]
fn provenance_maps_back_to_the_directory() {
    let bytes = build_file(
        &[(0x3f, 96, 0), (0x0b, 96, 16), (0x01, 0, 0)],
        &[(96, with_payload_header(1, &u32s(&[11, 12])))],
    );
    let report = decode_bytes(bytes).unwrap();
    for entry in &report.decoded {
        let descriptor = report.directory.get(entry.provenance.table_index).unwrap();
        assert_eq!(descriptor.id, entry.provenance.table_id);
        assert!(entry.provenance.file_offset >= descriptor.file_offset);
    }
    assert_eq!(report.decoded[0].provenance.table_index, 1);
}

#[test]
fn truncated_header_is_fatal() {
    let err = decode_bytes(vec![1, 0, 5, 5, 4]).unwrap_err();
    assert!(matches!(err, OaError::HeaderTruncated { expected: 16, found: 5 }));
    assert!(!err.is_table_scoped());
}

#[test]
fn truncated_directory_is_fatal() {
    let mut bytes = build_file(&[(0x04, 0, 4), (0x05, 4, 4)], &[]);
    // Cut into the offsets array.
    bytes.truncate(16 + 16 + 8);
    let err = decode_bytes(bytes).unwrap_err();
    assert!(matches!(
        err,
        OaError::DirectoryTruncated {
            array: "table offsets",
            entries: 2,
            expected: 16,
            found: 8,
        }
    ));
}

/// String table, a table carrying a connectivity record, and an instance table.
fn connectivity_file() -> Vec<u8> {
    let mut net = Vec::new();
    net.write_u16::<LittleEndian>(1).unwrap();
    net.write_u32::<LittleEndian>(42).unwrap();
    net.write_u32::<LittleEndian>(0).unwrap();

    build_file(
        &[(0x0a, 96, 8 + 6), (0x0c, 112, 8 + 10), (0x0b, 136, 16)],
        &[
            (96, with_payload_header(1, b"\0NET1\0")),
            (112, with_payload_header(1, &net)),
            (136, with_payload_header(1, &u32s(&[42, 7]))),
        ],
    )
}

#[test]
fn connectivity_pass_resolves_names_through_the_string_table() {
    let mut reader = OaReader::from_reader(Cursor::new(connectivity_file()), DecodeOptions::default()).unwrap();
    let mut report = DecodeReport::new(reader.header, reader.directory().clone());
    reader.decode(&mut report).unwrap();

    assert!(matches!(
        report.table(0).map(|t| &t.outcome),
        Some(TableOutcome::Indexed { strings: 1 })
    ));
    let pooled: Vec<(usize, &str)> = reader.string_pool().unwrap().iter().collect();
    assert_eq!(pooled, vec![(1, "NET1")]);

    let found = reader.scan_connectivity(&mut report).unwrap();
    assert_eq!(found, 1);
    let candidate = &report.candidates[0];
    assert_eq!(candidate.kind, CandidateKind::ConnectivityHeuristic);
    assert_eq!(candidate.table_index, 1);
    assert_eq!(candidate.file_offset, 120);
    assert_eq!(candidate.name.as_deref(), Some("NET1"));
    assert_eq!(candidate.fields, vec![42]);

    let nets = correlate(&report);
    assert_eq!(nets.len(), 1);
    assert_eq!(nets[0].net_name, "NET1");
    let matched = &nets[0].matches[0].matched;
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].table_id, 0x0b);
    assert_eq!(matched[0].record_index, 0);
    assert_eq!(matched[0].master_value, 7);
}

#[test]
fn connectivity_without_string_table_emits_nothing() {
    let bytes = build_file(&[(0x0c, 64, 18)], &[(64, with_payload_header(1, &u32s(&[1, 42, 0])))]);
    let mut reader = OaReader::from_reader(Cursor::new(bytes), DecodeOptions::default()).unwrap();
    let mut report = DecodeReport::default();
    assert_eq!(reader.scan_connectivity(&mut report).unwrap(), 0);
    assert!(report.candidates.is_empty());
}

#[test]
fn probe_reports_exact_index_hits() {
    let mut reader = OaReader::from_reader(Cursor::new(connectivity_file()), DecodeOptions::default()).unwrap();
    let mut report = DecodeReport::default();
    let hits = reader.probe_tables(0x0c, 42, &mut report).unwrap();

    // 42 as a bare u16 at payload offset 2, then as a zero-extended u32 at the same spot.
    assert_eq!(hits, 2);
    let summary: Vec<(u64, u8)> = report
        .probe_hits
        .iter()
        .map(|h| (h.table_offset, h.match_width))
        .collect();
    assert_eq!(summary, vec![(2, 2), (2, 4)]);
    assert_eq!(report.probe_hits[0].file_offset, 122);
    assert_eq!(report.probe_hits[1].four_byte_values, vec![42, 0]);
}

#[test]
fn report_serializes_to_json() {
    let body = u32s(&[1, 100]);
    let bytes = build_file(&[(0x0b, 64, 16), (0x05, 0, 1)], &[(64, with_payload_header(1, &body))]);
    let report = decode_bytes(bytes).unwrap();

    let json = serde_json::to_value(&report).unwrap();
    let entry = &json["decoded"][0];
    assert_eq!(entry["table_id"], 0x0b);
    assert_eq!(entry["file_offset"], 72);
    assert_eq!(entry["record"]["type"], "InstanceRecord");
    assert_eq!(entry["record"]["master_id"], 100);
    assert_eq!(json["tables"][1]["outcome"]["state"], "Skipped");
    assert!(json["tables"][1]["outcome"]["reason"]
        .as_str()
        .unwrap()
        .starts_with("TableTooSmall"));
}

#[test]
fn decode_file_reads_from_disk() {
    let body = u32s(&[1, 100, 2, 100]);
    let bytes = build_file(&[(0x0b, 64, 24)], &[(64, with_payload_header(2, &body))]);

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&bytes).unwrap();
    file.flush().unwrap();

    let report = decode_file(file.path(), DecodeOptions::default()).unwrap();
    assert_eq!(report.decoded.len(), 2);
    assert_eq!(report.decoded[1].provenance.file_offset, 80);
}
