//! Cross-references connectivity candidates with instance observations.
//!
//! Every object ID trailing a connectivity candidate is looked up against the instance
//! tables: by instance value, by master value, by record index, and by the same keys
//! after dividing out a byte-shift scale.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::Serialize;

use super::sink::DecodeReport;
use super::types::models::TablePayloadHeader;
use super::types::records::{CandidateKind, DecodedRecord};

/// Shifts tried when an OID does not match directly.
pub const OID_SCALES: [u64; 3] = [256, 65_536, 16_777_216];

/// One `(instance, master)` pair seen in an instance-like table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstanceObservation {
    pub table_id: u64,
    pub table_index: usize,
    /// Position of the pair within its table, in 8-byte units. Best effort for pairs
    /// found by the heuristic scan.
    pub record_index: u64,
    pub instance_value: u64,
    pub master_value: u64,
    pub file_offset: u64,
}

/// Why an OID matched an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    InstanceValue,
    MasterValue,
    RecordIndex,
    ScaledRecordIndex(u64),
    ScaledInstanceValue(u64),
}

impl fmt::Display for MatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchReason::InstanceValue => write!(f, "instance_value==oid"),
            MatchReason::MasterValue => write!(f, "master_value==oid"),
            MatchReason::RecordIndex => write!(f, "record_index==oid"),
            MatchReason::ScaledRecordIndex(scale) => write!(f, "oid/{}==record_index", scale),
            MatchReason::ScaledInstanceValue(scale) => write!(f, "oid/{}==instance_value", scale),
        }
    }
}

impl Serialize for MatchReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OidMatch {
    pub table_id: u64,
    pub record_index: u64,
    pub instance_value: u64,
    pub master_value: u64,
    pub file_offset: u64,
    pub reason: MatchReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OidResolution {
    pub oid: u64,
    pub matched: Vec<OidMatch>,
}

/// A connectivity candidate with every OID resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedNet {
    pub net_name: String,
    pub table_id: u64,
    pub table_index: usize,
    pub file_offset: u64,
    pub oids: Vec<u64>,
    pub matches: Vec<OidResolution>,
}

/// Collects instance observations from typed records and pair candidates.
pub fn instance_observations(report: &DecodeReport) -> Vec<InstanceObservation> {
    let record_index = |table_index: usize, file_offset: u64| {
        report
            .directory
            .get(table_index)
            .map(|d| file_offset.saturating_sub(d.file_offset + TablePayloadHeader::SIZE) / 8)
            .unwrap_or(0)
    };

    let typed = report.decoded.iter().filter_map(|entry| match entry.record {
        DecodedRecord::InstanceRecord {
            instance_id,
            master_id,
        } => Some(InstanceObservation {
            table_id: entry.provenance.table_id,
            table_index: entry.provenance.table_index,
            record_index: record_index(entry.provenance.table_index, entry.provenance.file_offset),
            instance_value: u64::from(instance_id),
            master_value: u64::from(master_id),
            file_offset: entry.provenance.file_offset,
        }),
        _ => None,
    });

    let heuristic = report
        .candidates
        .iter()
        .filter(|c| c.kind == CandidateKind::PairHeuristic && c.fields.len() == 2)
        .map(|c| InstanceObservation {
            table_id: c.table_id,
            table_index: c.table_index,
            record_index: record_index(c.table_index, c.file_offset),
            instance_value: c.fields[0],
            master_value: c.fields[1],
            file_offset: c.file_offset,
        });

    typed.chain(heuristic).collect()
}

/// Lookup tables over a set of observations.
pub struct InstanceIndex<'a> {
    by_record: BTreeMap<(u64, u64), &'a InstanceObservation>,
    by_instance_value: HashMap<u64, Vec<&'a InstanceObservation>>,
    by_master_value: HashMap<u64, Vec<&'a InstanceObservation>>,
}

impl<'a> InstanceIndex<'a> {
    pub fn new(observations: &'a [InstanceObservation]) -> Self {
        let mut index = Self {
            by_record: BTreeMap::new(),
            by_instance_value: HashMap::new(),
            by_master_value: HashMap::new(),
        };
        for obs in observations {
            index.by_record.insert((obs.table_id, obs.record_index), obs);
            index.by_instance_value.entry(obs.instance_value).or_default().push(obs);
            index.by_master_value.entry(obs.master_value).or_default().push(obs);
        }
        index
    }

    /// All observations matching `oid`, de-duplicated by `(table_id, record_index)`.
    pub fn match_oid(&self, oid: u64) -> Vec<OidMatch> {
        let mut found: Vec<(&InstanceObservation, MatchReason)> = Vec::new();

        for obs in self.by_instance_value.get(&oid).into_iter().flatten().copied() {
            found.push((obs, MatchReason::InstanceValue));
        }
        for obs in self.by_master_value.get(&oid).into_iter().flatten().copied() {
            found.push((obs, MatchReason::MasterValue));
        }
        found.extend(self.with_record_index(oid).map(|obs| (obs, MatchReason::RecordIndex)));

        for scale in OID_SCALES {
            if oid % scale != 0 {
                continue;
            }
            let scaled = oid / scale;
            found.extend(
                self.with_record_index(scaled)
                    .map(|obs| (obs, MatchReason::ScaledRecordIndex(scale))),
            );
            for obs in self.by_instance_value.get(&scaled).into_iter().flatten().copied() {
                found.push((obs, MatchReason::ScaledInstanceValue(scale)));
            }
        }

        let mut seen = HashSet::new();
        found
            .into_iter()
            .filter(|(obs, _)| seen.insert((obs.table_id, obs.record_index)))
            .map(|(obs, reason)| OidMatch {
                table_id: obs.table_id,
                record_index: obs.record_index,
                instance_value: obs.instance_value,
                master_value: obs.master_value,
                file_offset: obs.file_offset,
                reason,
            })
            .collect()
    }

    fn with_record_index(&self, record_index: u64) -> impl Iterator<Item = &'a InstanceObservation> + '_ {
        self.by_record
            .iter()
            .filter(move |((_, ri), _)| *ri == record_index)
            .map(|(_, obs)| *obs)
    }
}

/// Resolves the OIDs of every connectivity candidate in `report`.
pub fn correlate(report: &DecodeReport) -> Vec<ResolvedNet> {
    let observations = instance_observations(report);
    let index = InstanceIndex::new(&observations);

    report
        .candidates
        .iter()
        .filter(|c| c.kind == CandidateKind::ConnectivityHeuristic)
        .map(|c| ResolvedNet {
            net_name: c.name.clone().unwrap_or_default(),
            table_id: c.table_id,
            table_index: c.table_index,
            file_offset: c.file_offset,
            oids: c.fields.clone(),
            matches: c
                .fields
                .iter()
                .map(|&oid| OidResolution {
                    oid,
                    matched: index.match_oid(oid),
                })
                .collect(),
        })
        .collect()
}
