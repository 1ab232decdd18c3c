//! Pattern archive with motif indexing.
//!
//! Each subject gets a fixed-capacity ring of coarse state descriptors
//! (default 256).  When the ring is full the oldest snapshot is evicted.
//! Alongside the ring, a motif table counts how often each exact
//! descriptor has been seen and when it was last seen.  Motif counts are
//! lifetime counts and are not decremented on eviction.
//!
//! The archivist is an owned value with no interior locking; callers that
//! share one across threads wrap it in a lock.

use std::collections::{BTreeMap, HashMap};

use core::fmt;

use heapless::HistoryBuffer;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{ArchiveBands, CutPoints};
use crate::error::{Result, ValidationError};
use crate::health::{Band, Bioload, HealthState};
use crate::telemetry::{Metric, NormalizedTelemetry};

pub const DEFAULT_CAPACITY: usize = 256;

/// Three-level coarse banding of a continuous reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoarseBand {
    Green,
    Yellow,
    Red,
    /// No reading.
    Unknown,
}

impl CoarseBand {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
            Self::Unknown => "unknown",
        }
    }

    pub fn of(value: Option<f64>, cuts: &CutPoints) -> Self {
        match value {
            None => Self::Unknown,
            Some(v) if v < cuts.low_red || v > cuts.high_red => Self::Red,
            Some(v) if v < cuts.low_yellow || v > cuts.high_yellow => Self::Yellow,
            Some(_) => Self::Green,
        }
    }
}

/// The motif key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Descriptor {
    pub band: Band,
    pub bioload: Bioload,
    pub temp_band: CoarseBand,
    pub humidity_band: CoarseBand,
}

impl fmt::Display for Descriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.band,
            self.bioload,
            self.temp_band.as_str(),
            self.humidity_band.as_str()
        )
    }
}

/// What the caller hands to [`PatternArchivist::record`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SnapshotInput {
    pub health: HealthState,
    pub brood_temp_c: Option<f64>,
    pub brood_humidity_pct: Option<f64>,
    pub captured_at_ms: u64,
}

impl SnapshotInput {
    pub fn from_telemetry(telemetry: &NormalizedTelemetry, health: HealthState) -> Self {
        Self {
            health,
            brood_temp_c: telemetry.get(Metric::BroodTempC),
            brood_humidity_pct: telemetry.get(Metric::BroodHumidityPct),
            captured_at_ms: telemetry.captured_at_ms,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchivedSnapshot {
    pub id: String,
    pub subject_id: String,
    pub descriptor: Descriptor,
    pub captured_at_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MotifStats {
    pub count: u64,
    pub last_seen_ms: u64,
}

/// Similarity query.  `None` fields are wildcards; the rest match the
/// descriptor field of the same name case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PatternQuery {
    pub band: Option<String>,
    pub bioload: Option<String>,
    pub temp_band: Option<String>,
    pub humidity_band: Option<String>,
}

impl PatternQuery {
    pub fn from_value(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(ValidationError::NotARecord("pattern query").into());
        }
        serde_json::from_value(value.clone())
            .map_err(|_| ValidationError::NotARecord("pattern query").into())
    }

    fn matches(&self, d: &Descriptor) -> bool {
        let field = |q: &Option<String>, actual: &str| {
            q.as_deref().is_none_or(|q| q.trim().eq_ignore_ascii_case(actual))
        };
        field(&self.band, d.band.as_str())
            && field(&self.bioload, d.bioload.as_str())
            && field(&self.temp_band, d.temp_band.as_str())
            && field(&self.humidity_band, d.humidity_band.as_str())
    }
}

struct SubjectArchive<const CAP: usize> {
    ring: HistoryBuffer<ArchivedSnapshot, CAP>,
    motifs: HashMap<Descriptor, MotifStats>,
}

impl<const CAP: usize> SubjectArchive<CAP> {
    fn new() -> Self {
        Self {
            ring: HistoryBuffer::new(),
            motifs: HashMap::new(),
        }
    }
}

/// Per-subject bounded history plus motif index.
pub struct PatternArchivist<const CAP: usize = DEFAULT_CAPACITY> {
    bands: ArchiveBands,
    subjects: BTreeMap<String, Box<SubjectArchive<CAP>>>,
    next_sequence: u64,
}

impl<const CAP: usize> Default for PatternArchivist<CAP> {
    fn default() -> Self {
        Self::new(ArchiveBands::default())
    }
}

impl<const CAP: usize> PatternArchivist<CAP> {
    pub fn new(bands: ArchiveBands) -> Self {
        Self {
            bands,
            subjects: BTreeMap::new(),
            next_sequence: 0,
        }
    }

    pub const fn capacity(&self) -> usize {
        CAP
    }

    pub fn set_bands(&mut self, bands: ArchiveBands) {
        self.bands = bands;
    }

    pub fn describe(&self, input: &SnapshotInput) -> Descriptor {
        Descriptor {
            band: input.health.band,
            bioload: input.health.bioload,
            temp_band: CoarseBand::of(input.brood_temp_c, &self.bands.temperature),
            humidity_band: CoarseBand::of(input.brood_humidity_pct, &self.bands.humidity),
        }
    }

    /// Archive one snapshot, evicting the subject's oldest when full.
    pub fn record(&mut self, subject_id: &str, input: &SnapshotInput) -> Result<ArchivedSnapshot> {
        if subject_id.trim().is_empty() {
            return Err(ValidationError::EmptySubject.into());
        }

        let descriptor = self.describe(input);
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        let record = ArchivedSnapshot {
            id: snapshot_id(subject_id, &descriptor, sequence),
            subject_id: subject_id.to_owned(),
            descriptor,
            captured_at_ms: input.captured_at_ms,
        };

        let archive = self
            .subjects
            .entry(subject_id.to_owned())
            .or_insert_with(|| Box::new(SubjectArchive::new()));

        if archive.ring.len() == CAP {
            debug!("archive: {subject_id} full ({CAP}), evicting oldest");
        }
        archive.ring.write(record.clone());

        let motif = archive.motifs.entry(descriptor).or_insert(MotifStats {
            count: 0,
            last_seen_ms: input.captured_at_ms,
        });
        motif.count += 1;
        motif.last_seen_ms = input.captured_at_ms;

        Ok(record)
    }

    /// Linear scan over every subject, oldest first within a subject.
    pub fn find_similar(&self, query: &PatternQuery) -> Vec<ArchivedSnapshot> {
        self.subjects
            .values()
            .flat_map(|a| a.ring.oldest_ordered())
            .filter(|s| query.matches(&s.descriptor))
            .cloned()
            .collect()
    }

    /// A subject's stored snapshots, oldest first.
    pub fn history(&self, subject_id: &str) -> Vec<ArchivedSnapshot> {
        self.subjects
            .get(subject_id)
            .map(|a| a.ring.oldest_ordered().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, subject_id: &str) -> usize {
        self.subjects.get(subject_id).map_or(0, |a| a.ring.len())
    }

    /// Motif table, most frequent first; ties ordered by descriptor.
    pub fn motifs(&self, subject_id: &str) -> Vec<(Descriptor, MotifStats)> {
        let mut out: Vec<_> = self
            .subjects
            .get(subject_id)
            .map(|a| a.motifs.iter().map(|(d, m)| (*d, *m)).collect())
            .unwrap_or_default();
        out.sort_by(|a, b| b.1.count.cmp(&a.1.count).then(a.0.cmp(&b.0)));
        out
    }

    pub fn subjects(&self) -> impl Iterator<Item = &str> {
        self.subjects.keys().map(String::as_str)
    }
}

fn snapshot_id(subject_id: &str, descriptor: &Descriptor, sequence: u64) -> String {
    let base = format!("{subject_id}|{descriptor}|{sequence}");
    hex::encode(&hmac_sha256::Hash::hash(base.as_bytes())[..8])
}
