//! Identity merge: fold records that describe the same work into one entry.
//!
//! Records are keyed by [`CanonicalKey`]. The first record seen for a key is
//! kept as the representative; later sightings only add to its sector and
//! source sets. Iteration follows first-seen order.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::record::{CanonicalKey, Record};

/// A deduplicated work with the provenance of every sighting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedRecord {
    record: Record,
    assigned_sectors: BTreeSet<String>,
    provenance_sources: BTreeSet<String>,
    query_sector: String,
}

impl MergedRecord {
    fn first_sighting(record: Record, sector_label: &str) -> Self {
        let provenance_sources = BTreeSet::from([record.source.clone()]);
        Self {
            record,
            assigned_sectors: BTreeSet::from([sector_label.to_string()]),
            provenance_sources,
            query_sector: sector_label.to_string(),
        }
    }

    /// The record from the first sighting.
    #[must_use]
    pub fn record(&self) -> &Record {
        &self.record
    }

    /// Every sector label this work was found under.
    #[must_use]
    pub fn assigned_sectors(&self) -> &BTreeSet<String> {
        &self.assigned_sectors
    }

    /// Every source tag that returned this work.
    #[must_use]
    pub fn provenance_sources(&self) -> &BTreeSet<String> {
        &self.provenance_sources
    }

    /// Sector of the first sighting.
    #[must_use]
    pub fn query_sector(&self) -> &str {
        &self.query_sector
    }
}

/// Result of [`IdentityMerger::ingest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    /// True when the record started a new entry.
    pub created: bool,
    /// Key the record was filed under; `None` when it could not be keyed.
    pub key: Option<CanonicalKey>,
}

/// Owns every [`MergedRecord`] of a run.
#[derive(Debug, Default)]
pub struct IdentityMerger {
    entries: BTreeMap<CanonicalKey, usize>,
    records: Vec<MergedRecord>,
    unkeyed: usize,
}

impl IdentityMerger {
    /// Creates an empty merger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Files `record` under its canonical key.
    ///
    /// Unkeyable records (no DOI, title normalizing to nothing) are counted
    /// and dropped.
    pub fn ingest(&mut self, record: Record, sector_label: &str) -> IngestOutcome {
        let Some(key) = record.canonical_key() else {
            self.unkeyed += 1;
            trace!(identifier = %record.identifier, "record has no canonical key");
            return IngestOutcome {
                created: false,
                key: None,
            };
        };

        if let Some(&index) = self.entries.get(&key) {
            let merged = &mut self.records[index];
            merged.assigned_sectors.insert(sector_label.to_string());
            merged.provenance_sources.insert(record.source);
            return IngestOutcome {
                created: false,
                key: Some(key),
            };
        }

        self.entries.insert(key.clone(), self.records.len());
        self.records
            .push(MergedRecord::first_sighting(record, sector_label));
        IngestOutcome {
            created: true,
            key: Some(key),
        }
    }

    /// Looks up an entry by key.
    #[must_use]
    pub fn get(&self, key: &CanonicalKey) -> Option<&MergedRecord> {
        self.entries.get(key).map(|&index| &self.records[index])
    }

    /// Entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = &MergedRecord> {
        self.records.iter()
    }

    /// Number of distinct works.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when nothing has been merged.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records dropped for lack of a key.
    #[must_use]
    pub fn unkeyed_count(&self) -> usize {
        self.unkeyed
    }

    /// Consumes the merger, yielding entries in first-seen order.
    #[must_use]
    pub fn into_records(self) -> Vec<MergedRecord> {
        self.records
    }
}
