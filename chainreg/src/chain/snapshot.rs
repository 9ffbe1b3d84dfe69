//! Immutable, indexed sets of chain records.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use super::record::ChainRecord;

/// How to pick among records sharing a chain ID.
///
/// The chain-list data contains such collisions, typically a deprecated
/// network and its replacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DuplicatePolicy {
    /// The record appearing last in the source list.
    #[default]
    LastWins,
    /// The record appearing first in the source list.
    FirstWins,
    /// The last record that is not deprecated, else the last record.
    PreferActive,
}

impl DuplicatePolicy {
    fn pick<'a>(self, candidates: &[&'a Arc<ChainRecord>]) -> Option<&'a Arc<ChainRecord>> {
        match self {
            Self::LastWins => candidates.last().copied(),
            Self::FirstWins => candidates.first().copied(),
            Self::PreferActive => candidates
                .iter()
                .rev()
                .find(|r| !r.is_deprecated())
                .or_else(|| candidates.last())
                .copied(),
        }
    }
}

/// Where a snapshot's records came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotOrigin {
    /// Compiled into the binary.
    Bundled,
    /// Retrieved from a chain source at run time.
    Fetched,
}

impl fmt::Display for SnapshotOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bundled => f.write_str("bundled"),
            Self::Fetched => f.write_str("fetched"),
        }
    }
}

/// An indexed, read-only set of chain records.
#[derive(Debug)]
pub struct Snapshot {
    origin: SnapshotOrigin,
    records: Vec<Arc<ChainRecord>>,
    by_id: HashMap<u64, Vec<usize>>,
    by_slug: HashMap<String, usize>,
    loaded_at: Instant,
}

impl Snapshot {
    /// Indexes `records`.
    ///
    /// Records failing [`ChainRecord::validate`] are dropped. When two records
    /// share a slug the later one keeps it. Both cases are logged.
    #[must_use]
    pub fn new(origin: SnapshotOrigin, records: impl IntoIterator<Item = ChainRecord>) -> Self {
        let mut kept: Vec<Arc<ChainRecord>> = Vec::new();
        let mut by_id: HashMap<u64, Vec<usize>> = HashMap::new();
        let mut by_slug = HashMap::new();

        for record in records {
            if let Err(error) = record.validate() {
                tracing::warn!(%origin, %error, "dropping invalid chain record");
                continue;
            }
            let idx = kept.len();
            by_id.entry(record.chain_id).or_default().push(idx);
            if let Some(prev) = by_slug.insert(record.slug.clone(), idx) {
                let prev = &kept[prev];
                tracing::warn!(
                    %origin,
                    slug = %record.slug,
                    replaced = prev.chain_id,
                    chain_id = record.chain_id,
                    "duplicate chain slug"
                );
            }
            kept.push(Arc::new(record));
        }

        let duplicates = by_id.values().filter(|v| v.len() > 1).count();
        if duplicates > 0 {
            tracing::debug!(%origin, duplicates, "chain IDs shared by several records");
        }

        Self {
            origin,
            records: kept,
            by_id,
            by_slug,
            loaded_at: Instant::now(),
        }
    }

    /// Snapshot without records.
    #[must_use]
    pub fn empty(origin: SnapshotOrigin) -> Self {
        Self::new(origin, [])
    }

    /// Where the records came from.
    #[must_use]
    pub const fn origin(&self) -> SnapshotOrigin {
        self.origin
    }

    /// Number of indexed records, duplicates included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the snapshot holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Time since the snapshot was built.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.loaded_at.elapsed()
    }

    /// All records in source order.
    #[must_use]
    pub fn records(&self) -> &[Arc<ChainRecord>] {
        &self.records
    }

    /// Whether any record has `chain_id`.
    #[must_use]
    pub fn contains_id(&self, chain_id: u64) -> bool {
        self.by_id.contains_key(&chain_id)
    }

    /// Every record with `chain_id`, in source order.
    #[must_use]
    pub fn candidates_by_id(&self, chain_id: u64) -> Vec<&Arc<ChainRecord>> {
        self.by_id
            .get(&chain_id)
            .map(|idxs| idxs.iter().map(|&i| &self.records[i]).collect())
            .unwrap_or_default()
    }

    /// The record for `chain_id` selected by `policy`.
    #[must_use]
    pub fn by_id(&self, chain_id: u64, policy: DuplicatePolicy) -> Option<&Arc<ChainRecord>> {
        policy.pick(&self.candidates_by_id(chain_id))
    }

    /// The record owning `slug`.
    #[must_use]
    pub fn by_slug(&self, slug: &str) -> Option<&Arc<ChainRecord>> {
        self.by_slug.get(slug).map(|&i| &self.records[i])
    }
}
