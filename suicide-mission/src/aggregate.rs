//! Per-outcome tallies.

use crate::codec::{OutcomeCode, TraversalCode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::hash::Hasher;
use twox_hash::XxHash64;

/// How often an outcome was reached, and the first traversal that reached it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRecord {
    pub count: u64,
    pub example: TraversalCode,
}

/// Outcome counts keyed by outcome code, in ascending code order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Aggregator {
    records: BTreeMap<OutcomeCode, AggregateRecord>,
    total: u64,
}

impl Aggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one traversal. The first traversal seen for an outcome stays
    /// its example.
    pub fn record(&mut self, outcome: OutcomeCode, traversal: TraversalCode) {
        self.records
            .entry(outcome)
            .and_modify(|record| record.count += 1)
            .or_insert(AggregateRecord {
                count: 1,
                example: traversal,
            });
        self.total += 1;
    }

    #[must_use]
    pub fn get(&self, outcome: OutcomeCode) -> Option<&AggregateRecord> {
        self.records.get(&outcome)
    }

    /// Distinct outcomes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Traversals counted across every outcome.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.total
    }

    pub fn iter(&self) -> impl Iterator<Item = (OutcomeCode, &AggregateRecord)> {
        self.records.iter().map(|(code, record)| (*code, record))
    }

    /// Hash of the canonical record stream. Equal aggregates hash equal.
    #[must_use]
    pub fn digest(&self) -> u64 {
        let mut hasher = XxHash64::with_seed(0);
        for (code, record) in self.iter() {
            hasher.write(&code.raw().to_le_bytes());
            hasher.write(&record.count.to_le_bytes());
            hasher.write(&record.example.raw().to_le_bytes());
        }
        hasher.finish()
    }

    /// Rebuilds an aggregator from records already in ascending code order.
    /// Returns `None` when codes repeat or are out of order.
    pub(crate) fn from_sorted(
        records: impl IntoIterator<Item = (OutcomeCode, AggregateRecord)>,
    ) -> Option<Self> {
        let mut aggregator = Self::new();
        let mut last: Option<OutcomeCode> = None;
        for (code, record) in records {
            if last.is_some_and(|prev| prev >= code) {
                return None;
            }
            last = Some(code);
            aggregator.total = aggregator.total.checked_add(record.count)?;
            aggregator.records.insert(code, record);
        }
        Some(aggregator)
    }
}
