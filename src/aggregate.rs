//! Per-worker sentiment sums and their global merge.
//!

use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};

use crate::extract::Event;

/// Running sentiment sum per key.
pub type Sums = FnvHashMap<String, f64>;

/// The sums one worker computed over its own range.
///
/// Owned by that worker until it is handed, by value, to the reducer.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialAggregate {
    /// Keyed by `YYYY-MM-DDTHH`.
    pub hour_sums: Sums,
    /// Keyed by `"<username> (<id>)"`.
    pub user_sums: Sums,
}

/// The merge of every worker's [`PartialAggregate`]. Same shape, owned by
/// the coordinator.
pub type GlobalAggregate = PartialAggregate;

impl PartialAggregate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds a stream of events into fresh sums.
    pub fn from_events<I: IntoIterator<Item = Event>>(events: I) -> Self {
        let mut agg = Self::new();
        for event in events {
            agg.add(event);
        }
        agg
    }

    /// Adds one event to its hour bucket and its user bucket.
    #[inline]
    pub fn add(&mut self, event: Event) {
        *self.hour_sums.entry(event.hour_key).or_insert(0.0) += event.sentiment;
        *self.user_sums.entry(event.user_key).or_insert(0.0) += event.sentiment;
    }

    /// Adds every entry of `other` into `self`. Keys only present in
    /// `other` are created.
    pub fn merge(&mut self, other: PartialAggregate) {
        merge_sums(&mut self.hour_sums, other.hour_sums);
        merge_sums(&mut self.user_sums, other.user_sums);
    }

    pub fn is_empty(&self) -> bool {
        self.hour_sums.is_empty() && self.user_sums.is_empty()
    }
}

fn merge_sums(into: &mut Sums, from: Sums) {
    for (key, value) in from {
        *into.entry(key).or_insert(0.0) += value;
    }
}

/// Merges all partial aggregates into the global one.
///
/// Plain addition, so the order of `partials` only affects floating-point
/// rounding.
pub fn reduce_partials<I>(partials: I) -> GlobalAggregate
where
    I: IntoIterator<Item = PartialAggregate>,
{
    partials
        .into_iter()
        .fold(GlobalAggregate::new(), |mut global, partial| {
            global.merge(partial);
            global
        })
}

/// Record counts a worker reports next to its sums.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerStats {
    pub records_read: u64,
    pub records_dropped: u64,
}

impl WorkerStats {
    pub fn extracted(&self) -> u64 {
        self.records_read - self.records_dropped
    }

    pub fn merge(&mut self, other: WorkerStats) {
        self.records_read += other.records_read;
        self.records_dropped += other.records_dropped;
    }
}
