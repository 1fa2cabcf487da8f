//! Top-K / bottom-K selection with a deterministic tie-break.
//!
//! Equal values are always ordered by ascending key, in both directions, so
//! the output does not depend on hash map iteration order.

use std::cmp::Ordering;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::aggregate::Sums;

/// One line of a report.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub key: String,
    pub value: f64,
}

/// At most `K` entries, already in report order.
pub type RankedList = Vec<RankedEntry>;

/// The `k` highest values, highest first.
pub fn top_k(sums: &Sums, k: usize) -> RankedList {
    ranked(sums, k, |a, b| b.total_cmp(a))
}

/// The `k` lowest values, lowest first.
pub fn bottom_k(sums: &Sums, k: usize) -> RankedList {
    ranked(sums, k, f64::total_cmp)
}

fn ranked<F>(sums: &Sums, k: usize, by_value: F) -> RankedList
where
    F: Fn(&f64, &f64) -> Ordering,
{
    sums.iter()
        .sorted_by(|(ka, va), (kb, vb)| by_value(*va, *vb).then_with(|| ka.cmp(kb)))
        .take(k)
        .map(|(key, value)| RankedEntry {
            key: key.clone(),
            value: *value,
        })
        .collect()
}
