//! The coordinator's final output: four ranked lists.
//!

use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::aggregate::GlobalAggregate;
use crate::rank::{bottom_k, top_k, RankedList};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub happiest_hours: RankedList,
    pub saddest_hours: RankedList,
    pub happiest_users: RankedList,
    pub saddest_users: RankedList,
}

impl Report {
    /// Ranks both categories of `global`, `k` entries per list.
    pub fn new(global: &GlobalAggregate, k: usize) -> Self {
        Self {
            happiest_hours: top_k(&global.hour_sums, k),
            saddest_hours: bottom_k(&global.hour_sums, k),
            happiest_users: top_k(&global.user_sums, k),
            saddest_users: bottom_k(&global.user_sums, k),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn sections(&self) -> [(&'static str, &RankedList); 4] {
        [
            ("Happiest Hours", &self.happiest_hours),
            ("Saddest Hours", &self.saddest_hours),
            ("Happiest Users", &self.happiest_users),
            ("Saddest Users", &self.saddest_users),
        ]
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (title, list) in self.sections() {
            writeln!(f, "{}:", title)?;
            if list.is_empty() {
                writeln!(f, "  (none)")?;
            }
            for (i, entry) in list.iter().enumerate() {
                writeln!(f, "  [{}]\t{:+.4}\t{}", i + 1, entry.value, entry.key)?;
            }
        }
        Ok(())
    }
}
