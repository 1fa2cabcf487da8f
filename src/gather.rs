//! The collective "gather every partial aggregate at the coordinator" step.
//!
//! [`channel`] returns the two ends. Workers (local tasks, or the RPC service
//! on behalf of remote ranks) hold a cloned [`Contributor`] and send exactly
//! one [`Contribution`] per rank. The coordinator owns the single
//! [`Gatherer`], which completes once every rank has delivered, or fails if
//! all contributors are gone before that.

use std::sync::{Arc, Mutex};

use fnv::FnvHashSet;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::aggregate::{PartialAggregate, WorkerStats};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GatherError {
    #[error("rank {rank} is out of range for {world_size} workers")]
    RankOutOfRange { rank: u32, world_size: u32 },
    #[error("rank {0} already delivered its partial aggregate")]
    Duplicate(u32),
    #[error("world size mismatch: coordinator expects {expected} workers, rank claims {claimed}")]
    WorldSizeMismatch { expected: u32, claimed: u32 },
    #[error("the coordinator is no longer gathering")]
    Closed,
    #[error("gather ended with {received} of {expected} partial aggregates, missing ranks {missing:?}")]
    Incomplete {
        received: usize,
        expected: usize,
        missing: Vec<u32>,
    },
}

/// What one rank hands to the coordinator.
#[derive(Clone, Debug, PartialEq)]
pub struct Contribution {
    pub rank: u32,
    pub partial: PartialAggregate,
    pub stats: WorkerStats,
}

/// Everything the coordinator collected, indexed by rank.
#[derive(Debug)]
pub struct Gathered {
    pub partials: Vec<PartialAggregate>,
    pub stats: Vec<WorkerStats>,
}

impl Gathered {
    pub fn total_stats(&self) -> WorkerStats {
        self.stats.iter().fold(WorkerStats::default(), |mut acc, s| {
            acc.merge(*s);
            acc
        })
    }
}

/// Creates a gather point for `world_size` ranks.
pub fn channel(world_size: u32) -> (Contributor, Gatherer) {
    // Room for every rank, so a send never waits on the coordinator.
    let (tx, rx) = mpsc::channel(world_size.max(1) as usize);
    let contributor = Contributor {
        tx,
        world_size,
        delivered: Arc::new(Mutex::new(FnvHashSet::default())),
    };
    (contributor, Gatherer { rx, world_size })
}

/// The sending end. Cheap to clone; all clones share one roster of ranks
/// that have already delivered.
#[derive(Clone, Debug)]
pub struct Contributor {
    tx: mpsc::Sender<Contribution>,
    world_size: u32,
    delivered: Arc<Mutex<FnvHashSet<u32>>>,
}

impl Contributor {
    pub fn world_size(&self) -> u32 {
        self.world_size
    }

    /// Checks that a remote rank belongs to this job.
    pub fn check_world_size(&self, claimed: u32) -> Result<(), GatherError> {
        if claimed != self.world_size {
            return Err(GatherError::WorldSizeMismatch {
                expected: self.world_size,
                claimed,
            });
        }
        Ok(())
    }

    pub async fn send(&self, contribution: Contribution) -> Result<(), GatherError> {
        self.claim(contribution.rank)?;
        self.tx.send(contribution).await.map_err(|_| GatherError::Closed)
    }

    /// Like [`Contributor::send`], for callers outside the async runtime.
    pub fn blocking_send(&self, contribution: Contribution) -> Result<(), GatherError> {
        self.claim(contribution.rank)?;
        self.tx
            .blocking_send(contribution)
            .map_err(|_| GatherError::Closed)
    }

    fn claim(&self, rank: u32) -> Result<(), GatherError> {
        if rank >= self.world_size {
            return Err(GatherError::RankOutOfRange {
                rank,
                world_size: self.world_size,
            });
        }
        let mut delivered = self.delivered.lock().unwrap_or_else(|e| e.into_inner());
        if !delivered.insert(rank) {
            return Err(GatherError::Duplicate(rank));
        }
        Ok(())
    }
}

/// The receiving end, owned by the coordinator.
#[derive(Debug)]
pub struct Gatherer {
    rx: mpsc::Receiver<Contribution>,
    world_size: u32,
}

impl Gatherer {
    /// Waits for one contribution from every rank.
    pub async fn gather(mut self) -> Result<Gathered, GatherError> {
        let expected = self.world_size as usize;
        let mut slots: Vec<Option<Contribution>> = vec![None; expected];
        let mut received = 0;
        while received < expected {
            let Some(contribution) = self.rx.recv().await else {
                let missing = slots
                    .iter()
                    .enumerate()
                    .filter(|(_, slot)| slot.is_none())
                    .map(|(rank, _)| rank as u32)
                    .collect();
                return Err(GatherError::Incomplete {
                    received,
                    expected,
                    missing,
                });
            };
            tracing::debug!(rank = contribution.rank, received = received + 1, expected, "partial aggregate received");
            let slot = &mut slots[contribution.rank as usize];
            if slot.is_some() {
                return Err(GatherError::Duplicate(contribution.rank));
            }
            *slot = Some(contribution);
            received += 1;
        }
        let (partials, stats) = slots
            .into_iter()
            .flatten()
            .map(|c| (c.partial, c.stats))
            .unzip();
        Ok(Gathered { partials, stats })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contribution(rank: u32, value: f64) -> Contribution {
        let mut partial = PartialAggregate::new();
        partial.hour_sums.insert("h".into(), value);
        Contribution {
            rank,
            partial,
            stats: WorkerStats {
                records_read: 1,
                records_dropped: 0,
            },
        }
    }

    #[tokio::test]
    async fn gathers_one_partial_per_rank_in_rank_order() {
        let (tx, gatherer) = channel(3);
        for rank in [2, 0, 1] {
            tx.send(contribution(rank, rank as f64)).await.unwrap();
        }
        let gathered = gatherer.gather().await.unwrap();
        let values: Vec<f64> = gathered.partials.iter().map(|p| p.hour_sums["h"]).collect();
        assert_eq!(values, vec![0.0, 1.0, 2.0]);
        assert_eq!(gathered.total_stats().records_read, 3);
    }

    #[tokio::test]
    async fn rejects_duplicates_and_strangers() {
        let (tx, _gatherer) = channel(2);
        tx.send(contribution(1, 1.0)).await.unwrap();
        assert_eq!(tx.send(contribution(1, 1.0)).await, Err(GatherError::Duplicate(1)));
        assert_eq!(
            tx.send(contribution(2, 1.0)).await,
            Err(GatherError::RankOutOfRange { rank: 2, world_size: 2 })
        );
        assert!(tx.check_world_size(2).is_ok());
        assert!(tx.check_world_size(3).is_err());
    }

    #[tokio::test]
    async fn missing_rank_fails_the_gather() {
        let (tx, gatherer) = channel(3);
        tx.send(contribution(0, 1.0)).await.unwrap();
        drop(tx);
        assert_eq!(
            gatherer.gather().await.unwrap_err(),
            GatherError::Incomplete {
                received: 1,
                expected: 3,
                missing: vec![1, 2],
            }
        );
    }

    #[tokio::test]
    async fn send_after_coordinator_left_is_an_error() {
        let (tx, gatherer) = channel(1);
        drop(gatherer);
        assert_eq!(tx.send(contribution(0, 1.0)).await, Err(GatherError::Closed));
    }
}
