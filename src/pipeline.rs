//! The per-worker streaming pipeline (reader → extractor → aggregator) and
//! an in-process run of the whole job.
//!

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use tracing::{debug, info};

use crate::aggregate::{reduce_partials, GlobalAggregate, PartialAggregate, WorkerStats};
use crate::extract::extract;
use crate::gather::{self, Contribution};
use crate::partition::ByteRange;
use crate::reader::{RangeReader, RawRecord};
use crate::topology::Topology;

/// What one worker produces.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct WorkerOutput {
    pub partial: PartialAggregate,
    pub stats: WorkerStats,
}

impl WorkerOutput {
    pub fn into_contribution(self, rank: u32) -> Contribution {
        Contribution {
            rank,
            partial: self.partial,
            stats: self.stats,
        }
    }
}

/// The result of a complete job as seen by the coordinator.
#[derive(Clone, Debug, PartialEq)]
pub struct JobOutput {
    pub global: GlobalAggregate,
    pub stats: WorkerStats,
}

/// Folds raw records into sums. Undecodable records are counted and skipped;
/// a read error aborts the fold.
pub fn aggregate_records<I>(records: I) -> Result<WorkerOutput>
where
    I: IntoIterator<Item = Result<RawRecord>>,
{
    let mut out = WorkerOutput::default();
    for record in records {
        let record = record?;
        out.stats.records_read += 1;
        match extract(&record) {
            Some(event) => out.partial.add(event),
            None => out.stats.records_dropped += 1,
        }
    }
    Ok(out)
}

pub fn file_size(path: impl AsRef<Path>) -> Result<u64> {
    let path = path.as_ref();
    Ok(std::fs::metadata(path)
        .with_context(|| format!("stat {}", path.display()))?
        .len())
}

/// Streams every record that begins in `range` into a [`WorkerOutput`].
pub fn process_range(path: impl AsRef<Path>, range: ByteRange) -> Result<WorkerOutput> {
    let path = path.as_ref();
    let reader = RangeReader::open(path, range)?;
    let out = aggregate_records(reader)?;
    debug!(
        start = range.start,
        end = range.end,
        records = out.stats.records_read,
        dropped = out.stats.records_dropped,
        "range processed"
    );
    Ok(out)
}

/// Derives this rank's range from the file size and processes it.
pub fn process_rank(path: impl AsRef<Path>, topology: Topology) -> Result<WorkerOutput> {
    let path = path.as_ref();
    let range = ByteRange::for_worker(file_size(path)?, topology.world_size, topology.rank)?;
    info!(rank = topology.rank, start = range.start, end = range.end, "processing range");
    let out = process_range(path, range)
        .with_context(|| format!("rank {} failed on {}..{}", topology.rank, range.start, range.end))?;
    info!(
        rank = topology.rank,
        records = out.stats.records_read,
        dropped = out.stats.records_dropped,
        hours = out.partial.hour_sums.len(),
        users = out.partial.user_sums.len(),
        "local aggregation done"
    );
    Ok(out)
}

/// Runs `workers` ranks as blocking tasks in this process and gathers their
/// partials through the same channel the RPC coordinator uses.
pub async fn run_local(path: impl Into<PathBuf>, workers: u32) -> Result<JobOutput> {
    let path: PathBuf = path.into();
    if workers == 0 {
        bail!("worker count must be at least 1");
    }
    let (contributor, gatherer) = gather::channel(workers);

    let mut handles = Vec::with_capacity(workers as usize);
    for rank in 0..workers {
        let topology = Topology::new(rank, workers)?;
        let path = path.clone();
        let contributor = contributor.clone();
        handles.push(tokio::task::spawn_blocking(move || -> Result<()> {
            let out = process_rank(&path, topology)?;
            contributor.blocking_send(out.into_contribution(rank))?;
            Ok(())
        }));
    }
    drop(contributor);

    // Surface the worker's own error rather than the gather's missing ranks.
    for (rank, handle) in handles.into_iter().enumerate() {
        handle
            .await
            .with_context(|| format!("worker {} did not finish", rank))??;
    }

    let gathered = gatherer.gather().await?;
    let stats = gathered.total_stats();
    Ok(JobOutput {
        global: reduce_partials(gathered.partials),
        stats,
    })
}
