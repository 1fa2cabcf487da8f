//! Splits a file into one contiguous byte range per worker.
//!

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// A half-open span `[start, end)` of file bytes assigned to one worker.
///
/// `start == end` is a legal, empty range: it happens when the file is
/// smaller than the worker count.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Computes the range of worker `index` out of `workers`.
    ///
    /// Every worker derives its own range independently. Each gets
    /// `file_size / workers` bytes and the last one also takes the remainder,
    /// so the ranges of all workers partition `[0, file_size)` exactly.
    pub fn for_worker(file_size: u64, workers: u32, index: u32) -> Result<Self> {
        if workers == 0 {
            bail!("worker count must be at least 1");
        }
        if index >= workers {
            bail!("worker index {} out of range for {} workers", index, workers);
        }
        let chunk = file_size / u64::from(workers);
        let start = u64::from(index) * chunk;
        let end = if index == workers - 1 {
            file_size
        } else {
            (u64::from(index) + 1) * chunk
        };
        Ok(Self { start, end })
    }

    /// All ranges of a job, in worker order.
    pub fn all(file_size: u64, workers: u32) -> Result<Vec<Self>> {
        (0..workers)
            .map(|index| Self::for_worker(file_size, workers, index))
            .collect()
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}
