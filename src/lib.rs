//! A distributed sentiment analytics (lite) system.
//!
//! A very large newline-delimited event file is split into contiguous byte
//! ranges, one per worker. Every worker streams the records that start in its
//! range, sums sentiment per calendar hour and per author, and ships the
//! partial sums to the coordinator (rank 0). The coordinator merges them and
//! reports the happiest and saddest hours and users.

pub mod aggregate;
pub mod cmd;
pub mod extract;
pub mod gather;
pub mod partition;
pub mod pipeline;
pub mod rank;
pub mod reader;
pub mod report;
pub mod rpc;
pub mod topology;
pub mod utils;

pub use aggregate::{reduce_partials, GlobalAggregate, PartialAggregate, WorkerStats};
pub use extract::{extract, Event};
pub use partition::ByteRange;
pub use rank::{bottom_k, top_k, RankedEntry, RankedList};
pub use reader::RangeReader;
pub use report::Report;
pub use topology::Topology;

/////////////////////////////////////////////////////////////////////////////
// Defaults shared by the binaries
/////////////////////////////////////////////////////////////////////////////

/// Number of entries in each list of the default report.
pub const DEFAULT_TOP_K: usize = 5;

/// Port the coordinator listens on when none is given.
pub const DEFAULT_COORDINATOR_PORT: u16 = 50051;

/// Rank of the process that gathers, reduces and reports.
pub const COORDINATOR_RANK: u32 = 0;
