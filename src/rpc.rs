//! gRPC transport for the gather step.
//!
//! Rank 0 serves `Coordinator/SubmitPartial`, feeding every accepted report
//! into the same [`gather`](crate::gather) channel its own partial goes to.
//! Every other rank computes its partial and submits it exactly once.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::time::sleep;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::{Channel, Server};
use tonic::{Request, Response, Status};
use tracing::{info, warn};

use crate::aggregate::{reduce_partials, PartialAggregate, WorkerStats};
use crate::gather::{self, Contribution, Contributor, GatherError};
use crate::pipeline::{process_rank, JobOutput, WorkerOutput};
use crate::topology::Topology;
use crate::COORDINATOR_RANK;

pub mod proto {
    tonic::include_proto!("aggregate");
}

use proto::coordinator_client::CoordinatorClient;
use proto::coordinator_server::{Coordinator, CoordinatorServer};
use proto::{PartialReport, SubmitAck};

/// Pause between attempts to reach a coordinator that is not up yet.
pub const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(1);

// Partials of a large file easily outgrow tonic's 4 MiB default.
const MAX_PARTIAL_BYTES: usize = 1 << 30;

/////////////////////////////////////////////////////////////////////////////
// Wire conversions
/////////////////////////////////////////////////////////////////////////////

impl From<PartialReport> for Contribution {
    fn from(report: PartialReport) -> Self {
        Contribution {
            rank: report.rank,
            partial: PartialAggregate {
                hour_sums: report.hour_sums.into_iter().collect(),
                user_sums: report.user_sums.into_iter().collect(),
            },
            stats: WorkerStats {
                records_read: report.records_read,
                records_dropped: report.records_dropped,
            },
        }
    }
}

pub fn to_report(topology: Topology, out: WorkerOutput) -> PartialReport {
    PartialReport {
        rank: topology.rank,
        world_size: topology.world_size,
        hour_sums: out.partial.hour_sums.into_iter().collect(),
        user_sums: out.partial.user_sums.into_iter().collect(),
        records_read: out.stats.records_read,
        records_dropped: out.stats.records_dropped,
    }
}

fn to_status(err: GatherError) -> Status {
    match err {
        GatherError::Duplicate(_) => Status::already_exists(err.to_string()),
        GatherError::RankOutOfRange { .. } | GatherError::WorldSizeMismatch { .. } => {
            Status::invalid_argument(err.to_string())
        }
        GatherError::Closed | GatherError::Incomplete { .. } => Status::unavailable(err.to_string()),
    }
}

/////////////////////////////////////////////////////////////////////////////
// Coordinator side
/////////////////////////////////////////////////////////////////////////////

/// Accepts partial aggregates from remote ranks.
pub struct GatherService {
    contributor: Contributor,
}

impl GatherService {
    pub fn new(contributor: Contributor) -> Self {
        Self { contributor }
    }
}

#[tonic::async_trait]
impl Coordinator for GatherService {
    async fn submit_partial(
        &self,
        request: Request<PartialReport>,
    ) -> Result<Response<SubmitAck>, Status> {
        let remote = request.remote_addr();
        let report = request.into_inner();
        let rank = report.rank;
        self.contributor
            .check_world_size(report.world_size)
            .map_err(to_status)?;
        if rank == COORDINATOR_RANK {
            return Err(Status::invalid_argument("rank 0 is the coordinator itself"));
        }
        self.contributor
            .send(Contribution::from(report))
            .await
            .map_err(to_status)?;
        info!(rank, remote = ?remote, "partial aggregate accepted");
        Ok(Response::new(SubmitAck {
            accepted: true,
            message: format!("rank {} accepted", rank),
        }))
    }
}

/// Runs rank 0: serves the gather RPC on `listener`, processes its own
/// range meanwhile, then reduces everything once all ranks have delivered.
pub async fn run_coordinator(
    listener: TcpListener,
    input: impl Into<PathBuf>,
    workers: u32,
) -> Result<JobOutput> {
    let input: PathBuf = input.into();
    let topology = Topology::new(COORDINATOR_RANK, workers)?;
    let (contributor, gatherer) = gather::channel(workers);
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    let addr = listener.local_addr().context("listener address")?;
    let service = CoordinatorServer::new(GatherService::new(contributor.clone()))
        .max_decoding_message_size(MAX_PARTIAL_BYTES);
    let server = tokio::spawn(async move {
        Server::builder()
            .add_service(service)
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), async {
                let _ = shutdown_rx.await;
            })
            .await
    });
    info!(%addr, workers, "coordinator listening");

    let local = tokio::task::spawn_blocking(move || process_rank(&input, topology));
    let out = match local.await.context("local worker did not finish")? {
        Ok(out) => out,
        Err(err) => {
            server.abort();
            return Err(err);
        }
    };
    contributor.send(out.into_contribution(COORDINATOR_RANK)).await?;
    drop(contributor);

    let gathered = gatherer.gather().await;
    let _ = shutdown_tx.send(());
    server
        .await
        .context("gather server did not finish")?
        .context("gather server failed")?;
    let gathered = gathered?;

    let stats = gathered.total_stats();
    info!(
        workers,
        records = stats.records_read,
        dropped = stats.records_dropped,
        "all partial aggregates gathered"
    );
    Ok(JobOutput {
        global: reduce_partials(gathered.partials),
        stats,
    })
}

/////////////////////////////////////////////////////////////////////////////
// Worker side
/////////////////////////////////////////////////////////////////////////////

fn endpoint(coordinator: &str) -> String {
    if coordinator.starts_with("http://") || coordinator.starts_with("https://") {
        coordinator.to_string()
    } else {
        format!("http://{}", coordinator)
    }
}

/// Connects to the coordinator, retrying while it is not listening yet.
pub async fn connect(coordinator: &str, attempts: u32) -> Result<CoordinatorClient<Channel>> {
    let endpoint = endpoint(coordinator);
    let mut attempt = 1;
    loop {
        match CoordinatorClient::connect(endpoint.clone()).await {
            Ok(client) => return Ok(client),
            Err(err) if attempt < attempts => {
                warn!(%endpoint, attempt, error = %err, "coordinator not reachable yet");
                sleep(CONNECT_RETRY_DELAY).await;
                attempt += 1;
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("connect to coordinator at {} after {} attempts", endpoint, attempt)
                })
            }
        }
    }
}

/// Delivers this rank's partial aggregate. Any rejection is fatal.
pub async fn submit_partial(
    coordinator: &str,
    topology: Topology,
    out: WorkerOutput,
    connect_attempts: u32,
) -> Result<()> {
    if topology.is_coordinator() {
        bail!("rank {} is the coordinator and does not submit", topology.rank);
    }
    let mut client = connect(coordinator, connect_attempts.max(1))
        .await?
        .max_encoding_message_size(MAX_PARTIAL_BYTES);
    let ack = client
        .submit_partial(Request::new(to_report(topology, out)))
        .await
        .with_context(|| format!("rank {} could not deliver its partial aggregate", topology.rank))?
        .into_inner();
    if !ack.accepted {
        bail!("coordinator refused rank {}: {}", topology.rank, ack.message);
    }
    info!(rank = topology.rank, "{}", ack.message);
    Ok(())
}
