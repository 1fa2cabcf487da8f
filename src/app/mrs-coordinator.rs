use anyhow::{Context, Result};
use clap::Parser;
use mrsent::cmd::coordinator::Args;
use mrsent::rpc::run_coordinator;
use mrsent::{utils, Report, Topology, COORDINATOR_RANK};
use tokio::net::TcpListener;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    utils::init_tracing(args.verbose);

    let topology = Topology::resolve(Some(COORDINATOR_RANK), args.workers)?;
    // Bind before reading so early workers find the port open.
    let addr = format!("0.0.0.0:{}", args.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("bind {}", addr))?;

    let job = run_coordinator(listener, &args.input, topology.world_size).await?;
    info!(
        hours = job.global.hour_sums.len(),
        users = job.global.user_sums.len(),
        extracted = job.stats.extracted(),
        dropped = job.stats.records_dropped,
        "global aggregate ready"
    );

    let report = Report::new(&job.global, args.top);
    if args.json {
        println!("{}", report.to_json()?);
    } else {
        print!("{}", report);
    }
    Ok(())
}
