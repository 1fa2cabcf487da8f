use anyhow::{bail, Context, Result};
use clap::Parser;
use mrsent::cmd::worker::Args;
use mrsent::pipeline::process_rank;
use mrsent::rpc::submit_partial;
use mrsent::{utils, Topology};

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    utils::init_tracing(args.verbose);

    let topology = Topology::resolve(args.rank, args.workers)?;
    if topology.is_coordinator() {
        bail!("rank 0 is the coordinator; start it with mrs-coordinator");
    }

    let input = args.input.clone();
    let out = tokio::task::spawn_blocking(move || process_rank(&input, topology))
        .await
        .context("worker task did not finish")??;

    submit_partial(&args.join, topology, out, args.connect_attempts).await
}
