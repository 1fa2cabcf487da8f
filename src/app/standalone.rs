use anyhow::Result;
use clap::Parser;
use mrsent::cmd::standalone::Args;
use mrsent::pipeline::run_local;
use mrsent::{utils, Report};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    utils::init_tracing(args.verbose);

    let workers = args.workers.unwrap_or_else(utils::default_workers);
    info!(workers, input = %args.input.display(), "running standalone job");
    let job = run_local(&args.input, workers).await?;
    info!(
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
