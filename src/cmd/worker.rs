use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about = "Ranks 1..N: process one range and submit it to the coordinator", long_about = None)]
pub struct Args {
    /// Connect to a coordinator at the given IP address and port
    #[clap(short, long)]
    pub join: String,
    /// Newline-delimited event file
    #[clap(short, long)]
    pub input: PathBuf,
    /// This worker's rank; defaults to the launcher's (MPI / Slurm) rank
    #[clap(short, long)]
    pub rank: Option<u32>,
    /// Total number of workers; defaults to the launcher's task count
    #[clap(short = 'n', long)]
    pub workers: Option<u32>,
    /// Attempts to reach the coordinator, one second apart
    #[clap(long, default_value_t = 30)]
    pub connect_attempts: u32,
    /// More logging (-v, -vv)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
