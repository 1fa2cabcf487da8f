use clap::Parser;
use std::path::PathBuf;

use crate::DEFAULT_TOP_K;

#[derive(Parser, Debug)]
#[command(version, about = "Run every worker in this process", long_about = None)]
pub struct Args {
    /// Newline-delimited event file
    #[clap(short, long)]
    pub input: PathBuf,
    /// Number of simulated workers (default: available parallelism)
    #[clap(short = 'n', long)]
    pub workers: Option<u32>,
    /// Entries per ranked list
    #[clap(short = 'k', long, default_value_t = DEFAULT_TOP_K)]
    pub top: usize,
    /// Print the report as JSON
    #[clap(long)]
    pub json: bool,
    /// More logging (-v, -vv)
    #[clap(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
