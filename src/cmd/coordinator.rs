use clap::Parser;
use std::path::PathBuf;

use crate::{DEFAULT_COORDINATOR_PORT, DEFAULT_TOP_K};

#[derive(Parser, Debug)]
#[command(version, about = "Rank 0: process one range, gather every partial, report", long_about = None)]
pub struct Args {
    /// Newline-delimited event file, readable at the same path on every rank
    #[clap(short, long)]
    pub input: PathBuf,
    /// Total number of workers, this coordinator included
    #[clap(short = 'n', long)]
    pub workers: Option<u32>,
    /// Port to serve the gather RPC on
    #[clap(short = 'P', long, default_value_t = DEFAULT_COORDINATOR_PORT)]
    pub port: u16,
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
