use anyhow::{bail, Context, Result};
use std::env;

/// (rank, world size) variable pairs exported by common launchers.
const LAUNCHER_VARS: [(&str, &str); 3] = [
    ("OMPI_COMM_WORLD_RANK", "OMPI_COMM_WORLD_SIZE"),
    ("PMI_RANK", "PMI_SIZE"),
    ("SLURM_PROCID", "SLURM_NTASKS"),
];

/// Where this process sits in the job.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Topology {
    pub rank: u32,
    pub world_size: u32,
}

impl Topology {
    pub fn new(rank: u32, world_size: u32) -> Result<Self> {
        if world_size == 0 {
            bail!("world size must be at least 1");
        }
        if rank >= world_size {
            bail!("rank {} out of range for world size {}", rank, world_size);
        }
        Ok(Self { rank, world_size })
    }

    /// Explicit values win; anything left unset comes from the launcher's
    /// environment.
    pub fn resolve(rank: Option<u32>, world_size: Option<u32>) -> Result<Self> {
        Self::resolve_with(rank, world_size, |name| env::var(name).ok())
    }

    pub fn resolve_with<F>(rank: Option<u32>, world_size: Option<u32>, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let detected = detect(&lookup)?;
        let rank = rank
            .or(detected.map(|(r, _)| r))
            .context("rank not given and no launcher environment found")?;
        let world_size = world_size
            .or(detected.map(|(_, w)| w))
            .context("worker count not given and no launcher environment found")?;
        Self::new(rank, world_size)
    }

    pub fn is_coordinator(&self) -> bool {
        self.rank == crate::COORDINATOR_RANK
    }
}

fn detect<F>(lookup: &F) -> Result<Option<(u32, u32)>>
where
    F: Fn(&str) -> Option<String>,
{
    for (rank_var, size_var) in LAUNCHER_VARS {
        if let (Some(rank), Some(size)) = (lookup(rank_var), lookup(size_var)) {
            let rank = rank
                .trim()
                .parse()
                .with_context(|| format!("{} is not a rank: {:?}", rank_var, rank))?;
            let size = size
                .trim()
                .parse()
                .with_context(|| format!("{} is not a task count: {:?}", size_var, size))?;
            return Ok(Some((rank, size)));
        }
    }
    Ok(None)
}
