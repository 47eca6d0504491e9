//! CLI argument parsing using clap

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExecutionMode {
    /// Standalone mode (default) - all workers as threads of this process
    Standalone,
    /// Coordinator mode - worker 0 of a multi-process run; gathers and reports
    Coordinator,
    /// Worker mode - worker `rank` of a multi-process run
    Worker,
    /// Generate synthetic input files
    Generate,
}

/// proxpulse - Nearest-facility proximity classifier
#[derive(Parser, Debug)]
#[command(name = "proxpulse")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Execution mode: standalone, coordinator, worker, or generate
    #[arg(long, value_enum, default_value = "standalone")]
    pub mode: ExecutionMode,

    /// TOML configuration file (CLI flags override its values)
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    // === Inputs ===
    /// Residence file (fixed-width records)
    #[arg(short = 'r', long)]
    pub residences: Option<PathBuf>,

    /// Facility file (whitespace-separated coordinate pairs)
    #[arg(short = 'f', long)]
    pub facilities: Option<PathBuf>,

    /// Residence record size in bytes, newline included (default: length of the first line)
    #[arg(long)]
    pub record_size: Option<u64>,

    // === Worker Group ===
    /// Number of workers (default: number of CPUs)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Worker id of this process (worker mode)
    #[arg(long)]
    pub rank: Option<usize>,

    /// Coordinator address host:port (worker mode)
    #[arg(long, env = "PROXPULSE_COORDINATOR")]
    pub coordinator: Option<String>,

    /// Port the coordinator listens on (coordinator mode)
    #[arg(long)]
    pub listen_port: Option<u16>,

    /// Connection attempts before giving up on the coordinator (worker mode)
    #[arg(long)]
    pub connect_attempts: Option<u32>,

    /// Fail the run if tallies are still missing after this long (e.g. 30s, 5m)
    #[arg(long)]
    pub gather_timeout: Option<String>,

    // === Output ===
    /// Write the report as JSON to this file
    #[arg(long)]
    pub json_output: Option<PathBuf>,

    /// Print only the aggregate table
    #[arg(long)]
    pub no_per_worker: bool,

    /// Validate configuration and exit
    #[arg(long)]
    pub dry_run: bool,

    /// Log progress (info level)
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Log diagnostics (debug level)
    #[arg(long)]
    pub debug: bool,

    // === Generate Options ===
    /// Residences to generate
    #[arg(long, default_value = "100000")]
    pub num_residences: u64,

    /// Facilities to generate
    #[arg(long, default_value = "100")]
    pub num_facilities: u64,

    /// Side of the square area to scatter points in, meters
    #[arg(long, default_value = "20000")]
    pub extent: f64,

    /// RNG seed for generated data
    #[arg(long, default_value = "0")]
    pub seed: u64,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate CLI arguments
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Some(0) = self.workers {
            anyhow::bail!("workers must be at least 1");
        }

        if let Some(rank) = self.rank {
            match self.mode {
                ExecutionMode::Worker if rank == 0 => {
                    anyhow::bail!("rank 0 is the coordinator; use --mode coordinator");
                }
                ExecutionMode::Worker => {}
                _ => anyhow::bail!("--rank is only valid in worker mode"),
            }
        }

        if self.mode == ExecutionMode::Generate {
            if self.residences.is_none() || self.facilities.is_none() {
                anyhow::bail!("generate mode requires --residences and --facilities output paths");
            }
            if self.config.is_some() {
                anyhow::bail!("--config is not used in generate mode");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("proxpulse").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults() {
        let cli = parse(&["-r", "res.dat", "-f", "fac.dat"]);
        assert_eq!(cli.mode, ExecutionMode::Standalone);
        assert_eq!(cli.workers, None);
        assert!(!cli.no_per_worker);
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_worker_mode() {
        let cli = parse(&[
            "--mode", "worker", "--rank", "2", "-w", "4", "--coordinator", "10.0.1.10:9999",
        ]);
        assert_eq!(cli.mode, ExecutionMode::Worker);
        assert_eq!(cli.rank, Some(2));
        assert_eq!(cli.coordinator.as_deref(), Some("10.0.1.10:9999"));
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_validate_rank() {
        assert!(parse(&["--mode", "worker", "--rank", "0"]).validate().is_err());
        assert!(parse(&["--mode", "coordinator", "--rank", "1"]).validate().is_err());
    }

    #[test]
    fn test_validate_workers() {
        assert!(parse(&["-w", "0"]).validate().is_err());
    }

    #[test]
    fn test_generate_needs_paths() {
        assert!(parse(&["--mode", "generate", "-r", "res.dat"]).validate().is_err());
        assert!(parse(&["--mode", "generate", "-r", "res.dat", "-f", "fac.dat"]).validate().is_ok());
    }
}
