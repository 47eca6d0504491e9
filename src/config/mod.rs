//! Configuration module
//!
//! Handles CLI argument parsing, TOML configuration files, and validation.

pub mod cli;
pub mod cli_convert;
pub mod toml;
pub mod validator;

use crate::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Complete run configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub inputs: InputConfig,
    #[serde(default)]
    pub workers: WorkerConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

/// Input files
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    /// Fixed-width residence file
    #[serde(default)]
    pub residences: PathBuf,
    /// Facility coordinate file
    #[serde(default)]
    pub facilities: PathBuf,
    /// Residence record size in bytes (detected from the first line if unset)
    pub record_size: Option<u64>,
}

/// Worker group configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Number of workers in the group
    #[serde(default = "default_worker_count")]
    pub count: usize,
    /// This process's worker id (multi-process runs)
    #[serde(default)]
    pub rank: usize,
    /// Coordinator address `host:port` (worker mode)
    pub coordinator: Option<String>,
    /// Port the coordinator listens on for tallies
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Connection attempts before a worker gives up on the coordinator
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,
}

fn default_worker_count() -> usize {
    num_cpus::get()
}

fn default_listen_port() -> u16 {
    9999
}

fn default_connect_attempts() -> u32 {
    150
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            count: default_worker_count(),
            rank: 0,
            coordinator: None,
            listen_port: default_listen_port(),
            connect_attempts: default_connect_attempts(),
        }
    }
}

/// Report output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    /// JSON report file
    pub json_output: Option<PathBuf>,
    /// Print one table per worker before the aggregate
    #[serde(default = "default_true")]
    pub per_worker: bool,
}

fn default_true() -> bool {
    true
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            json_output: None,
            per_worker: true,
        }
    }
}

/// Runtime configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Give up on missing tallies after this long (e.g. "30s"); waits forever if unset
    pub gather_timeout: Option<String>,
    /// Validate and print the configuration without running
    #[serde(default)]
    pub dry_run: bool,
    /// Log at debug level unless a log filter is set in the environment
    #[serde(default)]
    pub debug: bool,
}

impl RuntimeConfig {
    /// Parsed gather timeout
    pub fn gather_timeout(&self) -> Result<Option<Duration>> {
        self.gather_timeout
            .as_deref()
            .map(cli_convert::parse_duration)
            .transpose()
    }

    /// Default log level for this run
    pub fn log_level(&self, verbose: bool) -> &'static str {
        crate::util::logging::default_level(verbose, self.debug)
    }
}
