//! CLI to Config conversion utilities

use crate::config::cli::Cli;
use crate::config::Config;
use crate::input::generate::GenerateConfig;
use anyhow::{Context, Result};
use std::time::Duration;

/// Parse a duration string (e.g., "500ms", "60s", "5m", "1h")
///
/// A bare number is taken as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();

    let (num_str, millis) = if let Some(n) = s.strip_suffix("ms") {
        (n, 1u64)
    } else if let Some(n) = s.strip_suffix("sec").or_else(|| s.strip_suffix('s')) {
        (n, 1000)
    } else if let Some(n) = s.strip_suffix("min").or_else(|| s.strip_suffix('m')) {
        (n, 60 * 1000)
    } else if let Some(n) = s.strip_suffix("hr").or_else(|| s.strip_suffix('h')) {
        (n, 3600 * 1000)
    } else {
        (s.as_str(), 1000)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid duration format: {}", s))?;

    match num.checked_mul(millis) {
        Some(total) => Ok(Duration::from_millis(total)),
        None => anyhow::bail!("Duration out of range: {}", s),
    }
}

/// Build a configuration from CLI arguments alone
pub fn build_config_from_cli(cli: &Cli) -> Config {
    let mut config = Config::default();
    apply_cli_overrides(cli, &mut config);
    config
}

/// Copy every value given on the command line into `config`
pub fn apply_cli_overrides(cli: &Cli, config: &mut Config) {
    if let Some(ref path) = cli.residences {
        config.inputs.residences = path.clone();
    }
    if let Some(ref path) = cli.facilities {
        config.inputs.facilities = path.clone();
    }
    if cli.record_size.is_some() {
        config.inputs.record_size = cli.record_size;
    }

    if let Some(count) = cli.workers {
        config.workers.count = count;
    }
    if let Some(rank) = cli.rank {
        config.workers.rank = rank;
    }
    if cli.coordinator.is_some() {
        config.workers.coordinator = cli.coordinator.clone();
    }
    if let Some(port) = cli.listen_port {
        config.workers.listen_port = port;
    }
    if let Some(attempts) = cli.connect_attempts {
        config.workers.connect_attempts = attempts;
    }

    if cli.json_output.is_some() {
        config.output.json_output = cli.json_output.clone();
    }
    if cli.no_per_worker {
        config.output.per_worker = false;
    }

    if cli.gather_timeout.is_some() {
        config.runtime.gather_timeout = cli.gather_timeout.clone();
    }
    config.runtime.dry_run |= cli.dry_run;
    config.runtime.debug |= cli.debug;
}

/// Generate-mode parameters from CLI arguments
pub fn build_generate_config(cli: &Cli) -> Result<GenerateConfig> {
    let residences = cli
        .residences
        .clone()
        .context("generate mode requires --residences")?;
    let facilities = cli
        .facilities
        .clone()
        .context("generate mode requires --facilities")?;

    Ok(GenerateConfig {
        residences,
        facilities,
        num_residences: cli.num_residences,
        num_facilities: cli.num_facilities,
        extent: cli.extent,
        seed: cli.seed,
    })
}
