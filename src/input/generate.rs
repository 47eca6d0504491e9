//! Synthetic input generation
//!
//! Writes facility and residence files with uniformly scattered coordinates
//! inside a square extent. Output is reproducible for a given seed, which makes
//! generated datasets usable for benchmarking runs with different worker
//! counts against identical input.
//!
//! Residence files use the fixed 24-byte record layout
//! (`{:>11.3} {:>11.3}\n`), so every coordinate must fit in 11 columns.

use crate::error::ProximityError;
use crate::geo::Point;
use crate::input::file::DEFAULT_RECORD_SIZE;
use crate::Result;
use anyhow::Context;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Largest extent (meters) whose coordinates fit the 11-column layout
pub const MAX_EXTENT: f64 = 10_000_000.0;

/// Synthetic dataset parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateConfig {
    /// Residence file to write
    pub residences: PathBuf,
    /// Facility file to write
    pub facilities: PathBuf,
    /// Number of residence records
    pub num_residences: u64,
    /// Number of facilities
    pub num_facilities: u64,
    /// Side length of the square extent in meters
    #[serde(default = "default_extent")]
    pub extent: f64,
    /// RNG seed
    #[serde(default)]
    pub seed: u64,
}

fn default_extent() -> f64 {
    20_000.0
}

/// Counts of what was written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenerateSummary {
    pub residences: u64,
    pub facilities: u64,
}

/// Format one residence record in the fixed 24-byte layout
pub fn format_record(point: &Point) -> String {
    format!("{:>11.3} {:>11.3}\n", point.x, point.y)
}

/// Write both files described by `config`
pub fn generate(config: &GenerateConfig) -> Result<GenerateSummary> {
    if !(config.extent > 0.0 && config.extent < MAX_EXTENT) {
        return Err(ProximityError::invalid_input(format!(
            "extent {} must be within (0, {})",
            config.extent, MAX_EXTENT
        ))
        .into());
    }

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(config.seed);

    write_points(&config.facilities, config.num_facilities, config.extent, &mut rng, |p| {
        format!("{:.3} {:.3}\n", p.x, p.y)
    })
    .with_context(|| format!("Failed to write facility file: {}", config.facilities.display()))?;

    write_points(&config.residences, config.num_residences, config.extent, &mut rng, format_record)
        .with_context(|| format!("Failed to write residence file: {}", config.residences.display()))?;

    tracing::info!(
        residences = config.num_residences,
        facilities = config.num_facilities,
        record_size = DEFAULT_RECORD_SIZE,
        seed = config.seed,
        "generated synthetic dataset"
    );

    Ok(GenerateSummary {
        residences: config.num_residences,
        facilities: config.num_facilities,
    })
}

fn write_points<F>(path: &Path, count: u64, extent: f64, rng: &mut Xoshiro256PlusPlus, format: F) -> Result<()>
where
    F: Fn(&Point) -> String,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut out = BufWriter::new(File::create(path)?);
    for _ in 0..count {
        let point = Point::new(rng.gen_range(0.0..extent), rng.gen_range(0.0..extent));
        out.write_all(format(&point).as_bytes())?;
    }
    out.flush()?;
    Ok(())
}
