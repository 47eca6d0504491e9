//! Configuration validation

use super::*;
use crate::config::cli::ExecutionMode;
use crate::input::file::MIN_RECORD_SIZE;
use anyhow::{Context, Result};

/// Validate complete configuration
pub fn validate_config(config: &Config) -> Result<()> {
    validate_inputs(&config.inputs)?;
    validate_workers(&config.workers)?;
    validate_output(&config.output)?;
    validate_runtime(&config.runtime)?;

    Ok(())
}

/// Validate the configuration for a specific execution mode
pub fn validate_for_mode(config: &Config, mode: ExecutionMode) -> Result<()> {
    validate_config(config)?;

    match mode {
        ExecutionMode::Standalone => {
            if config.workers.rank != 0 {
                anyhow::bail!("rank {} has no meaning in standalone mode", config.workers.rank);
            }
        }
        ExecutionMode::Coordinator => {
            if config.workers.rank != 0 {
                anyhow::bail!("the coordinator is always rank 0, got {}", config.workers.rank);
            }
        }
        ExecutionMode::Worker => {
            if config.workers.rank == 0 {
                anyhow::bail!("worker mode requires a rank of 1 or more (rank 0 is the coordinator)");
            }
            match config.workers.coordinator.as_deref() {
                None | Some("") => anyhow::bail!("worker mode requires a coordinator address"),
                Some(addr) if !addr.contains(':') => {
                    anyhow::bail!("coordinator address must be host:port, got {}", addr)
                }
                Some(_) => {}
            }
            if config.output.json_output.is_some() {
                anyhow::bail!("only the coordinator writes a JSON report");
            }
        }
        ExecutionMode::Generate => {}
    }

    Ok(())
}

/// Validate input configuration
pub fn validate_inputs(inputs: &InputConfig) -> Result<()> {
    if inputs.residences.as_os_str().is_empty() {
        anyhow::bail!("a residence file is required (--residences or [inputs] residences)");
    }
    if inputs.facilities.as_os_str().is_empty() {
        anyhow::bail!("a facility file is required (--facilities or [inputs] facilities)");
    }

    if let Some(size) = inputs.record_size {
        if size < MIN_RECORD_SIZE {
            anyhow::bail!("record_size must be at least {} bytes, got {}", MIN_RECORD_SIZE, size);
        }
    }

    Ok(())
}

/// Validate worker group configuration
pub fn validate_workers(workers: &WorkerConfig) -> Result<()> {
    if workers.count == 0 {
        anyhow::bail!("worker count must be at least 1");
    }

    if workers.rank >= workers.count {
        anyhow::bail!(
            "rank {} is out of range for {} workers (valid: 0..{})",
            workers.rank,
            workers.count,
            workers.count - 1
        );
    }

    if workers.connect_attempts == 0 {
        anyhow::bail!("connect_attempts must be at least 1");
    }

    Ok(())
}

/// Validate output configuration
pub fn validate_output(output: &OutputConfig) -> Result<()> {
    if let Some(ref path) = output.json_output {
        if path.as_os_str().is_empty() {
            anyhow::bail!("json_output path is empty");
        }
        if path.is_dir() {
            anyhow::bail!("json_output must be a file path, {} is a directory", path.display());
        }
    }

    Ok(())
}

/// Validate runtime configuration
pub fn validate_runtime(runtime: &RuntimeConfig) -> Result<()> {
    let timeout = runtime
        .gather_timeout()
        .context("Invalid gather_timeout")?;

    if timeout == Some(Duration::ZERO) {
        anyhow::bail!("gather_timeout must be greater than zero");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.inputs.residences = PathBuf::from("res.dat");
        config.inputs.facilities = PathBuf::from("fac.dat");
        config.workers.count = 4;
        config
    }

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&valid_config()).is_ok());
        assert!(validate_for_mode(&valid_config(), ExecutionMode::Standalone).is_ok());
    }

    #[test]
    fn test_missing_inputs() {
        let mut config = valid_config();
        config.inputs.facilities = PathBuf::new();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_record_size_minimum() {
        let mut config = valid_config();
        config.inputs.record_size = Some(3);
        assert!(validate_config(&config).is_err());

        config.inputs.record_size = Some(4);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_worker_count_and_rank() {
        let mut config = valid_config();
        config.workers.count = 0;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.workers.rank = 4;
        let err = validate_config(&config).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_worker_mode_requirements() {
        let mut config = valid_config();
        config.workers.rank = 1;
        assert!(validate_for_mode(&config, ExecutionMode::Worker).is_err());

        config.workers.coordinator = Some("10.0.1.10".to_string());
        assert!(validate_for_mode(&config, ExecutionMode::Worker).is_err());

        config.workers.coordinator = Some("10.0.1.10:9999".to_string());
        assert!(validate_for_mode(&config, ExecutionMode::Worker).is_ok());

        config.output.json_output = Some(PathBuf::from("report.json"));
        assert!(validate_for_mode(&config, ExecutionMode::Worker).is_err());
    }

    #[test]
    fn test_coordinator_is_rank_zero() {
        let mut config = valid_config();
        config.workers.rank = 2;
        assert!(validate_for_mode(&config, ExecutionMode::Coordinator).is_err());
        assert!(validate_for_mode(&config, ExecutionMode::Standalone).is_err());
    }

    #[test]
    fn test_gather_timeout() {
        let mut config = valid_config();
        config.runtime.gather_timeout = Some("0s".to_string());
        assert!(validate_config(&config).is_err());

        config.runtime.gather_timeout = Some("forever".to_string());
        assert!(validate_config(&config).is_err());

        config.runtime.gather_timeout = Some("18446744073709551615h".to_string());
        let err = validate_config(&config).unwrap_err();
        assert!(format!("{:#}", err).contains("out of range"));

        config.runtime.gather_timeout = Some("90s".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_json_output_directory_rejected() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = valid_config();
        config.output.json_output = Some(dir.path().to_path_buf());
        assert!(validate_config(&config).is_err());
    }
}
