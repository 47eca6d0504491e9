//! TOML configuration file parsing
//!
//! ```toml
//! [inputs]
//! residences = "data/residences.dat"
//! facilities = "data/facilities.dat"
//! record_size = 24
//!
//! [workers]
//! count = 8
//!
//! [output]
//! json_output = "report.json"
//!
//! [runtime]
//! gather_timeout = "5m"
//! ```

use super::*;
use crate::config::cli::Cli;
use crate::config::cli_convert::apply_cli_overrides;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML configuration file
pub fn parse_toml_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML configuration from string
pub fn parse_toml_string(contents: &str) -> Result<Config> {
    let config: Config = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(config)
}

/// Merge CLI arguments with TOML configuration (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, mut config: Config) -> Config {
    apply_cli_overrides(cli, &mut config);
    config
}

/// Load the configuration for this run: the `--config` file if given, with
/// CLI values on top
pub fn load_config(cli: &Cli) -> Result<Config> {
    match cli.config {
        Some(ref path) => {
            let config = parse_toml_file(path)?;
            Ok(merge_cli_with_config(cli, config))
        }
        None => Ok(cli_convert::build_config_from_cli(cli)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
        [inputs]
        residences = "data/residences.dat"
        facilities = "data/facilities.dat"
        record_size = 24

        [workers]
        count = 8

        [output]
        json_output = "report.json"
        per_worker = false

        [runtime]
        gather_timeout = "5m"
    "#;

    #[test]
    fn test_parse_full_config() {
        let config = parse_toml_string(SAMPLE).unwrap();
        assert_eq!(config.inputs.residences, PathBuf::from("data/residences.dat"));
        assert_eq!(config.inputs.record_size, Some(24));
        assert_eq!(config.workers.count, 8);
        assert_eq!(config.workers.listen_port, 9999);
        assert_eq!(config.output.json_output, Some(PathBuf::from("report.json")));
        assert!(!config.output.per_worker);
        assert_eq!(config.runtime.gather_timeout().unwrap(), Some(Duration::from_secs(300)));
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = parse_toml_string("[inputs]\nresidences = \"r\"\nfacilities = \"f\"\n").unwrap();
        assert_eq!(config.workers, WorkerConfig::default());
        assert_eq!(config.output, OutputConfig::default());
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert!(parse_toml_string("[workers]\ncount = \"many\"\n").is_err());
    }

    #[test]
    fn test_cli_overrides_file() {
        let config = parse_toml_string(SAMPLE).unwrap();
        let cli = Cli::try_parse_from(["proxpulse", "-w", "2", "-f", "other.dat"]).unwrap();

        let merged = merge_cli_with_config(&cli, config);
        assert_eq!(merged.workers.count, 2);
        assert_eq!(merged.inputs.facilities, PathBuf::from("other.dat"));
        // Untouched by the CLI
        assert_eq!(merged.inputs.residences, PathBuf::from("data/residences.dat"));
        assert!(!merged.output.per_worker);
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let path = file.path().to_str().unwrap();
        let cli = Cli::try_parse_from(["proxpulse", "--config", path]).unwrap();
        let config = load_config(&cli).unwrap();
        assert_eq!(config.workers.count, 8);
    }

    #[test]
    fn test_debug_from_file_sets_log_level() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"[runtime]\ndebug = true\n").unwrap();

        let path = file.path().to_str().unwrap();
        let cli = Cli::try_parse_from(["proxpulse", "--config", path]).unwrap();
        assert!(!cli.debug);

        let config = load_config(&cli).unwrap();
        assert!(config.runtime.debug);
        assert_eq!(config.runtime.log_level(cli.verbose), "debug");
    }

    #[test]
    fn test_missing_config_file() {
        let cli = Cli::try_parse_from(["proxpulse", "--config", "/nonexistent/proxpulse.toml"]).unwrap();
        let err = load_config(&cli).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
