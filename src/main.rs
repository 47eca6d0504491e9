//! proxpulse CLI entry point

use anyhow::{Context, Result};
use proxpulse::config::cli::{Cli, ExecutionMode};
use proxpulse::config::{cli_convert, toml::load_config, validator, Config};
use proxpulse::distributed::{Collective, ProximityReport, TcpCoordinator, TcpParticipant, ThreadCollective};
use proxpulse::input::{generate, load_facilities, FixedWidthRecordFile};
use proxpulse::output::{json, text};
use proxpulse::util::logging;
use proxpulse::error::root_cause;
use proxpulse::{Worker, WorkerOutcome};
use std::sync::Arc;
use std::thread;
use std::time::Instant;

fn main() -> Result<()> {
    let cli = Cli::parse_args();
    cli.validate()?;

    println!("proxpulse v{}", env!("CARGO_PKG_VERSION"));
    println!("Nearest-facility proximity classifier");
    println!();

    match cli.mode {
        ExecutionMode::Standalone => run_standalone(&cli),
        ExecutionMode::Coordinator => run_coordinator(&cli),
        ExecutionMode::Worker => run_worker(&cli),
        ExecutionMode::Generate => run_generate(&cli),
    }
}

/// Load, validate and print the configuration
///
/// Returns `None` in dry-run mode.
fn prepare(cli: &Cli) -> Result<Option<Config>> {
    let config = load_config(cli)?;

    // `[runtime] debug` from the config file counts as well as `--debug`
    logging::init_tracing(config.runtime.log_level(cli.verbose));

    validator::validate_for_mode(&config, cli.mode)
        .context("Configuration validation failed")?;

    print_configuration(&config, cli.mode);

    if config.runtime.dry_run {
        println!();
        println!("Dry run mode - configuration validated successfully");
        return Ok(None);
    }

    println!();
    Ok(Some(config))
}

/// Run every worker as a thread of this process
fn run_standalone(cli: &Cli) -> Result<()> {
    let Some(config) = prepare(cli)? else {
        return Ok(());
    };

    let timeout = config.runtime.gather_timeout()?;
    let config = Arc::new(config);

    // Elapsed time covers loading on every worker
    let started = Instant::now();

    let mut handles = Vec::with_capacity(config.workers.count);
    for endpoint in ThreadCollective::group(config.workers.count, timeout) {
        let config = Arc::clone(&config);
        let handle = thread::Builder::new()
            .name(format!("worker-{}", endpoint.worker_id()))
            .spawn(move || {
                let mut worker = Worker::with_start(endpoint, started);
                run_worker_pipeline(&mut worker, &config)
            })
            .context("Failed to spawn worker thread")?;
        handles.push(handle);
    }

    let mut report = None;
    let mut failures = Vec::new();
    for (worker_id, handle) in handles.into_iter().enumerate() {
        match handle.join() {
            Ok(Ok(WorkerOutcome::Reported(r))) => report = Some(r),
            Ok(Ok(WorkerOutcome::Done)) => {}
            Ok(Err(e)) => failures.push(e),
            Err(_) => failures.push(anyhow::anyhow!("worker {} panicked", worker_id)),
        }
    }

    if let Some(err) = root_cause(failures) {
        return Err(err);
    }

    let report = report.context("Coordinator finished without a report")?;
    emit_report(&config, &report)
}

/// Run worker 0 of a multi-process group
fn run_coordinator(cli: &Cli) -> Result<()> {
    let Some(config) = prepare(cli)? else {
        return Ok(());
    };

    let started = Instant::now();

    // Listen before loading so early workers can connect right away
    let addr = format!("0.0.0.0:{}", config.workers.listen_port);
    let coordinator = TcpCoordinator::bind(&addr, config.workers.count, config.runtime.gather_timeout()?)?;
    println!(
        "Waiting for {} worker(s) on {}",
        config.workers.count - 1,
        coordinator.local_addr()
    );
    println!();

    let mut worker = Worker::with_start(coordinator, started);
    match run_worker_pipeline(&mut worker, &config)? {
        WorkerOutcome::Reported(report) => emit_report(&config, &report),
        WorkerOutcome::Done => anyhow::bail!("Coordinator finished without a report"),
    }
}

/// Run worker `rank` of a multi-process group
fn run_worker(cli: &Cli) -> Result<()> {
    let Some(config) = prepare(cli)? else {
        return Ok(());
    };

    let coordinator = config
        .workers
        .coordinator
        .clone()
        .context("Worker mode requires a coordinator address")?;

    let participant = TcpParticipant::new(
        config.workers.rank,
        config.workers.count,
        coordinator,
        config.runtime.gather_timeout()?,
        config.workers.connect_attempts,
    )?;

    let mut worker = Worker::new(participant);
    run_worker_pipeline(&mut worker, &config)?;

    println!("Worker {} delivered its tally", config.workers.rank);
    Ok(())
}

/// Write synthetic input files
fn run_generate(cli: &Cli) -> Result<()> {
    logging::init_tracing(logging::default_level(cli.verbose, cli.debug));

    let gen = cli_convert::build_generate_config(cli)?;

    println!("Generating synthetic dataset:");
    println!("  Residences: {} -> {}", gen.num_residences, gen.residences.display());
    println!("  Facilities: {} -> {}", gen.num_facilities, gen.facilities.display());
    println!("  Extent: {} m, seed {}", gen.extent, gen.seed);

    let summary = generate::generate(&gen)?;

    println!();
    println!(
        "Wrote {} residences and {} facilities",
        summary.residences, summary.facilities
    );
    Ok(())
}

fn run_worker_pipeline<C: Collective>(worker: &mut Worker<C>, config: &Config) -> Result<WorkerOutcome> {
    worker.run(
        || load_facilities(&config.inputs.facilities),
        || FixedWidthRecordFile::open(&config.inputs.residences, config.inputs.record_size),
    )
}

fn emit_report(config: &Config, report: &ProximityReport) -> Result<()> {
    text::print_report(report, config.output.per_worker);

    if let Some(ref path) = config.output.json_output {
        json::write_json_report(path, report, true)?;
        println!("JSON report written to {}", path.display());
    }

    Ok(())
}

fn print_configuration(config: &Config, mode: ExecutionMode) {
    println!("Configuration:");
    println!("  Mode: {:?}", mode);
    println!("  Inputs:");
    println!("    Residences: {}", config.inputs.residences.display());
    println!("    Facilities: {}", config.inputs.facilities.display());
    match config.inputs.record_size {
        Some(size) => println!("    Record size: {} bytes", size),
        None => println!("    Record size: auto"),
    }

    println!("  Workers:");
    println!("    Count: {}", config.workers.count);
    match mode {
        ExecutionMode::Coordinator => {
            println!("    Listen port: {}", config.workers.listen_port);
        }
        ExecutionMode::Worker => {
            println!("    Rank: {}", config.workers.rank);
            if let Some(ref coordinator) = config.workers.coordinator {
                println!("    Coordinator: {}", coordinator);
            }
        }
        _ => {}
    }

    if let Some(ref timeout) = config.runtime.gather_timeout {
        println!("  Gather timeout: {}", timeout);
    }
    if let Some(ref path) = config.output.json_output {
        println!("  JSON output: {}", path.display());
    }
}
