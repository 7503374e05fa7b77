use std::process::ExitCode;

use kvorb::bench::Suite;
use kvorb::config::history::latest_for;
use kvorb::config::ConfigManager;
use kvorb::error::user_friendly_message;
use kvorb::models::{BenchmarkReport, BenchmarkResult};
use kvorb::report::{OutputFormat, Reporter};
use kvorb::store::{BackendInfo, KeyValueStore, SqliteStore};
use kvorb::util::{format_latency, Clock};
use kvorb::{Result, LOG_ENV};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let env = std::env::var(LOG_ENV).unwrap_or_else(|_| "kvorb=info".to_string());
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(EnvFilter::new(env))
        .try_init();
}

fn run() -> Result<()> {
    let manager = ConfigManager::new()?;
    let config = manager.load_config()?;
    info!(path = %manager.config_path().display(), "configuration loaded");

    if !manager.config_path().exists() {
        match manager.save_config(&config) {
            Ok(()) => info!(path = %manager.config_path().display(), "wrote default configuration"),
            Err(e) => warn!("{}", user_friendly_message(&e)),
        }
    }

    let previous = if config.keep_history {
        manager.load_results().unwrap_or_else(|e| {
            warn!("{}", user_friendly_message(&e));
            Vec::new()
        })
    } else {
        Vec::new()
    };

    let suite = Suite::standard(&config)?;
    let mut store = SqliteStore::open(&config.sqlite)?;
    // A reused database file would skew every run.
    store.clear()?;

    let backend = store.info();
    let reporter = Reporter::new(config.output);

    if reporter.format() == OutputFormat::Text {
        println!("========================================");
        println!(
            "Key-Value Benchmark: {} {}",
            backend.name,
            backend.version.as_deref().unwrap_or("")
        );
        println!(
            "Key: {} bytes, Value: {} bytes",
            config.benchmark.key_size, config.benchmark.value_size
        );
        println!("========================================");
    }

    let started = Clock::now();
    let mut reports = Vec::new();
    suite.run(&mut store, |outcome| {
        let report = Reporter::report(outcome);
        match reporter.render(&report) {
            Ok(rendered) => println!("{}", rendered),
            Err(e) => warn!(benchmark = outcome.name.as_str(), error = %e, "failed to render report"),
        }
        reports.push(report);
    })?;

    info!(elapsed = %format_latency(Clock::elapsed_micros(started)), "suite finished");
    compare_with_previous(&reports, &previous, &backend);

    let failed = reports.iter().filter(|report| report.is_failed()).count();
    if failed > 0 {
        warn!(failed, total = reports.len(), "some benchmarks failed");
    }

    if config.keep_history {
        let results: Vec<BenchmarkResult> = reports
            .into_iter()
            .map(|report| BenchmarkResult::new(report, backend.clone()))
            .collect();
        match manager.save_results(&results) {
            Ok(stored) => info!(path = %manager.results_path().display(), stored, "history updated"),
            Err(e) => warn!("{}", user_friendly_message(&e)),
        }
    }

    Ok(())
}

/// Log how each benchmark's mean latency moved since its last saved run
fn compare_with_previous(
    reports: &[BenchmarkReport],
    previous: &[BenchmarkResult],
    backend: &BackendInfo,
) {
    for report in reports {
        let Some(last) = latest_for(previous, &report.name, &backend.name) else {
            continue;
        };
        if let (Some(change), Some(previous_avg)) =
            (report.avg_latency_change(&last.report), last.report.avg_us)
        {
            let change = format!("{:+.1}%", change);
            info!(
                benchmark = report.name.as_str(),
                previous_avg = %format_latency(previous_avg),
                change = %change,
                "compared with previous run"
            );
        }
    }
}

fn main() -> ExitCode {
    init_tracing();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", user_friendly_message(&e));
            ExitCode::FAILURE
        }
    }
}
