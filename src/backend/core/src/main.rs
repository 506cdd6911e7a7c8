//! Vigil Worker - Main entry point
//!
//! Runs a task scheduler with the platform's built-in maintenance work and
//! stops it gracefully on Ctrl-C or SIGTERM.

use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use clap::Parser;

use vigil_core::{
    config::Config,
    tasks::{
        HeartbeatWork, PathProbeWork, StatsReportWork, SubmitOptions, TaskPriority,
        TaskScheduler, TaskWork,
    },
    telemetry,
};

/// Process-wide scheduler, for code that cannot be handed an `Arc` explicitly.
static DEFAULT_SCHEDULER: OnceLock<Arc<TaskScheduler>> = OnceLock::new();

/// Get the process-wide scheduler once `main` has installed it.
fn default_scheduler() -> Option<&'static Arc<TaskScheduler>> {
    DEFAULT_SCHEDULER.get()
}

#[derive(Parser, Debug)]
#[command(
    name = "vigil-worker",
    version,
    about = "Vigil background task worker"
)]
struct Args {
    /// Configuration file path (TOML, YAML or JSON)
    #[arg(short, long, env = "VIGIL_CONFIG")]
    config: Option<PathBuf>,

    /// Override the number of worker loops
    #[arg(short, long)]
    workers: Option<usize>,

    /// Seconds between maintenance rounds (heartbeat, stats report, probe)
    #[arg(long, default_value_t = 30)]
    report_interval_secs: u64,

    /// Path checked by the probe task each interval
    #[arg(long)]
    probe_path: Option<PathBuf>,

    /// Seconds to wait for outstanding tasks on shutdown
    #[arg(long, default_value_t = 30)]
    shutdown_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load().unwrap_or_else(|e| {
            eprintln!("Warning: Could not load config: {}. Using defaults.", e);
            Config::default()
        }),
    };
    if let Some(workers) = args.workers {
        config.scheduler.max_workers = workers;
        config.scheduler.validate()?;
    }

    let telemetry = telemetry::init_telemetry(&config.telemetry)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        max_workers = config.scheduler.max_workers,
        "Starting Vigil worker"
    );

    let scheduler = Arc::new(TaskScheduler::new(config.scheduler.clone())?);
    let _ = DEFAULT_SCHEDULER.set(Arc::clone(&scheduler));
    scheduler.start();

    let report_interval = Duration::from_secs(args.report_interval_secs.max(1));
    let mut ticker = tokio::time::interval(report_interval);
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = ticker.tick() => submit_maintenance(&args),
        }
    }

    let outcome = scheduler
        .stop(true, Duration::from_secs(args.shutdown_timeout_secs))
        .await;
    tracing::info!(
        drained = outcome.drained,
        abandoned_pending = outcome.abandoned_pending,
        abandoned_running = outcome.abandoned_running,
        "Worker shutdown complete"
    );

    telemetry.shutdown();
    Ok(())
}

/// Queue one round of maintenance work. Backpressure is logged, not fatal.
fn submit_maintenance(args: &Args) {
    let Some(scheduler) = default_scheduler() else {
        tracing::warn!("No default scheduler installed; skipping maintenance round");
        return;
    };

    let mut round = vec![
        (
            TaskWork::new(HeartbeatWork::new("vigil-worker")),
            SubmitOptions::new().priority(TaskPriority::Background).max_retries(0),
        ),
        (
            TaskWork::new(StatsReportWork::new(Arc::downgrade(scheduler))),
            SubmitOptions::new().priority(TaskPriority::Low).timeout_ms(5_000),
        ),
    ];
    if let Some(path) = &args.probe_path {
        round.push((
            TaskWork::new(PathProbeWork::new(path.clone())),
            SubmitOptions::new().priority(TaskPriority::Normal).timeout_ms(10_000),
        ));
    }

    for (work, options) in round {
        let name = work.name().to_string();
        match scheduler.submit(work, options) {
            Ok(_) => {}
            Err(err) if err.is_queue_full() => {
                tracing::warn!(task_name = %name, "Queue full; maintenance task skipped this round");
            }
            Err(err) => {
                tracing::warn!(task_name = %name, error = %err, "Maintenance task not submitted");
            }
        }
    }
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
