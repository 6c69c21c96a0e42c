//! Logging setup: a `tracing_subscriber` registry with an `EnvFilter`,
//! writing to stdout and to a timestamped file under `logs/` at once.
//!
//! Grounded on `multi_agent_governance::tracing_layer::configure_tracing`'s
//! layering shape, simplified since the judging core has no OpenTelemetry
//! collector to export to, and on the original's `InitializeLogger`'s
//! `io.MultiWriter(os.Stdout, logFile)` dual-sink requirement.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use judgecore_core::Result;

/// Initialize stdout + file logging under `log_dir`. The returned guards
/// must be kept alive for the process lifetime — dropping them stops the
/// non-blocking writers from flushing.
pub fn init(log_dir: &Path, rust_log: Option<&str>) -> Result<Vec<WorkerGuard>> {
    let env_filter = tracing_subscriber::EnvFilter::new(rust_log.unwrap_or("info,judgecore=debug"));

    let file_name = chrono::Local::now().format("%Y-%m-%d_%H-%M-%S").to_string();
    let file_appender = tracing_appender::rolling::never(log_dir, format!("{file_name}.txt"));
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);
    let (stdout_writer, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(stdout_writer))
        .with(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(file_writer))
        .init();

    Ok(vec![file_guard, stdout_guard])
}
