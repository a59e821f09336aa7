//! Tracing setup.
//!
//! Everything goes to a daily log file under the data directory. Warnings
//! and errors are also echoed to stderr so offline fallbacks are visible
//! from the command line.

use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_ENV: &str = "STOREFRONT_LOG";
const DEFAULT_FILTER: &str = "storefront=info";

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the program or buffered lines are lost.
pub fn init(log_dir: &Path, verbose: bool) -> Result<WorkerGuard> {
  std::fs::create_dir_all(log_dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", log_dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(log_dir, "storefront.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
  let stderr_level = if verbose {
    LevelFilter::DEBUG
  } else {
    LevelFilter::WARN
  };

  tracing_subscriber::registry()
    .with(filter)
    .with(fmt::layer().with_ansi(false).with_target(true).with_writer(writer))
    .with(
      fmt::layer()
        .compact()
        .without_time()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_filter(stderr_level),
    )
    .try_init()
    .map_err(|e| eyre!("Failed to initialize logging: {}", e))?;

  Ok(guard)
}
