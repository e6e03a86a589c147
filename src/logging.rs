use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Prefs;

const DEFAULT_FILTER: &str = "mpv_autoscripts=info";

/// Install the global subscriber: stderr always, plus a daily log file when asked.
///
/// `RUST_LOG` wins over `level`. Keep the returned guard alive for the whole process
/// so buffered file output is flushed.
pub fn init(level: Option<&str>, log_file: bool) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(level.map_or(DEFAULT_FILTER.to_string(), |l| format!("mpv_autoscripts={}", l))))
    .context("Invalid log filter")?;

  let (file_layer, guard) = if log_file {
    let dirs = Prefs::project_dirs().context("No home directory for log files")?;
    let appender = tracing_appender::rolling::daily(dirs.data_dir(), "mpv-autoscripts.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    (Some(tracing_subscriber::fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
  } else {
    (None, None)
  };

  tracing_subscriber::registry()
    .with(filter)
    .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
    .with(file_layer)
    .try_init()
    .context("Failed to install tracing subscriber")?;
  Ok(guard)
}
