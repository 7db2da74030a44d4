use std::fs;
use std::path::Path;
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::LoggingConfig;

static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sink {
  /// Keeps the interactive prompt clean.
  FileOnly,
  FileAndStderr,
}

impl Sink {
  pub fn from_verbose(verbose: bool) -> Self {
    if verbose {
      Self::FileAndStderr
    } else {
      Self::FileOnly
    }
  }
}

/// `file_name` is the rolling log prefix, one per binary.
pub fn init(log_dir: &Path, file_name: &str, cfg: &LoggingConfig, sink: Sink) -> anyhow::Result<()> {
  fs::create_dir_all(log_dir)?;
  cleanup_old_logs(log_dir, file_name, cfg.retention_days);

  let file_appender = tracing_appender::rolling::daily(log_dir, file_name);
  let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
  let _ = FILE_GUARD.set(guard);

  let filter = tracing_subscriber::EnvFilter::try_new(&cfg.level)
    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

  let file_layer = tracing_subscriber::fmt::layer()
    .with_ansi(false)
    .with_writer(file_writer)
    .with_target(true);

  let stderr_layer = (sink == Sink::FileAndStderr).then(|| {
    tracing_subscriber::fmt::layer()
      .with_ansi(false)
      .with_writer(std::io::stderr)
      .with_target(false)
  });

  tracing_subscriber::registry()
    .with(filter)
    .with(file_layer)
    .with(stderr_layer)
    .try_init()?;

  Ok(())
}

fn cleanup_old_logs(log_dir: &Path, file_name: &str, retention_days: u64) {
  if retention_days == 0 {
    return;
  }

  let cutoff = SystemTime::now()
    .checked_sub(Duration::from_secs(retention_days.saturating_mul(24 * 60 * 60)))
    .unwrap_or(SystemTime::UNIX_EPOCH);

  let Ok(entries) = fs::read_dir(log_dir) else {
    return;
  };

  for entry in entries.flatten() {
    let path = entry.path();
    if !is_log_file(&path, file_name) {
      continue;
    }

    let modified = entry.metadata().and_then(|m| m.modified());
    if matches!(modified, Ok(t) if t < cutoff) {
      let _ = fs::remove_file(&path);
    }
  }
}

fn is_log_file(path: &Path, file_name: &str) -> bool {
  let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
    return false;
  };

  name == file_name
    || name
      .strip_prefix(file_name)
      .is_some_and(|rest| rest.starts_with('.'))
}
