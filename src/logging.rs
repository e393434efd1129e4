use std::{
    fs,
    path::{Path, PathBuf},
    time::{Duration, SystemTime},
};

use anyhow::{Context, Result, bail};
use tracing_appender::{
    non_blocking::WorkerGuard,
    rolling::{self, RollingFileAppender},
};
use tracing_error::ErrorLayer;
use tracing_subscriber::{
    EnvFilter, Layer,
    filter::LevelFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use uuid::Uuid;

use crate::config::{LoggingConfig, LoggingRotation};

const LOG_FILE_PREFIX: &str = "treasury.log";

/// Keeps the non-blocking writer alive; drop it last so buffered events flush.
pub struct LoggingGuard {
    _worker_guard: WorkerGuard,
    run_id: String,
    log_dir: PathBuf,
}

impl LoggingGuard {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

#[derive(Debug, Default)]
struct SweepReport {
    removed: usize,
    warnings: Vec<String>,
}

pub fn init_tracing(config: &LoggingConfig) -> Result<LoggingGuard> {
    if config.dir.as_os_str().is_empty() {
        bail!("logging.dir cannot be empty");
    }
    let env_filter = parse_filter(&config.filter)?;

    let log_dir = if config.dir.is_absolute() {
        config.dir.clone()
    } else {
        std::env::current_dir()
            .context("failed to read current working directory for logging.dir")?
            .join(&config.dir)
    };
    fs::create_dir_all(&log_dir)
        .with_context(|| format!("failed to create logging directory {}", log_dir.display()))?;

    let sweep = sweep_expired_logs(
        &log_dir,
        LOG_FILE_PREFIX,
        config.retention_days,
        SystemTime::now(),
    );
    let (writer, worker_guard) =
        tracing_appender::non_blocking(open_appender(&log_dir, &config.rotation));

    let file_layer = fmt::layer()
        .json()
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_span_events(FmtSpan::CLOSE)
        .with_current_span(true)
        .with_target(true)
        .with_ansi(false)
        .with_writer(writer)
        .with_filter(env_filter);

    let stderr_layer = config.stderr_warn_enabled.then(|| {
        fmt::layer()
            .compact()
            .with_writer(std::io::stderr)
            .with_filter(LevelFilter::WARN)
    });

    tracing_subscriber::registry()
        .with(ErrorLayer::default())
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("failed to initialize tracing subscriber")?;

    let run_id = Uuid::now_v7().to_string();
    tracing::info!(
        target: "logging",
        run_id = %run_id,
        dir = %log_dir.display(),
        filter = %config.filter,
        rotation = ?config.rotation,
        retention_days = config.retention_days,
        expired_removed = sweep.removed,
        "logging_initialized"
    );
    for warning in &sweep.warnings {
        tracing::warn!(target: "logging", warning = %warning, "log_sweep_warning");
    }

    Ok(LoggingGuard {
        _worker_guard: worker_guard,
        run_id,
        log_dir,
    })
}

fn parse_filter(filter: &str) -> Result<EnvFilter> {
    if filter.trim().is_empty() {
        bail!("logging.filter cannot be empty");
    }
    EnvFilter::try_new(filter).with_context(|| format!("invalid logging.filter '{filter}'"))
}

fn open_appender(log_dir: &Path, rotation: &LoggingRotation) -> RollingFileAppender {
    match rotation {
        LoggingRotation::Daily => rolling::daily(log_dir, LOG_FILE_PREFIX),
        LoggingRotation::Hourly => rolling::hourly(log_dir, LOG_FILE_PREFIX),
    }
}

/// Removes rotated files older than the retention window. Problems are
/// reported, never fatal: logging must come up even on a messy directory.
fn sweep_expired_logs(
    log_dir: &Path,
    prefix: &str,
    retention_days: usize,
    now: SystemTime,
) -> SweepReport {
    let mut report = SweepReport::default();
    let retention = Duration::from_secs((retention_days as u64).saturating_mul(86_400));
    let cutoff = now.checked_sub(retention).unwrap_or(SystemTime::UNIX_EPOCH);

    let entries = match fs::read_dir(log_dir) {
        Ok(entries) => entries,
        Err(err) => {
            report
                .warnings
                .push(format!("failed to scan {}: {err}", log_dir.display()));
            return report;
        }
    };

    let candidates = entries.filter_map(|entry| match entry {
        Ok(entry) => Some(entry),
        Err(err) => {
            report.warnings.push(format!("failed to read log entry: {err}"));
            None
        }
    });
    let candidates: Vec<_> = candidates
        .filter(|entry| entry.file_name().to_string_lossy().starts_with(prefix))
        .collect();

    for entry in candidates {
        let path = entry.path();
        let modified = entry
            .metadata()
            .and_then(|metadata| {
                if metadata.is_file() {
                    metadata.modified().map(Some)
                } else {
                    Ok(None)
                }
            });

        match modified {
            Ok(Some(modified)) if modified <= cutoff => match fs::remove_file(&path) {
                Ok(()) => report.removed += 1,
                Err(err) => report
                    .warnings
                    .push(format!("failed to remove {}: {err}", path.display())),
            },
            Ok(_) => {}
            Err(err) => report
                .warnings
                .push(format!("failed to stat {}: {err}", path.display())),
        }
    }

    report
}
