//! Unified logging setup for GridWatch services
//!
//! Console layer plus a daily-rolling file layer behind a non-blocking
//! writer, with a reloadable `EnvFilter` so the level can be changed at
//! runtime through the service API.

use std::fs::{self, File, OpenOptions};
#[allow(unused_imports)] // Used by the Write impl on DailyRollingWriter
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{
        self,
        format::Writer,
        FmtContext, FormatEvent, FormatFields,
    },
    layer::SubscriberExt,
    registry::LookupSpan,
    reload,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

/// Bracketed level tag: `[INFO]`, `[WARN]`, etc.
fn level_tag(level: &Level) -> &'static str {
    match *level {
        Level::TRACE => "[TRACE]",
        Level::DEBUG => "[DEBUG]",
        Level::INFO => "[INFO]",
        Level::WARN => "[WARN]",
        Level::ERROR => "[ERROR]",
    }
}

/// Event formatter producing `timestamp [LEVEL] message` lines
///
/// Example: `2026-08-25T07:12:44.809231Z [INFO] sync task registered`
struct BracketLevelFormat;

impl<S, N> FormatEvent<S, N> for BracketLevelFormat
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &tracing::Event<'_>,
    ) -> std::fmt::Result {
        let now = chrono::Utc::now();
        write!(writer, "{} ", now.format("%Y-%m-%dT%H:%M:%S%.6fZ"))?;

        let level = *event.metadata().level();
        if writer.has_ansi_escapes() {
            let color = match level {
                Level::TRACE => "\x1b[35m", // magenta
                Level::DEBUG => "\x1b[34m", // blue
                Level::INFO => "\x1b[32m",  // green
                Level::WARN => "\x1b[33m",  // yellow
                Level::ERROR => "\x1b[31m", // red
            };
            write!(writer, "{}{}\x1b[0m ", color, level_tag(&level))?;
        } else {
            write!(writer, "{} ", level_tag(&level))?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

// Worker guards must outlive the subscriber or buffered lines are lost.
static GUARDS: OnceLock<Arc<Mutex<Vec<WorkerGuard>>>> = OnceLock::new();

type FilterReloadHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;
static FILTER_HANDLE: OnceLock<FilterReloadHandle> = OnceLock::new();
static CURRENT_FILTER: OnceLock<Mutex<String>> = OnceLock::new();

/// Daily rolling file writer producing `{service}_{YYYYMMDD}.log`
///
/// Rolls when the local date changes or the current file disappears out
/// from under us (manual rotation). On each roll, files beyond
/// `keep_files` are pruned, oldest first.
struct DailyRollingWriter {
    service_name: String,
    log_dir: PathBuf,
    keep_files: usize,
    current_date: Arc<Mutex<String>>,
    current_file: Arc<Mutex<Option<File>>>,
}

impl DailyRollingWriter {
    fn new(service_name: String, log_dir: PathBuf, keep_files: usize) -> std::io::Result<Self> {
        let current_date = chrono::Local::now().format("%Y%m%d").to_string();
        fs::create_dir_all(&log_dir)?;

        let path = log_dir.join(format!("{}_{}.log", service_name, current_date));
        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            service_name,
            log_dir,
            keep_files,
            current_date: Arc::new(Mutex::new(current_date)),
            current_file: Arc::new(Mutex::new(Some(file))),
        })
    }

    fn current_path(&self, date: &str) -> PathBuf {
        self.log_dir
            .join(format!("{}_{}.log", self.service_name, date))
    }

    fn writer(&self) -> std::io::Result<std::sync::MutexGuard<'_, Option<File>>> {
        let today = chrono::Local::now().format("%Y%m%d").to_string();
        let mut current_date = self
            .current_date
            .lock()
            .map_err(|e| std::io::Error::other(format!("poisoned date lock: {}", e)))?;

        let missing = !self.current_path(&current_date).exists();
        if *current_date != today || missing {
            fs::create_dir_all(&self.log_dir)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.current_path(&today))?;

            *current_date = today;
            let mut current_file = self
                .current_file
                .lock()
                .map_err(|e| std::io::Error::other(format!("poisoned file lock: {}", e)))?;
            *current_file = Some(file);

            if let Err(e) = prune_old_logs(&self.log_dir, &self.service_name, self.keep_files) {
                eprintln!("log prune failed: {}", e);
            }
        }

        self.current_file
            .lock()
            .map_err(|e| std::io::Error::other(format!("poisoned file lock: {}", e)))
    }
}

impl std::io::Write for DailyRollingWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Some(ref mut file) = *self.writer()? {
            file.write(buf)
        } else {
            Ok(0)
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if let Some(ref mut file) = *self.writer()? {
            file.flush()
        } else {
            Ok(())
        }
    }
}

impl Clone for DailyRollingWriter {
    fn clone(&self) -> Self {
        Self {
            service_name: self.service_name.clone(),
            log_dir: self.log_dir.clone(),
            keep_files: self.keep_files,
            current_date: Arc::clone(&self.current_date),
            current_file: Arc::clone(&self.current_file),
        }
    }
}

/// Delete `{service}_*.log` files beyond `keep`, oldest first.
///
/// File names sort chronologically because the date is zero-padded
/// `YYYYMMDD`. Returns the number of files removed.
fn prune_old_logs(dir: &Path, service_name: &str, keep: usize) -> std::io::Result<usize> {
    let prefix = format!("{}_", service_name);
    let mut logs: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension().is_some_and(|ext| ext == "log")
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(&prefix))
        })
        .collect();

    if logs.len() <= keep {
        return Ok(0);
    }

    logs.sort();
    let excess = logs.len() - keep;
    let mut removed = 0;
    for path in logs.into_iter().take(excess) {
        if fs::remove_file(&path).is_ok() {
            removed += 1;
        }
    }
    Ok(removed)
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Service name, used as the log file prefix (e.g., "syncsrv")
    pub service_name: String,
    /// Directory for rolled log files
    pub log_dir: PathBuf,
    /// Console log level
    pub console_level: Level,
    /// File log level
    pub file_level: Level,
    /// Number of daily files retained before pruning
    pub max_log_files: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "service".to_string(),
            log_dir: PathBuf::from("logs"),
            console_level: Level::INFO,
            file_level: Level::DEBUG,
            max_log_files: 30,
        }
    }
}

/// Initialize the global subscriber from a [`LogConfig`].
///
/// `RUST_LOG` wins over the configured levels when set. Safe to call only
/// once per process; later calls fail inside `try_init` and are surfaced
/// as an error.
pub fn init_with_config(config: LogConfig) -> anyhow::Result<()> {
    fs::create_dir_all(&config.log_dir)?;

    let file_writer = DailyRollingWriter::new(
        config.service_name.clone(),
        config.log_dir.clone(),
        config.max_log_files,
    )?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_writer);

    let guards = GUARDS.get_or_init(|| Arc::new(Mutex::new(Vec::new())));
    match guards.lock() {
        Ok(mut guards) => guards.push(guard),
        Err(poisoned) => poisoned.into_inner().push(guard),
    }

    // Level filtering happens in the shared reloadable filter so runtime
    // changes apply to console and file alike.
    let filter_str = std::env::var("RUST_LOG").unwrap_or_else(|_| {
        format!(
            "{},{}={}",
            config.console_level.as_str().to_lowercase(),
            config.service_name,
            config.file_level.as_str().to_lowercase()
        )
    });
    let env_filter = EnvFilter::new(filter_str.clone());
    let (reload_filter, reload_handle) = reload::Layer::new(env_filter);
    let _ = FILTER_HANDLE.set(reload_handle);
    let _ = CURRENT_FILTER.set(Mutex::new(filter_str));

    let console_layer = fmt::layer()
        .with_ansi(true)
        .event_format(BracketLevelFormat)
        .boxed();

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .event_format(BracketLevelFormat)
        .boxed();

    tracing_subscriber::registry()
        .with(reload_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    tracing::info!(
        "Logging: {} @ {}",
        config.service_name,
        config.log_dir.display()
    );
    Ok(())
}

/// Change the active filter at runtime.
///
/// Accepts a bare level ("debug") or a full filter spec
/// ("info,syncsrv=debug").
pub fn set_log_level(spec: &str) -> Result<(), String> {
    let handle = FILTER_HANDLE
        .get()
        .ok_or("logging not initialized with reload support")?;

    let filter =
        EnvFilter::try_new(spec).map_err(|e| format!("invalid log filter '{}': {}", spec, e))?;
    handle
        .reload(filter)
        .map_err(|e| format!("filter reload failed: {}", e))?;

    if let Some(current) = CURRENT_FILTER.get() {
        if let Ok(mut guard) = current.lock() {
            *guard = spec.to_string();
        }
    }

    tracing::info!("Log filter changed to: {}", spec);
    Ok(())
}

/// Current filter spec, or "unknown" before init.
pub fn get_log_level() -> String {
    CURRENT_FILTER
        .get()
        .and_then(|m| m.lock().ok())
        .map(|guard| guard.clone())
        .unwrap_or_else(|| "unknown".to_string())
}

// ============================================================================
// Tests
// ============================================================================
