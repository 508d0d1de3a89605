//! Process-wide file sink for [`LogCrateLogger`](crate::LogCrateLogger) records.
//!
//! # Responsibility
//! - Start one size-rotated `flexi_logger` file sink per process.
//! - Own the single-line text cleaning shared by every record writer.
//!
//! # Invariants
//! - Re-initialization with the same level and directory is a no-op.
//! - Re-initialization with a different level or directory is rejected.
//! - Initialization never panics.

use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{info, LevelFilter};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const LOG_FILE_BASENAME: &str = "sqlkit";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 10 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;

static SINK: OnceCell<FileSink> = OnceCell::new();

struct FileSink {
    level: LevelFilter,
    log_dir: PathBuf,
    _handle: LoggerHandle,
}

/// Routes `log` records at or above `level` into rolling files under `log_dir`.
///
/// `level` is any `log` level name (case-insensitive, `warning` accepted);
/// `log_dir` must be absolute.
///
/// # Errors
/// - Unknown level, empty or relative directory.
/// - Logging already active with another level or directory.
/// - Directory creation or `flexi_logger` startup failure.
pub fn init_logging(level: &str, log_dir: impl AsRef<Path>) -> Result<(), String> {
    let level = parse_level(level)?;
    let log_dir = log_dir.as_ref();
    if log_dir.as_os_str().is_empty() || !log_dir.is_absolute() {
        return Err(format!(
            "log_dir must be a non-empty absolute path, got `{}`",
            log_dir.display()
        ));
    }

    let sink = SINK.get_or_try_init(|| start_sink(level, log_dir))?;
    if sink.log_dir != log_dir || sink.level != level {
        return Err(format!(
            "logging already initialized with level `{}` at `{}`; refusing to switch to `{level}` at `{}`",
            sink.level,
            sink.log_dir.display(),
            log_dir.display()
        ));
    }
    Ok(())
}

/// Returns the active `(level, log_dir)`, or `None` before [`init_logging`].
pub fn logging_status() -> Option<(LevelFilter, PathBuf)> {
    SINK.get().map(|sink| (sink.level, sink.log_dir.clone()))
}

/// `debug` for debug builds, `info` otherwise.
pub fn default_log_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    }
}

/// Collapses all whitespace runs to one space and caps the length at
/// `max_chars`, appending `...` when cut.
pub(crate) fn single_line(value: &str, max_chars: usize) -> String {
    let normalized = value.split_whitespace().collect::<Vec<_>>().join(" ");
    let mut truncated = normalized.chars().take(max_chars).collect::<String>();
    if normalized.chars().count() > max_chars {
        truncated.push_str("...");
    }
    truncated
}

fn parse_level(level: &str) -> Result<LevelFilter, String> {
    let trimmed = level.trim();
    if trimmed.eq_ignore_ascii_case("warning") {
        return Ok(LevelFilter::Warn);
    }
    LevelFilter::from_str(trimmed).map_err(|_| {
        format!("unsupported log level `{trimmed}`; expected off|error|warn|info|debug|trace")
    })
}

fn start_sink(level: LevelFilter, log_dir: &Path) -> Result<FileSink, String> {
    std::fs::create_dir_all(log_dir).map_err(|err| {
        format!(
            "failed to create log directory `{}`: {err}",
            log_dir.display()
        )
    })?;

    let handle = Logger::with(level)
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()
        .map_err(|err| format!("failed to start logger: {err}"))?;

    info!(
        "event=logging_init module=logging status=ok level={level} log_dir={}",
        log_dir.display()
    );

    Ok(FileSink {
        level,
        log_dir: log_dir.to_path_buf(),
        _handle: handle,
    })
}
