// src/logging.rs
//
// Leveled, timestamped log lines: `HH:MM:SS.mmm LEVEL [area] message`.
// stderr shows lines at or above the stderr threshold; the optional log file
// receives every line regardless of threshold.

use std::fmt;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Mutex;

use crate::io::IoError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Info = 1,
    Warn = 2,
}

impl LogLevel {
    fn tag(self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
        }
    }
}

static LOG_FILE: Mutex<Option<std::fs::File>> = Mutex::new(None);
static STDERR_LEVEL: AtomicU8 = AtomicU8::new(LogLevel::Info as u8);

/// Lowest level echoed to stderr. The log file is unaffected.
pub fn set_stderr_level(level: LogLevel) {
    STDERR_LEVEL.store(level as u8, Ordering::Relaxed);
}

pub(crate) fn emit(level: LogLevel, args: fmt::Arguments<'_>) {
    let line = format!(
        "{} {} {}",
        chrono::Local::now().format("%H:%M:%S%.3f"),
        level.tag(),
        args
    );
    if level as u8 >= STDERR_LEVEL.load(Ordering::Relaxed) {
        eprintln!("{}", line);
    }
    if let Ok(mut guard) = LOG_FILE.lock() {
        if let Some(file) = guard.as_mut() {
            let _ = writeln!(file, "{}", line);
        }
    }
}

/// Mirror log lines into `<log_dir>/<YYYYmmdd-HHMMSS>-comtap.log`.
/// On Unix, `comtap.log` in the same directory points at the newest file.
pub fn init_file_logging(log_dir: &Path) -> Result<PathBuf, IoError> {
    std::fs::create_dir_all(log_dir).map_err(|e| {
        IoError::config(format!("cannot create log dir {}: {}", log_dir.display(), e))
    })?;

    let filename = chrono::Local::now()
        .format("%Y%m%d-%H%M%S-comtap.log")
        .to_string();
    let log_path = log_dir.join(&filename);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .map_err(|e| IoError::config(format!("cannot open {}: {}", log_path.display(), e)))?;

    #[cfg(unix)]
    {
        let link = log_dir.join("comtap.log");
        let _ = std::fs::remove_file(&link);
        if let Err(e) = std::os::unix::fs::symlink(&filename, &link) {
            emit(LogLevel::Warn, format_args!("[logging] no comtap.log link: {}", e));
        }
    }

    if let Ok(mut guard) = LOG_FILE.lock() {
        *guard = Some(file);
    }
    emit(LogLevel::Info, format_args!("[logging] writing to {}", log_path.display()));
    Ok(log_path)
}

pub fn stop_file_logging() {
    let closed = LOG_FILE.lock().map(|mut guard| guard.take().is_some()).unwrap_or(false);
    if closed {
        emit(LogLevel::Info, format_args!("[logging] file mirror closed"));
    }
}

macro_rules! tlog {
    ($($arg:tt)*) => {
        $crate::logging::emit($crate::logging::LogLevel::Info, format_args!($($arg)*))
    };
}

macro_rules! twarn {
    ($($arg:tt)*) => {
        $crate::logging::emit($crate::logging::LogLevel::Warn, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_receives_every_level_with_tags() {
        let dir = tempfile::tempdir().unwrap();
        let path = init_file_logging(dir.path()).unwrap();

        set_stderr_level(LogLevel::Warn);
        tlog!("[test] hello {}", 42);
        twarn!("[test] careful");
        set_stderr_level(LogLevel::Info);
        stop_file_logging();
        tlog!("[test] after stop");

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.lines().any(|l| l.contains("INFO [test] hello 42")));
        assert!(contents.lines().any(|l| l.contains("WARN [test] careful")));
        assert!(!contents.contains("after stop"));

        #[cfg(unix)]
        assert!(dir.path().join("comtap.log").exists());
    }

    #[test]
    fn test_levels_order() {
        assert!(LogLevel::Warn > LogLevel::Info);
        assert_eq!(LogLevel::Warn.tag(), "WARN");
    }
}
