//! Session logger.
//!
//! Every run writes a fresh log file (the previous session's file is
//! truncated):
//!   Windows:  `%APPDATA%\KidPaint\kidpaint.log`
//!   Linux:    `~/.local/share/KidPaint/kidpaint.log`
//!   macOS:    `~/Library/Application Support/KidPaint/kidpaint.log`
//!
//! Use the `log_info!` / `log_warn!` / `log_err!` macros anywhere in the
//! crate. Until [`init`] has been called every write is a silent no-op, so the
//! engine can be embedded (and unit-tested) without touching the filesystem.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

static LOG_FILE: OnceLock<Mutex<File>> = OnceLock::new();
static LOG_PATH: OnceLock<PathBuf> = OnceLock::new();

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub fn tag(self) -> &'static str {
        match self {
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }
}

/// Path of the active session log, if logging was initialised.
pub fn log_path() -> Option<&'static PathBuf> {
    LOG_PATH.get()
}

/// Append a raw line. I/O errors are swallowed: logging never takes the
/// drawing session down with it.
pub fn write_line(line: &str) {
    if let Some(mutex) = LOG_FILE.get()
        && let Ok(mut file) = mutex.lock()
    {
        let _ = writeln!(file, "{}", line);
    }
}

/// Append a timestamped, level-tagged line.
pub fn write(level: Level, msg: &str) {
    if LOG_FILE.get().is_none() {
        return;
    }
    write_line(&format_line(&timestamp(), level, msg));
}

fn format_line(ts: &str, level: Level, msg: &str) -> String {
    format!("[{}] [{}] {}", ts, level.tag(), msg)
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Info, &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Warn, &format!($($arg)*));
    };
}

#[macro_export]
macro_rules! log_err {
    ($($arg:tt)*) => {
        $crate::logger::write($crate::logger::Level::Error, &format!($($arg)*));
    };
}

/// Initialise the session logger at the platform default location.
pub fn init() {
    init_at(&default_log_path());
}

/// Initialise the session logger at `path`.
///
/// * Creates (or truncates) the log file.
/// * Installs a panic hook that mirrors the panic message into the log
///   before handing over to the default hook.
///
/// Calling this more than once keeps the first file.
pub fn init_at(path: &Path) {
    if LOG_FILE.get().is_some() {
        return;
    }

    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }

    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path);

    match file {
        Ok(f) => {
            let _ = LOG_PATH.set(path.to_path_buf());
            let _ = LOG_FILE.set(Mutex::new(f));
        }
        Err(e) => {
            // Not fatal: the session simply runs without a log
            eprintln!("[logger] Failed to open log file {:?}: {}", path, e);
            return;
        }
    }

    write_line(&format!(
        "=== KidPaint session started (unix {}) ===",
        unix_seconds()
    ));
    write_line(&format!("Log file: {}", path.display()));
    write_line("");

    let prev = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        write_line(&format_line(&timestamp(), Level::Error, &format!("PANIC: {}", info)));
        prev(info);
    }));
}

fn default_log_path() -> PathBuf {
    data_dir().join("KidPaint").join("kidpaint.log")
}

/// Platform data directory (without the app sub-folder).
fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        if let Ok(appdata) = std::env::var("APPDATA") {
            return PathBuf::from(appdata);
        }
    }
    #[cfg(target_os = "macos")]
    {
        if let Ok(home) = std::env::var("HOME") {
            return PathBuf::from(home)
                .join("Library")
                .join("Application Support");
        }
    }
    if let Ok(xdg) = std::env::var("XDG_DATA_HOME") {
        return PathBuf::from(xdg);
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local").join("share");
    }
    PathBuf::from(".")
}

fn unix_seconds() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// HH:MM:SS (UTC) within the current day.
fn timestamp() -> String {
    let secs = unix_seconds();
    let h = (secs % 86400) / 3600;
    let m = (secs % 3600) / 60;
    let s = secs % 60;
    format!("{:02}:{:02}:{:02}", h, m, s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_format_carries_level_tag() {
        let line = format_line("12:00:01", Level::Warn, "history evicted 1 entry");
        assert_eq!(line, "[12:00:01] [WARN] history evicted 1 entry");
    }

    #[test]
    fn write_without_init_is_silent() {
        // No file configured in unit tests; must not panic.
        write(Level::Info, "nothing to see");
        log_info!("formatted {}", 42);
    }
}
