use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
};

use console::{style, Color};
pub use log;
use log::{Level, LevelFilter};
use parking_lot::Mutex;
use rolling_file::{RollingConditionBasic, RollingFileAppender};

/// Sink for the phase transitions and the final outcome of an ingestion run.
///
/// The ingestion core only ever talks to this trait; the caller decides where
/// the messages end up.
pub trait EventLog: Send + Sync {
    fn info(&self, message: &str);
    fn warn(&self, message: &str);
    fn error(&self, message: &str);
}

pub fn parse_level(level: &str) -> LevelFilter {
    match level.to_ascii_uppercase().as_str() {
        "ERROR" => LevelFilter::Error,
        "WARN" => LevelFilter::Warn,
        "INFO" => LevelFilter::Info,
        "DEBUG" => LevelFilter::Debug,
        "TRACE" => LevelFilter::Trace,
        "OFF" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

type Appender = RollingFileAppender<RollingConditionBasic>;

/// Console + rotating file logger.
///
/// Each day gets its own `<log_dir>/<YYYY-MM-DD>.log` file, rolled over at
/// [`Logger::MAX_FILE_SIZE`] with [`Logger::MAX_BACKUPS`] backups kept.
#[derive(Clone)]
pub struct Logger {
    fs_writer: Option<Arc<Mutex<Appender>>>,
    file_path: Option<PathBuf>,
    level: LevelFilter,
}

impl Logger {
    pub const MAX_FILE_SIZE: u64 = 5 * 1024 * 1024;
    pub const MAX_BACKUPS: usize = 2;

    /// Creates a logger writing into `log_dir`.
    ///
    /// If the directory or the log file cannot be created the logger keeps
    /// working on the console only and reports the reason there.
    pub fn new(log_dir: impl AsRef<Path>, level: LevelFilter) -> Self {
        let file_path = Self::file_path(log_dir.as_ref());
        match Self::open_appender(&file_path) {
            Ok(appender) => Self {
                fs_writer: Some(Arc::new(Mutex::new(appender))),
                file_path: Some(file_path),
                level,
            },
            Err(err) => {
                let logger = Self::console(level);
                logger.write(
                    Level::Error,
                    &format!(
                        "Failed to create rotating log file {}: {}",
                        file_path.display(),
                        err
                    ),
                );
                logger
            }
        }
    }

    /// A logger that only writes to the console.
    pub fn console(level: LevelFilter) -> Self {
        Self {
            fs_writer: None,
            file_path: None,
            level,
        }
    }

    /// Path of the active log file, if file logging is enabled.
    pub fn path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    fn file_path(log_dir: &Path) -> PathBuf {
        let date = chrono::Local::now().date_naive().format("%Y-%m-%d");
        log_dir.join(format!("{}.log", date))
    }

    fn open_appender(file_path: &Path) -> std::io::Result<Appender> {
        if let Some(dir) = file_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        RollingFileAppender::new(
            file_path,
            RollingConditionBasic::new().max_size(Self::MAX_FILE_SIZE),
            Self::MAX_BACKUPS,
        )
    }

    pub fn write(&self, level: Level, message: &str) {
        if level > self.level {
            return;
        }

        let color = match level {
            Level::Error => Color::Red,
            Level::Warn => Color::Yellow,
            Level::Info => Color::Cyan,
            Level::Debug => Color::Magenta,
            Level::Trace => Color::White,
        };
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S");

        println!(
            "{} - [{}] - {}",
            timestamp,
            style(level.as_str()).fg(color),
            message
        );

        if let Some(fs_writer) = &self.fs_writer {
            let line = format!("{} - [{}] - {}\n", timestamp, level.as_str(), message);
            let mut fs_writer = fs_writer.lock();
            // Write errors on the log file are dropped.
            let _ = fs_writer
                .write_all(line.as_bytes())
                .and_then(|_| fs_writer.flush());
        }
    }
}

impl EventLog for Logger {
    fn info(&self, message: &str) {
        self.write(Level::Info, message);
    }

    fn warn(&self, message: &str) {
        self.write(Level::Warn, message);
    }

    fn error(&self, message: &str) {
        self.write(Level::Error, message);
    }
}
