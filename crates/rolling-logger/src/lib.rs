//! Rolling Logger
//!
//! File logger for desktop-style apps:
//! - size-rotated files (`<app>.log`, `<app>.1.log`, ... up to `max_files`)
//! - the most recent lines mirrored into a circular buffer for in-app display
//! - `log` records are bridged into the same `tracing` subscriber

use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

pub use tracing::Level;

/// Errors raised while setting up or using the logger
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("log file error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("logger already initialized")]
    AlreadyInitialized,
    #[error("logger not initialized")]
    NotInitialized,
}

/// Logger tuning knobs
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Rotate once the current file would grow past this size
    pub max_file_bytes: u64,
    /// Total number of files kept, including the current one
    pub max_files: usize,
    /// Lines kept in the in-memory ring buffer
    pub buffer_lines: usize,
    pub level: tracing::Level,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            max_file_bytes: 1024 * 1024,
            max_files: 5,
            buffer_lines: 500,
            level: tracing::Level::INFO,
        }
    }
}

static LOGGER: OnceLock<RollingWriter> = OnceLock::new();

/// Initialize the global logger with default settings
pub fn init_logger(log_dir: impl AsRef<Path>, app_name: &str) -> Result<(), LoggerError> {
    init_logger_with(log_dir, app_name, LoggerConfig::default())
}

/// Initialize the global logger
///
/// Installs a `tracing` fmt subscriber writing into the rolling file set.
/// Fails with `AlreadyInitialized` if any global subscriber is already set.
pub fn init_logger_with(
    log_dir: impl AsRef<Path>,
    app_name: &str,
    config: LoggerConfig,
) -> Result<(), LoggerError> {
    let writer = RollingWriter::open(log_dir, app_name, &config)?;

    tracing_subscriber::fmt()
        .with_writer(writer.clone())
        .with_ansi(false)
        .with_max_level(config.level)
        .try_init()
        .map_err(|_| LoggerError::AlreadyInitialized)?;
    log::set_max_level(to_log_filter(config.level));

    LOGGER
        .set(writer)
        .map_err(|_| LoggerError::AlreadyInitialized)
}

pub fn info(msg: &str) -> Result<(), LoggerError> {
    ensure_initialized()?;
    tracing::info!("{}", msg);
    Ok(())
}

pub fn warn(msg: &str) -> Result<(), LoggerError> {
    ensure_initialized()?;
    tracing::warn!("{}", msg);
    Ok(())
}

pub fn error(msg: &str) -> Result<(), LoggerError> {
    ensure_initialized()?;
    tracing::error!("{}", msg);
    Ok(())
}

/// Last `n` lines written through the global logger (oldest first)
pub fn recent_lines(n: usize) -> Vec<String> {
    LOGGER.get().map(|w| w.recent_lines(n)).unwrap_or_default()
}

fn ensure_initialized() -> Result<(), LoggerError> {
    if LOGGER.get().is_some() {
        Ok(())
    } else {
        Err(LoggerError::NotInitialized)
    }
}

fn to_log_filter(level: tracing::Level) -> log::LevelFilter {
    match level {
        tracing::Level::TRACE => log::LevelFilter::Trace,
        tracing::Level::DEBUG => log::LevelFilter::Debug,
        tracing::Level::INFO => log::LevelFilter::Info,
        tracing::Level::WARN => log::LevelFilter::Warn,
        tracing::Level::ERROR => log::LevelFilter::Error,
    }
}

/// Writer shared between the subscriber and the ring buffer readers
#[derive(Clone)]
pub struct RollingWriter {
    file: Arc<Mutex<RollingFile>>,
    buffer: Arc<Mutex<LineBuffer>>,
}

impl RollingWriter {
    /// Open (or append to) `<log_dir>/<app_name>.log` and write a session header
    pub fn open(
        log_dir: impl AsRef<Path>,
        app_name: &str,
        config: &LoggerConfig,
    ) -> Result<Self, LoggerError> {
        let dir = log_dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|source| LoggerError::Io {
            path: dir.clone(),
            source,
        })?;

        let file = RollingFile::open(dir, app_name, config.max_file_bytes, config.max_files)?;
        let mut writer = Self {
            file: Arc::new(Mutex::new(file)),
            buffer: Arc::new(Mutex::new(LineBuffer::new(config.buffer_lines))),
        };

        let header = format!(
            "=== {} session started {} ===\n",
            app_name,
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f")
        );
        writer
            .write_all(header.as_bytes())
            .map_err(|source| LoggerError::Io {
                path: writer.current_path(),
                source,
            })?;
        Ok(writer)
    }

    pub fn current_path(&self) -> PathBuf {
        self.file.lock().current_path()
    }

    pub fn recent_lines(&self, n: usize) -> Vec<String> {
        self.buffer.lock().recent(n)
    }
}

impl Write for RollingWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.lock().write_all(buf)?;
        self.buffer.lock().push_bytes(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.lock().file.flush()
    }
}

impl<'a> MakeWriter<'a> for RollingWriter {
    type Writer = RollingWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

struct RollingFile {
    dir: PathBuf,
    app_name: String,
    file: File,
    written: u64,
    max_file_bytes: u64,
    max_files: usize,
}

impl RollingFile {
    fn open(
        dir: PathBuf,
        app_name: &str,
        max_file_bytes: u64,
        max_files: usize,
    ) -> Result<Self, LoggerError> {
        let path = dir.join(format!("{}.log", app_name));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LoggerError::Io {
                path: path.clone(),
                source,
            })?;
        let written = file.metadata().map(|m| m.len()).unwrap_or(0);

        Ok(Self {
            dir,
            app_name: app_name.to_string(),
            file,
            written,
            max_file_bytes: max_file_bytes.max(1),
            max_files: max_files.max(1),
        })
    }

    fn current_path(&self) -> PathBuf {
        self.dir.join(format!("{}.log", self.app_name))
    }

    fn rotated_path(&self, n: usize) -> PathBuf {
        self.dir.join(format!("{}.{}.log", self.app_name, n))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.written > 0 && self.written + buf.len() as u64 > self.max_file_bytes {
            self.rotate()?;
        }
        self.file.write_all(buf)?;
        self.written += buf.len() as u64;
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        self.file.flush()?;

        if self.max_files > 1 {
            let oldest = self.rotated_path(self.max_files - 1);
            if oldest.exists() {
                fs::remove_file(&oldest)?;
            }
            for n in (1..self.max_files - 1).rev() {
                let from = self.rotated_path(n);
                if from.exists() {
                    fs::rename(&from, self.rotated_path(n + 1))?;
                }
            }
            fs::rename(self.current_path(), self.rotated_path(1))?;
        }

        self.file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(self.current_path())?;
        self.written = 0;
        Ok(())
    }
}

/// Circular buffer of complete lines
struct LineBuffer {
    lines: VecDeque<String>,
    capacity: usize,
    partial: String,
}

impl LineBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            lines: VecDeque::with_capacity(capacity),
            capacity,
            partial: String::new(),
        }
    }

    fn push_bytes(&mut self, buf: &[u8]) {
        self.partial.push_str(&String::from_utf8_lossy(buf));
        while let Some(pos) = self.partial.find('\n') {
            let line: String = self.partial.drain(..=pos).collect();
            self.push_line(line.trim_end_matches(['\n', '\r']).to_string());
        }
    }

    fn push_line(&mut self, line: String) {
        if self.capacity == 0 {
            return;
        }
        if self.lines.len() == self.capacity {
            self.lines.pop_front();
        }
        self.lines.push_back(line);
    }

    fn recent(&self, n: usize) -> Vec<String> {
        let skip = self.lines.len().saturating_sub(n);
        self.lines.iter().skip(skip).cloned().collect()
    }
}
