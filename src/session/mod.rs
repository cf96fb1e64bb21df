pub mod log;

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use thiserror::Error;

pub use log::{read_entries, SessionLogEntry, HEADER, TIMESTAMP_FORMAT};

/// File stem format for a session started at a given local time, e.g. `20241128_210509`.
pub const SESSION_NAME_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session log already exists: {path}")]
    AlreadyExists { path: String },
    #[error("session log not found: {path}")]
    NotFound { path: String },
    #[error("unexpected session log header in {path}: {found}")]
    BadHeader { path: String, found: String },
    #[error("malformed session log row at line {line}: {message}")]
    MalformedRow { line: u64, message: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// An open monitoring session. Owns the log file from creation until [`Session::close`].
///
/// Only the holder of this value can append, so the log has a single writer.
pub struct Session {
    name: String,
    path: PathBuf,
    writer: csv::Writer<File>,
    rows: u64,
    started_at: DateTime<Local>,
}

/// A finished session whose log is complete and safe to analyse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClosedSession {
    pub name: String,
    pub log_path: PathBuf,
    pub rows: u64,
}

impl Session {
    /// Creates `{dir}/{YYYYmmdd_HHMMSS}.csv` for a session starting at `started_at`.
    pub fn create(dir: impl AsRef<Path>, started_at: DateTime<Local>) -> Result<Self, SessionError> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let name = started_at.format(SESSION_NAME_FORMAT).to_string();
        let path = dir.join(format!("{name}.csv"));
        Self::create_at(path, started_at)
    }

    /// Creates the log at an explicit path. Fails if anything already lives there.
    pub fn create_at(path: impl Into<PathBuf>, started_at: DateTime<Local>) -> Result<Self, SessionError> {
        let path = path.into();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| match e.kind() {
                ErrorKind::AlreadyExists => SessionError::AlreadyExists {
                    path: path.display().to_string(),
                },
                _ => SessionError::Io(e),
            })?;

        let mut writer = log::writer_for(file);
        writer.write_record(HEADER)?;
        writer.flush()?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        tracing::info!(session = %name, path = %path.display(), "Session log created");

        Ok(Self {
            name,
            path,
            writer,
            rows: 0,
            started_at,
        })
    }

    /// Appends one row and flushes it, so a crash loses at most the row being written.
    pub fn append(&mut self, entry: &SessionLogEntry) -> Result<(), SessionError> {
        self.writer.serialize(entry)?;
        self.writer.flush()?;
        self.rows += 1;
        tracing::trace!(rows = self.rows, blinks = entry.blink_count, "Sample persisted");
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn close(mut self) -> Result<ClosedSession, SessionError> {
        self.writer.flush()?;
        tracing::info!(session = %self.name, rows = self.rows, "Session log closed");
        Ok(ClosedSession {
            name: self.name,
            log_path: self.path,
            rows: self.rows,
        })
    }
}

impl ClosedSession {
    /// Wraps an existing log on disk, e.g. for re-running analytics on an old session.
    pub fn from_log_path(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let log_path = path.into();
        let rows = read_entries(&log_path)?.len() as u64;
        let name = log_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self {
            name,
            log_path,
            rows,
        })
    }

    pub fn report_path(&self) -> PathBuf {
        self.sibling(&format!("{}_FocusReport.json", self.name))
    }

    pub fn hotspot_path(&self) -> PathBuf {
        self.sibling(&format!("{}_hotspot.png", self.name))
    }

    fn sibling(&self, file_name: &str) -> PathBuf {
        match self.log_path.parent() {
            Some(dir) => dir.join(file_name),
            None => PathBuf::from(file_name),
        }
    }
}
