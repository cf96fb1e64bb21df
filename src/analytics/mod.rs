//! Offline analytics over a closed session log.

pub mod hotspot;
pub mod report;
pub mod resample;

use eye_metrics::AttentionScorer;
use thiserror::Error;

use crate::config::AnalyticsConfig;
use crate::session::{read_entries, ClosedSession, SessionError};

pub use hotspot::Hotspot;
pub use report::{write_report, ReportArtifacts, ReportPage, SessionReport, PAGE_ORDER};

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("session log unavailable: {0}")]
    LogUnavailable(String),
    #[error("malformed session log row at line {line}: {message}")]
    MalformedRow { line: u64, message: String },
    #[error("report page {page} has no data")]
    EmptyPage { page: &'static str },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<SessionError> for AnalyticsError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::MalformedRow { line, message } => Self::MalformedRow { line, message },
            other => Self::LogUnavailable(other.to_string()),
        }
    }
}

/// Reads the whole log and builds its report in memory.
pub fn build_report(
    session: &ClosedSession,
    config: &AnalyticsConfig,
    scorer: &AttentionScorer,
) -> Result<SessionReport, AnalyticsError> {
    let entries = read_entries(&session.log_path)?;
    let report = SessionReport::from_entries(&session.name, &entries, config, scorer)?;
    tracing::info!(
        session = %session.name,
        rows = report.rows,
        pages = report.pages.len(),
        "Focus report generated"
    );
    Ok(report)
}

/// Builds the report and writes it next to the log.
pub fn generate(
    session: &ClosedSession,
    config: &AnalyticsConfig,
    scorer: &AttentionScorer,
) -> Result<ReportArtifacts, AnalyticsError> {
    let report = build_report(session, config, scorer)?;
    write_report(&report, session)
}
