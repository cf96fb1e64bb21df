//! Report pages and the on-disk report artifact.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime};
use eye_metrics::AttentionScorer;
use serde::Serialize;
use uuid::Uuid;

use super::hotspot::Hotspot;
use super::resample::{overall_mean, resample_mean, TimePoint, WindowMean};
use super::AnalyticsError;
use crate::config::AnalyticsConfig;
use crate::dashboard::FOCUS_THRESHOLD;
use crate::session::{ClosedSession, SessionLogEntry};

/// Page identifiers in the order they appear in every report.
pub const PAGE_ORDER: [&str; 6] = [
    "attention_over_time",
    "hotspot_map",
    "speed_over_time",
    "openness_over_time",
    "cumulative_blinks",
    "blink_frequency",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionPage {
    pub samples: Vec<TimePoint>,
    pub windows: Vec<WindowMean>,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotPage {
    /// File name of the rendered PNG, next to the report.
    pub image: String,
    pub hotspot: Hotspot,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpeedPage {
    pub left: Vec<TimePoint>,
    pub right: Vec<TimePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpennessPage {
    pub samples: Vec<TimePoint>,
    pub windows: Vec<WindowMean>,
    pub overall_mean: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CountPoint {
    pub at: NaiveDateTime,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeBlinksPage {
    /// Blinks completed between consecutive rows.
    pub deltas: Vec<CountPoint>,
    /// Running sum of `deltas`; never decreases.
    pub cumulative: Vec<CountPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlinkFrequencyPage {
    /// The logged blink-count column, one bar per row.
    pub bars: Vec<CountPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "page", rename_all = "snake_case")]
pub enum ReportPage {
    AttentionOverTime(AttentionPage),
    HotspotMap(HotspotPage),
    SpeedOverTime(SpeedPage),
    OpennessOverTime(OpennessPage),
    CumulativeBlinks(CumulativeBlinksPage),
    BlinkFrequency(BlinkFrequencyPage),
}

impl ReportPage {
    pub fn name(&self) -> &'static str {
        match self {
            Self::AttentionOverTime(_) => PAGE_ORDER[0],
            Self::HotspotMap(_) => PAGE_ORDER[1],
            Self::SpeedOverTime(_) => PAGE_ORDER[2],
            Self::OpennessOverTime(_) => PAGE_ORDER[3],
            Self::CumulativeBlinks(_) => PAGE_ORDER[4],
            Self::BlinkFrequency(_) => PAGE_ORDER[5],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub report_id: Uuid,
    pub session: String,
    pub rows: usize,
    pub first_sample: NaiveDateTime,
    pub last_sample: NaiveDateTime,
    pub generated_at: DateTime<Local>,
    pub scorer: AttentionScorer,
    pub pages: Vec<ReportPage>,
}

impl SessionReport {
    /// Builds every page in order. Fails on the first page without data, so a report is either
    /// complete or not produced.
    pub fn from_entries(
        session: &str,
        entries: &[SessionLogEntry],
        config: &AnalyticsConfig,
        scorer: &AttentionScorer,
    ) -> Result<Self, AnalyticsError> {
        let (Some(first), Some(last)) = (entries.first(), entries.last()) else {
            return Err(AnalyticsError::EmptyPage { page: PAGE_ORDER[0] });
        };

        let pages = vec![
            attention_page(entries, config, scorer),
            hotspot_page(session, entries, config)?,
            speed_page(entries),
            openness_page(entries, config)?,
            cumulative_blinks_page(entries),
            blink_frequency_page(entries),
        ];

        Ok(Self {
            report_id: Uuid::new_v4(),
            session: session.to_string(),
            rows: entries.len(),
            first_sample: first.timestamp,
            last_sample: last.timestamp,
            generated_at: Local::now(),
            scorer: *scorer,
            pages,
        })
    }

    pub fn page(&self, name: &str) -> Option<&ReportPage> {
        self.pages.iter().find(|p| p.name() == name)
    }

    pub fn hotspot(&self) -> Option<&Hotspot> {
        self.pages.iter().find_map(|p| match p {
            ReportPage::HotspotMap(page) => Some(&page.hotspot),
            _ => None,
        })
    }
}

fn series(entries: &[SessionLogEntry], value: impl Fn(&SessionLogEntry) -> f64) -> Vec<TimePoint> {
    entries
        .iter()
        .map(|e| TimePoint::new(e.timestamp, value(e)))
        .collect()
}

fn attention_page(
    entries: &[SessionLogEntry],
    config: &AnalyticsConfig,
    scorer: &AttentionScorer,
) -> ReportPage {
    let samples = series(entries, |e| {
        scorer.score_row(e.left_speed, e.right_speed, e.average_ear)
    });
    let windows = resample_mean(&samples, config.resample_window);
    ReportPage::AttentionOverTime(AttentionPage {
        samples,
        windows,
        threshold: FOCUS_THRESHOLD,
    })
}

fn hotspot_page(
    session: &str,
    entries: &[SessionLogEntry],
    config: &AnalyticsConfig,
) -> Result<ReportPage, AnalyticsError> {
    let mut hotspot = Hotspot::from_config(config);
    for e in entries {
        hotspot.add(e.left_x as f64, e.left_y as f64);
        hotspot.add(e.right_x as f64, e.right_y as f64);
    }
    if hotspot.total() == 0 {
        return Err(AnalyticsError::EmptyPage { page: PAGE_ORDER[1] });
    }
    if hotspot.out_of_bounds > 0 {
        tracing::warn!(
            dropped = hotspot.out_of_bounds,
            width = config.capture_width,
            height = config.capture_height,
            "Eye centres outside the capture frame were left out of the hotspot map"
        );
    }
    Ok(ReportPage::HotspotMap(HotspotPage {
        image: format!("{session}_hotspot.png"),
        hotspot,
    }))
}

fn speed_page(entries: &[SessionLogEntry]) -> ReportPage {
    ReportPage::SpeedOverTime(SpeedPage {
        left: series(entries, |e| e.left_speed),
        right: series(entries, |e| e.right_speed),
    })
}

fn openness_page(
    entries: &[SessionLogEntry],
    config: &AnalyticsConfig,
) -> Result<ReportPage, AnalyticsError> {
    let samples = series(entries, |e| e.average_ear);
    let Some(mean) = overall_mean(&samples) else {
        return Err(AnalyticsError::EmptyPage { page: PAGE_ORDER[3] });
    };
    let windows = resample_mean(&samples, config.resample_window);
    Ok(ReportPage::OpennessOverTime(OpennessPage {
        samples,
        windows,
        overall_mean: mean,
    }))
}

fn cumulative_blinks_page(entries: &[SessionLogEntry]) -> ReportPage {
    let mut previous = 0u64;
    let mut running = 0u64;
    let mut deltas = Vec::with_capacity(entries.len());
    let mut cumulative = Vec::with_capacity(entries.len());
    for e in entries {
        // 计数列本身是累计值，逐行差分还原每段新增的眨眼
        let delta = e.blink_count.saturating_sub(previous);
        previous = e.blink_count;
        running += delta;
        deltas.push(CountPoint {
            at: e.timestamp,
            count: delta,
        });
        cumulative.push(CountPoint {
            at: e.timestamp,
            count: running,
        });
    }
    ReportPage::CumulativeBlinks(CumulativeBlinksPage { deltas, cumulative })
}

fn blink_frequency_page(entries: &[SessionLogEntry]) -> ReportPage {
    ReportPage::BlinkFrequency(BlinkFrequencyPage {
        bars: entries
            .iter()
            .map(|e| CountPoint {
                at: e.timestamp,
                count: e.blink_count,
            })
            .collect(),
    })
}

/// Paths of a written report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportArtifacts {
    pub report_path: PathBuf,
    pub hotspot_path: PathBuf,
}

/// Writes the JSON report and hotspot PNG next to the session log.
///
/// Both files are written under temporary names and renamed once complete, so a failed write
/// never leaves a half-written report behind.
pub fn write_report(
    report: &SessionReport,
    session: &ClosedSession,
) -> Result<ReportArtifacts, AnalyticsError> {
    let hotspot = report
        .hotspot()
        .ok_or(AnalyticsError::EmptyPage { page: PAGE_ORDER[1] })?;

    let artifacts = ReportArtifacts {
        report_path: session.report_path(),
        hotspot_path: session.hotspot_path(),
    };
    let png_tmp = tmp_path(&artifacts.hotspot_path);
    let json_tmp = tmp_path(&artifacts.report_path);

    let result = (|| -> Result<(), AnalyticsError> {
        let mut png = BufWriter::new(File::create(&png_tmp)?);
        hotspot.write_png(&mut png)?;
        finish(png)?.sync_all()?;

        let mut json = BufWriter::new(File::create(&json_tmp)?);
        serde_json::to_writer_pretty(&mut json, report)?;
        finish(json)?.sync_all()?;

        std::fs::rename(&png_tmp, &artifacts.hotspot_path)?;
        std::fs::rename(&json_tmp, &artifacts.report_path)?;
        Ok(())
    })();

    if let Err(e) = result {
        let _ = std::fs::remove_file(&png_tmp);
        let _ = std::fs::remove_file(&json_tmp);
        return Err(e);
    }

    tracing::info!(
        session = %report.session,
        report = %artifacts.report_path.display(),
        "Focus report written"
    );
    Ok(artifacts)
}

/// Flushes the buffer and returns the inner writer. Dropping a `BufWriter` would swallow the error.
fn finish<W: Write>(writer: BufWriter<W>) -> io::Result<W> {
    writer.into_inner().map_err(io::IntoInnerError::into_error)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
