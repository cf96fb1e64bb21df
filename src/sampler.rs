//! Frame-driven sampling loop: the only writer of the attention state and the session log.

use chrono::{DateTime, Local, SubsecRound};
use eye_metrics::{
    extract, AttentionScorer, BlinkDetector, BlinkUpdate, EyeMetrics, EyeSpeeds, FaceLandmarks,
    MotionEstimator,
};
use serde::Serialize;
use tokio::sync::broadcast::{self, error::TryRecvError};

use crate::config::PipelineConfig;
use crate::frames::FrameSource;
use crate::session::{ClosedSession, Session, SessionError, SessionLogEntry};
use crate::state::{AttentionPublisher, AttentionSnapshot};

/// Everything derived from one frame with a detected face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMetrics {
    pub captured_at: DateTime<Local>,
    pub eyes: EyeMetrics,
    pub speeds: EyeSpeeds,
    pub blink: BlinkUpdate,
    pub score: f64,
}

impl FrameMetrics {
    pub fn to_log_entry(&self) -> SessionLogEntry {
        SessionLogEntry {
            timestamp: self.captured_at.naive_local().trunc_subsecs(0),
            left_x: self.eyes.left_center.x,
            left_y: self.eyes.left_center.y,
            right_x: self.eyes.right_center.x,
            right_y: self.eyes.right_center.y,
            left_speed: self.speeds.left,
            right_speed: self.speeds.right,
            average_ear: self.eyes.average_ear,
            blink_count: self.blink.count,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingSummary {
    pub frames_seen: u64,
    pub frames_with_face: u64,
    pub rows_persisted: u64,
    pub blink_count: u64,
    pub stopped_by_signal: bool,
}

#[derive(Debug)]
pub struct SamplingOutcome {
    pub session: ClosedSession,
    pub summary: SamplingSummary,
}

pub struct SamplingLoop {
    scorer: AttentionScorer,
    persist_interval: chrono::Duration,
    blink: BlinkDetector,
    motion: MotionEstimator,
    publisher: AttentionPublisher,
    last_persisted_at: Option<DateTime<Local>>,
    last_face: Option<FrameMetrics>,
    logged_blinks: u64,
    summary: SamplingSummary,
}

impl SamplingLoop {
    pub fn new(config: &PipelineConfig, publisher: AttentionPublisher) -> Self {
        Self {
            scorer: config.scorer,
            persist_interval: chrono::Duration::from_std(config.persist_interval)
                .unwrap_or_else(|_| chrono::Duration::seconds(1)),
            blink: BlinkDetector::new(config.blink_low_threshold, config.blink_high_threshold),
            motion: MotionEstimator::new(),
            publisher,
            last_persisted_at: None,
            last_face: None,
            logged_blinks: 0,
            summary: SamplingSummary::default(),
        }
    }

    /// Runs the extractor, blink detector, motion estimator and scorer for one face, then
    /// publishes the new snapshot as a single replacement.
    pub fn process_face(&mut self, face: &FaceLandmarks, captured_at: DateTime<Local>) -> FrameMetrics {
        let eyes = extract(face);
        let blink = self.blink.update(eyes.left_ear, eyes.right_ear);
        if blink.blink_completed {
            tracing::debug!(total = blink.count, at = %captured_at.format("%H:%M:%S"), "Blink detected");
        }

        let t = captured_at.timestamp_micros() as f64 / 1_000_000.0;
        let speeds = self.motion.update(eyes.left_center, eyes.right_center, t);
        let speed = speeds.average();
        let score = self.scorer.score(eyes.average_ear, speed);

        self.summary.frames_with_face += 1;
        self.summary.blink_count = blink.count;
        self.publisher.publish(AttentionSnapshot {
            ear: eyes.average_ear,
            speed,
            score,
            blink_count: blink.count,
            captured_at: Some(captured_at),
            sequence: self.summary.frames_with_face,
        });

        FrameMetrics {
            captured_at,
            eyes,
            speeds,
            blink,
            score,
        }
    }

    /// True when at least one persist interval has passed since the last written row.
    ///
    /// The first face frame only starts the timer: frame sources may replay recordings whose
    /// capture times have nothing to do with the wall clock the session was opened at.
    fn persist_due(&mut self, at: DateTime<Local>) -> bool {
        let Some(last) = self.last_persisted_at else {
            self.last_persisted_at = Some(at);
            return false;
        };
        let due = at - last >= self.persist_interval;
        if due {
            self.last_persisted_at = Some(at);
        }
        due
    }

    fn persist(&mut self, session: &mut Session, metrics: &FrameMetrics) -> Result<(), SessionError> {
        session.append(&metrics.to_log_entry())?;
        self.logged_blinks = metrics.blink.count;
        self.summary.rows_persisted += 1;
        Ok(())
    }

    /// Drives the loop until the source is exhausted or the stop signal fires.
    ///
    /// Blocking: frame sources may wait on hardware, so call this from a blocking worker
    /// (see [`SamplingLoop::spawn`]).
    pub fn run<S: FrameSource>(
        mut self,
        mut source: S,
        mut session: Session,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<SamplingOutcome, SessionError> {
        tracing::info!(
            session = %session.name(),
            opened_at = %session.started_at().format("%H:%M:%S"),
            "Sampling loop started"
        );

        loop {
            if !matches!(shutdown_rx.try_recv(), Err(TryRecvError::Empty)) {
                self.summary.stopped_by_signal = true;
                tracing::info!("Stop signal received, ending sampling loop");
                break;
            }

            let Some(frame) = source.next_frame() else {
                tracing::info!("Frame source exhausted");
                break;
            };
            self.summary.frames_seen += 1;

            let Some(face) = frame.face else {
                continue;
            };

            let metrics = self.process_face(&face, frame.captured_at);
            self.last_face = Some(metrics);
            if self.persist_due(frame.captured_at) {
                self.persist(&mut session, &metrics)?;
            }
        }

        // 最后一次写入之后的眨眼补写一行，日志末行与实时计数一致
        if let Some(last) = self.last_face.filter(|m| m.blink.count > self.logged_blinks) {
            self.persist(&mut session, &last)?;
        }

        let summary = self.summary;
        tracing::info!(
            frames = summary.frames_seen,
            with_face = summary.frames_with_face,
            rows = summary.rows_persisted,
            blinks = summary.blink_count,
            "Sampling loop finished"
        );
        Ok(SamplingOutcome {
            session: session.close()?,
            summary,
        })
    }

    pub fn spawn<S>(
        self,
        source: S,
        session: Session,
        shutdown_rx: broadcast::Receiver<()>,
    ) -> tokio::task::JoinHandle<Result<SamplingOutcome, SessionError>>
    where
        S: FrameSource + 'static,
    {
        tokio::task::spawn_blocking(move || self.run(source, session, shutdown_rx))
    }
}
