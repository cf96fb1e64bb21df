//! Live dashboard feed: a fixed-period observer of the attention state.
//!
//! Runs on its own timer, independent of the frame rate. It only reads snapshots; the eased
//! display values are its own state and never flow back into the shared attention state.

use std::time::Duration;

use eye_metrics::{smooth_change, AttentionScorer};
use futures::Stream;
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::config::PipelineConfig;
use crate::state::{AttentionReader, AttentionSnapshot};

/// Focus scores above this are shown as "focused"; also drawn as the report threshold line.
pub const FOCUS_THRESHOLD: f64 = 0.5;

const BAR_WIDTH: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardFrame {
    /// Eased EAR bar level in [0, 1].
    pub ear_level: f64,
    /// Eased speed bar level in [0, 1].
    pub speed_level: f64,
    /// Composite score from the raw values; not eased.
    pub focus_score: f64,
    /// Raw EAR below the alert reference.
    pub ear_alert: bool,
    /// Raw speed above half the speed ceiling.
    pub speed_alert: bool,
    pub focus_ok: bool,
    pub blink_count: u64,
    pub sequence: u64,
}

impl DashboardFrame {
    /// One-line text rendering, e.g. `EAR [#########-----------] 0.45 ! | ...`.
    pub fn render_bars(&self) -> String {
        format!(
            "EAR {} {:.2}{} | Speed {} {:.2}{} | Focus {} {:.2}{} | Blinks {}",
            bar(self.ear_level),
            self.ear_level,
            if self.ear_alert { " !" } else { "" },
            bar(self.speed_level),
            self.speed_level,
            if self.speed_alert { " !" } else { "" },
            bar(self.focus_score),
            self.focus_score,
            if self.focus_ok { "" } else { " !" },
            self.blink_count,
        )
    }
}

fn bar(level: f64) -> String {
    let filled = ((level.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize).min(BAR_WIDTH);
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

pub struct DashboardFeed {
    reader: AttentionReader,
    scorer: AttentionScorer,
    step: f64,
    period: Duration,
    displayed_ear: f64,
    displayed_speed: f64,
}

impl DashboardFeed {
    pub fn new(reader: AttentionReader, config: &PipelineConfig) -> Self {
        Self {
            reader,
            scorer: config.scorer,
            step: config.easing_step,
            period: config.dashboard_period,
            // 初始显示值取中点，首个 tick 从中间缓动
            displayed_ear: 0.5,
            displayed_speed: 0.5,
        }
    }

    /// Reads the latest snapshot and advances the display by one tick.
    pub fn tick(&mut self) -> DashboardFrame {
        let snapshot = self.reader.latest();
        self.render(&snapshot)
    }

    pub fn render(&mut self, snapshot: &AttentionSnapshot) -> DashboardFrame {
        let ear_target = self.scorer.normalized_ear(snapshot.ear);
        let speed_target = self.scorer.normalized_speed(snapshot.speed);
        self.displayed_ear = smooth_change(self.displayed_ear, ear_target, self.step);
        self.displayed_speed = smooth_change(self.displayed_speed, speed_target, self.step);

        let focus_score = self.scorer.score(snapshot.ear, snapshot.speed);
        DashboardFrame {
            ear_level: self.displayed_ear,
            speed_level: self.displayed_speed,
            focus_score,
            ear_alert: snapshot.ear < self.scorer.ear_reference,
            speed_alert: snapshot.speed > self.scorer.speed_ceiling / 2.0,
            focus_ok: focus_score > FOCUS_THRESHOLD,
            blink_count: snapshot.blink_count,
            sequence: snapshot.sequence,
        }
    }

    /// Emits one frame per period until shutdown. Ticks missed by a slow consumer are skipped
    /// rather than replayed; the sampling loop is never blocked by this stream.
    pub fn into_stream(
        self,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> impl Stream<Item = DashboardFrame> {
        let mut feed = self;
        async_stream::stream! {
            let mut interval = tokio::time::interval(feed.period.max(Duration::from_millis(1)));
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        yield feed.tick();
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }
        }
    }
}
