//! Frame sources: the boundary with the external landmark detector.
//!
//! The core only needs, per frame, a capture time and zero-or-one face given as two 6-point
//! eye shapes in pixel coordinates. Camera capture and the detection model live outside this
//! crate; `ReplayFrameSource` consumes their recorded output.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Local};
use eye_metrics::{EyeShape, FaceLandmarks, Point};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    pub captured_at: DateTime<Local>,
    pub face: Option<FaceLandmarks>,
}

/// Yields frames one at a time; `None` means the source is exhausted or disconnected.
///
/// Implementations may block (a camera waits for the next exposure), so the sampling loop runs
/// them on a blocking worker.
pub trait FrameSource: Send {
    fn next_frame(&mut self) -> Option<Frame>;
}

#[derive(Debug, Error)]
pub enum FrameSourceError {
    #[error("failed to open frame recording {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// In-memory source, mostly for tests and replays that are already decoded.
#[derive(Debug, Default)]
pub struct VecFrameSource {
    frames: VecDeque<Frame>,
}

impl VecFrameSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

impl FrameSource for VecFrameSource {
    fn next_frame(&mut self) -> Option<Frame> {
        self.frames.pop_front()
    }
}

/// Reads a JSON-lines recording, one serialized [`Frame`] per line.
pub struct ReplayFrameSource {
    lines: Lines<BufReader<File>>,
    line_no: usize,
}

impl ReplayFrameSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, FrameSourceError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| FrameSourceError::Open {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
            line_no: 0,
        })
    }
}

impl FrameSource for ReplayFrameSource {
    fn next_frame(&mut self) -> Option<Frame> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    tracing::warn!(error = %e, line = self.line_no + 1, "Frame recording unreadable, stopping replay");
                    return None;
                }
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Frame>(&line) {
                Ok(frame) => return Some(frame),
                Err(e) => {
                    tracing::warn!(error = %e, line = self.line_no, "Skipping malformed frame record");
                }
            }
        }
    }
}

/// Builds a 6-point eye whose aspect ratio is exactly `ear`.
pub fn eye_with_ratio(center: Point, width: f64, ear: f64) -> EyeShape {
    // EAR = 4h / 2w，即 h = ear * w / 2
    let h = ear * width / 2.0;
    let third = width / 6.0;
    EyeShape::new([
        Point::new(center.x - width / 2.0, center.y),
        Point::new(center.x - third, center.y - h),
        Point::new(center.x + third, center.y - h),
        Point::new(center.x + width / 2.0, center.y),
        Point::new(center.x + third, center.y + h),
        Point::new(center.x - third, center.y + h),
    ])
}

#[derive(Debug, Clone, Copy)]
pub struct SyntheticProfile {
    pub frames: u64,
    pub fps: f64,
    /// Sleep between frames so the source behaves like a live camera.
    pub realtime: bool,
    pub seed: u64,
}

/// A simulated subject: steady open eyes with noise, a blink every few seconds, a slow gaze
/// drift, and the occasional frame where the face is lost.
pub struct SyntheticFrameSource {
    profile: SyntheticProfile,
    rng: StdRng,
    started_at: DateTime<Local>,
    emitted: u64,
    gaze: Point,
    blink_frames_left: u32,
    frames_to_next_blink: u32,
}

const EYE_WIDTH: f64 = 60.0;
const EYE_SEPARATION: f64 = 200.0;

impl SyntheticFrameSource {
    pub fn new(profile: SyntheticProfile) -> Self {
        let mut rng = StdRng::seed_from_u64(profile.seed);
        let frames_to_next_blink = next_blink_gap(&mut rng, profile.fps);
        Self {
            profile,
            rng,
            started_at: Local::now(),
            emitted: 0,
            gaze: Point::new(960.0, 540.0),
            blink_frames_left: 0,
            frames_to_next_blink,
        }
    }

    fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.profile.fps.max(1.0))
    }

    fn next_face(&mut self) -> FaceLandmarks {
        self.gaze.x = (self.gaze.x + self.rng.gen_range(-4.0..4.0)).clamp(300.0, 1620.0);
        self.gaze.y = (self.gaze.y + self.rng.gen_range(-3.0..3.0)).clamp(200.0, 880.0);

        let ear = if self.blink_frames_left > 0 {
            self.blink_frames_left -= 1;
            self.rng.gen_range(0.08..0.15)
        } else {
            self.frames_to_next_blink = self.frames_to_next_blink.saturating_sub(1);
            if self.frames_to_next_blink == 0 {
                self.blink_frames_left = ((self.profile.fps * 0.15).ceil() as u32).max(1);
                self.frames_to_next_blink = next_blink_gap(&mut self.rng, self.profile.fps);
            }
            self.rng.gen_range(0.26..0.32)
        };

        let half = EYE_SEPARATION / 2.0;
        FaceLandmarks {
            left: eye_with_ratio(Point::new(self.gaze.x + half, self.gaze.y), EYE_WIDTH, ear),
            right: eye_with_ratio(Point::new(self.gaze.x - half, self.gaze.y), EYE_WIDTH, ear),
        }
    }
}

fn next_blink_gap(rng: &mut StdRng, fps: f64) -> u32 {
    (rng.gen_range(2.5..5.0) * fps.max(1.0)).round() as u32
}

impl FrameSource for SyntheticFrameSource {
    fn next_frame(&mut self) -> Option<Frame> {
        if self.emitted >= self.profile.frames {
            return None;
        }
        if self.profile.realtime && self.emitted > 0 {
            std::thread::sleep(self.frame_interval());
        }

        let offset = self.frame_interval().mul_f64(self.emitted as f64);
        let captured_at = self.started_at
            + chrono::Duration::from_std(offset).unwrap_or_else(|_| chrono::Duration::zero());
        self.emitted += 1;

        let face = if self.rng.gen_bool(0.01) {
            None
        } else {
            Some(self.next_face())
        };
        Some(Frame { captured_at, face })
    }
}
