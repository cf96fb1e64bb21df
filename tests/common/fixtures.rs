use std::path::Path;

use chrono::{DateTime, Duration, Local, NaiveDateTime, TimeZone};

use eye_metrics::{FaceLandmarks, Point};
use focus_monitor::frames::{eye_with_ratio, Frame};
use focus_monitor::session::{ClosedSession, Session, SessionLogEntry};

pub fn session_start() -> DateTime<Local> {
    Local
        .with_ymd_and_hms(2024, 11, 28, 21, 0, 0)
        .single()
        .expect("unambiguous local time")
}

/// Both eyes at the given EAR, 200 px apart, centred on `(x, y)`.
pub fn face_at(ear: f64, x: f64, y: f64) -> FaceLandmarks {
    FaceLandmarks {
        left: eye_with_ratio(Point::new(x + 100.0, y), 60.0, ear),
        right: eye_with_ratio(Point::new(x - 100.0, y), 60.0, ear),
    }
}

pub fn frame_at(offset_ms: i64, face: Option<FaceLandmarks>) -> Frame {
    Frame {
        captured_at: session_start() + Duration::milliseconds(offset_ms),
        face,
    }
}

/// A still subject at `fps` for `seconds`, blinking (two closed frames) at each listed second.
pub fn blinking_subject(fps: u32, seconds: u32, blink_at_secs: &[u32]) -> Vec<Frame> {
    let step_ms = 1_000 / fps as i64;
    (0..(fps * seconds) as i64)
        .map(|i| {
            let ms = i * step_ms;
            let closed = blink_at_secs.iter().any(|&s| {
                let start = s as i64 * 1_000;
                ms >= start && ms < start + 2 * step_ms
            });
            let ear = if closed { 0.12 } else { 0.30 };
            frame_at(ms, Some(face_at(ear, 960.0, 540.0)))
        })
        .collect()
}

pub fn log_entry(at: NaiveDateTime, ear: f64, speed: f64, blinks: u64) -> SessionLogEntry {
    SessionLogEntry {
        timestamp: at,
        left_x: 1060,
        left_y: 540,
        right_x: 860,
        right_y: 540,
        left_speed: speed,
        right_speed: speed,
        average_ear: ear,
        blink_count: blinks,
    }
}

pub fn write_session(dir: &Path, entries: &[SessionLogEntry]) -> ClosedSession {
    let mut session = Session::create(dir, session_start()).expect("create session");
    for entry in entries {
        session.append(entry).expect("append");
    }
    session.close().expect("close")
}
