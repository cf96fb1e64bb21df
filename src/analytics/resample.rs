//! Fixed-window time resampling.
//!
//! Windows are aligned to midnight of the first sample's day, so a 180 s window always starts on
//! a multiple of three minutes of the clock. Every window between the first and the last sample is
//! emitted, including ones with no samples.

use std::time::Duration;

use chrono::NaiveDateTime;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimePoint {
    pub at: NaiveDateTime,
    pub value: f64,
}

impl TimePoint {
    pub fn new(at: NaiveDateTime, value: f64) -> Self {
        Self { at, value }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowMean {
    pub start: NaiveDateTime,
    /// `None` for a window without samples.
    pub mean: Option<f64>,
    pub samples: usize,
}

/// Per-window mean of `points`. NaN samples are ignored.
pub fn resample_mean(points: &[TimePoint], window: Duration) -> Vec<WindowMean> {
    let Some(first) = points.iter().map(|p| p.at).min() else {
        return Vec::new();
    };
    let origin = first.date().and_hms_opt(0, 0, 0).unwrap_or(first);
    let window_secs = window.as_secs().max(1) as i64;
    let bucket_of = |at: NaiveDateTime| (at - origin).num_seconds().div_euclid(window_secs);

    let first_bucket = bucket_of(first);
    let last_bucket = points
        .iter()
        .map(|p| bucket_of(p.at))
        .max()
        .unwrap_or(first_bucket);

    let len = (last_bucket - first_bucket + 1) as usize;
    let mut sums = vec![0.0f64; len];
    let mut counts = vec![0usize; len];
    for p in points {
        if p.value.is_nan() {
            continue;
        }
        let idx = (bucket_of(p.at) - first_bucket) as usize;
        sums[idx] += p.value;
        counts[idx] += 1;
    }

    sums.into_iter()
        .zip(counts)
        .enumerate()
        .map(|(i, (sum, n))| WindowMean {
            start: origin + chrono::Duration::seconds((first_bucket + i as i64) * window_secs),
            mean: (n > 0).then(|| sum / n as f64),
            samples: n,
        })
        .collect()
}

/// Mean over all non-NaN values, `None` when there are none.
pub fn overall_mean(points: &[TimePoint]) -> Option<f64> {
    let (sum, n) = points
        .iter()
        .filter(|p| !p.value.is_nan())
        .fold((0.0, 0usize), |(s, n), p| (s + p.value, n + 1));
    (n > 0).then(|| sum / n as f64)
}
