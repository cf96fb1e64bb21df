//! Session log row format: comma-delimited, header written once, one row per persisted sample.

use std::fs::File;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use super::SessionError;

pub const HEADER: [&str; 9] = [
    "Timestamp",
    "Left Eye X",
    "Left Eye Y",
    "Right Eye X",
    "Right Eye Y",
    "Left Speed",
    "Right Speed",
    "Average EAR",
    "Blink Count",
];

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SessionLogEntry {
    #[serde(rename = "Timestamp", with = "timestamp_format")]
    pub timestamp: NaiveDateTime,
    #[serde(rename = "Left Eye X")]
    pub left_x: i32,
    #[serde(rename = "Left Eye Y")]
    pub left_y: i32,
    #[serde(rename = "Right Eye X")]
    pub right_x: i32,
    #[serde(rename = "Right Eye Y")]
    pub right_y: i32,
    #[serde(rename = "Left Speed")]
    pub left_speed: f64,
    #[serde(rename = "Right Speed")]
    pub right_speed: f64,
    #[serde(rename = "Average EAR")]
    pub average_ear: f64,
    /// Cumulative blink count at the time of the sample.
    #[serde(rename = "Blink Count")]
    pub blink_count: u64,
}

mod timestamp_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(raw.trim(), TIMESTAMP_FORMAT).map_err(serde::de::Error::custom)
    }
}

pub(crate) fn writer_for(file: File) -> csv::Writer<File> {
    csv::WriterBuilder::new().has_headers(false).from_writer(file)
}

/// Reads a whole session log. Whitespace around fields and header names is ignored.
pub fn read_entries(path: impl AsRef<Path>) -> Result<Vec<SessionLogEntry>, SessionError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(SessionError::NotFound {
            path: path.display().to_string(),
        });
    }

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    if headers.iter().ne(HEADER.iter().copied()) {
        return Err(SessionError::BadHeader {
            path: path.display().to_string(),
            found: headers.iter().collect::<Vec<_>>().join(","),
        });
    }

    let mut entries = Vec::new();
    for row in reader.deserialize::<SessionLogEntry>() {
        match row {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or_default();
                return Err(SessionError::MalformedRow {
                    line,
                    message: e.to_string(),
                });
            }
        }
    }
    Ok(entries)
}
