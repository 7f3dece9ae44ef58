//! CSV session log.
//!
//! One daemon run produces one session log: a header row followed by one
//! row per captured frame, `timestamp,red_x,red_y,green_x,green_y`, all
//! integer fields. Dropped-out markers (empty mask) are logged as `(0, 0)`.
//!
//! `SessionLogReader` parses a finished log back, validating header and
//! row shape; `summarize` computes the figures the `track_stats` tool
//! reports.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};

use crate::clock::RateEstimator;
use crate::track::TrackSample;
use crate::Ticks;

/// Column order of the session log.
pub const SESSION_LOG_HEADER: [&str; 5] = ["timestamp", "red_x", "red_y", "green_x", "green_y"];

/// One session log row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRecord {
    pub timestamp: Ticks,
    pub red_x: i64,
    pub red_y: i64,
    pub green_x: i64,
    pub green_y: i64,
}

impl TrackRecord {
    /// Convert a tracking sample to a log row: coordinates truncate to
    /// integers, missing centroids become `(0, 0)`.
    pub fn from_sample(sample: &TrackSample) -> Self {
        let (red_x, red_y) = sample
            .red
            .map(|c| (c.x as i64, c.y as i64))
            .unwrap_or((0, 0));
        let (green_x, green_y) = sample
            .green
            .map(|c| (c.x as i64, c.y as i64))
            .unwrap_or((0, 0));
        Self {
            timestamp: sample.ticks,
            red_x,
            red_y,
            green_x,
            green_y,
        }
    }

    /// True when the red marker was a dropout on this row.
    pub fn red_dropped(&self) -> bool {
        self.red_x == 0 && self.red_y == 0
    }

    /// True when the green marker was a dropout on this row.
    pub fn green_dropped(&self) -> bool {
        self.green_x == 0 && self.green_y == 0
    }
}

/// Appends session rows to a CSV file.
pub struct SessionLogWriter {
    writer: csv::Writer<File>,
    path: PathBuf,
    rows: u64,
}

impl SessionLogWriter {
    /// Create the log file and write the header row.
    pub fn create(path: &Path) -> Result<Self> {
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_path(path)
            .with_context(|| format!("create session log {}", path.display()))?;
        writer
            .write_record(SESSION_LOG_HEADER)
            .context("write session log header")?;
        Ok(Self {
            writer,
            path: path.to_path_buf(),
            rows: 0,
        })
    }

    /// Append one row.
    pub fn append(&mut self, record: &TrackRecord) -> Result<()> {
        self.writer
            .serialize(record)
            .with_context(|| format!("append row {} to session log", self.rows + 1))?;
        self.rows += 1;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush().context("flush session log")
    }

    pub fn rows(&self) -> u64 {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Parses finished session logs.
pub struct SessionLogReader;

impl SessionLogReader {
    pub fn read_all(path: &Path) -> Result<Vec<TrackRecord>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(path)
            .with_context(|| format!("open session log {}", path.display()))?;

        let headers = reader.headers().context("read session log header")?;
        if headers.iter().ne(SESSION_LOG_HEADER) {
            return Err(anyhow!(
                "unexpected session log header: {:?} (expected {:?})",
                headers,
                SESSION_LOG_HEADER
            ));
        }

        let mut records = Vec::new();
        for (i, row) in reader.deserialize::<TrackRecord>().enumerate() {
            let record = row.with_context(|| format!("parse session log row {}", i + 1))?;
            records.push(record);
        }
        Ok(records)
    }
}

/// Coordinate extents of a marker over a session, dropouts excluded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Extent {
    pub min_x: i64,
    pub max_x: i64,
    pub min_y: i64,
    pub max_y: i64,
}

impl Extent {
    fn fold(extent: Option<Extent>, x: i64, y: i64) -> Option<Extent> {
        Some(match extent {
            None => Extent {
                min_x: x,
                max_x: x,
                min_y: y,
                max_y: y,
            },
            Some(e) => Extent {
                min_x: e.min_x.min(x),
                max_x: e.max_x.max(x),
                min_y: e.min_y.min(y),
                max_y: e.max_y.max(y),
            },
        })
    }
}

/// Figures reported by `track_stats`.
#[derive(Clone, Debug, Serialize)]
pub struct SessionSummary {
    pub rows: u64,
    pub duration_secs: f64,
    pub avg_fps: Option<f64>,
    pub red_dropouts: u64,
    pub green_dropouts: u64,
    pub red_extent: Option<Extent>,
    pub green_extent: Option<Extent>,
}

/// Summarize a session: row count, wall time spanned by the service
/// timestamps, average frame rate, and per-marker dropout counts and
/// coordinate extents.
pub fn summarize(records: &[TrackRecord], ticks_per_second: u32) -> SessionSummary {
    let mut rate = RateEstimator::new(ticks_per_second);
    let mut red_dropouts = 0u64;
    let mut green_dropouts = 0u64;
    let mut red_extent = None;
    let mut green_extent = None;

    for record in records {
        rate.observe(record.timestamp);
        if record.red_dropped() {
            red_dropouts += 1;
        } else {
            red_extent = Extent::fold(red_extent, record.red_x, record.red_y);
        }
        if record.green_dropped() {
            green_dropouts += 1;
        } else {
            green_extent = Extent::fold(green_extent, record.green_x, record.green_y);
        }
    }

    let duration_secs = match (records.first(), records.last()) {
        (Some(first), Some(last)) if records.len() > 1 => {
            (last.timestamp - first.timestamp) as f64 / ticks_per_second as f64
        }
        _ => 0.0,
    };

    SessionSummary {
        rows: records.len() as u64,
        duration_secs,
        avg_fps: rate.avg_fps(),
        red_dropouts,
        green_dropouts,
        red_extent,
        green_extent,
    }
}
