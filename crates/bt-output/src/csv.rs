//! CSV output backend.
//!
//! Creates three files in the configured output directory:
//! - `trajectory.csv`
//! - `episodes.csv`
//! - `metrics.csv`
//!
//! Missing optional values are written as empty fields.

use std::fs::File;
use std::path::Path;

use csv::Writer;

use crate::writer::OutputWriter;
use crate::{EpisodeRow, MetricRow, OutputResult, TrajectoryRow};

pub const TRAJECTORY_HEADER: [&str; 10] = [
    "episode", "time_secs", "event", "bus", "route", "stop", "stop_index", "status", "load", "location_m",
];
pub const EPISODE_HEADER: [&str; 7] = [
    "episode", "seed", "completed_trips", "truncated_trips", "holds", "total_hold_secs", "warnings",
];
pub const METRIC_HEADER: [&str; 9] = [
    "episode", "metric", "route", "aggregate", "stop", "bucket", "mean", "std", "count",
];

/// Writes simulation output to three CSV files.
pub struct CsvWriter {
    trajectory: Writer<File>,
    episodes:   Writer<File>,
    metrics:    Writer<File>,
    finished:   bool,
}

impl CsvWriter {
    /// Create `dir` if needed, open the three CSV files in it and write the
    /// header rows.
    pub fn new(dir: &Path) -> OutputResult<Self> {
        std::fs::create_dir_all(dir)?;

        let mut trajectory = Writer::from_path(dir.join("trajectory.csv"))?;
        trajectory.write_record(TRAJECTORY_HEADER)?;

        let mut episodes = Writer::from_path(dir.join("episodes.csv"))?;
        episodes.write_record(EPISODE_HEADER)?;

        let mut metrics = Writer::from_path(dir.join("metrics.csv"))?;
        metrics.write_record(METRIC_HEADER)?;

        Ok(Self { trajectory, episodes, metrics, finished: false })
    }
}

fn opt<T: ToString>(v: Option<T>) -> String {
    v.map(|v| v.to_string()).unwrap_or_default()
}

impl OutputWriter for CsvWriter {
    fn write_trajectory(&mut self, rows: &[TrajectoryRow]) -> OutputResult<()> {
        for row in rows {
            self.trajectory.write_record(&[
                row.episode.to_string(),
                row.time_secs.to_string(),
                row.event.to_owned(),
                row.bus.to_string(),
                row.route.to_string(),
                opt(row.stop),
                opt(row.stop_index),
                row.status.to_owned(),
                row.load.to_string(),
                row.location_m.to_string(),
            ])?;
        }
        Ok(())
    }

    fn write_episode(&mut self, row: &EpisodeRow) -> OutputResult<()> {
        self.episodes.write_record(&[
            row.episode.to_string(),
            row.seed.to_string(),
            row.completed_trips.to_string(),
            row.truncated_trips.to_string(),
            row.holds.to_string(),
            row.total_hold_secs.to_string(),
            row.warnings.to_string(),
        ])?;
        Ok(())
    }

    fn write_metrics(&mut self, rows: &[MetricRow]) -> OutputResult<()> {
        for row in rows {
            self.metrics.write_record(&[
                row.episode.to_string(),
                row.metric.to_owned(),
                row.route.to_string(),
                row.aggregate.to_owned(),
                opt(row.stop),
                opt(row.bucket),
                row.mean.to_string(),
                row.std.to_string(),
                row.count.to_string(),
            ])?;
        }
        Ok(())
    }

    fn finish(&mut self) -> OutputResult<()> {
        if self.finished {
            return Ok(());
        }
        self.finished = true;
        self.trajectory.flush()?;
        self.episodes.flush()?;
        self.metrics.flush()?;
        Ok(())
    }
}
