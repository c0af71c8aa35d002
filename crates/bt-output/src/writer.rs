//! The `OutputWriter` trait implemented by all backend writers.

use bt_sim::EpisodeOutput;

use crate::{EpisodeRow, MetricRow, OutputResult, TrajectoryRow, metric_rows};

/// Trait implemented by the CSV and SQLite writers.
///
/// Rows from several episodes may be interleaved; every row carries its
/// episode number.
pub trait OutputWriter {
    /// Write a batch of trajectory rows.
    fn write_trajectory(&mut self, rows: &[TrajectoryRow]) -> OutputResult<()>;

    /// Write one episode summary row.
    fn write_episode(&mut self, row: &EpisodeRow) -> OutputResult<()>;

    /// Write a batch of metric rows.
    fn write_metrics(&mut self, rows: &[MetricRow]) -> OutputResult<()>;

    /// Flush and close all underlying handles.
    ///
    /// Idempotent: safe to call more than once.
    fn finish(&mut self) -> OutputResult<()>;
}

/// Write everything a finished episode produced: its trajectory (when it
/// was recorded), its summary row, and its metrics.
pub fn write_episode_output<W: OutputWriter + ?Sized>(writer: &mut W, output: &EpisodeOutput) -> OutputResult<()> {
    if let Some(trajectory) = &output.trajectory {
        let rows: Vec<TrajectoryRow> = trajectory
            .iter()
            .map(|r| TrajectoryRow::from_record(output.episode, r))
            .collect();
        writer.write_trajectory(&rows)?;
    }
    writer.write_episode(&EpisodeRow::from_output(output))?;
    writer.write_metrics(&metric_rows(output.episode, &output.metrics))
}
