//! `EpisodeOutputObserver<W>` — bridges `SimObserver` to an `OutputWriter`.

use bt_core::{MetricName, SimConfig, SimTime};
use bt_entity::Passenger;
use bt_sim::{EventRecord, HoldRecord, MetricsCollector, SimObserver, TripRecord, VisitRecord};
use tracing::debug;

use crate::writer::OutputWriter;
use crate::{EpisodeRow, OutputError, OutputResult, TrajectoryRow, metric_rows};

/// Trajectory rows buffered before a batch write.
const BATCH_ROWS: usize = 4096;

/// A [`SimObserver`] that streams trajectories and writes per-episode
/// totals and metrics to any [`OutputWriter`] backend.
///
/// It keeps its own metrics collector, so the rows it writes match the
/// `EpisodeOutput` the simulator returns.  It spans episodes: pass one
/// observer to `EpisodeRunner::run_observed` and every episode lands in
/// the same files.
///
/// Errors from the writer are stored internally because `SimObserver` methods
/// have no return value.  Check them with [`take_error`][Self::take_error],
/// or call [`finish`][Self::finish], which reports the first one.
pub struct EpisodeOutputObserver<W: OutputWriter> {
    writer:      W,
    trajectory:  bool,
    metric_set:  Vec<MetricName>,
    bucket_secs: u64,
    metrics:     MetricsCollector,
    buffer:      Vec<TrajectoryRow>,
    totals:      EpisodeRow,
    last_error:  Option<OutputError>,
}

impl<W: OutputWriter> EpisodeOutputObserver<W> {
    /// Create an observer backed by `writer`.  `config` selects the metrics
    /// and whether the trajectory is written.
    pub fn new(writer: W, config: &SimConfig) -> Self {
        // An invalid metric list is rejected when the simulator is built.
        let metric_set = config.metrics().unwrap_or_default();
        Self {
            writer,
            trajectory:  config.record_trajectory,
            metrics:     MetricsCollector::new(&metric_set, config.metric_bucket_secs),
            metric_set,
            bucket_secs: config.metric_bucket_secs,
            buffer:      Vec::new(),
            totals:      EpisodeRow::default(),
            last_error:  None,
        }
    }

    /// Take the stored write error (if any).
    ///
    /// Returns `None` if all writes succeeded.
    pub fn take_error(&mut self) -> Option<OutputError> {
        self.last_error.take()
    }

    /// Report the first stored error, else flush and close the writer.
    pub fn finish(&mut self) -> OutputResult<()> {
        if let Some(e) = self.last_error.take() {
            return Err(e);
        }
        self.writer.finish()
    }

    /// Unwrap the inner writer (e.g. to inspect files after the run).
    pub fn into_writer(self) -> W {
        self.writer
    }

    fn flush_trajectory(&mut self) {
        if self.buffer.is_empty() {
            return;
        }
        let result = self.writer.write_trajectory(&self.buffer);
        self.buffer.clear();
        self.store_err(result);
    }

    fn store_err(&mut self, result: OutputResult<()>) {
        if let Err(e) = result {
            // Keep only the first error.
            if self.last_error.is_none() {
                self.last_error = Some(e);
            }
        }
    }
}

impl<W: OutputWriter> SimObserver for EpisodeOutputObserver<W> {
    fn on_episode_start(&mut self, episode: u32, seed: u64) {
        self.metrics = MetricsCollector::new(&self.metric_set, self.bucket_secs);
        self.buffer.clear();
        self.totals = EpisodeRow { episode, seed, ..EpisodeRow::default() };
    }

    fn on_event(&mut self, record: &EventRecord) {
        if !self.trajectory {
            return;
        }
        self.buffer.push(TrajectoryRow::from_record(self.totals.episode, record));
        if self.buffer.len() >= BATCH_ROWS {
            self.flush_trajectory();
        }
    }

    fn on_stop_visit(&mut self, visit: &VisitRecord) {
        self.metrics.on_stop_visit(visit);
    }

    fn on_hold(&mut self, hold: &HoldRecord) {
        self.metrics.on_hold(hold);
        self.totals.holds += 1;
        self.totals.total_hold_secs += hold.applied;
        if hold.clamped {
            self.totals.warnings += 1;
        }
    }

    fn on_pax_boarded(&mut self, pax: &Passenger) {
        self.metrics.on_pax_boarded(pax);
    }

    fn on_pax_alighted(&mut self, pax: &Passenger) {
        self.metrics.on_pax_alighted(pax);
    }

    fn on_trip_end(&mut self, trip: &TripRecord) {
        self.metrics.on_trip_end(trip);
        if trip.completed {
            self.totals.completed_trips += 1;
        } else {
            self.totals.truncated_trips += 1;
        }
    }

    fn on_episode_end(&mut self, horizon: SimTime) {
        self.flush_trajectory();

        let totals = self.totals;
        let result = self.writer.write_episode(&totals);
        self.store_err(result);

        let rows = metric_rows(totals.episode, &self.metrics.finalize());
        let result = self.writer.write_metrics(&rows);
        self.store_err(result);

        debug!(episode = totals.episode, %horizon, metric_rows = rows.len(), "episode output written");
    }
}
