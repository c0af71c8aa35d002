//! Plain data row types written by output backends.

use bt_core::StopId;
use bt_sim::{EpisodeMetrics, EpisodeOutput, EventRecord};

/// One processed event of one episode.
#[derive(Debug, Clone, PartialEq)]
pub struct TrajectoryRow {
    pub episode:    u32,
    pub time_secs:  f64,
    pub event:      &'static str,
    pub bus:        u32,
    pub route:      u16,
    /// Stop the bus is at, if any.
    pub stop:       Option<u32>,
    pub stop_index: Option<u16>,
    /// Bus status after the event; empty when unknown.
    pub status:     &'static str,
    pub load:       u32,
    pub location_m: f64,
}

impl TrajectoryRow {
    pub fn from_record(episode: u32, r: &EventRecord) -> Self {
        Self {
            episode,
            time_secs:  r.time.as_secs_f64(),
            event:      r.event,
            bus:        r.bus.0,
            route:      r.route.0,
            stop:       r.stop.map(|s| s.0),
            stop_index: r.stop_index,
            status:     r.status.map_or("", |s| s.as_str()),
            load:       r.load,
            location_m: r.location_m,
        }
    }
}

/// Totals of one episode.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EpisodeRow {
    pub episode:         u32,
    pub seed:            u64,
    pub completed_trips: u32,
    pub truncated_trips: u32,
    /// Control-point decisions, including zero holds.
    pub holds:           u32,
    pub total_hold_secs: f64,
    pub warnings:        u32,
}

impl EpisodeRow {
    pub fn from_output(out: &EpisodeOutput) -> Self {
        Self {
            episode:         out.episode,
            seed:            out.seed,
            completed_trips: out.completed_trips,
            truncated_trips: out.truncated_trips,
            holds:           out.holds.len() as u32,
            total_hold_secs: out.holds.iter().map(|h| h.applied).sum(),
            warnings:        out.warnings,
        }
    }
}

/// One metric summary.
///
/// Episode-level rows have no `stop` and no `bucket`; per-bucket rows have
/// a `bucket` and, except for route-level metrics such as `trip_time`, a
/// `stop`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricRow {
    pub episode:   u32,
    pub metric:    &'static str,
    pub route:     u16,
    pub aggregate: &'static str,
    pub stop:      Option<u32>,
    pub bucket:    Option<u32>,
    pub mean:      f64,
    pub std:       f64,
    pub count:     u64,
}

/// Flatten an episode's metrics: summaries first, then time buckets, each
/// in key order.
pub fn metric_rows(episode: u32, metrics: &EpisodeMetrics) -> Vec<MetricRow> {
    let summaries = metrics.summaries.iter().map(|(k, s)| MetricRow {
        episode,
        metric:    k.metric.as_str(),
        route:     k.route.0,
        aggregate: k.aggregate.as_str(),
        stop:      None,
        bucket:    None,
        mean:      s.mean,
        std:       s.std,
        count:     s.count,
    });
    let buckets = metrics.per_bucket.iter().map(|(k, s)| MetricRow {
        episode,
        metric:    k.metric.as_str(),
        route:     k.route.0,
        aggregate: "per_event",
        stop:      (k.stop != StopId::INVALID).then_some(k.stop.0),
        bucket:    Some(k.bucket),
        mean:      s.mean,
        std:       s.std,
        count:     s.count,
    });
    summaries.chain(buckets).collect()
}
