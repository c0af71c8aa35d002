//! Episode metrics: Welford accumulators keyed by (route, stop, time bucket).
//!
//! [`MetricsCollector`] is a [`SimObserver`]; it only reads records and
//! never touches simulation state.  Only configured metrics are collected.
//!
//! | Metric                | Sample                                       | Keyed by stop |
//! |-----------------------|----------------------------------------------|---------------|
//! | `headway_std`         | departure − previous departure (route, stop) | departure     |
//! | `schedule_deviation`  | \|departure − scheduled departure\|           | departure     |
//! | `hold_time`           | applied hold per decision; total per bus     | control point |
//! | `pax_wait_time`       | boarding − arrival                           | origin        |
//! | `pax_in_vehicle_time` | alighting − boarding                         | origin        |
//! | `queueing_delay`      | service start − arrival at stop              | visited stop  |
//! | `trip_time`           | terminate − dispatch (completed trips)       | none          |
//!
//! Route-level samples use `StopId::INVALID` as their stop.

use std::collections::BTreeMap;

use bt_core::{MetricName, RouteId, SimTime, StopId};
use bt_entity::Passenger;
use rustc_hash::FxHashMap;

use crate::{HoldRecord, SimObserver, TripRecord, VisitRecord};

// ── RunningStats ──────────────────────────────────────────────────────────────

/// Streaming mean and variance (Welford), mergeable (Chan et al.).
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct RunningStats {
    count: u64,
    mean:  f64,
    m2:    f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, x: f64) {
        self.count += 1;
        let delta = x - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (x - self.mean);
    }

    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = *other;
            return;
        }
        let n = (self.count + other.count) as f64;
        let delta = other.mean - self.mean;
        self.mean += delta * other.count as f64 / n;
        self.m2 += other.m2 + delta * delta * (self.count as f64) * (other.count as f64) / n;
        self.count += other.count;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Population variance; 0 below two samples.
    pub fn variance(&self) -> f64 {
        if self.count < 2 { 0.0 } else { (self.m2 / self.count as f64).max(0.0) }
    }

    pub fn std(&self) -> f64 {
        self.variance().sqrt()
    }

    pub fn summary(&self) -> Summary {
        Summary { mean: self.mean, std: self.std(), count: self.count }
    }
}

// ── Keys and summaries ────────────────────────────────────────────────────────

#[derive(Copy, Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Summary {
    pub mean:  f64,
    pub std:   f64,
    pub count: u64,
}

/// What one summary aggregates over.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Aggregate {
    /// One sample per observation (departure, passenger, decision, trip).
    /// For `headway_std`, one sample per stop.
    PerEvent,
    /// One sample per bus trip.  Only `hold_time` reports it.
    PerBus,
}

impl Aggregate {
    pub fn as_str(self) -> &'static str {
        match self {
            Aggregate::PerEvent => "per_event",
            Aggregate::PerBus   => "per_bus",
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MetricKey {
    pub metric:    MetricName,
    pub route:     RouteId,
    pub aggregate: Aggregate,
}

impl MetricKey {
    pub fn per_event(metric: MetricName, route: RouteId) -> Self {
        Self { metric, route, aggregate: Aggregate::PerEvent }
    }

    pub fn per_bus(metric: MetricName, route: RouteId) -> Self {
        Self { metric, route, aggregate: Aggregate::PerBus }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BucketKey {
    pub metric: MetricName,
    pub route:  RouteId,
    pub stop:   StopId,
    pub bucket: u32,
}

/// Finalized metrics of one episode.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EpisodeMetrics {
    pub summaries:  BTreeMap<MetricKey, Summary>,
    pub per_bucket: BTreeMap<BucketKey, Summary>,
    /// Trips cut off by the horizon, per route.  Filled with `trip_time`.
    pub truncated:  BTreeMap<RouteId, u32>,
}

impl EpisodeMetrics {
    /// Per-event summary of `metric` on `route`.
    pub fn get(&self, metric: MetricName, route: RouteId) -> Option<&Summary> {
        self.summaries.get(&MetricKey::per_event(metric, route))
    }

    pub fn mean(&self, metric: MetricName, route: RouteId) -> Option<f64> {
        self.get(metric, route).map(|s| s.mean)
    }

    pub fn is_empty(&self) -> bool {
        self.summaries.is_empty()
    }
}

// ── MetricsCollector ──────────────────────────────────────────────────────────

pub struct MetricsCollector {
    enabled:        Vec<MetricName>,
    bucket_secs:    u64,
    cells:          BTreeMap<BucketKey, RunningStats>,
    per_bus_hold:   BTreeMap<RouteId, RunningStats>,
    truncated:      BTreeMap<RouteId, u32>,
    last_departure: FxHashMap<(RouteId, StopId), SimTime>,
}

impl MetricsCollector {
    pub fn new(metrics: &[MetricName], bucket_secs: u64) -> Self {
        let mut enabled = metrics.to_vec();
        enabled.sort();
        enabled.dedup();
        Self {
            enabled,
            bucket_secs:    bucket_secs.max(1),
            cells:          BTreeMap::new(),
            per_bus_hold:   BTreeMap::new(),
            truncated:      BTreeMap::new(),
            last_departure: FxHashMap::default(),
        }
    }

    #[inline]
    pub fn wants(&self, metric: MetricName) -> bool {
        self.enabled.binary_search(&metric).is_ok()
    }

    fn push(&mut self, metric: MetricName, route: RouteId, stop: StopId, at: SimTime, x: f64) {
        if !self.wants(metric) || !x.is_finite() {
            return;
        }
        let key = BucketKey { metric, route, stop, bucket: at.bucket(self.bucket_secs) };
        self.cells.entry(key).or_default().push(x);
    }

    /// Fold the accumulators into summaries.
    pub fn finalize(&self) -> EpisodeMetrics {
        let per_bucket = self.cells.iter().map(|(k, s)| (*k, s.summary())).collect();

        let mut by_route: BTreeMap<(MetricName, RouteId), RunningStats> = BTreeMap::new();
        let mut headway_by_stop: BTreeMap<(RouteId, StopId), RunningStats> = BTreeMap::new();
        for (k, s) in &self.cells {
            if k.metric == MetricName::HeadwayStd {
                headway_by_stop.entry((k.route, k.stop)).or_default().merge(s);
            } else {
                by_route.entry((k.metric, k.route)).or_default().merge(s);
            }
        }

        let mut summaries: BTreeMap<MetricKey, Summary> = by_route
            .into_iter()
            .map(|((metric, route), s)| (MetricKey::per_event(metric, route), s.summary()))
            .collect();

        // headway_std: population std per stop, then averaged across stops.
        let mut headway: BTreeMap<RouteId, RunningStats> = BTreeMap::new();
        for ((route, _), s) in headway_by_stop {
            headway.entry(route).or_default().push(s.std());
        }
        for (route, s) in headway {
            summaries.insert(MetricKey::per_event(MetricName::HeadwayStd, route), s.summary());
        }

        for (route, s) in &self.per_bus_hold {
            summaries.insert(MetricKey::per_bus(MetricName::HoldTime, *route), s.summary());
        }

        EpisodeMetrics { summaries, per_bucket, truncated: self.truncated.clone() }
    }
}

impl SimObserver for MetricsCollector {
    fn on_stop_visit(&mut self, v: &VisitRecord) {
        let visit = &v.visit;
        let Some(departed) = visit.departed_at else { return };

        if let Some(prev) = self.last_departure.insert((v.route, visit.stop), departed) {
            self.push(MetricName::HeadwayStd, v.route, visit.stop, departed, departed.secs_since(prev));
        }
        if let Some(sched) = v.scheduled {
            let dev = departed.secs_since(sched.departure).abs();
            self.push(MetricName::ScheduleDeviation, v.route, visit.stop, departed, dev);
        }
        if let Some(q) = visit.queueing_secs() {
            self.push(MetricName::QueueingDelay, v.route, visit.stop, visit.arrived_at, q);
        }
    }

    fn on_hold(&mut self, h: &HoldRecord) {
        self.push(MetricName::HoldTime, h.route, h.stop, h.time, h.applied);
    }

    fn on_pax_boarded(&mut self, pax: &Passenger) {
        if let (Some(wait), Some(at)) = (pax.wait_secs(), pax.boarded_at) {
            self.push(MetricName::PaxWaitTime, pax.route, pax.origin, at, wait);
        }
    }

    fn on_pax_alighted(&mut self, pax: &Passenger) {
        if let (Some(ride), Some(at)) = (pax.in_vehicle_secs(), pax.alighted_at) {
            self.push(MetricName::PaxInVehicleTime, pax.route, pax.origin, at, ride);
        }
    }

    fn on_trip_end(&mut self, trip: &TripRecord) {
        if self.wants(MetricName::HoldTime) {
            self.per_bus_hold.entry(trip.route).or_default().push(trip.total_hold_secs);
        }
        if trip.completed {
            self.push(MetricName::TripTime, trip.route, StopId::INVALID, trip.dispatched_at, trip.duration_secs());
        } else if self.wants(MetricName::TripTime) {
            *self.truncated.entry(trip.route).or_default() += 1;
        }
    }
}
