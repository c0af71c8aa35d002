//! Passenger demand generation.
//!
//! # Stream model
//!
//! Demand is an arrival *stream* per (route, origin stop).  The stop entity
//! asks for the next arrival strictly after the previous one and keeps one
//! arrival of lookahead, so the sequence a stream produces depends only on
//! its seed, never on when buses happen to query it.  That is what keeps
//! demand draws identical between a zero-hold run and a run with holding
//! disabled.
//!
//! # Time-of-day profile
//!
//! Base OD rates (passengers per second) are scaled by a piecewise-constant
//! [`DemandProfile`].  Poisson arrivals are drawn by inverting the cumulative
//! intensity: draw `E ~ Exp(1)` and walk forward through the profile
//! segments until the integrated rate reaches `E`.

use std::collections::BTreeMap;

use rand::Rng;
use rand_distr::Exp1;

use bt_core::{RouteId, SimTime, StopId, StreamRng};

use crate::{Network, NetworkError, NetworkResult, Node};

/// One generated passenger arrival.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct PaxArrival {
    pub at:          SimTime,
    pub destination: Node,
}

// ── Trait ─────────────────────────────────────────────────────────────────────

/// Produces passenger arrivals at a stop.
pub trait DemandModel: Send + Sync {
    /// The first arrival strictly after `after` for `route` at `origin`, or
    /// `None` if the stream is exhausted (zero rate from `after` onwards).
    fn next_arrival(
        &self,
        route:  RouteId,
        origin: StopId,
        after:  SimTime,
        rng:    &mut StreamRng,
    ) -> Option<PaxArrival>;

    /// Expected arrival rate (pax/s) at `at`.  Used by the virtual schedule
    /// and by schedule-based controllers.
    fn rate(&self, route: RouteId, origin: StopId, at: SimTime) -> f64;

    /// Check the model against the assembled topology.  Called once by
    /// `NetworkBuilder::build`.
    fn validate(&self, _network: &Network) -> NetworkResult<()> {
        Ok(())
    }
}

/// Demand model with no passengers at all.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoDemand;

impl DemandModel for NoDemand {
    fn next_arrival(&self, _: RouteId, _: StopId, _: SimTime, _: &mut StreamRng) -> Option<PaxArrival> {
        None
    }

    fn rate(&self, _: RouteId, _: StopId, _: SimTime) -> f64 {
        0.0
    }
}

// ── DemandProfile ─────────────────────────────────────────────────────────────

/// Piecewise-constant time-of-day multiplier.
///
/// Segment `i` covers `[starts[i], starts[i+1])`; the last extends forever.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DemandProfile {
    segments: Vec<(f64, f64)>,
}

impl DemandProfile {
    /// Constant multiplier 1.
    pub fn flat() -> Self {
        Self { segments: vec![(0.0, 1.0)] }
    }

    /// Build from `(start_secs, multiplier)` pairs.  The first start must be
    /// 0, starts must increase strictly, and multipliers must be finite and
    /// non-negative.
    pub fn new(segments: Vec<(f64, f64)>) -> NetworkResult<Self> {
        let bad = |reason: String| NetworkError::Distribution { what: "demand profile".into(), reason };
        match segments.first() {
            None => return Err(bad("profile has no segments".into())),
            Some(&(start, _)) if start != 0.0 => {
                return Err(bad(format!("first segment must start at 0, got {start}")));
            }
            _ => {}
        }
        for w in segments.windows(2) {
            if w[1].0.is_nan() || w[1].0 <= w[0].0 {
                return Err(bad(format!("segment starts not increasing at {}", w[1].0)));
            }
        }
        if let Some(&(_, m)) = segments.iter().find(|(_, m)| !m.is_finite() || *m < 0.0) {
            return Err(bad(format!("multiplier must be finite and non-negative, got {m}")));
        }
        Ok(Self { segments })
    }

    pub fn multiplier_at(&self, t_secs: f64) -> f64 {
        let i = self.segment_index(t_secs);
        self.segments[i].1
    }

    fn segment_index(&self, t_secs: f64) -> usize {
        self.segments
            .partition_point(|&(start, _)| start <= t_secs)
            .saturating_sub(1)
    }

    /// End of segment `i` (`inf` for the last one).
    fn segment_end(&self, i: usize) -> f64 {
        self.segments.get(i + 1).map_or(f64::INFINITY, |&(s, _)| s)
    }
}

impl Default for DemandProfile {
    fn default() -> Self {
        Self::flat()
    }
}

// ── OdTable ───────────────────────────────────────────────────────────────────

/// Base origin–destination rates in passengers per second.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OdTable {
    rows: BTreeMap<(RouteId, StopId), Vec<(Node, f64)>>,
}

impl OdTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `rate` pax/s from `origin` to `destination` on `route`.
    /// Repeated pairs accumulate.
    pub fn insert(&mut self, route: RouteId, origin: StopId, destination: Node, rate: f64) {
        let row = self.rows.entry((route, origin)).or_default();
        match row.iter_mut().find(|(d, _)| *d == destination) {
            Some((_, r)) => *r += rate,
            None => row.push((destination, rate)),
        }
    }

    pub fn destinations(&self, route: RouteId, origin: StopId) -> &[(Node, f64)] {
        self.rows.get(&(route, origin)).map_or(&[], Vec::as_slice)
    }

    pub fn total_rate(&self, route: RouteId, origin: StopId) -> f64 {
        self.destinations(route, origin).iter().map(|(_, r)| r).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (RouteId, StopId, Node, f64)> + '_ {
        self.rows
            .iter()
            .flat_map(|(&(r, o), dests)| dests.iter().map(move |&(d, rate)| (r, o, d, rate)))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

// ── OdDemand ──────────────────────────────────────────────────────────────────

/// How arrivals are spaced in time.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ArrivalProcess {
    #[default]
    Poisson,
    /// Evenly spaced at the instantaneous rate.
    Deterministic,
}

/// OD-table demand scaled by a time-of-day profile.
#[derive(Clone, Debug)]
pub struct OdDemand {
    table:   OdTable,
    profile: DemandProfile,
    process: ArrivalProcess,
}

impl OdDemand {
    pub fn new(table: OdTable, profile: DemandProfile, process: ArrivalProcess) -> NetworkResult<Self> {
        if let Some((route, origin, dest, rate)) =
            table.iter().find(|&(_, _, _, rate)| !rate.is_finite() || rate < 0.0)
        {
            return Err(NetworkError::Distribution {
                what:   format!("OD {route} {origin}->{dest}"),
                reason: format!("rate must be finite and non-negative, got {rate}"),
            });
        }
        Ok(Self { table, profile, process })
    }

    pub fn table(&self) -> &OdTable {
        &self.table
    }

    fn pick_destination(&self, route: RouteId, origin: StopId, rng: &mut StreamRng) -> Option<Node> {
        let dests = self.table.destinations(route, origin);
        let weights: Vec<f64> = dests.iter().map(|(_, r)| *r).collect();
        rng.weighted_index(&weights).map(|i| dests[i].0)
    }

    /// Exponential gap under the piecewise rate `base * profile(t)`.
    fn poisson_next(&self, base: f64, after: f64, rng: &mut StreamRng) -> Option<f64> {
        let mut remaining: f64 = rng.inner().sample(Exp1);
        let mut t = after;
        let mut i = self.profile.segment_index(t);
        loop {
            let rate = base * self.profile.segments[i].1;
            let end = self.profile.segment_end(i);
            if rate > 0.0 {
                let need = remaining / rate;
                if t + need < end {
                    return Some(t + need);
                }
                remaining -= rate * (end - t);
            }
            if end.is_infinite() {
                return None;
            }
            t = end;
            i += 1;
        }
    }

    /// Next evenly spaced arrival: one gap at the rate in force at `after`,
    /// skipping ahead over zero-rate segments.
    fn deterministic_next(&self, base: f64, after: f64) -> Option<f64> {
        let mut t = after;
        let mut i = self.profile.segment_index(t);
        loop {
            let rate = base * self.profile.segments[i].1;
            if rate > 0.0 {
                return Some(t + 1.0 / rate);
            }
            let end = self.profile.segment_end(i);
            if end.is_infinite() {
                return None;
            }
            t = end;
            i += 1;
        }
    }
}

impl DemandModel for OdDemand {
    fn next_arrival(
        &self,
        route:  RouteId,
        origin: StopId,
        after:  SimTime,
        rng:    &mut StreamRng,
    ) -> Option<PaxArrival> {
        let base = self.table.total_rate(route, origin);
        if base <= 0.0 {
            return None;
        }
        let after_secs = after.as_secs_f64();
        let t = match self.process {
            ArrivalProcess::Poisson       => self.poisson_next(base, after_secs, rng)?,
            ArrivalProcess::Deterministic => self.deterministic_next(base, after_secs)?,
        };
        // At least one millisecond of progress so a stream can never stall.
        let at = SimTime::from_secs_f64(t).max(SimTime(after.0.saturating_add(1)));
        let destination = self.pick_destination(route, origin, rng)?;
        Some(PaxArrival { at, destination })
    }

    fn rate(&self, route: RouteId, origin: StopId, at: SimTime) -> f64 {
        self.table.total_rate(route, origin) * self.profile.multiplier_at(at.as_secs_f64())
    }

    fn validate(&self, network: &Network) -> NetworkResult<()> {
        for (route_id, origin, dest, _) in self.table.iter() {
            let route = network.route(route_id).ok_or_else(|| {
                NetworkError::Config(format!("OD table references unknown route {route_id}"))
            })?;
            let Some(o) = route.stop_index(origin) else {
                return Err(NetworkError::UnknownStop { route: route_id, stop: origin });
            };
            let downstream = match dest {
                Node::Stop(s) => route.stop_index(s).is_some_and(|d| d > o),
                Node::Terminal(t) => t == route.destination,
            };
            if !downstream {
                return Err(NetworkError::Config(format!(
                    "OD {route_id} {origin}->{dest}: destination is not downstream on the route"
                )));
            }
        }
        Ok(())
    }
}
