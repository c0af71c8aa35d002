//! Observer hooks and the records the event loop emits through them.
//!
//! Records are plain values: an observer can keep, aggregate, or write
//! them without ever borrowing simulation state.

use bt_core::{BusId, RouteId, SimTime, StopId};
use bt_entity::{BusStatus, Passenger, StopVisit};
use bt_network::Scheduled;

// ── Records ───────────────────────────────────────────────────────────────────

/// One processed event, as it appears in a trajectory.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EventRecord {
    pub time:       SimTime,
    /// [`EventKind::label`](bt_events::EventKind::label) of the event.
    pub event:      &'static str,
    pub bus:        BusId,
    pub route:      RouteId,
    pub stop:       Option<StopId>,
    pub stop_index: Option<u16>,
    /// Bus status after the event was applied.
    pub status:     Option<BusStatus>,
    pub load:       u32,
    pub location_m: f64,
}

/// A completed stop visit, emitted when the bus departs.
#[derive(Clone, Debug, PartialEq)]
pub struct VisitRecord {
    pub bus:       BusId,
    pub route:     RouteId,
    pub seq:       u32,
    pub visit:     StopVisit,
    /// Virtual-bus times for this bus at this stop, when a schedule exists.
    pub scheduled: Option<Scheduled>,
}

/// One control-point decision.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct HoldRecord {
    pub time:       SimTime,
    pub bus:        BusId,
    pub route:      RouteId,
    pub stop:       StopId,
    pub stop_index: usize,
    pub ready_at:   SimTime,
    pub requested:  f64,
    pub applied:    f64,
    pub clamped:    bool,
    pub truncated:  bool,
}

/// One bus trip, completed or cut off by the horizon.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TripRecord {
    pub bus:                BusId,
    pub route:              RouteId,
    pub seq:                u32,
    pub scheduled_dispatch: SimTime,
    pub dispatched_at:      SimTime,
    /// Terminal arrival, or the horizon for a truncated trip.
    pub ended_at:           SimTime,
    pub completed:          bool,
    pub stops_visited:      usize,
    pub boardings:          u32,
    pub alightings:         u32,
    /// Passengers still on board when the record was taken.
    pub load:               u32,
    pub total_hold_secs:    f64,
}

impl TripRecord {
    pub fn duration_secs(&self) -> f64 {
        self.ended_at.secs_since(self.dispatched_at)
    }
}

// ── SimObserver ───────────────────────────────────────────────────────────────

/// Callbacks invoked by [`Simulator::run`][crate::Simulator::run] as the
/// episode unfolds.
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.
///
/// # Example: departure counter
///
/// ```rust,ignore
/// struct Departures(usize);
///
/// impl SimObserver for Departures {
///     fn on_stop_visit(&mut self, _visit: &VisitRecord) {
///         self.0 += 1;
///     }
/// }
/// ```
pub trait SimObserver {
    /// Called once before the first event.
    fn on_episode_start(&mut self, _episode: u32, _seed: u64) {}

    /// Called after every processed event, stale departures excluded.
    fn on_event(&mut self, _record: &EventRecord) {}

    /// Called when a bus leaves a stop.
    fn on_stop_visit(&mut self, _visit: &VisitRecord) {}

    /// Called for every active control point, zero holds included.
    fn on_hold(&mut self, _hold: &HoldRecord) {}

    fn on_pax_boarded(&mut self, _pax: &Passenger) {}

    fn on_pax_alighted(&mut self, _pax: &Passenger) {}

    /// Called when a trip ends at its terminal, and once per live bus at
    /// the horizon with `completed == false`.
    fn on_trip_end(&mut self, _trip: &TripRecord) {}

    /// Called once after the last event, with the horizon.
    fn on_episode_end(&mut self, _horizon: SimTime) {}
}

/// A [`SimObserver`] that does nothing.
pub struct NoopObserver;

impl SimObserver for NoopObserver {}

impl<O: SimObserver + ?Sized> SimObserver for &mut O {
    fn on_episode_start(&mut self, episode: u32, seed: u64) {
        (**self).on_episode_start(episode, seed);
    }

    fn on_event(&mut self, record: &EventRecord) {
        (**self).on_event(record);
    }

    fn on_stop_visit(&mut self, visit: &VisitRecord) {
        (**self).on_stop_visit(visit);
    }

    fn on_hold(&mut self, hold: &HoldRecord) {
        (**self).on_hold(hold);
    }

    fn on_pax_boarded(&mut self, pax: &Passenger) {
        (**self).on_pax_boarded(pax);
    }

    fn on_pax_alighted(&mut self, pax: &Passenger) {
        (**self).on_pax_alighted(pax);
    }

    fn on_trip_end(&mut self, trip: &TripRecord) {
        (**self).on_trip_end(trip);
    }

    fn on_episode_end(&mut self, horizon: SimTime) {
        (**self).on_episode_end(horizon);
    }
}

/// Fan-out to two observers, first `A` then `B`.
impl<A: SimObserver, B: SimObserver> SimObserver for (A, B) {
    fn on_episode_start(&mut self, episode: u32, seed: u64) {
        self.0.on_episode_start(episode, seed);
        self.1.on_episode_start(episode, seed);
    }

    fn on_event(&mut self, record: &EventRecord) {
        self.0.on_event(record);
        self.1.on_event(record);
    }

    fn on_stop_visit(&mut self, visit: &VisitRecord) {
        self.0.on_stop_visit(visit);
        self.1.on_stop_visit(visit);
    }

    fn on_hold(&mut self, hold: &HoldRecord) {
        self.0.on_hold(hold);
        self.1.on_hold(hold);
    }

    fn on_pax_boarded(&mut self, pax: &Passenger) {
        self.0.on_pax_boarded(pax);
        self.1.on_pax_boarded(pax);
    }

    fn on_pax_alighted(&mut self, pax: &Passenger) {
        self.0.on_pax_alighted(pax);
        self.1.on_pax_alighted(pax);
    }

    fn on_trip_end(&mut self, trip: &TripRecord) {
        self.0.on_trip_end(trip);
        self.1.on_trip_end(trip);
    }

    fn on_episode_end(&mut self, horizon: SimTime) {
        self.0.on_episode_end(horizon);
        self.1.on_episode_end(horizon);
    }
}
