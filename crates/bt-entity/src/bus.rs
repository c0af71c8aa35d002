//! Bus state and per-stop visit records.

use bt_core::{BusId, LinkId, RouteId, SimTime, StopId, TerminalId};
use bt_events::EventHandle;
use bt_network::{Network, Node};

use crate::Passenger;

// ── Status / position ─────────────────────────────────────────────────────────

/// Lifecycle state of a bus.
///
/// ```text
/// Dispatched → InTransit → (Queued) → Servicing → (Holding) → Departed
///                 ↑                                              │
///                 └──────────────────────────────────────────────┘
///                                  … → Terminated
/// ```
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BusStatus {
    Dispatched,
    InTransit,
    Queued,
    Servicing,
    Holding,
    Departed,
    Terminated,
}

impl BusStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            BusStatus::Dispatched => "dispatched",
            BusStatus::InTransit  => "in_transit",
            BusStatus::Queued     => "queued",
            BusStatus::Servicing  => "servicing",
            BusStatus::Holding    => "holding",
            BusStatus::Departed   => "departed",
            BusStatus::Terminated => "terminated",
        }
    }
}

/// Where a bus is.
///
/// Leg `k` of a route ends at stop `k`; the last leg (`k == stops.len()`)
/// ends at the destination terminal.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum BusPosition {
    AtTerminal(TerminalId),
    AtStop { index: u16 },
    OnLink { link: LinkId, leg: u16, departed: SimTime, arrives: SimTime },
}

impl BusPosition {
    /// Fraction of the current link traversed at `now`, in `[0.0, 1.0]`.
    ///
    /// Returns `1.0` when not on a link or when the traversal is instantaneous.
    pub fn progress(&self, now: SimTime) -> f64 {
        let BusPosition::OnLink { departed, arrives, .. } = *self else {
            return 1.0;
        };
        if arrives <= departed {
            return 1.0;
        }
        let elapsed = now.0.saturating_sub(departed.0) as f64;
        let total = (arrives.0 - departed.0) as f64;
        (elapsed / total).min(1.0)
    }
}

// ── StopVisit ─────────────────────────────────────────────────────────────────

/// One bus's visit to one stop.  Filled in as the visit progresses.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StopVisit {
    pub stop:          StopId,
    pub stop_index:    u16,
    pub arrived_at:    SimTime,
    pub service_start: Option<SimTime>,
    /// Ready-to-depart time, i.e. departure without holding.
    pub ready_at:      Option<SimTime>,
    pub departed_at:   Option<SimTime>,
    pub boarded:       u32,
    pub alighted:      u32,
    pub hold_secs:     f64,
    /// Passengers on board after this visit's boarding.
    pub load:          u32,
}

impl StopVisit {
    pub fn new(stop: StopId, stop_index: u16, arrived_at: SimTime) -> Self {
        Self {
            stop,
            stop_index,
            arrived_at,
            service_start: None,
            ready_at:      None,
            departed_at:   None,
            boarded:       0,
            alighted:      0,
            hold_secs:     0.0,
            load:          0,
        }
    }

    /// Time spent waiting for the stop to free up.
    pub fn queueing_secs(&self) -> Option<f64> {
        self.service_start.map(|s| s.secs_since(self.arrived_at))
    }
}

// ── Bus ───────────────────────────────────────────────────────────────────────

pub struct Bus {
    pub id:                 BusId,
    pub route:              RouteId,
    /// Dispatch ordinal within the route, starting at 1.
    pub seq:                u32,
    pub capacity:           Option<u32>,
    pub status:             BusStatus,
    pub position:           BusPosition,
    pub passengers:         Vec<Passenger>,
    pub scheduled_dispatch: SimTime,
    pub dispatched_at:      SimTime,
    /// One entry per stop reached, in route order; `visits[i].stop_index == i`.
    pub visits:             Vec<StopVisit>,
    pub total_hold_secs:    f64,
    pub pending_departure:  Option<EventHandle>,
    /// Hold to serve in the stop's holding area once the bus leaves its berth.
    pub pending_hold:       SimTime,
    /// Bumped whenever a pending departure is superseded.
    pub generation:         u32,
    pub boardings:          u32,
    pub alightings:         u32,
}

impl Bus {
    pub fn new(
        id:                 BusId,
        route:              RouteId,
        seq:                u32,
        origin:             TerminalId,
        capacity:           Option<u32>,
        scheduled_dispatch: SimTime,
        now:                SimTime,
    ) -> Self {
        Self {
            id,
            route,
            seq,
            capacity,
            status:            BusStatus::Dispatched,
            position:          BusPosition::AtTerminal(origin),
            passengers:        Vec::new(),
            scheduled_dispatch,
            dispatched_at:     now,
            visits:            Vec::new(),
            total_hold_secs:   0.0,
            pending_departure: None,
            pending_hold:      SimTime::ZERO,
            generation:        0,
            boardings:         0,
            alightings:        0,
        }
    }

    pub fn load(&self) -> u32 {
        self.passengers.len() as u32
    }

    /// Seats left; `u32::MAX` for an unlimited bus.
    pub fn remaining_capacity(&self) -> u32 {
        self.capacity.map_or(u32::MAX, |c| c.saturating_sub(self.load()))
    }

    pub fn current_visit(&self) -> Option<&StopVisit> {
        self.visits.last()
    }

    pub fn current_visit_mut(&mut self) -> Option<&mut StopVisit> {
        self.visits.last_mut()
    }

    /// Visit record at stop `index`, if the bus has reached it.
    pub fn visit(&self, index: usize) -> Option<&StopVisit> {
        self.visits.get(index)
    }

    /// Index of the last stop reached, `None` before the first stop.
    pub fn last_stop_index(&self) -> Option<usize> {
        self.visits.len().checked_sub(1)
    }

    /// Invalidate the pending departure and return the new generation.
    pub fn bump_generation(&mut self) -> u32 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    // ── Movement ──────────────────────────────────────────────────────────

    pub fn start_link(&mut self, link: LinkId, leg: u16, departed: SimTime, arrives: SimTime) {
        self.status = BusStatus::InTransit;
        self.position = BusPosition::OnLink { link, leg, departed, arrives };
    }

    /// Record arrival at stop `index` and open its visit.
    pub fn arrive(&mut self, stop: StopId, index: u16, now: SimTime) {
        self.position = BusPosition::AtStop { index };
        self.visits.push(StopVisit::new(stop, index, now));
    }

    /// Distance from the route's origin terminal at `now`.
    pub fn location_m(&self, now: SimTime, network: &Network) -> f64 {
        match self.position {
            BusPosition::AtTerminal(_) if self.status == BusStatus::Terminated => {
                network.stop_offset_m(self.route, network.stop_sequence(self.route).len())
            }
            BusPosition::AtTerminal(_) => 0.0,
            BusPosition::AtStop { index } => network.stop_offset_m(self.route, index as usize),
            BusPosition::OnLink { leg, .. } => {
                let leg = leg as usize;
                let start = if leg == 0 { 0.0 } else { network.stop_offset_m(self.route, leg - 1) };
                let end = network.stop_offset_m(self.route, leg);
                start + (end - start) * self.position.progress(now)
            }
        }
    }

    // ── Passengers ────────────────────────────────────────────────────────

    /// Remove and return every passenger bound for `node`, stamped with
    /// `now` as the alighting time.
    pub fn alight(&mut self, node: Node, now: SimTime) -> Vec<Passenger> {
        let (mut off, stay): (Vec<_>, Vec<_>) =
            self.passengers.drain(..).partition(|p| p.destination == node);
        self.passengers = stay;
        for p in &mut off {
            p.alighted_at = Some(now);
        }
        self.alightings += off.len() as u32;
        off
    }

    pub fn board(&mut self, mut pax: Passenger, now: SimTime) {
        pax.boarded_at = Some(now);
        self.passengers.push(pax);
        self.boardings += 1;
    }
}
