//! Stop entity: passenger queues, demand streams, berths, and the bus queue.
//!
//! # Service model
//!
//! A stop has one or more berths, numbered upstream (0) to downstream.  A
//! bus arriving while a berth is reachable and nobody waits takes that
//! berth; otherwise it joins the entry queue and is admitted in arrival
//! order as berths open up.
//!
//! | Rule             | Entry berth                                        | May leave when                  |
//! |------------------|----------------------------------------------------|---------------------------------|
//! | `Fifo`           | last berth of the free run at the upstream end     | every downstream berth is empty |
//! | `FreeOvertaking` | first berth of the free run at the downstream end  | always                          |
//!
//! A served bus that may not leave yet is *blocked* in its berth and is
//! released once the berths ahead of it clear.  With a holding area, a held
//! bus gives up its berth and waits out the hold off-berth.  The default
//! layout (one berth, no holding area) is a single server: a held bus keeps
//! the berth and nothing overtakes it.
//!
//! # Demand
//!
//! Each serving route has its own [`DemandStream`] holding one arrival of
//! lookahead.  [`Stop::advance_demand`] moves every stream to `now`,
//! appending arrivals to the route's passenger queue in arrival order.

use std::collections::VecDeque;

use bt_core::{BusId, PaxId, RouteId, SimTime, StopId, Stream, StreamRng};
use bt_network::{DemandModel, PaxArrival, QueueRule, StopLayout};

use crate::{Bus, EntityError, EntityResult, Passenger};

// ── DemandStream ──────────────────────────────────────────────────────────────

/// Lazily generated arrival process for one (route, stop).
pub struct DemandStream {
    route: RouteId,
    stop:  StopId,
    rng:   StreamRng,
    next:  Option<PaxArrival>,
}

impl DemandStream {
    /// Arrivals start strictly after `start`.
    pub fn new(route: RouteId, stop: StopId, start: SimTime, seed: u64, demand: &dyn DemandModel) -> Self {
        let mut rng = StreamRng::new(seed, Stream::Demand(route, stop));
        let next = demand.next_arrival(route, stop, start, &mut rng);
        Self { route, stop, rng, next }
    }

    /// Time of the next pending arrival.
    pub fn peek(&self) -> Option<SimTime> {
        self.next.map(|a| a.at)
    }

    /// Pop every arrival at or before `now` into `queue`.
    fn advance(
        &mut self,
        now:     SimTime,
        demand:  &dyn DemandModel,
        next_id: &mut u64,
        queue:   &mut VecDeque<Passenger>,
    ) -> usize {
        let mut n = 0;
        while let Some(a) = self.next.filter(|a| a.at <= now) {
            queue.push_back(Passenger::new(PaxId(*next_id), self.route, self.stop, a.destination, a.at));
            *next_id += 1;
            n += 1;
            self.next = demand.next_arrival(self.route, self.stop, a.at, &mut self.rng);
        }
        n
    }
}

// ── RouteQueue ────────────────────────────────────────────────────────────────

/// Per-route state at a stop.
pub struct RouteQueue {
    pub route:          RouteId,
    pub queue:          VecDeque<Passenger>,
    pub stream:         DemandStream,
    /// Most recent departure of this route from the stop.
    pub last_departure: Option<(BusId, SimTime)>,
    /// Most recent ready-to-depart time of this route at the stop.
    pub last_ready:     Option<(BusId, SimTime)>,
}

// ── Stop ──────────────────────────────────────────────────────────────────────

pub struct Stop {
    pub id:       StopId,
    layout:       StopLayout,
    routes:       Vec<RouteQueue>,
    berths:       Vec<Option<BusId>>,
    waiting:      VecDeque<BusId>,
    /// Served buses stuck behind an occupied downstream berth.
    blocked:      Vec<BusId>,
    holding:      Vec<BusId>,
    pub boarded:  u64,
    pub alighted: u64,
}

impl Stop {
    /// Single berth, no holding area.
    pub fn new(id: StopId) -> Self {
        Self::with_layout(id, StopLayout::default())
    }

    pub fn with_layout(id: StopId, layout: StopLayout) -> Self {
        Self {
            id,
            layout,
            routes:   Vec::new(),
            berths:   vec![None; usize::from(layout.berths.max(1))],
            waiting:  VecDeque::new(),
            blocked:  Vec::new(),
            holding:  Vec::new(),
            boarded:  0,
            alighted: 0,
        }
    }

    pub fn layout(&self) -> StopLayout {
        self.layout
    }

    pub fn has_holding_area(&self) -> bool {
        self.layout.holding_area
    }

    /// Register `route` with its demand stream starting after `start`.
    pub fn serve_route(&mut self, route: RouteId, start: SimTime, seed: u64, demand: &dyn DemandModel) {
        if self.route_queue(route).is_some() {
            return;
        }
        self.routes.push(RouteQueue {
            route,
            queue:          VecDeque::new(),
            stream:         DemandStream::new(route, self.id, start, seed, demand),
            last_departure: None,
            last_ready:     None,
        });
    }

    pub fn serves(&self, route: RouteId) -> bool {
        self.route_queue(route).is_some()
    }

    pub fn route_queue(&self, route: RouteId) -> Option<&RouteQueue> {
        self.routes.iter().find(|q| q.route == route)
    }

    fn route_queue_mut(&mut self, route: RouteId) -> EntityResult<&mut RouteQueue> {
        let stop = self.id;
        self.routes
            .iter_mut()
            .find(|q| q.route == route)
            .ok_or(EntityError::RouteNotServed { stop, route })
    }

    // ── Demand ────────────────────────────────────────────────────────────

    /// Advance every route's stream to `now`.  Returns the number of new
    /// passengers.
    pub fn advance_demand(&mut self, now: SimTime, demand: &dyn DemandModel, next_id: &mut u64) -> usize {
        self.routes
            .iter_mut()
            .map(|q| q.stream.advance(now, demand, next_id, &mut q.queue))
            .sum()
    }

    /// Passengers waiting for `route`.
    pub fn queue_len(&self, route: RouteId) -> usize {
        self.route_queue(route).map_or(0, |q| q.queue.len())
    }

    pub fn total_waiting_pax(&self) -> usize {
        self.routes.iter().map(|q| q.queue.len()).sum()
    }

    // ── Boarding / alighting ──────────────────────────────────────────────

    /// Board `route` passengers onto `bus` in FIFO order, up to capacity,
    /// taking only those that arrived at or before `arrived_by`.
    ///
    /// Each passenger is stamped as boarding at `max(service_start, arrival)`.
    pub fn board(
        &mut self,
        bus:           &mut Bus,
        service_start: SimTime,
        arrived_by:    SimTime,
    ) -> EntityResult<u32> {
        let q = self.route_queue_mut(bus.route)?;
        let mut n = 0;
        while bus.remaining_capacity() > 0 {
            if q.queue.front().is_none_or(|p| p.arrived_at > arrived_by) {
                break;
            }
            let Some(pax) = q.queue.pop_front() else { break };
            let at = service_start.max(pax.arrived_at);
            bus.board(pax, at);
            n += 1;
        }
        self.boarded += n as u64;
        Ok(n)
    }

    pub fn record_alighted(&mut self, n: u32) {
        self.alighted += n as u64;
    }

    pub fn record_departure(&mut self, route: RouteId, bus: BusId, at: SimTime) -> EntityResult<()> {
        self.route_queue_mut(route)?.last_departure = Some((bus, at));
        Ok(())
    }

    pub fn last_departure(&self, route: RouteId) -> Option<(BusId, SimTime)> {
        self.route_queue(route).and_then(|q| q.last_departure)
    }

    /// Record that `bus` became ready to depart at `at`, returning the
    /// previous ready record of the route.
    pub fn record_ready(
        &mut self,
        route: RouteId,
        bus:   BusId,
        at:    SimTime,
    ) -> EntityResult<Option<(BusId, SimTime)>> {
        Ok(self.route_queue_mut(route)?.last_ready.replace((bus, at)))
    }

    pub fn last_ready(&self, route: RouteId) -> Option<(BusId, SimTime)> {
        self.route_queue(route).and_then(|q| q.last_ready)
    }

    // ── Berths ────────────────────────────────────────────────────────────

    pub fn berths(&self) -> &[Option<BusId>] {
        &self.berths
    }

    pub fn berth_of(&self, bus: BusId) -> Option<usize> {
        self.berths.iter().position(|&b| b == Some(bus))
    }

    /// Berth an arriving bus would take, if any is reachable.
    pub fn entry_berth(&self) -> Option<usize> {
        match self.layout.rule {
            QueueRule::Fifo => self.berths.iter().take_while(|b| b.is_none()).count().checked_sub(1),
            QueueRule::FreeOvertaking => {
                let free = self.berths.iter().rev().take_while(|b| b.is_none()).count();
                (free > 0).then(|| self.berths.len() - free)
            }
        }
    }

    /// A berth is reachable and nobody waits ahead.
    pub fn is_free(&self) -> bool {
        self.waiting.is_empty() && self.entry_berth().is_some()
    }

    /// Buses in the entry queue.
    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    /// Put `bus` in the entry berth and return its index.
    pub fn occupy(&mut self, bus: BusId) -> EntityResult<usize> {
        let berth = self.entry_berth().ok_or(EntityError::StopFull { stop: self.id, bus })?;
        self.berths[berth] = Some(bus);
        Ok(berth)
    }

    pub fn enqueue(&mut self, bus: BusId) {
        self.waiting.push_back(bus);
    }

    /// Move waiting buses into berths in arrival order while an entry berth
    /// is reachable.  Returns the admitted buses.
    pub fn admit(&mut self) -> Vec<BusId> {
        let mut admitted = Vec::new();
        while let Some(berth) = self.entry_berth() {
            let Some(bus) = self.waiting.pop_front() else { break };
            self.berths[berth] = Some(bus);
            admitted.push(bus);
        }
        admitted
    }

    /// Whether a served bus may pull out of its berth now.
    pub fn can_leave(&self, bus: BusId) -> EntityResult<bool> {
        let berth = self.berth_of(bus).ok_or(EntityError::NotInBerth { stop: self.id, bus })?;
        Ok(match self.layout.rule {
            QueueRule::Fifo           => self.berths[berth + 1..].iter().all(Option::is_none),
            QueueRule::FreeOvertaking => true,
        })
    }

    /// `bus` finished service but must wait for the berths ahead to clear.
    pub fn block(&mut self, bus: BusId) {
        if !self.blocked.contains(&bus) {
            self.blocked.push(bus);
        }
    }

    pub fn blocked_len(&self) -> usize {
        self.blocked.len()
    }

    /// Take the first blocked bus that may now leave.
    pub fn take_unblocked(&mut self) -> Option<BusId> {
        let i = self.blocked.iter().position(|&b| self.can_leave(b).unwrap_or(false))?;
        Some(self.blocked.remove(i))
    }

    /// `bus` pulls out of its berth.
    pub fn release(&mut self, bus: BusId) -> EntityResult<()> {
        let berth = self.berth_of(bus).ok_or(EntityError::NotInBerth { stop: self.id, bus })?;
        self.berths[berth] = None;
        self.blocked.retain(|&b| b != bus);
        Ok(())
    }

    // ── Holding area ──────────────────────────────────────────────────────

    pub fn enter_holding(&mut self, bus: BusId) {
        self.holding.push(bus);
    }

    /// Returns whether `bus` was in the holding area.
    pub fn leave_holding(&mut self, bus: BusId) -> bool {
        let before = self.holding.len();
        self.holding.retain(|&b| b != bus);
        self.holding.len() != before
    }

    pub fn holding_len(&self) -> usize {
        self.holding.len()
    }
}
