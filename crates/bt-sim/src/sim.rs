//! The `Simulator` struct and its event loop.

use std::collections::BTreeSet;
use std::sync::Arc;

use bt_control::{BusView, ControlPoint, Holder, HoldingAgent, Snapshot, SnapshotSpec};
use bt_core::{BoardTruncation, BusId, LinkId, MetricName, RouteId, SimConfig, SimTime, StopId, TerminalId};
use bt_entity::{Bus, BusPosition, BusStatus, DwellModel, Link, Stop, Terminal};
use bt_events::{Event, EventKind, EventQueue};
use bt_network::{Network, Node, RouteSpec};
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::{
    EpisodeOutput, EventRecord, HoldRecord, MetricsCollector, SimError, SimObserver, SimResult,
    TripRecord, VisitRecord,
};

// ── Simulator ─────────────────────────────────────────────────────────────────

/// One episode: entities, the event queue, and the records they produce.
///
/// Each event is handled to completion before the next is popped:
///
/// 1. **Dispatch**: create the bus at its origin, sample leg 0, schedule
///    the route's next dispatch.
/// 2. **ArriveAtStop**: open a visit; begin service if the stop is free,
///    otherwise join the stop's bus FIFO.
/// 3. **Begin service**: alight, board, compute the dwell, schedule the
///    departure at the ready time, then consult the holder.  A positive
///    hold replaces the departure with a `HoldExpire` one generation later.
/// 4. **DepartFromStop / HoldExpire**: leave the berth if the berths ahead
///    are clear (else wait blocked), move into the holding area if the stop
///    has one and a hold is pending, otherwise sample the next leg.  Freed
///    berths go to blocked buses first, then to the entry queue.
/// 5. **Terminate**: alight the rest, close the trip.
///
/// Events later than the horizon are never processed; the live buses at
/// that point are reported as truncated trips.
///
/// Create via [`SimBuilder`][crate::SimBuilder].
pub struct Simulator {
    pub(crate) config:     SimConfig,
    pub(crate) metrics:    Vec<MetricName>,
    pub(crate) episode:    u32,
    pub(crate) seed:       u64,
    pub(crate) network:    Arc<Network>,
    pub(crate) queue:      EventQueue,
    pub(crate) terminals:  FxHashMap<TerminalId, Terminal>,
    pub(crate) stops:      FxHashMap<StopId, Stop>,
    pub(crate) links:      FxHashMap<LinkId, Link>,
    pub(crate) holder:     Holder,
    pub(crate) dwell:      Box<dyn DwellModel>,
    /// Every bus dispatched this episode, indexed by `BusId`.
    pub(crate) buses:      Vec<Bus>,
    pub(crate) live:       BTreeSet<BusId>,
    /// Buses of each route in dispatch order; `fleet[r][seq - 1]`.
    pub(crate) fleet:      Vec<Vec<BusId>>,
    pub(crate) next_pax:   u64,
    pub(crate) warnings:   u32,
    pub(crate) trips:      Vec<TripRecord>,
    pub(crate) holds:      Vec<HoldRecord>,
    pub(crate) trajectory: Option<Vec<EventRecord>>,
    pub(crate) finished:   bool,
}

impl Simulator {
    // ── Public API ────────────────────────────────────────────────────────

    /// Run the episode to its horizon.
    ///
    /// `agent` is reset to this episode first and consulted at every active
    /// control point.  Use [`NoopObserver`][crate::NoopObserver] if you don't
    /// need callbacks.  A simulator runs once; a second call is an error.
    pub fn run<O: SimObserver>(
        &mut self,
        agent:    &mut dyn HoldingAgent,
        observer: &mut O,
    ) -> SimResult<EpisodeOutput> {
        if self.finished {
            return Err(SimError::Invariant(format!("episode {} already ran", self.episode)));
        }
        self.finished = true;

        let horizon = self.config.horizon();
        let mut metrics = MetricsCollector::new(&self.metrics, self.config.metric_bucket_secs);
        let mut obs = (&mut metrics, observer);

        info!(
            episode = self.episode,
            seed = self.seed,
            env = self.network.name(),
            agent = agent.name(),
            %horizon,
            "episode start"
        );
        agent.reset(self.episode);
        obs.on_episode_start(self.episode, self.seed);
        self.schedule_first_dispatches()?;

        let mut processed = 0u64;
        while let Some(t) = self.queue.peek_time() {
            if t > horizon {
                break;
            }
            let Some(event) = self.queue.pop_next() else { break };
            self.handle(event, agent, &mut obs)?;
            processed += 1;
        }

        self.truncate(horizon, &mut obs);
        obs.on_episode_end(horizon);

        let truncated_trips = self.trips.iter().filter(|t| !t.completed).count() as u32;
        let output = EpisodeOutput {
            episode:         self.episode,
            seed:            self.seed,
            metrics:         metrics.finalize(),
            warnings:        self.warnings,
            truncated_trips,
            completed_trips: self.trips.len() as u32 - truncated_trips,
            trips:           std::mem::take(&mut self.trips),
            holds:           std::mem::take(&mut self.holds),
            trajectory:      self.trajectory.take(),
        };
        info!(
            episode = self.episode,
            events = processed,
            completed = output.completed_trips,
            truncated = output.truncated_trips,
            holds = output.holds.len(),
            warnings = output.warnings,
            "episode end"
        );
        Ok(output)
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn episode(&self) -> u32 {
        self.episode
    }

    /// Episode seed every entity stream derives from.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn now(&self) -> SimTime {
        self.queue.now()
    }

    pub fn bus(&self, id: BusId) -> Option<&Bus> {
        self.buses.get(id.index())
    }

    /// Every bus dispatched so far, in id order.
    pub fn buses(&self) -> &[Bus] {
        &self.buses
    }

    pub fn stop(&self, id: StopId) -> Option<&Stop> {
        self.stops.get(&id)
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(&id)
    }

    pub fn holder(&self) -> &Holder {
        &self.holder
    }

    // ── Event handling ────────────────────────────────────────────────────

    fn schedule_first_dispatches(&mut self) -> SimResult<()> {
        // Route-id order fixes the tie order of simultaneous first dispatches.
        for route in self.network.routes() {
            let first = self.terminals.get(&route.origin).and_then(|t| t.peek(route.id));
            if let Some(at) = first {
                self.queue.schedule(at, EventKind::Dispatch { terminal: route.origin, route: route.id })?;
            }
        }
        Ok(())
    }

    fn handle(
        &mut self,
        event: Event,
        agent: &mut dyn HoldingAgent,
        obs:   &mut dyn SimObserver,
    ) -> SimResult<()> {
        let now = event.time;
        debug!(t = %now, kind = event.kind.label(), bus = ?event.kind.bus(), "event");
        match event.kind {
            EventKind::Dispatch { terminal, route } => self.on_dispatch(now, terminal, route, obs),
            EventKind::ArriveAtStop { bus, stop_index } => {
                self.on_arrive(now, bus, stop_index, agent, obs)
            }
            EventKind::DepartFromStop { bus, generation } | EventKind::HoldExpire { bus, generation } => {
                self.on_depart(now, bus, generation, event.kind, agent, obs)
            }
            EventKind::Terminate { bus } => self.on_terminate(now, bus, obs),
        }
    }

    fn on_dispatch(
        &mut self,
        now:         SimTime,
        terminal_id: TerminalId,
        route_id:    RouteId,
        obs:         &mut dyn SimObserver,
    ) -> SimResult<()> {
        let net = Arc::clone(&self.network);
        let spec = route_spec(&net, route_id)?;

        let terminal = entity_mut(&mut self.terminals, terminal_id, "terminal")?;
        let slot = terminal.take(route_id).ok_or_else(|| {
            SimError::Invariant(format!("{terminal_id} has no dispatch left for {route_id}"))
        })?;
        let next = terminal.peek(route_id);
        if next == Some(slot.scheduled) {
            return Err(SimError::DuplicateDispatch { route: route_id, at: slot.scheduled });
        }

        let id = BusId(self.buses.len() as u32);
        self.buses.push(Bus::new(id, route_id, slot.seq, spec.origin, spec.capacity, slot.scheduled, now));
        self.live.insert(id);
        if let Some(order) = self.fleet.get_mut(route_id.index()) {
            order.push(id);
        }
        self.record(now, EventKind::Dispatch { terminal: terminal_id, route: route_id }, id, obs);

        self.start_leg(now, id, 0)?;
        if let Some(at) = next {
            self.queue.schedule(at, EventKind::Dispatch { terminal: terminal_id, route: route_id })?;
        }
        Ok(())
    }

    fn on_arrive(
        &mut self,
        now:   SimTime,
        id:    BusId,
        index: u16,
        agent: &mut dyn HoldingAgent,
        obs:   &mut dyn SimObserver,
    ) -> SimResult<()> {
        let net = Arc::clone(&self.network);
        let bus = bus_mut(&mut self.buses, id)?;
        let stop_id = *net
            .stop_sequence(bus.route)
            .get(index as usize)
            .ok_or_else(|| SimError::Invariant(format!("{id} arrived at stop index {index} past the route end")))?;
        bus.arrive(stop_id, index, now);

        let stop = entity_mut(&mut self.stops, stop_id, "stop")?;
        let free = stop.is_free();
        if free {
            stop.occupy(id)?;
        } else {
            stop.enqueue(id);
            bus.status = BusStatus::Queued;
        }
        self.record(now, EventKind::ArriveAtStop { bus: id, stop_index: index }, id, obs);

        if free {
            self.begin_service(now, id, agent, obs)?;
        }
        Ok(())
    }

    /// Serve a berthed bus from `start`: alight, board, dwell,
    /// schedule the departure, then give the holder its chance.
    fn begin_service(
        &mut self,
        start: SimTime,
        id:    BusId,
        agent: &mut dyn HoldingAgent,
        obs:   &mut dyn SimObserver,
    ) -> SimResult<()> {
        let net = Arc::clone(&self.network);
        let demand = Arc::clone(net.demand());
        let horizon = self.config.horizon();

        let bus = bus_mut(&mut self.buses, id)?;
        let spec = route_spec(&net, bus.route)?;
        let visit = bus
            .current_visit_mut()
            .ok_or_else(|| SimError::Invariant(format!("{id} began service without a visit")))?;
        visit.service_start = Some(start);
        let (stop_id, index) = (visit.stop, visit.stop_index as usize);
        bus.status = BusStatus::Servicing;

        let stop = entity_mut(&mut self.stops, stop_id, "stop")?;
        stop.advance_demand(start, demand.as_ref(), &mut self.next_pax);

        let off = bus.alight(Node::Stop(stop_id), start);
        let alighted = off.len() as u32;
        stop.record_alighted(alighted);
        for pax in &off {
            obs.on_pax_alighted(pax);
        }

        let first_new = bus.passengers.len();
        let mut boarded = stop.board(bus, start, start)?;
        let mut dwell = self.dwell.dwell_secs(boarded, alighted, spec);
        if self.config.board_truncation == BoardTruncation::ReadyToDepart {
            // Passengers reaching the stop before the doors close board too;
            // each admission lengthens the dwell, so iterate to a fixed point.
            loop {
                let ready = start.add_secs(dwell);
                if ready > horizon || bus.remaining_capacity() == 0 {
                    break;
                }
                if stop.advance_demand(ready, demand.as_ref(), &mut self.next_pax) == 0 {
                    break;
                }
                let more = stop.board(bus, start, ready)?;
                if more == 0 {
                    break;
                }
                boarded += more;
                dwell = self.dwell.dwell_secs(boarded, alighted, spec);
            }
        }
        for pax in &bus.passengers[first_new..] {
            obs.on_pax_boarded(pax);
        }

        let ready = start.add_secs(dwell);
        let prev_ready = stop.record_ready(bus.route, id, ready)?.map(|(_, t)| t);
        let holding_area = stop.has_holding_area();
        let load = bus.load();
        if let Some(v) = bus.current_visit_mut() {
            v.ready_at = Some(ready);
            v.boarded = boarded;
            v.alighted = alighted;
            v.load = load;
        }
        let handle = self
            .queue
            .schedule(ready, EventKind::DepartFromStop { bus: id, generation: bus.generation })?;
        bus.pending_departure = Some(handle);
        let route = bus.route;

        debug!(bus = %id, stop = %stop_id, boarded, alighted, dwell, load, "service");

        // ── Control point ─────────────────────────────────────────────────
        let point = ControlPoint {
            time:       start,
            bus:        id,
            route,
            stop:       stop_id,
            stop_index: index,
            holdable:   spec.is_hold_stop(stop_id),
            ready_at:   ready,
        };
        let holder = self.holder;
        if !holder.is_active(&point) {
            return Ok(());
        }
        let decision = holder.on_arrival(&point, agent, |want| self.snapshot(&point, prev_ready, want));
        if decision.clamped {
            self.warnings += 1;
        }

        let hold = decision.applied_time();
        if hold > SimTime::ZERO {
            let bus = bus_mut(&mut self.buses, id)?;
            if holding_area {
                // Counted down off-berth once the bus pulls out.
                bus.pending_hold = hold;
            } else {
                if let Some(stale) = bus.pending_departure.take() {
                    self.queue.cancel(stale);
                }
                let generation = bus.bump_generation();
                let handle = self.queue.schedule(ready + hold, EventKind::HoldExpire { bus: id, generation })?;
                bus.pending_departure = Some(handle);
                bus.status = BusStatus::Holding;
            }
            bus.total_hold_secs += hold.as_secs_f64();
            if let Some(v) = bus.current_visit_mut() {
                v.hold_secs = hold.as_secs_f64();
            }
            debug!(bus = %id, stop = %stop_id, hold = hold.as_secs_f64(), truncated = decision.truncated, "hold");
        }

        let record = HoldRecord {
            time:       start,
            bus:        id,
            route,
            stop:       stop_id,
            stop_index: index,
            ready_at:   ready,
            requested:  decision.requested,
            applied:    hold.as_secs_f64(),
            clamped:    decision.clamped,
            truncated:  decision.truncated,
        };
        obs.on_hold(&record);
        self.holds.push(record);
        Ok(())
    }

    fn on_depart(
        &mut self,
        now:        SimTime,
        id:         BusId,
        generation: u32,
        kind:       EventKind,
        agent:      &mut dyn HoldingAgent,
        obs:        &mut dyn SimObserver,
    ) -> SimResult<()> {
        let bus = bus_mut(&mut self.buses, id)?;
        if bus.generation != generation {
            debug!(bus = %id, generation, current = bus.generation, "stale departure dropped");
            return Ok(());
        }
        bus.pending_departure = None;
        let stop_id = bus
            .current_visit()
            .map(|v| v.stop)
            .ok_or_else(|| SimError::Invariant(format!("{id} departed without a visit")))?;

        let stop = entity_mut(&mut self.stops, stop_id, "stop")?;
        if stop.leave_holding(id) {
            return self.depart(now, id, kind, obs);
        }
        if !stop.can_leave(id)? {
            stop.block(id);
            debug!(bus = %id, stop = %stop_id, "blocked in berth");
            return Ok(());
        }
        self.vacate(now, stop_id, id, kind, agent, obs)
    }

    /// `id` pulls out of its berth.  Blocked buses it was holding back
    /// follow it out, then waiting buses take the freed berths.
    fn vacate(
        &mut self,
        now:     SimTime,
        stop_id: StopId,
        id:      BusId,
        kind:    EventKind,
        agent:   &mut dyn HoldingAgent,
        obs:     &mut dyn SimObserver,
    ) -> SimResult<()> {
        let mut leaving = Some((id, kind));
        while let Some((bus, kind)) = leaving {
            entity_mut(&mut self.stops, stop_id, "stop")?.release(bus)?;
            self.leave_berth(now, stop_id, bus, kind, obs)?;
            leaving = match entity_mut(&mut self.stops, stop_id, "stop")?.take_unblocked() {
                Some(next) => {
                    let generation = bus_mut(&mut self.buses, next)?.generation;
                    Some((next, EventKind::DepartFromStop { bus: next, generation }))
                }
                None => None,
            };
        }

        let admitted = entity_mut(&mut self.stops, stop_id, "stop")?.admit();
        for next in admitted {
            self.begin_service(now, next, agent, obs)?;
        }
        Ok(())
    }

    /// Out of the berth: into the holding area if a hold is pending there,
    /// otherwise off down the next leg.
    fn leave_berth(
        &mut self,
        now:     SimTime,
        stop_id: StopId,
        id:      BusId,
        kind:    EventKind,
        obs:     &mut dyn SimObserver,
    ) -> SimResult<()> {
        let bus = bus_mut(&mut self.buses, id)?;
        if bus.pending_hold == SimTime::ZERO {
            return self.depart(now, id, kind, obs);
        }
        let hold = std::mem::replace(&mut bus.pending_hold, SimTime::ZERO);
        let generation = bus.bump_generation();
        let handle = self.queue.schedule(now + hold, EventKind::HoldExpire { bus: id, generation })?;
        bus.pending_departure = Some(handle);
        bus.status = BusStatus::Holding;
        entity_mut(&mut self.stops, stop_id, "stop")?.enter_holding(id);
        debug!(bus = %id, stop = %stop_id, hold = hold.as_secs_f64(), "holding area");
        Ok(())
    }

    /// Close the visit and start the next leg.
    fn depart(&mut self, now: SimTime, id: BusId, kind: EventKind, obs: &mut dyn SimObserver) -> SimResult<()> {
        let net = Arc::clone(&self.network);
        let bus = bus_mut(&mut self.buses, id)?;
        bus.status = BusStatus::Departed;
        let visit = bus
            .current_visit_mut()
            .ok_or_else(|| SimError::Invariant(format!("{id} departed without a visit")))?;
        visit.departed_at = Some(now);
        let visit = visit.clone();
        let (route, seq, scheduled_dispatch) = (bus.route, bus.seq, bus.scheduled_dispatch);

        entity_mut(&mut self.stops, visit.stop, "stop")?.record_departure(route, id, now)?;

        let origin = route_spec(&net, route)?.origin;
        let scheduled = self
            .terminals
            .get(&origin)
            .and_then(|t| t.scheduled(route, visit.stop_index as usize, scheduled_dispatch));

        self.record(now, kind, id, obs);
        let leg = visit.stop_index as usize + 1;
        obs.on_stop_visit(&VisitRecord { bus: id, route, seq, visit, scheduled });
        self.start_leg(now, id, leg)
    }

    fn on_terminate(&mut self, now: SimTime, id: BusId, obs: &mut dyn SimObserver) -> SimResult<()> {
        let net = Arc::clone(&self.network);
        let bus = bus_mut(&mut self.buses, id)?;
        let destination = route_spec(&net, bus.route)?.destination;
        bus.position = BusPosition::AtTerminal(destination);
        bus.status = BusStatus::Terminated;

        let off = bus.alight(Node::Terminal(destination), now);
        for pax in &off {
            obs.on_pax_alighted(pax);
        }
        if !bus.passengers.is_empty() {
            warn!(bus = %id, left = bus.passengers.len(), "passengers still on board at the destination terminal");
        }

        let trip = trip_record(bus, now, true);
        self.live.remove(&id);
        self.record(now, EventKind::Terminate { bus: id }, id, obs);
        obs.on_trip_end(&trip);
        self.trips.push(trip);
        Ok(())
    }

    /// Sample leg `leg` of the bus's route and schedule the arrival at its
    /// end: the next stop, or the destination terminal after the last stop.
    fn start_leg(&mut self, now: SimTime, id: BusId, leg: usize) -> SimResult<()> {
        let net = Arc::clone(&self.network);
        let bus = bus_mut(&mut self.buses, id)?;
        let link_id = *net
            .route_links(bus.route)
            .get(leg)
            .ok_or_else(|| SimError::Invariant(format!("{id} has no leg {leg}")))?;
        let link = entity_mut(&mut self.links, link_id, "link")?;

        let arrives = now.add_secs(link.traverse(id, now));
        bus.start_link(link_id, leg as u16, now, arrives);

        let kind = if leg < net.stop_sequence(bus.route).len() {
            EventKind::ArriveAtStop { bus: id, stop_index: leg as u16 }
        } else {
            EventKind::Terminate { bus: id }
        };
        self.queue.schedule(arrives, kind)?;
        Ok(())
    }

    /// Horizon reached: drop pending events and close the live trips.
    fn truncate(&mut self, horizon: SimTime, obs: &mut dyn SimObserver) {
        self.queue.clear();
        self.queue.advance_to(horizon);

        let live = std::mem::take(&mut self.live);
        for id in &live {
            if let Some(bus) = self.buses.get(id.index()) {
                let trip = trip_record(bus, horizon, false);
                obs.on_trip_end(&trip);
                self.trips.push(trip);
            }
        }
        if !live.is_empty() {
            warn!(episode = self.episode, trips = live.len(), "trips cut off by the horizon");
        }

        let waiting: usize = self.stops.values().map(Stop::total_waiting_pax).sum();
        if waiting > 0 {
            warn!(episode = self.episode, waiting, "passengers left waiting at stops");
        }
    }

    // ── Records and snapshots ─────────────────────────────────────────────

    fn record(&mut self, now: SimTime, kind: EventKind, id: BusId, obs: &mut dyn SimObserver) {
        let Some(bus) = self.buses.get(id.index()) else { return };
        let (stop, stop_index) = match bus.position {
            BusPosition::AtStop { index } => {
                (self.network.stop_sequence(bus.route).get(index as usize).copied(), Some(index))
            }
            _ => (None, None),
        };
        let record = EventRecord {
            time: now,
            event: kind.label(),
            bus: id,
            route: bus.route,
            stop,
            stop_index,
            status: Some(bus.status),
            load: bus.load(),
            location_m: bus.location_m(now, &self.network),
        };
        obs.on_event(&record);
        if let Some(trajectory) = &mut self.trajectory {
            trajectory.push(record);
        }
    }

    /// The state an agent sees at `point`.  `prev_ready` is when the
    /// preceding bus of the route was ready to depart this stop.
    fn snapshot(&self, point: &ControlPoint, prev_ready: Option<SimTime>, want: SnapshotSpec) -> Snapshot {
        let now = point.time;
        let mut snap = Snapshot::bare(now, point.bus, point.route, point.stop, point.stop_index);
        snap.ready_at = point.ready_at;
        let Some(bus) = self.buses.get(point.bus.index()) else { return snap };
        let net = &*self.network;

        snap.seq = bus.seq;
        snap.pax_count = bus.load();
        snap.location_m = bus.location_m(now, net);
        if let Some(v) = bus.current_visit() {
            snap.arrived_at = v.arrived_at;
        }
        if let Some(spec) = net.route(point.route) {
            snap.schedule_headway = spec.dispatch.headway_secs();
            snap.board_secs_per_pax = spec.board_secs_per_pax;
        }
        if let Some(stop) = self.stops.get(&point.stop) {
            snap.forward_headway = prev_ready.map(|t| point.ready_at.secs_since(t));
            snap.stop_queue_len = stop.queue_len(point.route);
        }
        snap.stop_arrival_rate = net.demand().rate(point.route, point.stop, now);

        let (ahead, behind) = self.neighbours(bus);
        if let Some(ahead) = ahead.filter(|b| b.status != BusStatus::Terminated) {
            snap.forward_spacing_m = Some(ahead.location_m(now, net) - snap.location_m);
        }
        if let Some(behind) = behind {
            snap.backward_spacing_m = Some(snap.location_m - behind.location_m(now, net));
            snap.backward_headway = Some(backward_headway(bus, behind));
        }

        if self.config.has_schedule {
            let terminal = net.route(point.route).and_then(|r| self.terminals.get(&r.origin));
            if let Some(terminal) = terminal {
                if let Some(s) = terminal.scheduled(point.route, point.stop_index, bus.scheduled_dispatch) {
                    snap.arrival_deviation = Some(snap.arrived_at.secs_since(s.arrival));
                    snap.ready_deviation = Some(point.ready_at.secs_since(s.ready));
                }
                snap.forward_arrival_deviation = ahead.and_then(|a| {
                    let visit = a.visit(point.stop_index)?;
                    let s = terminal.scheduled(point.route, point.stop_index, a.scheduled_dispatch)?;
                    Some(visit.arrived_at.secs_since(s.arrival))
                });
            }
        }

        if want.fleet {
            snap.fleet = Some(
                self.live
                    .iter()
                    .filter_map(|id| self.buses.get(id.index()))
                    .map(|b| BusView {
                        bus:        b.id,
                        route:      b.route,
                        seq:        b.seq,
                        status:     b.status,
                        location_m: b.location_m(now, net),
                        load:       b.load(),
                    })
                    .collect(),
            );
        }
        snap
    }

    /// The preceding and following bus of the same route, by dispatch order.
    fn neighbours(&self, bus: &Bus) -> (Option<&Bus>, Option<&Bus>) {
        let Some(order) = self.fleet.get(bus.route.index()) else { return (None, None) };
        let pos = (bus.seq as usize).saturating_sub(1);
        let ahead = pos
            .checked_sub(1)
            .and_then(|i| order.get(i))
            .and_then(|id| self.buses.get(id.index()));
        let behind = order.get(pos + 1).and_then(|id| self.buses.get(id.index()));
        (ahead, behind)
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

/// Time between `bus` and its follower at the last point both have passed:
/// the follower's latest stop, or the origin terminal before its first stop.
fn backward_headway(bus: &Bus, follower: &Bus) -> f64 {
    follower
        .last_stop_index()
        .and_then(|j| Some(follower.visit(j)?.arrived_at.secs_since(bus.visit(j)?.arrived_at)))
        .unwrap_or_else(|| follower.dispatched_at.secs_since(bus.dispatched_at))
}

fn trip_record(bus: &Bus, ended_at: SimTime, completed: bool) -> TripRecord {
    TripRecord {
        bus: bus.id,
        route: bus.route,
        seq: bus.seq,
        scheduled_dispatch: bus.scheduled_dispatch,
        dispatched_at: bus.dispatched_at,
        ended_at,
        completed,
        stops_visited: bus.visits.iter().filter(|v| v.departed_at.is_some()).count(),
        boardings: bus.boardings,
        alightings: bus.alightings,
        load: bus.load(),
        total_hold_secs: bus.total_hold_secs,
    }
}

fn route_spec(network: &Network, route: RouteId) -> SimResult<&RouteSpec> {
    network
        .route(route)
        .ok_or_else(|| SimError::Invariant(format!("unknown {route}")))
}

fn bus_mut(buses: &mut [Bus], id: BusId) -> SimResult<&mut Bus> {
    buses
        .get_mut(id.index())
        .ok_or_else(|| SimError::Invariant(format!("unknown {id}")))
}

fn entity_mut<'a, K, V>(map: &'a mut FxHashMap<K, V>, id: K, kind: &str) -> SimResult<&'a mut V>
where
    K: std::hash::Hash + Eq + std::fmt::Display,
{
    match map.get_mut(&id) {
        Some(v) => Ok(v),
        None => Err(SimError::Invariant(format!("no {kind} entity for {id}"))),
    }
}
