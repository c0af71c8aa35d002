//! The virtual bus: a perfect-schedule reference trajectory per route.
//!
//! The virtual bus leaves the origin terminal at t = 0, drives every link at
//! its mean travel time, dwells at each stop for the expected boarding time
//! of one headway's worth of passengers, then holds for the per-stop slack:
//!
//! ```text
//! arrival[i]   = departure[i-1] + mean_link_secs(i)
//! ready[i]     = arrival[i] + rate(i) * H * board_secs_per_pax
//! departure[i] = ready[i] + hold[i]
//! ```
//!
//! Alighting is ignored; boarding dominates the dwell.  Bus `k` is scheduled
//! at `dispatch_k + offset`.  Passenger arrival streams start at the virtual
//! bus's ready time at each stop.
//!
//! `rate(i)` is the demand rate in force at t = 0.  Offsets are shared by
//! every dispatch, so a time-of-day [`DemandProfile`][crate::DemandProfile]
//! only enters through its first segment; scheduled dwells do not follow
//! later peaks.

use bt_core::{RouteId, SimTime};

use crate::{Network, TravelTimeModel};

/// Offsets (seconds after dispatch) of the virtual bus at one stop.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct StopOffsets {
    pub arrival_secs:   f64,
    pub ready_secs:     f64,
    pub departure_secs: f64,
}

/// Absolute scheduled times of one bus at one stop.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Scheduled {
    pub arrival:   SimTime,
    pub ready:     SimTime,
    pub departure: SimTime,
}

/// The virtual-bus trajectory of one route.
#[derive(Clone, Debug, PartialEq)]
pub struct RouteSchedule {
    pub route:        RouteId,
    pub headway_secs: f64,
    stops:            Vec<StopOffsets>,
    /// Arrival offset at the destination terminal.
    pub end_secs:     f64,
}

impl RouteSchedule {
    pub fn stops(&self) -> &[StopOffsets] {
        &self.stops
    }
}

#[derive(Clone, Debug, PartialEq, Default)]
pub struct VirtualSchedule {
    routes: Vec<RouteSchedule>,
}

impl VirtualSchedule {
    /// Perfect schedule with the same `slack_secs` hold at every stop.
    pub fn perfect(network: &Network, slack_secs: f64) -> Self {
        Self::with_holds(network, |_, _| slack_secs)
    }

    /// Schedule with a per-(route, stop index) average hold, e.g. the mean
    /// holds observed in a previous run.  Negative holds count as 0, and
    /// dwells use the t = 0 demand rate.
    pub fn with_holds(network: &Network, hold_secs: impl Fn(RouteId, usize) -> f64) -> Self {
        let routes = network
            .routes()
            .iter()
            .map(|route| {
                let headway = route.dispatch.headway_secs();
                let legs = network.route_links(route.id);
                let mean = |leg: usize| {
                    legs.get(leg)
                        .and_then(|&l| network.travel_time(l))
                        .map_or(0.0, |s| s.mean_secs())
                };

                let mut t = 0.0;
                let mut stops = Vec::with_capacity(route.stops.len());
                for (i, &stop) in route.stops.iter().enumerate() {
                    t += mean(i);
                    let arrival_secs = t;
                    let rate = network.demand().rate(route.id, stop, SimTime::ZERO);
                    t += rate * headway * route.board_secs_per_pax;
                    let ready_secs = t;
                    t += hold_secs(route.id, i).max(0.0);
                    stops.push(StopOffsets { arrival_secs, ready_secs, departure_secs: t });
                }
                let end_secs = t + mean(route.stops.len());

                RouteSchedule { route: route.id, headway_secs: headway, stops, end_secs }
            })
            .collect();
        Self { routes }
    }

    pub fn route(&self, route: RouteId) -> Option<&RouteSchedule> {
        self.routes.get(route.index())
    }

    pub fn offsets(&self, route: RouteId, stop_index: usize) -> Option<StopOffsets> {
        self.route(route).and_then(|r| r.stops.get(stop_index)).copied()
    }

    /// Scheduled times at stop `stop_index` of a bus dispatched at `dispatch`.
    pub fn scheduled(&self, route: RouteId, stop_index: usize, dispatch: SimTime) -> Option<Scheduled> {
        let o = self.offsets(route, stop_index)?;
        Some(Scheduled {
            arrival:   dispatch.add_secs(o.arrival_secs),
            ready:     dispatch.add_secs(o.ready_secs),
            departure: dispatch.add_secs(o.departure_secs),
        })
    }

    /// When the passenger stream at a stop starts: the virtual bus's ready
    /// time there.
    pub fn demand_start(&self, route: RouteId, stop_index: usize) -> SimTime {
        self.offsets(route, stop_index)
            .map_or(SimTime::ZERO, |o| SimTime::from_secs_f64(o.ready_secs))
    }
}
