//! Static topology descriptors: nodes, stops, terminals, links, routes.

use std::fmt;

use bt_core::{LinkId, RouteId, SimTime, StopId, TerminalId};

use crate::TravelTimeSpec;

// ── Node ──────────────────────────────────────────────────────────────────────

/// An endpoint of a link: either a terminal or a stop.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Node {
    Terminal(TerminalId),
    Stop(StopId),
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Terminal(t) => write!(f, "{t}"),
            Node::Stop(s)     => write!(f, "{s}"),
        }
    }
}

// ── Stops, terminals, links ───────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StopSpec {
    pub id:     StopId,
    pub name:   String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub layout: StopLayout,
}

/// Berth discipline at a multi-berth stop.  Berth 0 is the most upstream.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum QueueRule {
    /// Enter the furthest berth reachable through the free run at the
    /// upstream end; leave only once every downstream berth is empty.
    #[default]
    Fifo,
    /// Enter the first berth of the free run at the downstream end; leave
    /// at any time.
    FreeOvertaking,
}

/// Physical layout of a stop.
///
/// The default is one berth with no holding area: a single server where a
/// held bus keeps the berth and nothing overtakes it.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct StopLayout {
    pub berths:       u16,
    pub rule:         QueueRule,
    /// Held buses pull out of their berth and count down the hold in a
    /// separate area, freeing the berth for followers.
    pub holding_area: bool,
}

impl StopLayout {
    pub fn new(berths: u16, rule: QueueRule) -> Self {
        Self { berths, rule, holding_area: false }
    }

    pub fn with_holding_area(mut self) -> Self {
        self.holding_area = true;
        self
    }
}

impl Default for StopLayout {
    fn default() -> Self {
        Self::new(1, QueueRule::Fifo)
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TerminalSpec {
    pub id:   TerminalId,
    pub name: String,
}

/// A directed link between two consecutive route nodes.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinkSpec {
    pub id:          LinkId,
    pub from:        Node,
    pub to:          Node,
    pub length_m:    f64,
    pub travel_time: TravelTimeSpec,
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

/// How a terminal times the departures of one route.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DispatchSpec {
    /// First bus at `first_secs`, then one every `headway_secs`.
    Headway { first_secs: f64, headway_secs: f64 },
    /// Explicit departure times in seconds.  Must be strictly increasing.
    Timetable(Vec<f64>),
}

impl DispatchSpec {
    /// Dispatch times strictly before `horizon`.
    pub fn times(&self, horizon: SimTime) -> Vec<SimTime> {
        match self {
            DispatchSpec::Headway { first_secs, headway_secs } => {
                let first = SimTime::from_secs_f64(*first_secs);
                if !headway_secs.is_finite() || *headway_secs <= 0.0 {
                    return if first < horizon { vec![first] } else { vec![] };
                }
                let mut out = Vec::new();
                let mut k = 0u64;
                loop {
                    // Multiply rather than accumulate so long runs don't drift.
                    let t = SimTime::from_secs_f64(first_secs + k as f64 * headway_secs);
                    if t >= horizon {
                        break;
                    }
                    out.push(t);
                    k += 1;
                }
                out
            }
            DispatchSpec::Timetable(secs) => secs
                .iter()
                .map(|&s| SimTime::from_secs_f64(s))
                .take_while(|&t| t < horizon)
                .collect(),
        }
    }

    /// The nominal headway `H` used by schedule-based control.
    ///
    /// For a timetable this is the mean gap (0 with fewer than two entries).
    pub fn headway_secs(&self) -> f64 {
        match self {
            DispatchSpec::Headway { headway_secs, .. } => *headway_secs,
            DispatchSpec::Timetable(secs) if secs.len() >= 2 => {
                (secs[secs.len() - 1] - secs[0]) / (secs.len() - 1) as f64
            }
            DispatchSpec::Timetable(_) => 0.0,
        }
    }
}

// ── Route ─────────────────────────────────────────────────────────────────────

/// One direction of bus service.
///
/// Construct with [`RouteSpec::new`] and the chained setters; the route id is
/// assigned by [`NetworkBuilder::add_route`][crate::NetworkBuilder::add_route].
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RouteSpec {
    pub id:                  RouteId,
    pub name:                String,
    pub origin:              TerminalId,
    /// Visit order.  Non-empty, no repeats.
    pub stops:               Vec<StopId>,
    pub destination:         TerminalId,
    pub dispatch:            DispatchSpec,
    /// Passenger capacity per bus; `None` is unlimited.
    pub capacity:            Option<u32>,
    /// Stops at which the control point may hold buses of this route.
    pub hold_stops:          Vec<StopId>,
    pub board_secs_per_pax:  f64,
    pub alight_secs_per_pax: f64,
}

impl RouteSpec {
    /// A route with unlimited capacity, every stop holdable, 2 s per
    /// boarding and 1 s per alighting passenger.
    pub fn new(
        name:        impl Into<String>,
        origin:      TerminalId,
        stops:       Vec<StopId>,
        destination: TerminalId,
        dispatch:    DispatchSpec,
    ) -> Self {
        Self {
            id: RouteId::INVALID,
            name: name.into(),
            origin,
            hold_stops: stops.clone(),
            stops,
            destination,
            dispatch,
            capacity:            None,
            board_secs_per_pax:  2.0,
            alight_secs_per_pax: 1.0,
        }
    }

    pub fn capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    pub fn hold_stops(mut self, stops: Vec<StopId>) -> Self {
        self.hold_stops = stops;
        self
    }

    pub fn board_secs(mut self, secs: f64) -> Self {
        self.board_secs_per_pax = secs;
        self
    }

    pub fn alight_secs(mut self, secs: f64) -> Self {
        self.alight_secs_per_pax = secs;
        self
    }

    /// Node sequence origin → stops → destination.
    pub fn nodes(&self) -> Vec<Node> {
        let mut nodes = Vec::with_capacity(self.stops.len() + 2);
        nodes.push(Node::Terminal(self.origin));
        nodes.extend(self.stops.iter().map(|&s| Node::Stop(s)));
        nodes.push(Node::Terminal(self.destination));
        nodes
    }

    /// Position of `stop` in the visit order.
    pub fn stop_index(&self, stop: StopId) -> Option<usize> {
        self.stops.iter().position(|&s| s == stop)
    }

    pub fn is_hold_stop(&self, stop: StopId) -> bool {
        self.hold_stops.contains(&stop)
    }
}
