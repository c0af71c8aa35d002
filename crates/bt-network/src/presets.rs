//! Ready-made topologies.
//!
//! | Preset                     | Shape                                              |
//! |----------------------------|----------------------------------------------------|
//! | [`homogeneous_one_route`]  | 35 identical stops on one route, stochastic links  |
//! | [`merging_corridor`]       | two branches merging onto a shared trunk           |
//! | [`single_stop`]            | terminal → one stop → terminal, deterministic      |

use bt_core::{RouteId, StopId, TerminalId};

use crate::{
    ArrivalProcess, DemandProfile, DispatchSpec, Network, NetworkBuilder, NetworkResult, Node,
    OdDemand, OdTable, RouteSpec, TravelTimeSpec,
};

// ── Homogeneous corridor ──────────────────────────────────────────────────────

pub const HOMOGENEOUS_STOPS:      usize = 35;
pub const HOMOGENEOUS_SPACING_M:  f64   = 1000.0;
pub const HOMOGENEOUS_SPEED_MPS:  f64   = 20.0;
pub const HOMOGENEOUS_HEADWAY_S:  f64   = 300.0;
pub const HOMOGENEOUS_PAX_PER_MIN: f64  = 4.0;

/// One route, 35 stops 1 km apart, normal travel times (20 m/s, cv 0.1),
/// 300 s headway and 4 pax/min at every stop riding to the last stop.
pub fn homogeneous_one_route() -> NetworkResult<Network> {
    let mut b = NetworkBuilder::new("homogeneous_one_route");
    let origin = b.add_terminal("origin");
    let stops: Vec<StopId> = (0..HOMOGENEOUS_STOPS)
        .map(|i| b.add_stop(format!("stop {i}")))
        .collect();
    let destination = b.add_terminal("destination");

    let mean_secs = HOMOGENEOUS_SPACING_M / HOMOGENEOUS_SPEED_MPS;
    let tt = TravelTimeSpec::Normal { mean_secs, cv: 0.1, min_secs: 0.0 };
    chain_links(&mut b, origin, &stops, destination, HOMOGENEOUS_SPACING_M, &tt);

    let route = b.add_route(
        RouteSpec::new(
            "0",
            origin,
            stops.clone(),
            destination,
            DispatchSpec::Headway { first_secs: 0.0, headway_secs: HOMOGENEOUS_HEADWAY_S },
        )
        .board_secs(2.0),
    );

    let rate = HOMOGENEOUS_PAX_PER_MIN / 60.0;
    let mut od = OdTable::new();
    if let Some((&last, upstream)) = stops.split_last() {
        for &s in upstream {
            od.insert(route, s, Node::Stop(last), rate);
        }
        od.insert(route, last, Node::Terminal(destination), rate);
    }
    b.demand(OdDemand::new(od, DemandProfile::flat(), ArrivalProcess::Poisson)?);
    b.build()
}

// ── Merging corridor ──────────────────────────────────────────────────────────

pub const MERGE_BRANCH_STOPS: usize = 4;
pub const MERGE_TRUNK_STOPS:  usize = 8;
pub const MERGE_HEADWAY_S:    f64   = 600.0;

/// Two routes from separate terminals, each with its own branch, merging
/// onto a shared trunk that ends at a common terminal.  Dispatches are
/// offset by half a headway so the trunk sees a combined 300 s service.
///
/// Every passenger rides to a trunk stop further down or to the end
/// terminal.  Holding is allowed on the trunk only.
pub fn merging_corridor() -> NetworkResult<Network> {
    let mut b = NetworkBuilder::new("merging_corridor");
    let west = b.add_terminal("west depot");
    let north = b.add_terminal("north depot");
    let west_branch: Vec<StopId> = (0..MERGE_BRANCH_STOPS)
        .map(|i| b.add_stop(format!("west {i}")))
        .collect();
    let north_branch: Vec<StopId> = (0..MERGE_BRANCH_STOPS)
        .map(|i| b.add_stop(format!("north {i}")))
        .collect();
    let trunk: Vec<StopId> = (0..MERGE_TRUNK_STOPS)
        .map(|i| b.add_stop(format!("trunk {i}")))
        .collect();
    let end = b.add_terminal("downtown");

    let branch_tt = TravelTimeSpec::LogNormal { mean_secs: 60.0, cv: 0.2, min_secs: 20.0 };
    let trunk_tt = TravelTimeSpec::Normal { mean_secs: 45.0, cv: 0.1, min_secs: 20.0 };

    // Branches up to (but excluding) the first trunk stop.
    for (terminal, branch) in [(west, &west_branch), (north, &north_branch)] {
        let mut prev = Node::Terminal(terminal);
        for &s in branch.iter() {
            b.add_link(prev, Node::Stop(s), 1200.0, branch_tt.clone());
            prev = Node::Stop(s);
        }
        b.add_link(prev, Node::Stop(trunk[0]), 1200.0, branch_tt.clone());
    }
    // Shared trunk.
    for w in trunk.windows(2) {
        b.add_link(Node::Stop(w[0]), Node::Stop(w[1]), 800.0, trunk_tt.clone());
    }
    if let Some(&last) = trunk.last() {
        b.add_link(Node::Stop(last), Node::Terminal(end), 800.0, trunk_tt.clone());
    }

    let mut routes = Vec::with_capacity(2);
    for (name, terminal, branch, first_secs) in [
        ("W", west, &west_branch, 0.0),
        ("N", north, &north_branch, MERGE_HEADWAY_S / 2.0),
    ] {
        let stops: Vec<StopId> = branch.iter().chain(trunk.iter()).copied().collect();
        let route = RouteSpec::new(
            name,
            terminal,
            stops,
            end,
            DispatchSpec::Headway { first_secs, headway_secs: MERGE_HEADWAY_S },
        )
        .capacity(80)
        .hold_stops(trunk.clone());
        routes.push(b.add_route(route));
    }

    let mut od = OdTable::new();
    for &route in &routes {
        let branch = if route == RouteId(0) { &west_branch } else { &north_branch };
        for &s in branch {
            od.insert(route, s, Node::Stop(trunk[MERGE_TRUNK_STOPS / 2]), 1.5 / 60.0);
            od.insert(route, s, Node::Terminal(end), 1.5 / 60.0);
        }
        for (i, &s) in trunk.iter().enumerate() {
            let dest = trunk.get(i + 3).map_or(Node::Terminal(end), |&d| Node::Stop(d));
            od.insert(route, s, dest, 1.0 / 60.0);
        }
    }
    // Morning peak between one and two hours in.
    let profile = DemandProfile::new(vec![(0.0, 1.0), (3600.0, 1.5), (7200.0, 1.0)])?;
    b.demand(OdDemand::new(od, profile, ArrivalProcess::Poisson)?);
    b.build()
}

// ── Single stop ───────────────────────────────────────────────────────────────

/// Terminal → one stop → terminal with deterministic `travel_secs` legs of
/// 500 m, dispatches every `headway_secs` from t = 0, and Poisson demand at
/// `pax_per_sec` riding to the end terminal.
pub fn single_stop(headway_secs: f64, pax_per_sec: f64, travel_secs: f64) -> NetworkResult<Network> {
    single_stop_with(
        DispatchSpec::Headway { first_secs: 0.0, headway_secs },
        pax_per_sec,
        travel_secs,
    )
}

/// [`single_stop`] with an arbitrary dispatch plan.
pub fn single_stop_with(dispatch: DispatchSpec, pax_per_sec: f64, travel_secs: f64) -> NetworkResult<Network> {
    let mut b = NetworkBuilder::new("single_stop");
    let origin = b.add_terminal("origin");
    let stop = b.add_stop("stop");
    let destination = b.add_terminal("destination");
    let tt = TravelTimeSpec::Deterministic { secs: travel_secs };
    chain_links(&mut b, origin, &[stop], destination, 500.0, &tt);

    let route = b.add_route(RouteSpec::new("0", origin, vec![stop], destination, dispatch));

    let mut od = OdTable::new();
    od.insert(route, stop, Node::Terminal(destination), pax_per_sec);
    b.demand(OdDemand::new(od, DemandProfile::flat(), ArrivalProcess::Poisson)?);
    b.build()
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn chain_links(
    b:           &mut NetworkBuilder,
    origin:      TerminalId,
    stops:       &[StopId],
    destination: TerminalId,
    length_m:    f64,
    tt:          &TravelTimeSpec,
) {
    let nodes: Vec<Node> = std::iter::once(Node::Terminal(origin))
        .chain(stops.iter().map(|&s| Node::Stop(s)))
        .chain(std::iter::once(Node::Terminal(destination)))
        .collect();
    for w in nodes.windows(2) {
        b.add_link(w[0], w[1], length_m, tt.clone());
    }
}
