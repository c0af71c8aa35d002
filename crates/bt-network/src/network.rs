//! The validated route network and its builder.
//!
//! # Data layout
//!
//! Stops, terminals, links and routes are stored in dense `Vec`s indexed by
//! their typed ids.  For every route the builder also resolves, once:
//!
//! ```text
//! route_links[r][k]  = LinkId of leg k   (k = 0 ..= stops.len())
//! offsets_m[r][i]    = distance from the origin terminal to stop i
//! offsets_m[r][n]    = total route length (destination terminal)
//! ```
//!
//! so the engine never searches the topology at run time.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bt_core::{LinkId, RouteId, SimTime, StopId, TerminalId};

use crate::{
    DemandModel, DispatchSpec, LinkSpec, NetworkError, NetworkResult, NoDemand, Node, RouteSpec,
    StopLayout, StopSpec, TerminalSpec, TravelTimeSampler, TravelTimeSpec,
};

// ── Network ───────────────────────────────────────────────────────────────────

/// Static topology plus the dispatch, demand and travel-time generators.
///
/// Immutable once built.  Share between episodes with `Arc<Network>`.
/// Construct with [`NetworkBuilder`].
pub struct Network {
    name:        String,
    terminals:   Vec<TerminalSpec>,
    stops:       Vec<StopSpec>,
    links:       Vec<LinkSpec>,
    samplers:    Vec<TravelTimeSampler>,
    routes:      Vec<RouteSpec>,
    route_links: Vec<Vec<LinkId>>,
    offsets_m:   Vec<Vec<f64>>,
    demand:      Arc<dyn DemandModel>,
}

impl Network {
    pub fn name(&self) -> &str {
        &self.name
    }

    // ── Lookup ────────────────────────────────────────────────────────────

    pub fn routes(&self) -> &[RouteSpec] {
        &self.routes
    }

    pub fn route(&self, id: RouteId) -> Option<&RouteSpec> {
        self.routes.get(id.index())
    }

    pub fn stops(&self) -> &[StopSpec] {
        &self.stops
    }

    pub fn stop(&self, id: StopId) -> Option<&StopSpec> {
        self.stops.get(id.index())
    }

    pub fn terminals(&self) -> &[TerminalSpec] {
        &self.terminals
    }

    pub fn terminal(&self, id: TerminalId) -> Option<&TerminalSpec> {
        self.terminals.get(id.index())
    }

    pub fn links(&self) -> &[LinkSpec] {
        &self.links
    }

    pub fn link(&self, id: LinkId) -> Option<&LinkSpec> {
        self.links.get(id.index())
    }

    // ── Route geometry ────────────────────────────────────────────────────

    /// Ordered stop list of `route` (empty for an unknown route).
    pub fn stop_sequence(&self, route: RouteId) -> &[StopId] {
        self.route(route).map_or(&[], |r| r.stops.as_slice())
    }

    /// Link of every leg of `route`: leg `k` ends at stop `k`; the last leg
    /// ends at the destination terminal.
    pub fn route_links(&self, route: RouteId) -> &[LinkId] {
        self.route_links.get(route.index()).map_or(&[], Vec::as_slice)
    }

    /// Distance from the origin terminal to stop `index` of `route`;
    /// `index == stops.len()` gives the full route length.
    pub fn stop_offset_m(&self, route: RouteId, index: usize) -> f64 {
        self.offsets_m
            .get(route.index())
            .and_then(|v| v.get(index))
            .copied()
            .unwrap_or(0.0)
    }

    /// Routes serving `stop`, in route-id order.
    pub fn routes_serving(&self, stop: StopId) -> Vec<RouteId> {
        self.routes
            .iter()
            .filter(|r| r.stops.contains(&stop))
            .map(|r| r.id)
            .collect()
    }

    // ── Generators ────────────────────────────────────────────────────────

    /// Dispatch timestamps of `route` strictly before `horizon`.
    pub fn dispatch_times(&self, route: RouteId, horizon: SimTime) -> Vec<SimTime> {
        self.route(route).map_or_else(Vec::new, |r| r.dispatch.times(horizon))
    }

    pub fn demand(&self) -> &Arc<dyn DemandModel> {
        &self.demand
    }

    /// The validated travel-time sampler of `link`.
    pub fn travel_time(&self, link: LinkId) -> Option<&TravelTimeSampler> {
        self.samplers.get(link.index())
    }
}

// ── NetworkBuilder ────────────────────────────────────────────────────────────

/// Construct a [`Network`] incrementally, then call [`build`](Self::build).
///
/// Ids are assigned densely in insertion order.  Nothing is checked until
/// `build()`, which validates the whole topology at once and fails on the
/// first inconsistency.
///
/// # Example
///
/// ```
/// use bt_network::{DispatchSpec, NetworkBuilder, Node, RouteSpec, TravelTimeSpec};
///
/// let mut b = NetworkBuilder::new("tiny");
/// let o = b.add_terminal("depot");
/// let s = b.add_stop("main st");
/// let d = b.add_terminal("end");
/// let tt = TravelTimeSpec::Deterministic { secs: 60.0 };
/// b.add_link(Node::Terminal(o), Node::Stop(s), 500.0, tt.clone());
/// b.add_link(Node::Stop(s), Node::Terminal(d), 500.0, tt);
/// b.add_route(RouteSpec::new(
///     "1", o, vec![s], d,
///     DispatchSpec::Headway { first_secs: 0.0, headway_secs: 300.0 },
/// ));
/// let net = b.build().unwrap();
/// assert_eq!(net.route_links(net.routes()[0].id).len(), 2);
/// ```
pub struct NetworkBuilder {
    name:      String,
    terminals: Vec<TerminalSpec>,
    stops:     Vec<StopSpec>,
    links:     Vec<LinkSpec>,
    routes:    Vec<RouteSpec>,
    demand:    Arc<dyn DemandModel>,
}

impl NetworkBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name:      name.into(),
            terminals: Vec::new(),
            stops:     Vec::new(),
            links:     Vec::new(),
            routes:    Vec::new(),
            demand:    Arc::new(NoDemand),
        }
    }

    pub fn add_terminal(&mut self, name: impl Into<String>) -> TerminalId {
        let id = TerminalId(self.terminals.len() as u32);
        self.terminals.push(TerminalSpec { id, name: name.into() });
        id
    }

    /// Single-berth stop without a holding area.
    pub fn add_stop(&mut self, name: impl Into<String>) -> StopId {
        self.add_stop_with(name, StopLayout::default())
    }

    pub fn add_stop_with(&mut self, name: impl Into<String>, layout: StopLayout) -> StopId {
        let id = StopId(self.stops.len() as u32);
        self.stops.push(StopSpec { id, name: name.into(), layout });
        id
    }

    pub fn add_link(&mut self, from: Node, to: Node, length_m: f64, travel_time: TravelTimeSpec) -> LinkId {
        let id = LinkId(self.links.len() as u32);
        self.links.push(LinkSpec { id, from, to, length_m, travel_time });
        id
    }

    pub fn add_route(&mut self, mut route: RouteSpec) -> RouteId {
        let id = RouteId(self.routes.len() as u16);
        route.id = id;
        self.routes.push(route);
        id
    }

    /// Replace the demand model (default: [`NoDemand`]).
    pub fn demand(&mut self, model: impl DemandModel + 'static) -> &mut Self {
        self.demand = Arc::new(model);
        self
    }

    pub fn stop_count(&self) -> usize {
        self.stops.len()
    }

    /// Validate and freeze.
    pub fn build(self) -> NetworkResult<Network> {
        if self.routes.is_empty() {
            return Err(NetworkError::Config(format!("network {:?} has no routes", self.name)));
        }
        if self.routes.len() > u16::MAX as usize {
            return Err(NetworkError::Config("too many routes".into()));
        }

        if let Some(stop) = self.stops.iter().find(|s| s.layout.berths == 0) {
            return Err(NetworkError::Config(format!("{} ({}) has no berths", stop.id, stop.name)));
        }

        // ── Links ─────────────────────────────────────────────────────────
        let mut link_by_ends: HashMap<(Node, Node), LinkId> = HashMap::with_capacity(self.links.len());
        let mut samplers = Vec::with_capacity(self.links.len());
        for link in &self.links {
            self.check_node(link.from)?;
            self.check_node(link.to)?;
            if !link.length_m.is_finite() || link.length_m < 0.0 {
                return Err(NetworkError::Config(format!(
                    "{} length must be non-negative, got {}",
                    link.id, link.length_m
                )));
            }
            if link_by_ends.insert((link.from, link.to), link.id).is_some() {
                return Err(NetworkError::Config(format!(
                    "duplicate link from {} to {}",
                    link.from, link.to
                )));
            }
            samplers.push(link.travel_time.sampler(&link.id.to_string())?);
        }

        // ── Routes ────────────────────────────────────────────────────────
        let mut route_links = Vec::with_capacity(self.routes.len());
        let mut offsets_m = Vec::with_capacity(self.routes.len());
        for route in &self.routes {
            self.check_route(route)?;

            let nodes = route.nodes();
            let mut legs = Vec::with_capacity(nodes.len() - 1);
            let mut offsets = Vec::with_capacity(nodes.len() - 1);
            let mut dist = 0.0;
            for pair in nodes.windows(2) {
                let link = *link_by_ends.get(&(pair[0], pair[1])).ok_or(NetworkError::MissingLink {
                    route: route.id,
                    from:  pair[0],
                    to:    pair[1],
                })?;
                dist += self.links[link.index()].length_m;
                legs.push(link);
                offsets.push(dist);
            }
            route_links.push(legs);
            offsets_m.push(offsets);
        }

        let network = Network {
            name: self.name,
            terminals: self.terminals,
            stops: self.stops,
            links: self.links,
            samplers,
            routes: self.routes,
            route_links,
            offsets_m,
            demand: self.demand,
        };
        network.demand.validate(&network)?;
        Ok(network)
    }

    // ── Validation helpers ────────────────────────────────────────────────

    fn check_node(&self, node: Node) -> NetworkResult<()> {
        let ok = match node {
            Node::Terminal(t) => t.index() < self.terminals.len(),
            Node::Stop(s)     => s.index() < self.stops.len(),
        };
        if ok {
            Ok(())
        } else {
            Err(NetworkError::Config(format!("link endpoint {node} does not exist")))
        }
    }

    fn check_route(&self, route: &RouteSpec) -> NetworkResult<()> {
        let id = route.id;
        if route.stops.is_empty() {
            return Err(NetworkError::EmptyRoute(id));
        }
        for terminal in [route.origin, route.destination] {
            if terminal.index() >= self.terminals.len() {
                return Err(NetworkError::UnknownTerminal { route: id, terminal });
            }
        }
        let mut seen = HashSet::with_capacity(route.stops.len());
        for &stop in &route.stops {
            if stop.index() >= self.stops.len() {
                return Err(NetworkError::UnknownStop { route: id, stop });
            }
            if !seen.insert(stop) {
                return Err(NetworkError::CyclicRoute { route: id, stop });
            }
        }
        if let Some(&stop) = route.hold_stops.iter().find(|s| !seen.contains(s)) {
            return Err(NetworkError::UnknownStop { route: id, stop });
        }
        if route.stops.len() > u16::MAX as usize {
            return Err(NetworkError::Config(format!("{id} has too many stops")));
        }

        if route.capacity == Some(0) {
            return Err(NetworkError::Config(format!("{id} capacity must be positive")));
        }
        for (name, v) in [
            ("board_secs_per_pax", route.board_secs_per_pax),
            ("alight_secs_per_pax", route.alight_secs_per_pax),
        ] {
            if !v.is_finite() || v < 0.0 {
                return Err(NetworkError::Config(format!(
                    "{id} {name} must be non-negative, got {v}"
                )));
            }
        }

        check_dispatch(id, &route.dispatch)
    }
}

fn check_dispatch(route: RouteId, dispatch: &DispatchSpec) -> NetworkResult<()> {
    match dispatch {
        DispatchSpec::Headway { first_secs, headway_secs } => {
            if !first_secs.is_finite() || *first_secs < 0.0 {
                return Err(NetworkError::Config(format!(
                    "{route} first dispatch must be non-negative, got {first_secs}"
                )));
            }
            if !headway_secs.is_finite() || *headway_secs <= 0.0 {
                return Err(NetworkError::Config(format!(
                    "{route} headway must be positive, got {headway_secs}"
                )));
            }
        }
        DispatchSpec::Timetable(times) => {
            if times.is_empty() {
                return Err(NetworkError::Config(format!("{route} timetable is empty")));
            }
            if let Some(t) = times.iter().find(|t| !t.is_finite() || **t < 0.0) {
                return Err(NetworkError::Config(format!(
                    "{route} timetable entry must be non-negative, got {t}"
                )));
            }
            // Distinct in milliseconds, since that is what the queue sees.
            let ms: Vec<SimTime> = times.iter().map(|&t| SimTime::from_secs_f64(t)).collect();
            if let Some(w) = ms.windows(2).find(|w| w[1] <= w[0]) {
                return Err(NetworkError::Config(format!(
                    "{route} timetable must be strictly increasing ({} then {})",
                    w[0], w[1]
                )));
            }
        }
    }
    Ok(())
}
