//! Components factories: how an episode's entities are constructed.
//!
//! [`SimBuilder`](crate::SimBuilder) calls the required constructors in a
//! fixed order (terminals → stops → links → holder) and then checks that
//! every terminal, stop, and link a route references was built exactly once.
//!
//! | Factory                  | Links                                     |
//! |--------------------------|-------------------------------------------|
//! | [`StandardFactory`]      | the network's travel-time distributions   |
//! | [`DeterministicFactory`] | every link at its mean travel time        |
//!
//! [`FactoryRegistry`] maps `SimConfig::env_name` to a network and factory.

use std::sync::Arc;

use bt_control::Holder;
use bt_core::SimConfig;
use bt_entity::{DwellModel, LinearDwell, Link, Stop, Terminal};
use bt_network::{Network, NetworkResult, TravelTimeModel, TravelTimeSampler, VirtualSchedule, presets};

use crate::{SimError, SimResult};

// ── FactoryContext ────────────────────────────────────────────────────────────

/// Everything a factory may read while constructing one episode.
pub struct FactoryContext<'a> {
    pub network:  &'a Network,
    pub config:   &'a SimConfig,
    /// Episode seed; entity streams derive from it.
    pub seed:     u64,
    /// Virtual bus of the episode.  Always present: demand streams start
    /// from it even when `config.has_schedule` is false.
    pub schedule: &'a Arc<VirtualSchedule>,
}

// ── ComponentsFactory ─────────────────────────────────────────────────────────

/// Constructs the entities of one episode.
pub trait ComponentsFactory: Send + Sync {
    fn name(&self) -> &str;

    fn terminals(&self, ctx: &FactoryContext<'_>) -> SimResult<Vec<Terminal>>;

    fn stops(&self, ctx: &FactoryContext<'_>) -> SimResult<Vec<Stop>>;

    fn links(&self, ctx: &FactoryContext<'_>) -> SimResult<Vec<Link>>;

    fn holder(&self, ctx: &FactoryContext<'_>) -> SimResult<Holder>;

    /// Dwell-time model shared by every stop.
    fn dwell_model(&self) -> Box<dyn DwellModel> {
        Box::new(LinearDwell::default())
    }
}

// ── Standard constructors ─────────────────────────────────────────────────────

/// One terminal per network terminal, each dispatching the routes that
/// originate there.  The virtual schedule is attached when
/// `config.has_schedule` is set.
pub fn standard_terminals(ctx: &FactoryContext<'_>) -> SimResult<Vec<Terminal>> {
    let horizon = ctx.config.horizon();
    ctx.network
        .terminals()
        .iter()
        .map(|spec| {
            let mut terminal = Terminal::new(spec.id);
            if ctx.config.has_schedule {
                terminal = terminal.with_schedule(Arc::clone(ctx.schedule));
            }
            for route in ctx.network.routes().iter().filter(|r| r.origin == spec.id) {
                terminal.add_route(route.id, ctx.network.dispatch_times(route.id, horizon))?;
            }
            Ok(terminal)
        })
        .collect()
}

/// One stop per network stop, with its berth layout and a demand stream for
/// every serving route starting at the virtual bus's ready time there.
pub fn standard_stops(ctx: &FactoryContext<'_>) -> SimResult<Vec<Stop>> {
    let demand = ctx.network.demand();
    let mut out = Vec::with_capacity(ctx.network.stops().len());
    for spec in ctx.network.stops() {
        let mut stop = Stop::with_layout(spec.id, spec.layout);
        for route in ctx.network.routes_serving(spec.id) {
            let index = ctx
                .network
                .route(route)
                .and_then(|r| r.stop_index(spec.id))
                .unwrap_or(0);
            let start = ctx.schedule.demand_start(route, index);
            stop.serve_route(route, start, ctx.seed, demand.as_ref());
        }
        out.push(stop);
    }
    Ok(out)
}

/// One link per network link.  With `fixed`, every traversal takes the
/// link's mean travel time.
pub fn standard_links(ctx: &FactoryContext<'_>, fixed: bool) -> SimResult<Vec<Link>> {
    ctx.network
        .links()
        .iter()
        .map(|spec| {
            let sampler = ctx.network.travel_time(spec.id).ok_or_else(|| SimError::MissingComponent {
                factory: "standard".into(),
                kind:    "travel-time model",
                id:      spec.id.to_string(),
            })?;
            let model: Box<dyn TravelTimeModel> = if fixed {
                Box::new(TravelTimeSampler::Fixed(sampler.mean_secs()))
            } else {
                Box::new(sampler.clone())
            };
            Ok(Link::new(spec.id, spec.length_m, model, ctx.seed))
        })
        .collect()
}

// ── Built-in factories ────────────────────────────────────────────────────────

/// Entities exactly as the network specifies them.
#[derive(Clone, Debug, Default)]
pub struct StandardFactory {
    pub dwell: LinearDwell,
}

impl ComponentsFactory for StandardFactory {
    fn name(&self) -> &str {
        "standard"
    }

    fn terminals(&self, ctx: &FactoryContext<'_>) -> SimResult<Vec<Terminal>> {
        standard_terminals(ctx)
    }

    fn stops(&self, ctx: &FactoryContext<'_>) -> SimResult<Vec<Stop>> {
        standard_stops(ctx)
    }

    fn links(&self, ctx: &FactoryContext<'_>) -> SimResult<Vec<Link>> {
        standard_links(ctx, false)
    }

    fn holder(&self, ctx: &FactoryContext<'_>) -> SimResult<Holder> {
        Ok(Holder::from_config(ctx.config))
    }

    fn dwell_model(&self) -> Box<dyn DwellModel> {
        Box::new(self.dwell)
    }
}

/// Noise-free travel: every link at its mean.  Demand stays stochastic.
#[derive(Clone, Debug, Default)]
pub struct DeterministicFactory {
    pub dwell: LinearDwell,
}

impl ComponentsFactory for DeterministicFactory {
    fn name(&self) -> &str {
        "deterministic"
    }

    fn terminals(&self, ctx: &FactoryContext<'_>) -> SimResult<Vec<Terminal>> {
        standard_terminals(ctx)
    }

    fn stops(&self, ctx: &FactoryContext<'_>) -> SimResult<Vec<Stop>> {
        standard_stops(ctx)
    }

    fn links(&self, ctx: &FactoryContext<'_>) -> SimResult<Vec<Link>> {
        standard_links(ctx, true)
    }

    fn holder(&self, ctx: &FactoryContext<'_>) -> SimResult<Holder> {
        Ok(Holder::from_config(ctx.config))
    }

    fn dwell_model(&self) -> Box<dyn DwellModel> {
        Box::new(self.dwell)
    }
}

// ── FactoryRegistry ───────────────────────────────────────────────────────────

/// A named environment: its network and the factory that populates it.
pub type Environment = (Arc<Network>, Arc<dyn ComponentsFactory>);

pub type EnvironmentCtor = Box<dyn Fn() -> SimResult<Environment> + Send + Sync>;

/// Environment constructors by name.
///
/// | Name                                  | Network                 | Factory                  |
/// |---------------------------------------|-------------------------|--------------------------|
/// | `homogeneous_one_route`               | `homogeneous_one_route` | [`StandardFactory`]      |
/// | `merging_corridor`                    | `merging_corridor`      | [`StandardFactory`]      |
/// | `homogeneous_one_route_deterministic` | `homogeneous_one_route` | [`DeterministicFactory`] |
pub struct FactoryRegistry {
    envs: Vec<(String, EnvironmentCtor)>,
}

impl Default for FactoryRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

impl FactoryRegistry {
    /// A registry with no environments.
    pub fn empty() -> Self {
        Self { envs: Vec::new() }
    }

    pub fn with_builtins() -> Self {
        let mut r = Self::empty();
        r.register("homogeneous_one_route", || {
            env(presets::homogeneous_one_route(), StandardFactory::default())
        });
        r.register("merging_corridor", || {
            env(presets::merging_corridor(), StandardFactory::default())
        });
        r.register("homogeneous_one_route_deterministic", || {
            env(presets::homogeneous_one_route(), DeterministicFactory::default())
        });
        r
    }

    /// Register an environment.  A later registration under the same name
    /// replaces the earlier one.
    pub fn register<F>(&mut self, name: impl Into<String>, ctor: F) -> &mut Self
    where
        F: Fn() -> SimResult<Environment> + Send + Sync + 'static,
    {
        let name = name.into();
        self.envs.retain(|(n, _)| *n != name);
        self.envs.push((name, Box::new(ctor)));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> + '_ {
        self.envs.iter().map(|(n, _)| n.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.envs.iter().any(|(n, _)| n == name)
    }

    pub fn build(&self, name: &str) -> SimResult<Environment> {
        let (_, ctor) = self
            .envs
            .iter()
            .find(|(n, _)| n == name)
            .ok_or_else(|| SimError::config(format!("unknown environment {name:?}")))?;
        ctor()
    }
}

fn env(network: NetworkResult<Network>, factory: impl ComponentsFactory + 'static) -> SimResult<Environment> {
    Ok((Arc::new(network?), Arc::new(factory)))
}
