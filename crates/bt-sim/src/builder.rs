//! Fluent builder for constructing a [`Simulator`].

use std::collections::BTreeSet;
use std::fmt::Display;
use std::hash::Hash;
use std::sync::Arc;

use bt_core::{SimConfig, episode_seed};
use bt_events::EventQueue;
use bt_network::{Network, VirtualSchedule};
use rustc_hash::FxHashMap;

use crate::{ComponentsFactory, FactoryContext, SimError, SimResult, Simulator};

/// Fluent builder for [`Simulator`].
///
/// # Required inputs
///
/// - [`SimConfig`]: horizon, seed, holding window, metrics, …
/// - `Arc<Network>`: the validated topology and generators
/// - `Arc<dyn ComponentsFactory>`: builds the episode's entities
///
/// # Optional inputs (have defaults)
///
/// | Method           | Default                                              |
/// |------------------|------------------------------------------------------|
/// | `.episode(k)`    | `0`                                                  |
/// | `.schedule(s)`   | `VirtualSchedule::perfect(network, schedule_slack)`  |
///
/// # Example
///
/// ```rust,ignore
/// let mut sim = SimBuilder::new(config, network, Arc::new(StandardFactory::default()))
///     .episode(3)
///     .build()?;
/// let output = sim.run(&mut DoNothing, &mut NoopObserver)?;
/// ```
pub struct SimBuilder {
    config:   SimConfig,
    network:  Arc<Network>,
    factory:  Arc<dyn ComponentsFactory>,
    episode:  u32,
    schedule: Option<Arc<VirtualSchedule>>,
}

impl SimBuilder {
    /// Create a builder with all required inputs.
    pub fn new(config: SimConfig, network: Arc<Network>, factory: Arc<dyn ComponentsFactory>) -> Self {
        Self { config, network, factory, episode: 0, schedule: None }
    }

    /// Episode number; selects the episode seed.
    pub fn episode(mut self, episode: u32) -> Self {
        self.episode = episode;
        self
    }

    /// Replace the perfect-schedule virtual bus, e.g. with one built by
    /// [`EpisodeRunner::stabilize_schedule`][crate::EpisodeRunner::stabilize_schedule].
    pub fn schedule(mut self, schedule: impl Into<Arc<VirtualSchedule>>) -> Self {
        self.schedule = Some(schedule.into());
        self
    }

    /// Validate the configuration, construct the entities through the
    /// factory, check their coverage, and return a ready-to-run
    /// [`Simulator`].
    pub fn build(self) -> SimResult<Simulator> {
        self.config.validate()?;
        let metrics = self.config.metrics()?;
        let seed = episode_seed(self.config.seed, self.episode);
        let schedule = self.schedule.unwrap_or_else(|| {
            Arc::new(VirtualSchedule::perfect(&self.network, self.config.schedule_slack_secs))
        });

        // ── Construct, in fixed order ─────────────────────────────────────
        let ctx = FactoryContext {
            network:  &self.network,
            config:   &self.config,
            seed,
            schedule: &schedule,
        };
        let factory = self.factory.as_ref();
        let terminals = factory.terminals(&ctx)?;
        let stops = factory.stops(&ctx)?;
        let links = factory.links(&ctx)?;
        let holder = factory.holder(&ctx)?;
        let dwell = factory.dwell_model();

        // ── Coverage: everything a route references, exactly once ─────────
        let name = factory.name();
        let terminals = index_by(terminals, |t| t.id, name, "terminal")?;
        let stops = index_by(stops, |s| s.id, name, "stop")?;
        let links = index_by(links, |l| l.id, name, "link")?;

        let missing = |kind: &'static str, id: String| SimError::MissingComponent {
            factory: name.to_string(),
            kind,
            id,
        };
        for route in self.network.routes() {
            let origin = terminals
                .get(&route.origin)
                .ok_or_else(|| missing("terminal", route.origin.to_string()))?;
            if !origin.routes().iter().any(|r| r.route == route.id) {
                return Err(missing("dispatch plan", format!("{} at {}", route.id, route.origin)));
            }
            if !terminals.contains_key(&route.destination) {
                return Err(missing("terminal", route.destination.to_string()));
            }
            for &stop in &route.stops {
                let s = stops.get(&stop).ok_or_else(|| missing("stop", stop.to_string()))?;
                if !s.serves(route.id) {
                    return Err(missing("passenger queue", format!("{} at {stop}", route.id)));
                }
            }
            for &link in self.network.route_links(route.id) {
                if !links.contains_key(&link) {
                    return Err(missing("link", link.to_string()));
                }
            }
        }

        let trajectory = self.config.record_trajectory.then(Vec::new);
        let fleet = vec![Vec::new(); self.network.routes().len()];
        Ok(Simulator {
            config: self.config,
            metrics,
            episode: self.episode,
            seed,
            network: self.network,
            queue: EventQueue::new(),
            terminals,
            stops,
            links,
            holder,
            dwell,
            buses: Vec::new(),
            live: BTreeSet::new(),
            fleet,
            next_pax: 0,
            warnings: 0,
            trips: Vec::new(),
            holds: Vec::new(),
            trajectory,
            finished: false,
        })
    }
}

/// Key entities by id, rejecting duplicates.
fn index_by<K, V>(
    items:   Vec<V>,
    key:     impl Fn(&V) -> K,
    factory: &str,
    kind:    &str,
) -> SimResult<FxHashMap<K, V>>
where
    K: Hash + Eq + Display,
{
    let mut map = FxHashMap::default();
    for item in items {
        let id = key(&item);
        if map.contains_key(&id) {
            return Err(SimError::config(format!("components factory `{factory}` built {kind} {id} twice")));
        }
        map.insert(id, item);
    }
    Ok(map)
}
