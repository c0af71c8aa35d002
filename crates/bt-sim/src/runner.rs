//! Multi-episode runs.
//!
//! Every episode gets a fresh set of entities from the factory, its own
//! seed `episode_seed(config.seed, episode)`, and its own agent.  Episodes
//! share nothing but the immutable `Network`, so they can run in parallel
//! (feature `parallel`) with results identical to a sequential run.
//!
//! # Schedule stabilisation
//!
//! The perfect virtual schedule assumes every stop holds for exactly the
//! configured slack.  [`EpisodeRunner::stabilize_schedule`] replaces that
//! assumption with the holds a controller actually applies: each round runs
//! one episode on the current schedule and rebuilds it from the mean
//! applied hold per (route, stop index).  Attach the result with
//! [`EpisodeRunner::with_schedule`] so later episodes are scheduled against
//! it.

use std::collections::BTreeMap;
use std::sync::Arc;

use bt_control::HoldingAgent;
use bt_core::{RouteId, SimConfig};
use bt_network::{Network, VirtualSchedule};
use tracing::info;

use crate::{
    ComponentsFactory, EpisodeMetrics, EventRecord, HoldRecord, MetricKey, NoopObserver, RunningStats,
    SimBuilder, SimObserver, SimResult, Summary, TripRecord,
};

// ── EpisodeOutput ─────────────────────────────────────────────────────────────

/// Everything one episode produced.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct EpisodeOutput {
    pub episode:         u32,
    pub seed:            u64,
    pub metrics:         EpisodeMetrics,
    /// Clamped agent decisions.
    pub warnings:        u32,
    pub truncated_trips: u32,
    pub completed_trips: u32,
    pub trips:           Vec<TripRecord>,
    pub holds:           Vec<HoldRecord>,
    /// Present when `config.record_trajectory` is set.
    pub trajectory:      Option<Vec<EventRecord>>,
}

// ── RunSummary ────────────────────────────────────────────────────────────────

/// Metric means averaged across the episodes of a run.
///
/// For each key, `mean`/`std` are taken over the per-episode means and
/// `count` is the number of episodes that reported the key.
#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunSummary {
    pub episodes:        u32,
    pub metrics:         BTreeMap<MetricKey, Summary>,
    pub warnings:        u32,
    pub truncated_trips: u32,
    pub completed_trips: u32,
}

impl RunSummary {
    pub fn from_outputs(outputs: &[EpisodeOutput]) -> Self {
        let mut stats: BTreeMap<MetricKey, RunningStats> = BTreeMap::new();
        for out in outputs {
            for (key, s) in &out.metrics.summaries {
                stats.entry(*key).or_default().push(s.mean);
            }
        }
        Self {
            episodes:        outputs.len() as u32,
            metrics:         stats.into_iter().map(|(k, s)| (k, s.summary())).collect(),
            warnings:        outputs.iter().map(|o| o.warnings).sum(),
            truncated_trips: outputs.iter().map(|o| o.truncated_trips).sum(),
            completed_trips: outputs.iter().map(|o| o.completed_trips).sum(),
        }
    }
}

// ── EpisodeRunner ─────────────────────────────────────────────────────────────

/// Runs `config.episode_num` episodes of one environment.
///
/// ```rust,ignore
/// let (network, factory) = FactoryRegistry::with_builtins().build(&config.env_name)?;
/// let runner = EpisodeRunner::new(config, network, factory);
/// let outputs = runner.run(|_| Box::new(DoNothing))?;
/// let summary = RunSummary::from_outputs(&outputs);
/// ```
pub struct EpisodeRunner {
    config:   SimConfig,
    network:  Arc<Network>,
    factory:  Arc<dyn ComponentsFactory>,
    schedule: Option<Arc<VirtualSchedule>>,
}

impl EpisodeRunner {
    pub fn new(config: SimConfig, network: Arc<Network>, factory: Arc<dyn ComponentsFactory>) -> Self {
        Self { config, network, factory, schedule: None }
    }

    /// Schedule every episode against `schedule` instead of the perfect one.
    pub fn with_schedule(mut self, schedule: VirtualSchedule) -> Self {
        self.schedule = Some(Arc::new(schedule));
        self
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn schedule(&self) -> Option<&VirtualSchedule> {
        self.schedule.as_deref()
    }

    /// Build and run episode `episode` with `agent`.
    pub fn run_episode<O: SimObserver>(
        &self,
        episode:  u32,
        agent:    &mut dyn HoldingAgent,
        observer: &mut O,
    ) -> SimResult<EpisodeOutput> {
        let mut builder = SimBuilder::new(self.config.clone(), Arc::clone(&self.network), Arc::clone(&self.factory))
            .episode(episode);
        if let Some(schedule) = &self.schedule {
            builder = builder.schedule(Arc::clone(schedule));
        }
        builder.build()?.run(agent, observer)
    }

    /// Refine the virtual schedule over `rounds` stabilising episodes.
    ///
    /// Starts from the attached schedule, or the perfect one with
    /// `config.schedule_slack_secs` at every stop.  Round `k` runs episode
    /// `k` with `make_agent(k)` and rebuilds the schedule from the mean
    /// applied hold per (route, stop index); stops without a hold record
    /// keep the slack.  Returns the last schedule.
    pub fn stabilize_schedule<F>(&self, make_agent: F, rounds: u32) -> SimResult<VirtualSchedule>
    where
        F: Fn(u32) -> Box<dyn HoldingAgent>,
    {
        let slack = self.config.schedule_slack_secs;
        let mut schedule = match &self.schedule {
            Some(s) => Arc::clone(s),
            None => Arc::new(VirtualSchedule::perfect(&self.network, slack)),
        };
        for round in 0..rounds {
            let mut agent = make_agent(round);
            let mut sim = SimBuilder::new(self.config.clone(), Arc::clone(&self.network), Arc::clone(&self.factory))
                .episode(round)
                .schedule(Arc::clone(&schedule))
                .build()?;
            let out = sim.run(agent.as_mut(), &mut NoopObserver)?;

            let means = mean_holds(&out.holds);
            info!(round, stops = means.len(), "virtual schedule refined");
            schedule = Arc::new(VirtualSchedule::with_holds(&self.network, |route, i| {
                means.get(&(route, i)).copied().unwrap_or(slack)
            }));
        }
        Ok(Arc::unwrap_or_clone(schedule))
    }

    /// Run every episode in order.  `make_agent` is called once per episode.
    pub fn run<F>(&self, make_agent: F) -> SimResult<Vec<EpisodeOutput>>
    where
        F: Fn(u32) -> Box<dyn HoldingAgent>,
    {
        self.run_observed(make_agent, &mut NoopObserver)
    }

    /// [`run`](Self::run) with one observer spanning all episodes.
    pub fn run_observed<F, O>(&self, make_agent: F, observer: &mut O) -> SimResult<Vec<EpisodeOutput>>
    where
        F: Fn(u32) -> Box<dyn HoldingAgent>,
        O: SimObserver,
    {
        (0..self.config.episode_num)
            .map(|ep| {
                let mut agent = make_agent(ep);
                self.run_episode(ep, agent.as_mut(), observer)
            })
            .collect()
    }

    /// Run the episodes on Rayon's thread pool.  Output is in episode order
    /// and identical to [`run`](Self::run).
    #[cfg(feature = "parallel")]
    pub fn run_parallel<F>(&self, make_agent: F) -> SimResult<Vec<EpisodeOutput>>
    where
        F: Fn(u32) -> Box<dyn HoldingAgent> + Sync,
    {
        use rayon::prelude::*;

        (0..self.config.episode_num)
            .into_par_iter()
            .map(|ep| {
                let mut agent = make_agent(ep);
                self.run_episode(ep, agent.as_mut(), &mut NoopObserver)
            })
            .collect()
    }
}

/// Mean applied hold per (route, stop index).
fn mean_holds(holds: &[HoldRecord]) -> BTreeMap<(RouteId, usize), f64> {
    let mut stats: BTreeMap<(RouteId, usize), RunningStats> = BTreeMap::new();
    for h in holds {
        stats.entry((h.route, h.stop_index)).or_default().push(h.applied);
    }
    stats.into_iter().map(|(k, s)| (k, s.mean())).collect()
}
