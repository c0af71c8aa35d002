//! `bt-sim` — discrete-event loop orchestrator for the rust_bt transit
//! simulator.
//!
//! # Event loop
//!
//! ```text
//! schedule first Dispatch of every route
//! while next event time <= horizon:
//!   pop (time, priority, seq)-ordered event
//!   Dispatch        → bus leaves the terminal; next Dispatch scheduled
//!   ArriveAtStop    → take the entry berth, or join the stop's bus FIFO
//!     begin service → alight, board, dwell → DepartFromStop at ready time
//!     control point → Holder asks the agent; hold h > 0 replaces the
//!                     departure with HoldExpire at ready + h (in the berth),
//!                     or is served after leaving it (holding area)
//!   DepartFromStop  ┐
//!   HoldExpire      ┘→ leave the berth once the berths ahead are clear,
//!                     admit queued buses, next leg
//!   Terminate       → trip complete
//! clear the queue; live buses become truncated trips
//! ```
//!
//! # Crate layout
//!
//! | Module       | Contents                                                      |
//! |--------------|---------------------------------------------------------------|
//! | [`sim`]      | `Simulator` and its event loop                                |
//! | [`builder`]  | `SimBuilder` (validation, construction, coverage check)       |
//! | [`factory`]  | `ComponentsFactory`, `StandardFactory`, `DeterministicFactory`, `FactoryRegistry` |
//! | [`observer`] | `SimObserver`, `EventRecord`, `VisitRecord`, `HoldRecord`, `TripRecord` |
//! | [`metrics`]  | `MetricsCollector`, `RunningStats`, `EpisodeMetrics`          |
//! | [`runner`]   | `EpisodeRunner`, `EpisodeOutput`, `RunSummary`                |
//! | [`error`]    | `SimError`, `SimResult<T>`                                    |
//!
//! # Cargo features
//!
//! | Feature    | Effect                                                       |
//! |------------|--------------------------------------------------------------|
//! | `parallel` | `EpisodeRunner::run_parallel` on Rayon's thread pool.        |
//! | `serde`    | Derives `Serialize` on records, metrics, and episode output. |
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use bt_control::DoNothing;
//! use bt_sim::{EpisodeRunner, FactoryRegistry, RunSummary};
//!
//! let (network, factory) = FactoryRegistry::with_builtins().build(&config.env_name)?;
//! let outputs = EpisodeRunner::new(config, network, factory).run(|_| Box::new(DoNothing))?;
//! let summary = RunSummary::from_outputs(&outputs);
//! ```

pub mod builder;
pub mod error;
pub mod factory;
pub mod metrics;
pub mod observer;
pub mod runner;
pub mod sim;

#[cfg(test)]
mod tests;

pub use builder::SimBuilder;
pub use error::{SimError, SimResult};
pub use factory::{
    ComponentsFactory, DeterministicFactory, Environment, EnvironmentCtor, FactoryContext, FactoryRegistry,
    StandardFactory, standard_links, standard_stops, standard_terminals,
};
pub use metrics::{Aggregate, BucketKey, EpisodeMetrics, MetricKey, MetricsCollector, RunningStats, Summary};
pub use observer::{EventRecord, HoldRecord, NoopObserver, SimObserver, TripRecord, VisitRecord};
pub use runner::{EpisodeOutput, EpisodeRunner, RunSummary};
pub use sim::Simulator;
