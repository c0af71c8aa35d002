//! `bt-core` — foundational types for the `rust_bt` transit simulator.
//!
//! This crate is a dependency of every other `bt-*` crate.  It intentionally
//! has no `bt-*` dependencies and minimal external ones (only `rand` and
//! `thiserror`, plus optional `serde`).
//!
//! # What lives here
//!
//! | Module     | Contents                                                  |
//! |------------|-----------------------------------------------------------|
//! | [`ids`]    | `RouteId`, `StopId`, `TerminalId`, `LinkId`, `BusId`, `PaxId` |
//! | [`time`]   | `SimTime` (ms), `HoldWindow`                              |
//! | [`rng`]    | `StreamRng` (per stochastic source), `episode_seed`       |
//! | [`config`] | `SimConfig`, `BoardTruncation`                            |
//! | [`metric`] | `MetricName`                                              |
//! | [`error`]  | `CoreError`, `CoreResult`                                 |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to all public types.        |

pub mod config;
pub mod error;
pub mod ids;
pub mod metric;
pub mod rng;
pub mod time;


// ── Re-exports ────────────────────────────────────────────────────────────────

pub use config::{BoardTruncation, SimConfig};
pub use error::{CoreError, CoreResult};
pub use ids::{BusId, LinkId, PaxId, RouteId, StopId, TerminalId};
pub use metric::MetricName;
pub use rng::{Stream, StreamRng, episode_seed};
pub use time::{HoldWindow, SimTime};
