//! `bt-network` — static route topology and the stochastic generators that
//! drive an episode.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                     |
//! |--------------|--------------------------------------------------------------|
//! | [`topology`] | `Node`, `StopSpec`, `StopLayout`, `TerminalSpec`, `LinkSpec`, `RouteSpec`, `DispatchSpec` |
//! | [`network`]  | `Network` (validated, immutable), `NetworkBuilder`           |
//! | [`travel`]   | `TravelTimeModel` trait, `TravelTimeSpec`, `TravelTimeSampler` |
//! | [`demand`]   | `DemandModel` trait, `OdTable`, `OdDemand`, `DemandProfile`  |
//! | [`schedule`] | `VirtualSchedule` (perfect-schedule virtual bus)             |
//! | [`loader`]   | `load_od_csv`, `load_od_reader`                              |
//! | [`presets`]  | `homogeneous_one_route`, `merging_corridor`, `single_stop`   |
//! | [`error`]    | `NetworkError`, `NetworkResult<T>`                           |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on topology and generator specs. |

pub mod demand;
pub mod error;
pub mod loader;
pub mod network;
pub mod presets;
pub mod schedule;
pub mod topology;
pub mod travel;

#[cfg(test)]
mod tests;

pub use demand::{ArrivalProcess, DemandModel, DemandProfile, NoDemand, OdDemand, OdTable, PaxArrival};
pub use error::{NetworkError, NetworkResult};
pub use loader::{load_od_csv, load_od_reader};
pub use network::{Network, NetworkBuilder};
pub use schedule::{RouteSchedule, Scheduled, StopOffsets, VirtualSchedule};
pub use topology::{DispatchSpec, LinkSpec, Node, QueueRule, RouteSpec, StopLayout, StopSpec, TerminalSpec};
pub use travel::{TravelTimeModel, TravelTimeSampler, TravelTimeSpec};
