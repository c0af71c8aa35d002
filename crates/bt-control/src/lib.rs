//! `bt-control` — holding control: what an agent sees, how it is asked, and
//! the strategies that ship with the simulator.
//!
//! # Crate layout
//!
//! | Module       | Contents                                                      |
//! |--------------|---------------------------------------------------------------|
//! | [`snapshot`] | `Snapshot`, `SnapshotSpec`, `BusView`                         |
//! | [`agent`]    | `HoldingAgent` trait, `HoldOutcome`                           |
//! | [`holder`]   | `Holder`, `ControlPoint`, `HoldDecision`, `clamp_hold`        |
//! | [`agents`]   | `DoNothing`, `FixedHold`, `ForwardHeadwayControl`, `ScheduleControl`, `Exploration` |
//! | [`registry`] | `AgentConfig`, `AgentRegistry`                                |
//! | [`error`]    | `ControlError`, `ControlResult<T>`                            |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                       |
//! |---------|--------------------------------------------------------------|
//! | `serde` | Derives `Serialize`/`Deserialize` on `AgentConfig` and snapshots. |

pub mod agent;
pub mod agents;
pub mod error;
pub mod holder;
pub mod registry;
pub mod snapshot;


pub use agent::{HoldOutcome, HoldingAgent};
pub use agents::{ControlBase, DoNothing, Exploration, FixedHold, ForwardHeadwayControl, ScheduleControl};
pub use error::{ControlError, ControlResult};
pub use holder::{ControlPoint, HoldDecision, Holder, clamp_hold};
pub use registry::{AgentConfig, AgentCtor, AgentRegistry};
pub use snapshot::{BusView, Snapshot, SnapshotSpec};
