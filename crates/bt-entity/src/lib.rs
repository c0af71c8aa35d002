//! `bt-entity` — the physical and operational entities of an episode.
//!
//! Entities hold state and enforce local transition rules.  They never
//! touch the event queue: the simulator decides *when* things happen and
//! calls into entities to apply the consequences.
//!
//! # Crate layout
//!
//! | Module        | Contents                                                 |
//! |---------------|----------------------------------------------------------|
//! | [`bus`]       | `Bus`, `BusStatus`, `BusPosition`, `StopVisit`           |
//! | [`stop`]      | `Stop` (berths, holding area, pax queues), `DemandStream` |
//! | [`link`]      | `Link` (travel-time model + own RNG stream)              |
//! | [`terminal`]  | `Terminal` (dispatch lists, virtual schedule)            |
//! | [`passenger`] | `Passenger`                                              |
//! | [`dwell`]     | `DwellModel` trait, `LinearDwell`, `DoorMode`            |
//! | [`error`]     | `EntityError`, `EntityResult<T>`                         |

pub mod bus;
pub mod dwell;
pub mod error;
pub mod link;
pub mod passenger;
pub mod stop;
pub mod terminal;


pub use bus::{Bus, BusPosition, BusStatus, StopVisit};
pub use dwell::{DoorMode, DwellModel, LinearDwell};
pub use error::{EntityError, EntityResult};
pub use link::Link;
pub use passenger::Passenger;
pub use stop::{DemandStream, RouteQueue, Stop};
pub use terminal::{DispatchSlot, RouteDispatch, Terminal};
