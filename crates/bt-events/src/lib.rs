//! `bt-events` — discrete-event queue and clock for the rust_bt simulator.
//!
//! The queue owns simulation time: `now()` only moves when an event is
//! popped (or when the loop explicitly advances to the horizon).
//!
//! # Tie-breaking
//!
//! ```text
//! key = (time_ms, kind priority, insertion seq)
//!
//!   priority 0  Terminate
//!   priority 1  DepartFromStop, HoldExpire
//!   priority 2  ArriveAtStop
//!   priority 3  Dispatch
//! ```
//!
//! # Quick-start
//!
//! ```rust,ignore
//! let mut q = EventQueue::new();
//! let h = q.schedule(SimTime::from_secs(30), EventKind::DepartFromStop { bus, generation: 0 })?;
//! q.cancel(h);                       // hold applied
//! q.schedule(SimTime::from_secs(90), EventKind::HoldExpire { bus, generation: 1 })?;
//! while let Some(ev) = q.pop_next() { /* ... */ }
//! ```

pub mod error;
pub mod event;
pub mod queue;


pub use error::{EventsError, EventsResult};
pub use event::EventKind;
pub use queue::{Event, EventHandle, EventQueue};
