//! Event payloads and their tie-break priority.

use bt_core::{BusId, RouteId, TerminalId};

/// What happens when an event fires.
///
/// Departure-type kinds carry the bus's `generation` at scheduling time; the
/// loop drops any whose generation no longer matches the bus.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EventKind {
    /// A terminal releases the next bus of `route`.
    Dispatch { terminal: TerminalId, route: RouteId },
    /// `bus` reaches the `stop_index`-th stop of its route.
    ArriveAtStop { bus: BusId, stop_index: u16 },
    /// `bus` leaves its current stop without holding.
    DepartFromStop { bus: BusId, generation: u32 },
    /// The hold applied to `bus` ends; the bus leaves its current stop.
    HoldExpire { bus: BusId, generation: u32 },
    /// `bus` reaches the destination terminal of its route.
    Terminate { bus: BusId },
}

impl EventKind {
    /// Secondary sort key among events with the same timestamp (lower first).
    ///
    /// Terminations and departures run before arrivals so a stop freed at
    /// time t is visibly free to a bus arriving at t.  Dispatches run last.
    #[inline]
    pub fn priority(self) -> u8 {
        match self {
            EventKind::Terminate { .. }      => 0,
            EventKind::DepartFromStop { .. } => 1,
            EventKind::HoldExpire { .. }     => 1,
            EventKind::ArriveAtStop { .. }   => 2,
            EventKind::Dispatch { .. }       => 3,
        }
    }

    /// The bus this event concerns, if any.
    pub fn bus(self) -> Option<BusId> {
        match self {
            EventKind::Dispatch { .. } => None,
            EventKind::ArriveAtStop { bus, .. }
            | EventKind::DepartFromStop { bus, .. }
            | EventKind::HoldExpire { bus, .. }
            | EventKind::Terminate { bus } => Some(bus),
        }
    }

    /// Short lowercase label used in logs and trajectory output.
    pub fn label(self) -> &'static str {
        match self {
            EventKind::Dispatch { .. }       => "dispatch",
            EventKind::ArriveAtStop { .. }   => "arrive_at_stop",
            EventKind::DepartFromStop { .. } => "depart_from_stop",
            EventKind::HoldExpire { .. }     => "hold_expire",
            EventKind::Terminate { .. }      => "terminate",
        }
    }
}
