use bt_core::{BusId, RouteId, StopId, TerminalId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("terminal {terminal} already dispatches route {route}")]
    DuplicateRoute { terminal: TerminalId, route: RouteId },

    #[error("{stop} does not serve route {route}")]
    RouteNotServed { stop: StopId, route: RouteId },

    #[error("{bus} cannot enter {stop}: no berth reachable")]
    StopFull { stop: StopId, bus: BusId },

    #[error("{bus} is not in a berth at {stop}")]
    NotInBerth { stop: StopId, bus: BusId },
}

pub type EntityResult<T> = Result<T, EntityError>;
