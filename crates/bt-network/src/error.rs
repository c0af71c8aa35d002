//! Network-construction error type.
//!
//! Every variant is a configuration error: a `Network` that builds
//! successfully never fails at sampling time.

use thiserror::Error;

use bt_core::{RouteId, StopId, TerminalId};

use crate::Node;

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("network configuration error: {0}")]
    Config(String),

    #[error("route {route} references unknown stop {stop}")]
    UnknownStop { route: RouteId, stop: StopId },

    #[error("route {route} references unknown terminal {terminal}")]
    UnknownTerminal { route: RouteId, terminal: TerminalId },

    #[error("route {route} has no link from {from} to {to}")]
    MissingLink { route: RouteId, from: Node, to: Node },

    #[error("route {route} visits stop {stop} more than once")]
    CyclicRoute { route: RouteId, stop: StopId },

    #[error("route {0} has no stops")]
    EmptyRoute(RouteId),

    #[error("invalid distribution parameters on {what}: {reason}")]
    Distribution { what: String, reason: String },

    #[error("OD table parse error: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type NetworkResult<T> = Result<T, NetworkError>;
