//! Passenger record.

use bt_core::{PaxId, RouteId, SimTime, StopId};
use bt_network::Node;

/// One passenger from stop arrival to alighting.
#[derive(Clone, Debug, PartialEq)]
pub struct Passenger {
    pub id:          PaxId,
    pub route:       RouteId,
    pub origin:      StopId,
    pub destination: Node,
    pub arrived_at:  SimTime,
    pub boarded_at:  Option<SimTime>,
    pub alighted_at: Option<SimTime>,
}

impl Passenger {
    pub fn new(id: PaxId, route: RouteId, origin: StopId, destination: Node, arrived_at: SimTime) -> Self {
        Self { id, route, origin, destination, arrived_at, boarded_at: None, alighted_at: None }
    }

    /// Out-of-vehicle wait, once boarded.
    pub fn wait_secs(&self) -> Option<f64> {
        self.boarded_at.map(|b| b.secs_since(self.arrived_at))
    }

    /// Time on board, once alighted.
    pub fn in_vehicle_secs(&self) -> Option<f64> {
        match (self.boarded_at, self.alighted_at) {
            (Some(b), Some(a)) => Some(a.secs_since(b)),
            _ => None,
        }
    }
}
