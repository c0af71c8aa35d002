//! Dwell-time models.
//!
//! The dwell is the time a bus spends serving passengers at a stop, from
//! service start to ready-to-depart.  It excludes queueing before service
//! and any hold after.

use bt_network::RouteSpec;

/// Maps a visit's boarding and alighting counts to a dwell duration.
pub trait DwellModel: Send + Sync {
    fn dwell_secs(&self, boarded: u32, alighted: u32, route: &RouteSpec) -> f64;
}

/// Whether boarding and alighting share a door.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum DoorMode {
    /// Front-door boarding and rear-door alighting run in parallel.
    #[default]
    Simultaneous,
    /// One door: alighting, then boarding.
    Sequential,
}

/// `dead_secs + max(b·t_b, a·t_a)` (simultaneous) or
/// `dead_secs + b·t_b + a·t_a` (sequential), with the per-passenger times
/// taken from the route.
///
/// A visit with no boarding and no alighting has zero dwell; the dead time
/// only applies when the doors open.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinearDwell {
    pub dead_secs: f64,
    pub doors:     DoorMode,
}

impl LinearDwell {
    pub fn new(dead_secs: f64, doors: DoorMode) -> Self {
        Self { dead_secs: dead_secs.max(0.0), doors }
    }
}

impl DwellModel for LinearDwell {
    fn dwell_secs(&self, boarded: u32, alighted: u32, route: &RouteSpec) -> f64 {
        if boarded == 0 && alighted == 0 {
            return 0.0;
        }
        let board = boarded as f64 * route.board_secs_per_pax;
        let alight = alighted as f64 * route.alight_secs_per_pax;
        let service = match self.doors {
            DoorMode::Simultaneous => board.max(alight),
            DoorMode::Sequential   => board + alight,
        };
        self.dead_secs + service
    }
}
