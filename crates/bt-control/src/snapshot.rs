//! The read-only state bundle an agent sees at a control point.

use bt_core::{BusId, RouteId, SimTime, StopId};
use bt_entity::BusStatus;

/// What an agent asks the engine to include in its snapshots.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct SnapshotSpec {
    /// Attach the position of every live bus on the route.
    pub fleet: bool,
}

/// One live bus as seen from a control point.
#[derive(Copy, Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BusView {
    pub bus:        BusId,
    pub route:      RouteId,
    pub seq:        u32,
    pub status:     BusStatus,
    pub location_m: f64,
    pub load:       u32,
}

/// State of the deciding bus and its neighbours at service start.
///
/// Headways and deviations are in seconds, spacings in metres.  Fields that
/// need a neighbour or a schedule are `None` when there is none.
///
/// | Field                       | Meaning                                                  |
/// |-----------------------------|----------------------------------------------------------|
/// | `forward_headway`           | ready-to-depart gap to the preceding same-route bus here |
/// | `backward_headway`          | gap to the following bus at their latest common point    |
/// | `arrival_deviation`         | actual minus scheduled arrival here                      |
/// | `ready_deviation`           | actual minus scheduled ready-to-depart here              |
/// | `forward_arrival_deviation` | the preceding bus's `arrival_deviation` at this stop     |
#[derive(Clone, PartialEq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    pub time:                      SimTime,
    pub bus:                       BusId,
    pub route:                     RouteId,
    pub seq:                       u32,
    pub stop:                      StopId,
    pub stop_index:                usize,
    pub pax_count:                 u32,
    pub location_m:                f64,
    pub arrived_at:                SimTime,
    pub ready_at:                  SimTime,
    pub forward_headway:           Option<f64>,
    pub backward_headway:          Option<f64>,
    pub forward_spacing_m:         Option<f64>,
    pub backward_spacing_m:        Option<f64>,
    pub arrival_deviation:         Option<f64>,
    pub ready_deviation:           Option<f64>,
    pub forward_arrival_deviation: Option<f64>,
    pub schedule_headway:          f64,
    pub stop_queue_len:            usize,
    /// Expected passenger arrival rate (pax/s) for this route at this stop.
    pub stop_arrival_rate:         f64,
    pub board_secs_per_pax:        f64,
    pub fleet:                     Option<Vec<BusView>>,
}

impl Snapshot {
    /// A snapshot with no neighbours, no schedule, and everything at `time`.
    pub fn bare(time: SimTime, bus: BusId, route: RouteId, stop: StopId, stop_index: usize) -> Self {
        Self {
            time,
            bus,
            route,
            seq:                       0,
            stop,
            stop_index,
            pax_count:                 0,
            location_m:                0.0,
            arrived_at:                time,
            ready_at:                  time,
            forward_headway:           None,
            backward_headway:          None,
            forward_spacing_m:         None,
            backward_spacing_m:        None,
            arrival_deviation:         None,
            ready_deviation:           None,
            forward_arrival_deviation: None,
            schedule_headway:          0.0,
            stop_queue_len:            0,
            stop_arrival_rate:         0.0,
            board_secs_per_pax:        0.0,
            fleet:                     None,
        }
    }

    /// Dwell the bus would have without holding.
    pub fn dwell_secs(&self) -> f64 {
        self.ready_at.secs_since(self.time)
    }

    /// Whether the bus has a neighbour on both sides.
    pub fn has_neighbours(&self) -> bool {
        self.forward_spacing_m.is_some() && self.backward_spacing_m.is_some()
    }
}
