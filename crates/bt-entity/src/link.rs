//! Link entity: a travel-time model plus its own random stream.

use bt_core::{BusId, LinkId, SimTime, Stream, StreamRng};
use bt_network::TravelTimeModel;

pub struct Link {
    pub id:         LinkId,
    pub length_m:   f64,
    model:          Box<dyn TravelTimeModel>,
    rng:            StreamRng,
    pub traversals: u64,
}

impl Link {
    pub fn new(id: LinkId, length_m: f64, model: Box<dyn TravelTimeModel>, seed: u64) -> Self {
        Self {
            id,
            length_m,
            model,
            rng: StreamRng::new(seed, Stream::Link(id)),
            traversals: 0,
        }
    }

    /// Draw the travel time of one traversal.  Called exactly once per bus
    /// per traversal; never negative.
    pub fn traverse(&mut self, bus: BusId, now: SimTime) -> f64 {
        self.traversals += 1;
        self.model.sample_secs(bus, now, &mut self.rng).max(0.0)
    }

    pub fn mean_secs(&self) -> f64 {
        self.model.mean_secs()
    }
}
