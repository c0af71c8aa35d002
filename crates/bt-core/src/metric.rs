//! Names of the episode metrics the engine knows how to aggregate.

use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// A metric that can be requested through `SimConfig::metric_names`.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum MetricName {
    /// Population std of departure headways per (route, stop), averaged over stops.
    HeadwayStd,
    /// Mean absolute departure deviation from the virtual schedule.
    ScheduleDeviation,
    /// Applied hold per decision and per bus.
    HoldTime,
    /// Passenger out-of-vehicle wait (boarding minus arrival).
    PaxWaitTime,
    /// Passenger in-vehicle time (alighting minus boarding).
    PaxInVehicleTime,
    /// Time buses spend queued behind another bus at a stop.
    QueueingDelay,
    /// Dispatch-to-terminate duration of completed trips.
    TripTime,
}

impl MetricName {
    pub const ALL: [MetricName; 7] = [
        MetricName::HeadwayStd,
        MetricName::ScheduleDeviation,
        MetricName::HoldTime,
        MetricName::PaxWaitTime,
        MetricName::PaxInVehicleTime,
        MetricName::QueueingDelay,
        MetricName::TripTime,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricName::HeadwayStd        => "headway_std",
            MetricName::ScheduleDeviation => "schedule_deviation",
            MetricName::HoldTime          => "hold_time",
            MetricName::PaxWaitTime       => "pax_wait_time",
            MetricName::PaxInVehicleTime  => "pax_in_vehicle_time",
            MetricName::QueueingDelay     => "queueing_delay",
            MetricName::TripTime          => "trip_time",
        }
    }
}

impl FromStr for MetricName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricName::ALL
            .into_iter()
            .find(|m| m.as_str() == s.trim())
            .ok_or_else(|| CoreError::UnknownMetric(s.to_owned()))
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
