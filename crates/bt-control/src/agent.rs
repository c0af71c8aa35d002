//! The `HoldingAgent` trait — the extension point for control strategies.

use bt_core::{BusId, RouteId, SimTime, StopId};

use crate::{HoldDecision, Snapshot, SnapshotSpec};

/// Feedback delivered to the agent after its decision was applied.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct HoldOutcome {
    pub time:       SimTime,
    pub bus:        BusId,
    pub route:      RouteId,
    pub stop:       StopId,
    pub stop_index: usize,
    pub decision:   HoldDecision,
}

/// Pluggable holding strategy.
///
/// Only [`decide`][Self::decide] is required.  The engine calls it
/// synchronously at every active control point and suspends simulated time
/// until it returns.
///
/// # Determinism
///
/// `decide` must be a function of the snapshot and the agent's own state.
/// Agents that explore draw from a [`bt_core::StreamRng`] seeded at
/// construction, never from a global source.
///
/// # Example
///
/// ```rust,ignore
/// struct HalfDwell;
///
/// impl HoldingAgent for HalfDwell {
///     fn decide(&mut self, s: &Snapshot) -> f64 {
///         s.dwell_secs() / 2.0
///     }
/// }
/// ```
pub trait HoldingAgent: Send {
    /// Requested hold in seconds.  Out-of-range values are clamped by the
    /// holder.
    fn decide(&mut self, snapshot: &Snapshot) -> f64;

    /// Optional snapshot content.  Default: no fleet view.
    fn snapshot_spec(&self) -> SnapshotSpec {
        SnapshotSpec::default()
    }

    /// Called after every decision with what was actually applied.
    fn observe(&mut self, _outcome: &HoldOutcome) {}

    /// Called before each episode.
    fn reset(&mut self, _episode: u32) {}

    fn name(&self) -> &str {
        "agent"
    }
}

impl<A: HoldingAgent + ?Sized> HoldingAgent for Box<A> {
    fn decide(&mut self, snapshot: &Snapshot) -> f64 {
        (**self).decide(snapshot)
    }

    fn snapshot_spec(&self) -> SnapshotSpec {
        (**self).snapshot_spec()
    }

    fn observe(&mut self, outcome: &HoldOutcome) {
        (**self).observe(outcome)
    }

    fn reset(&mut self, episode: u32) {
        (**self).reset(episode)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
