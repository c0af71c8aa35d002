//! The control point: decides whether a stop visit is holdable, queries the
//! agent, and turns its answer into an applicable hold.
//!
//! # Clamping law
//!
//! ```text
//! applied = max(0, min(requested, max_hold))      NaN → 0
//! if ready + applied > horizon:
//!     applied = max(0, horizon - ready)            truncated = true
//! ```

use bt_core::{BusId, HoldWindow, RouteId, SimConfig, SimTime, StopId};
use tracing::warn;

use crate::{HoldOutcome, HoldingAgent, Snapshot, SnapshotSpec};

/// Where and when a bus reached a potential control point.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ControlPoint {
    /// Service start.
    pub time:       SimTime,
    pub bus:        BusId,
    pub route:      RouteId,
    pub stop:       StopId,
    pub stop_index: usize,
    /// Whether the stop is a hold stop of the route.
    pub holdable:   bool,
    /// When the bus would leave with no hold.
    pub ready_at:   SimTime,
}

/// Result of one control-point query.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct HoldDecision {
    pub requested: f64,
    pub applied:   f64,
    /// The request fell outside `[0, max_hold]` or was NaN.
    pub clamped:   bool,
    /// The hold was shortened to end at the horizon.
    pub truncated: bool,
}

impl HoldDecision {
    /// No hold, no agent involved.
    pub fn pass_through() -> Self {
        Self::default()
    }

    /// Applied hold as a duration in whole milliseconds.
    pub fn applied_time(&self) -> SimTime {
        SimTime::from_secs_f64(self.applied)
    }
}

/// `max(0, min(h, max_hold))`, with NaN mapped to 0.  The flag reports
/// whether the value changed.
pub fn clamp_hold(requested: f64, max_hold_secs: f64) -> (f64, bool) {
    if requested.is_nan() {
        return (0.0, true);
    }
    let applied = requested.min(max_hold_secs).max(0.0);
    (applied, applied != requested)
}

/// Stateless mediator between a bus at a stop and the active agent.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Holder {
    pub window:        HoldWindow,
    pub enabled:       bool,
    pub max_hold_secs: f64,
    pub horizon:       SimTime,
}

impl Holder {
    pub fn new(window: HoldWindow, enabled: bool, max_hold_secs: f64, horizon: SimTime) -> Self {
        Self { window, enabled, max_hold_secs: max_hold_secs.max(0.0), horizon }
    }

    pub fn from_config(config: &SimConfig) -> Self {
        Self::new(config.hold_window(), config.holding_enabled, config.max_hold_secs, config.horizon())
    }

    /// A holder that never holds.
    pub fn disabled(horizon: SimTime) -> Self {
        Self::new(HoldWindow::CLOSED, false, 0.0, horizon)
    }

    /// Holding enabled, the stop holdable, and the time inside the window.
    pub fn is_active(&self, point: &ControlPoint) -> bool {
        self.enabled && point.holdable && self.window.contains(point.time)
    }

    /// Query `agent` at `point` if the point is active.
    ///
    /// `snapshot` is only called for an active point, with the agent's
    /// declared [`SnapshotSpec`].
    pub fn on_arrival<F>(&self, point: &ControlPoint, agent: &mut dyn HoldingAgent, snapshot: F) -> HoldDecision
    where
        F: FnOnce(SnapshotSpec) -> Snapshot,
    {
        if !self.is_active(point) {
            return HoldDecision::pass_through();
        }

        let spec = agent.snapshot_spec();
        let requested = agent.decide(&snapshot(spec));
        let (mut applied, clamped) = clamp_hold(requested, self.max_hold_secs);
        if clamped {
            warn!(
                agent = agent.name(),
                bus = %point.bus,
                stop = %point.stop,
                requested,
                applied,
                "hold decision clamped"
            );
        }

        let mut truncated = false;
        if applied > 0.0 && point.ready_at.add_secs(applied) > self.horizon {
            applied = self.horizon.secs_since(point.ready_at).max(0.0);
            truncated = true;
        }

        let decision = HoldDecision { requested, applied, clamped, truncated };
        agent.observe(&HoldOutcome {
            time:       point.time,
            bus:        point.bus,
            route:      point.route,
            stop:       point.stop,
            stop_index: point.stop_index,
            decision,
        });
        decision
    }
}
