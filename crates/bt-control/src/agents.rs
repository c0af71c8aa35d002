//! Built-in holding agents.
//!
//! | Agent                     | Hold (seconds, before clamping)                          |
//! |---------------------------|----------------------------------------------------------|
//! | [`DoNothing`]             | `0`                                                      |
//! | [`FixedHold`]             | `secs`                                                   |
//! | [`ForwardHeadwayControl`] | `alpha·(H − h_fwd) + slack`                              |
//! | [`ScheduleControl`]       | schedule-deviation feedback, see the type docs           |
//! | [`Exploration`]           | inner agent + `N(0, std²)` noise                         |

use rand::Rng;
use rand_distr::Normal;

use bt_core::{Stream, StreamRng, episode_seed};

use crate::{ControlError, ControlResult, HoldOutcome, HoldingAgent, Snapshot, SnapshotSpec};

// ── Trivial agents ────────────────────────────────────────────────────────────

/// Never holds.
#[derive(Copy, Clone, Debug, Default)]
pub struct DoNothing;

impl HoldingAgent for DoNothing {
    fn decide(&mut self, _snapshot: &Snapshot) -> f64 {
        0.0
    }

    fn name(&self) -> &str {
        "do_nothing"
    }
}

/// Always requests the same hold.
#[derive(Copy, Clone, Debug)]
pub struct FixedHold {
    pub secs: f64,
}

impl HoldingAgent for FixedHold {
    fn decide(&mut self, _snapshot: &Snapshot) -> f64 {
        self.secs
    }

    fn name(&self) -> &str {
        "fixed_hold"
    }
}

// ── Forward-headway control ───────────────────────────────────────────────────

/// Headway-based feedback on the gap to the preceding bus.
///
/// `h_fwd` is the gap between the preceding bus's ready-to-depart time at
/// this stop and this bus's (holds excluded), and `H` is the scheduled
/// headway.  A bus without a neighbour on either side
/// is never held.  The nonlinear variant floors the result at 0 before
/// the holder's own clamping.
#[derive(Copy, Clone, Debug)]
pub struct ForwardHeadwayControl {
    pub alpha:     f64,
    pub slack:     f64,
    pub nonlinear: bool,
}

impl HoldingAgent for ForwardHeadwayControl {
    fn decide(&mut self, s: &Snapshot) -> f64 {
        let Some(h_fwd) = s.forward_headway else { return 0.0 };
        if !s.has_neighbours() {
            return 0.0;
        }
        let hold = self.alpha * (s.schedule_headway - h_fwd) + self.slack;
        if self.nonlinear { hold.max(0.0) } else { hold }
    }

    fn name(&self) -> &str {
        "forward_headway"
    }
}

// ── Schedule control ──────────────────────────────────────────────────────────

/// Which deviation the schedule controller corrects.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ControlBase {
    Arrival,
    #[default]
    Ready,
}

/// Schedule-deviation feedback controller.
///
/// With `ε_a`/`ε_r` the arrival/ready deviations of this bus, `ε_a'` the
/// preceding bus's arrival deviation here, and `β = arrival rate × board
/// secs per pax`:
///
/// ```text
/// Arrival:  −ε_a + f0·ε_a + β·(ε_a' − ε_a) + slack
/// Ready:    −ε_r + f0·ε_a + slack
/// ```
///
/// floored at 0.  Without a schedule the controller never holds.
#[derive(Copy, Clone, Debug)]
pub struct ScheduleControl {
    pub f0:    f64,
    pub slack: f64,
    pub base:  ControlBase,
}

impl HoldingAgent for ScheduleControl {
    fn decide(&mut self, s: &Snapshot) -> f64 {
        let Some(eps_a) = s.arrival_deviation else { return 0.0 };
        let hold = match self.base {
            ControlBase::Arrival => {
                let beta = s.stop_arrival_rate * s.board_secs_per_pax;
                let eps_prev = s.forward_arrival_deviation.unwrap_or(eps_a);
                -eps_a + self.f0 * eps_a + beta * (eps_prev - eps_a) + self.slack
            }
            ControlBase::Ready => {
                let Some(eps_r) = s.ready_deviation else { return 0.0 };
                -eps_r + self.f0 * eps_a + self.slack
            }
        };
        hold.max(0.0)
    }

    fn name(&self) -> &str {
        "schedule"
    }
}

// ── Exploration ───────────────────────────────────────────────────────────────

/// Adds zero-mean Gaussian noise to another agent's decisions.
///
/// The noise stream is reseeded from `(seed, episode)` on every
/// [`reset`](HoldingAgent::reset), so episode `k` explores identically
/// across runs.
pub struct Exploration<A> {
    inner: A,
    noise: Normal<f64>,
    seed:  u64,
    rng:   StreamRng,
}

impl<A: HoldingAgent> Exploration<A> {
    pub fn new(inner: A, std_secs: f64, seed: u64) -> ControlResult<Self> {
        let noise = Normal::new(0.0, std_secs)
            .map_err(|e| ControlError::Config(format!("exploration std {std_secs}: {e}")))?;
        Ok(Self { inner, noise, seed, rng: StreamRng::new(seed, Stream::Agent(0)) })
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }
}

impl<A: HoldingAgent> HoldingAgent for Exploration<A> {
    fn decide(&mut self, snapshot: &Snapshot) -> f64 {
        self.inner.decide(snapshot) + self.rng.inner().sample(self.noise)
    }

    fn snapshot_spec(&self) -> SnapshotSpec {
        self.inner.snapshot_spec()
    }

    fn observe(&mut self, outcome: &HoldOutcome) {
        self.inner.observe(outcome);
    }

    fn reset(&mut self, episode: u32) {
        self.rng = StreamRng::new(episode_seed(self.seed, episode), Stream::Agent(0));
        self.inner.reset(episode);
    }

    fn name(&self) -> &str {
        "exploration"
    }
}
