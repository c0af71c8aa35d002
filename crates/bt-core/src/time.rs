//! Simulation time model.
//!
//! # Design
//!
//! Time is a `SimTime` counter of **milliseconds since episode start**.
//! Models (travel time, dwell, hold) think in seconds as `f64`; every value
//! crossing into the event queue is rounded to the nearest millisecond by
//! [`SimTime::from_secs_f64`].
//!
//! Using an integer as the canonical time unit means event ordering is exact:
//! two events computed along different arithmetic paths either tie exactly
//! or they do not, and tie-breaking is left entirely to the queue's secondary
//! key.

use std::fmt;

const MS_PER_SEC: f64 = 1_000.0;

// ── SimTime ───────────────────────────────────────────────────────────────────

/// An absolute simulation timestamp in milliseconds.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimTime(pub u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    /// Sentinel for "never" / unbounded.
    pub const MAX: SimTime = SimTime(u64::MAX);

    /// Convert seconds to a timestamp, rounding to the nearest millisecond.
    ///
    /// Negative and NaN inputs saturate to zero; `+inf` saturates to `MAX`.
    #[inline]
    pub fn from_secs_f64(secs: f64) -> SimTime {
        if secs.is_nan() || secs <= 0.0 {
            return SimTime::ZERO;
        }
        let ms = (secs * MS_PER_SEC).round();
        if ms >= u64::MAX as f64 {
            SimTime::MAX
        } else {
            SimTime(ms as u64)
        }
    }

    /// Whole seconds → timestamp.
    #[inline]
    pub fn from_secs(secs: u64) -> SimTime {
        SimTime(secs.saturating_mul(1_000))
    }

    #[inline]
    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / MS_PER_SEC
    }

    /// `self + secs`, saturating at `MAX`.  Negative `secs` are ignored.
    #[inline]
    pub fn add_secs(self, secs: f64) -> SimTime {
        SimTime(self.0.saturating_add(SimTime::from_secs_f64(secs).0))
    }

    /// Seconds elapsed from `earlier` to `self` (negative if `earlier` is later).
    #[inline]
    pub fn secs_since(self, earlier: SimTime) -> f64 {
        (self.0 as f64 - earlier.0 as f64) / MS_PER_SEC
    }

    /// Index of the `bucket_secs`-wide bucket containing this time.
    #[inline]
    pub fn bucket(self, bucket_secs: u64) -> u32 {
        let width = bucket_secs.max(1).saturating_mul(1_000);
        (self.0 / width).min(u32::MAX as u64) as u32
    }
}

impl std::ops::Add<SimTime> for SimTime {
    type Output = SimTime;
    #[inline]
    fn add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0.saturating_add(rhs.0))
    }
}

impl std::ops::Sub for SimTime {
    type Output = SimTime;
    /// Saturating difference.
    #[inline]
    fn sub(self, rhs: SimTime) -> SimTime {
        SimTime(self.0.saturating_sub(rhs.0))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={:.3}s", self.as_secs_f64())
    }
}

// ── HoldWindow ────────────────────────────────────────────────────────────────

/// The closed time-of-day interval during which holding control may act.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct HoldWindow {
    pub start: SimTime,
    pub end:   SimTime,
}

impl HoldWindow {
    /// A window that never admits any time.
    pub const CLOSED: HoldWindow = HoldWindow { start: SimTime::MAX, end: SimTime::ZERO };

    pub fn new(start: SimTime, end: SimTime) -> Self {
        Self { start, end }
    }

    #[inline]
    pub fn contains(&self, t: SimTime) -> bool {
        self.start <= t && t <= self.end
    }
}
