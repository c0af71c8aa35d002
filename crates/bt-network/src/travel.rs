//! Link travel-time generation.
//!
//! [`TravelTimeSpec`] is the serializable description attached to a link.
//! [`NetworkBuilder::build`][crate::NetworkBuilder::build] validates it into a
//! [`TravelTimeSampler`], constructing the `rand_distr` distribution up
//! front so malformed parameters surface as configuration errors rather than
//! at the first traversal.

use rand::Rng;
use rand_distr::{LogNormal, Normal};

use bt_core::{BusId, SimTime, StreamRng};

use crate::{NetworkError, NetworkResult};

// ── Trait ─────────────────────────────────────────────────────────────────────

/// Produces the traversal time of one link.
///
/// Called exactly once per bus traversal.  `rng` is the link's own stream.
pub trait TravelTimeModel: Send + Sync {
    fn sample_secs(&self, bus: BusId, now: SimTime, rng: &mut StreamRng) -> f64;

    /// Expected traversal time, used to build the virtual schedule.
    fn mean_secs(&self) -> f64;
}

// ── Spec ──────────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TravelTimeSpec {
    Deterministic { secs: f64 },
    /// Normal with std `mean_secs * cv`, floored at `min_secs`.
    Normal { mean_secs: f64, cv: f64, min_secs: f64 },
    /// Log-normal with the given arithmetic mean and coefficient of variation.
    LogNormal { mean_secs: f64, cv: f64, min_secs: f64 },
}

impl TravelTimeSpec {
    /// Validate parameters and build the sampler.  `what` names the link in
    /// error messages.
    pub fn sampler(&self, what: &str) -> NetworkResult<TravelTimeSampler> {
        let bad = |reason: String| NetworkError::Distribution { what: what.to_owned(), reason };
        let check_non_negative = |name: &str, v: f64| {
            if v.is_finite() && v >= 0.0 {
                Ok(())
            } else {
                Err(bad(format!("{name} must be a non-negative number, got {v}")))
            }
        };

        match *self {
            TravelTimeSpec::Deterministic { secs } => {
                check_non_negative("secs", secs)?;
                Ok(TravelTimeSampler::Fixed(secs))
            }
            TravelTimeSpec::Normal { mean_secs, cv, min_secs } => {
                check_non_negative("mean_secs", mean_secs)?;
                check_non_negative("cv", cv)?;
                check_non_negative("min_secs", min_secs)?;
                let dist = Normal::new(mean_secs, mean_secs * cv)
                    .map_err(|e| bad(e.to_string()))?;
                Ok(TravelTimeSampler::Normal { dist, mean_secs, min_secs })
            }
            TravelTimeSpec::LogNormal { mean_secs, cv, min_secs } => {
                check_non_negative("cv", cv)?;
                check_non_negative("min_secs", min_secs)?;
                if !(mean_secs.is_finite() && mean_secs > 0.0) {
                    return Err(bad(format!("mean_secs must be positive, got {mean_secs}")));
                }
                let sigma2 = (1.0 + cv * cv).ln();
                let mu = mean_secs.ln() - sigma2 / 2.0;
                let dist = LogNormal::new(mu, sigma2.sqrt()).map_err(|e| bad(e.to_string()))?;
                Ok(TravelTimeSampler::LogNormal { dist, mean_secs, min_secs })
            }
        }
    }

    /// Expected value before flooring.
    pub fn mean_secs(&self) -> f64 {
        match *self {
            TravelTimeSpec::Deterministic { secs }        => secs,
            TravelTimeSpec::Normal { mean_secs, .. }      => mean_secs,
            TravelTimeSpec::LogNormal { mean_secs, .. }   => mean_secs,
        }
    }
}

// ── Sampler ───────────────────────────────────────────────────────────────────

/// A validated, ready-to-sample travel-time distribution.
#[derive(Clone, Debug)]
pub enum TravelTimeSampler {
    Fixed(f64),
    Normal { dist: Normal<f64>, mean_secs: f64, min_secs: f64 },
    LogNormal { dist: LogNormal<f64>, mean_secs: f64, min_secs: f64 },
}

impl TravelTimeModel for TravelTimeSampler {
    fn sample_secs(&self, _bus: BusId, _now: SimTime, rng: &mut StreamRng) -> f64 {
        match self {
            TravelTimeSampler::Fixed(secs) => *secs,
            TravelTimeSampler::Normal { dist, min_secs, .. } => {
                rng.inner().sample(dist).max(*min_secs)
            }
            TravelTimeSampler::LogNormal { dist, min_secs, .. } => {
                rng.inner().sample(dist).max(*min_secs)
            }
        }
    }

    fn mean_secs(&self) -> f64 {
        match self {
            TravelTimeSampler::Fixed(secs) => *secs,
            TravelTimeSampler::Normal { mean_secs, .. }
            | TravelTimeSampler::LogNormal { mean_secs, .. } => *mean_secs,
        }
    }
}
