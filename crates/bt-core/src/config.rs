//! Episode configuration.
//!
//! `SimConfig` is the immutable value threaded through network assembly,
//! the builder, and the event loop.  It is validated once, up front, by
//! [`SimConfig::validate`]; nothing downstream re-checks or defaults it.

use crate::{CoreError, CoreResult, HoldWindow, MetricName, SimTime};

// ── BoardTruncation ───────────────────────────────────────────────────────────

/// Which waiting passengers a servicing bus admits.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum BoardTruncation {
    /// Only passengers already waiting when service starts.
    Arrival,
    /// Also passengers who arrive while the bus is still dwelling.
    #[default]
    ReadyToDepart,
}

// ── SimConfig ─────────────────────────────────────────────────────────────────

/// Top-level episode configuration.
///
/// Typically loaded from a JSON file by the application crate (feature
/// `serde`) and passed to the episode runner.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimConfig {
    /// Master RNG seed.  The same seed always produces identical episodes.
    pub seed: u64,

    /// Number of episodes the runner executes.
    pub episode_num: u32,

    /// Episode horizon in seconds.  Events after it are discarded.
    pub episode_duration_secs: f64,

    /// Start of the holding window (seconds since episode start).
    pub hold_start_secs: f64,

    /// End of the holding window (inclusive).
    pub hold_end_secs: f64,

    /// Topology identifier looked up in the factory registry.
    pub env_name: String,

    /// Metrics to aggregate.  Each must parse as a [`MetricName`].
    pub metric_names: Vec<String>,

    /// Whether a virtual-bus schedule is built for this episode.
    pub has_schedule: bool,

    /// Per-stop slack added to the virtual schedule (seconds).
    #[cfg_attr(feature = "serde", serde(default))]
    pub schedule_slack_secs: f64,

    /// Upper bound applied to every agent decision (seconds).
    pub max_hold_secs: f64,

    /// Master switch for the control point.  `false` never consults the agent.
    pub holding_enabled: bool,

    /// Width of the metric time buckets in seconds.
    #[cfg_attr(feature = "serde", serde(default = "default_bucket_secs"))]
    pub metric_bucket_secs: u64,

    #[cfg_attr(feature = "serde", serde(default))]
    pub board_truncation: BoardTruncation,

    /// Keep the full event log in the episode output.
    #[cfg_attr(feature = "serde", serde(default))]
    pub record_trajectory: bool,
}

#[cfg(feature = "serde")]
fn default_bucket_secs() -> u64 {
    3_600
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed:                  42,
            episode_num:           1,
            episode_duration_secs: 14_400.0,
            hold_start_secs:       3_600.0,
            hold_end_secs:         10_800.0,
            env_name:              "homogeneous_one_route".to_owned(),
            metric_names:          vec!["headway_std".to_owned(), "hold_time".to_owned()],
            has_schedule:          false,
            schedule_slack_secs:   0.0,
            max_hold_secs:         180.0,
            holding_enabled:       true,
            metric_bucket_secs:    3_600,
            board_truncation:      BoardTruncation::ReadyToDepart,
            record_trajectory:     false,
        }
    }
}

impl SimConfig {
    /// Check every field that has a legal range.  Fails on the first problem.
    pub fn validate(&self) -> CoreResult<()> {
        if self.episode_num == 0 {
            return Err(CoreError::Config("episode_num must be at least 1".into()));
        }
        if !self.episode_duration_secs.is_finite() || self.episode_duration_secs <= 0.0 {
            return Err(CoreError::Config(format!(
                "episode_duration_secs must be positive, got {}",
                self.episode_duration_secs
            )));
        }

        let (start, end, duration) =
            (self.hold_start_secs, self.hold_end_secs, self.episode_duration_secs);
        let in_range = |t: f64| t.is_finite() && (0.0..=duration).contains(&t);
        if !in_range(start) || !in_range(end) || start > end {
            return Err(CoreError::InvalidWindow { start, end, duration });
        }

        if !self.max_hold_secs.is_finite() || self.max_hold_secs < 0.0 {
            return Err(CoreError::Config(format!(
                "max_hold_secs must be a non-negative number, got {}",
                self.max_hold_secs
            )));
        }
        if !self.schedule_slack_secs.is_finite() || self.schedule_slack_secs < 0.0 {
            return Err(CoreError::Config(format!(
                "schedule_slack_secs must be a non-negative number, got {}",
                self.schedule_slack_secs
            )));
        }
        if self.metric_bucket_secs == 0 {
            return Err(CoreError::Config("metric_bucket_secs must be positive".into()));
        }
        if self.env_name.trim().is_empty() {
            return Err(CoreError::Config("env_name is empty".into()));
        }

        let metrics = self.metrics()?;
        if metrics.contains(&MetricName::ScheduleDeviation) && !self.has_schedule {
            return Err(CoreError::Config(
                "metric schedule_deviation requires has_schedule = true".into(),
            ));
        }
        Ok(())
    }

    /// Parse `metric_names`, rejecting unknown names.  Duplicates collapse.
    pub fn metrics(&self) -> CoreResult<Vec<MetricName>> {
        let mut out: Vec<MetricName> = self
            .metric_names
            .iter()
            .map(|s| s.parse())
            .collect::<CoreResult<_>>()?;
        out.sort();
        out.dedup();
        Ok(out)
    }

    /// The episode horizon as a timestamp.
    #[inline]
    pub fn horizon(&self) -> SimTime {
        SimTime::from_secs_f64(self.episode_duration_secs)
    }

    /// The holding window, or [`HoldWindow::CLOSED`] when holding is disabled.
    pub fn hold_window(&self) -> HoldWindow {
        if !self.holding_enabled {
            return HoldWindow::CLOSED;
        }
        HoldWindow::new(
            SimTime::from_secs_f64(self.hold_start_secs),
            SimTime::from_secs_f64(self.hold_end_secs),
        )
    }
}
