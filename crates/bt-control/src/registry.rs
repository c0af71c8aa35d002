//! Agent configuration and construction by name.
//!
//! Built-in agents are described by [`AgentConfig`]; user agents are added
//! to an [`AgentRegistry`] under a name and referenced from configuration as
//! `AgentConfig::Custom { name, params }`.
//!
//! ```json
//! { "type": "forward_headway", "alpha": 0.6, "slack": 30.0, "nonlinear": true }
//! { "type": "exploration", "inner": { "type": "fixed_hold", "secs": 20 }, "std_secs": 5 }
//! ```

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::{
    ControlBase, ControlError, ControlResult, DoNothing, Exploration, FixedHold,
    ForwardHeadwayControl, HoldingAgent, ScheduleControl,
};

#[derive(Clone, Debug, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "snake_case"))]
pub enum AgentConfig {
    #[default]
    DoNothing,
    FixedHold { secs: f64 },
    ForwardHeadway { alpha: f64, slack: f64, nonlinear: bool },
    Schedule { f0: f64, slack: f64, base: ControlBase },
    Exploration { inner: Box<AgentConfig>, std_secs: f64 },
    Custom { name: String, params: BTreeMap<String, f64> },
}

impl AgentConfig {
    /// Whether the agent needs a virtual schedule to act.
    pub fn needs_schedule(&self) -> bool {
        match self {
            AgentConfig::Schedule { .. }           => true,
            AgentConfig::Exploration { inner, .. } => inner.needs_schedule(),
            _                                      => false,
        }
    }
}

/// Constructor of a user agent from its parameters and a seed.
pub type AgentCtor =
    Box<dyn Fn(&BTreeMap<String, f64>, u64) -> ControlResult<Box<dyn HoldingAgent>> + Send + Sync>;

/// Builds agents from [`AgentConfig`]s.
#[derive(Default)]
pub struct AgentRegistry {
    custom: FxHashMap<String, AgentCtor>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a user agent.  A later registration under the same name
    /// replaces the earlier one.
    pub fn register<F>(&mut self, name: impl Into<String>, ctor: F) -> &mut Self
    where
        F: Fn(&BTreeMap<String, f64>, u64) -> ControlResult<Box<dyn HoldingAgent>> + Send + Sync + 'static,
    {
        self.custom.insert(name.into(), Box::new(ctor));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.custom.contains_key(name)
    }

    pub fn build(&self, config: &AgentConfig, seed: u64) -> ControlResult<Box<dyn HoldingAgent>> {
        let agent: Box<dyn HoldingAgent> = match config {
            AgentConfig::DoNothing => Box::new(DoNothing),
            AgentConfig::FixedHold { secs } => {
                finite("fixed_hold.secs", *secs)?;
                Box::new(FixedHold { secs: *secs })
            }
            AgentConfig::ForwardHeadway { alpha, slack, nonlinear } => {
                finite("forward_headway.alpha", *alpha)?;
                finite("forward_headway.slack", *slack)?;
                Box::new(ForwardHeadwayControl { alpha: *alpha, slack: *slack, nonlinear: *nonlinear })
            }
            AgentConfig::Schedule { f0, slack, base } => {
                finite("schedule.f0", *f0)?;
                finite("schedule.slack", *slack)?;
                Box::new(ScheduleControl { f0: *f0, slack: *slack, base: *base })
            }
            AgentConfig::Exploration { inner, std_secs } => {
                let inner = self.build(inner, seed)?;
                Box::new(Exploration::new(inner, *std_secs, seed)?)
            }
            AgentConfig::Custom { name, params } => {
                let ctor = self
                    .custom
                    .get(name)
                    .ok_or_else(|| ControlError::UnknownAgent(name.clone()))?;
                ctor(params, seed)?
            }
        };
        Ok(agent)
    }
}

fn finite(what: &str, v: f64) -> ControlResult<()> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(ControlError::Config(format!("{what} must be finite, got {v}")))
    }
}
