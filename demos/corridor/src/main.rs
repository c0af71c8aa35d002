//! corridor — run holding-control episodes on a built-in transit corridor.
//!
//! ```text
//! cargo run -p corridor --release -- demos/corridor/configs/forward_headway.json
//! RUST_LOG=bt_sim=debug cargo run -p corridor -- my_run.json
//! ```
//!
//! Without an argument a default run is used: the homogeneous one-route
//! corridor under forward-headway control.  Output lands in `output_dir`
//! as CSV (or SQLite with `--features sqlite` and `"backend": "sqlite"`).

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use bt_control::{AgentConfig, AgentRegistry, DoNothing, HoldingAgent};
use bt_core::{SimConfig, episode_seed};
use bt_output::{CsvWriter, EpisodeOutputObserver, OutputWriter, write_episode_output};
use bt_sim::{EpisodeOutput, EpisodeRunner, FactoryRegistry, RunSummary};

// ── Run configuration ─────────────────────────────────────────────────────────

#[derive(Deserialize, Clone, Copy, PartialEq, Eq, Debug, Default)]
#[serde(rename_all = "snake_case")]
enum Backend {
    #[default]
    Csv,
    Sqlite,
}

#[derive(Deserialize, Debug)]
struct RunConfig {
    sim:        SimConfig,
    #[serde(default)]
    agent:      AgentConfig,
    #[serde(default = "default_output_dir")]
    output_dir: PathBuf,
    /// Run episodes on all cores; output is written once they finish.
    #[serde(default)]
    parallel:   bool,
    #[serde(default)]
    backend:    Backend,
    /// Episodes spent refining the virtual schedule before the run.
    #[serde(default)]
    stabilize:  u32,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("output/corridor")
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            sim:        SimConfig {
                episode_num:  4,
                metric_names: ["headway_std", "hold_time", "trip_time", "pax_wait_time"]
                    .map(String::from)
                    .to_vec(),
                ..SimConfig::default()
            },
            agent:      AgentConfig::ForwardHeadway { alpha: 0.6, slack: 30.0, nonlinear: true },
            output_dir: default_output_dir(),
            parallel:   false,
            backend:    Backend::Csv,
            stabilize:  0,
        }
    }
}

fn load(path: &Path) -> Result<RunConfig> {
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let run = match std::env::args_os().nth(1) {
        Some(path) => load(Path::new(&path))?,
        None => RunConfig::default(),
    };
    run.sim.validate().context("invalid sim config")?;
    if run.agent.needs_schedule() && !run.sim.has_schedule {
        bail!("agent {:?} needs a schedule; set sim.has_schedule = true", run.agent);
    }

    println!("=== corridor — rust_bt holding control ===");
    println!(
        "Env: {}  |  Episodes: {}  |  Horizon: {} s  |  Seed: {}",
        run.sim.env_name, run.sim.episode_num, run.sim.episode_duration_secs, run.sim.seed
    );
    println!("Agent: {:?}", run.agent);
    println!();

    // 1. Environment and agent factory.
    let (network, factory) = FactoryRegistry::with_builtins().build(&run.sim.env_name)?;
    println!(
        "Network `{}`: {} routes, {} stops, {} links  (factory: {})",
        network.name(),
        network.routes().len(),
        network.stops().len(),
        network.links().len(),
        factory.name(),
    );
    let agents = AgentRegistry::new();
    // Surface agent config errors before any episode starts.
    agents.build(&run.agent, run.sim.seed)?;
    let seed = run.sim.seed;
    let make_agent = |ep: u32| -> Box<dyn HoldingAgent> {
        // Validated above; construction is deterministic in the config.
        agents
            .build(&run.agent, episode_seed(seed, ep))
            .unwrap_or_else(|_| Box::new(DoNothing))
    };
    let mut runner = EpisodeRunner::new(run.sim.clone(), network, factory);
    if run.stabilize > 0 {
        let schedule = runner.stabilize_schedule(&make_agent, run.stabilize)?;
        println!("Virtual schedule stabilised over {} episodes", run.stabilize);
        runner = runner.with_schedule(schedule);
    }

    // 2. Run and write.
    let t0 = Instant::now();
    let outputs = match run.backend {
        Backend::Csv => execute(&run, &runner, &make_agent, CsvWriter::new(&run.output_dir)?)?,
        #[cfg(feature = "sqlite")]
        Backend::Sqlite => execute(&run, &runner, &make_agent, bt_output::SqliteWriter::new(&run.output_dir)?)?,
        #[cfg(not(feature = "sqlite"))]
        Backend::Sqlite => bail!("the sqlite backend needs `--features sqlite`"),
    };
    let elapsed = t0.elapsed();
    info!(episodes = outputs.len(), secs = elapsed.as_secs_f64(), "run complete");

    // 3. Summary.
    let summary = RunSummary::from_outputs(&outputs);
    println!("Run complete in {:.3} s → {}", elapsed.as_secs_f64(), run.output_dir.display());
    println!(
        "  trips: {} completed, {} truncated  |  clamped decisions: {}",
        summary.completed_trips, summary.truncated_trips, summary.warnings
    );
    println!();
    println!("{:<20} {:>6} {:<10} {:>10} {:>10} {:>5}", "Metric", "Route", "Aggregate", "Mean", "Std", "Eps");
    println!("{}", "-".repeat(66));
    for (key, s) in &summary.metrics {
        println!(
            "{:<20} {:>6} {:<10} {:>10.2} {:>10.2} {:>5}",
            key.metric.as_str(),
            key.route.0,
            key.aggregate.as_str(),
            s.mean,
            s.std,
            s.count,
        );
    }

    Ok(())
}

/// Run every episode and write the output through `writer`.
fn execute<W, F>(run: &RunConfig, runner: &EpisodeRunner, make_agent: &F, writer: W) -> Result<Vec<EpisodeOutput>>
where
    W: OutputWriter,
    F: Fn(u32) -> Box<dyn HoldingAgent> + Sync,
{
    if run.parallel {
        let outputs = runner.run_parallel(make_agent)?;
        let mut writer = writer;
        for out in &outputs {
            write_episode_output(&mut writer, out)?;
        }
        writer.finish()?;
        return Ok(outputs);
    }

    let mut obs = EpisodeOutputObserver::new(writer, &run.sim);
    let outputs = runner.run_observed(make_agent, &mut obs)?;
    obs.finish()?;
    Ok(outputs)
}
