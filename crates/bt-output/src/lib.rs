//! `bt-output` — episode output writers for the rust_bt transit simulator.
//!
//! Two backends, the second behind a Cargo feature:
//!
//! | Feature   | Backend | Files created                                     |
//! |-----------|---------|---------------------------------------------------|
//! | *(none)*  | CSV     | `trajectory.csv`, `episodes.csv`, `metrics.csv`   |
//! | `sqlite`  | SQLite  | `output.db`                                       |
//!
//! Both implement [`OutputWriter`].  Feed one either live, through
//! [`EpisodeOutputObserver`] (a `bt_sim::SimObserver`), or after the fact
//! with [`write_episode_output`] on the `EpisodeOutput`s a runner returned.
//!
//! # Usage
//!
//! ```rust,ignore
//! use bt_output::{CsvWriter, EpisodeOutputObserver};
//!
//! let writer = CsvWriter::new(Path::new("./output"))?;
//! let mut obs = EpisodeOutputObserver::new(writer, &config);
//! runner.run_observed(|_| Box::new(DoNothing), &mut obs)?;
//! obs.finish()?;
//! ```

pub mod csv;
pub mod error;
pub mod observer;
pub mod row;
pub mod writer;

#[cfg(feature = "sqlite")]
pub mod sqlite;


pub use csv::CsvWriter;
pub use error::{OutputError, OutputResult};
pub use observer::EpisodeOutputObserver;
pub use row::{EpisodeRow, MetricRow, TrajectoryRow, metric_rows};
pub use writer::{OutputWriter, write_episode_output};

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteWriter;
