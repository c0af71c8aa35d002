//! CSV origin–destination loader.
//!
//! # CSV format
//!
//! One row per (route, origin, destination) pair.  Rates are in passengers
//! per hour; repeated pairs accumulate.
//!
//! ```csv
//! route,origin,destination,rate_per_hour
//! 0,0,5,12.0
//! 0,1,5,8.5
//! 0,4,t1,30
//! ```
//!
//! **`destination`** field:
//!
//! | Value  | Meaning                                 |
//! |--------|-----------------------------------------|
//! | `t<n>` | `Node::Terminal(TerminalId(n))`         |
//! | *u32*  | `Node::Stop(StopId(n))`                 |
//!
//! The table is only checked against a topology when the resulting
//! `OdDemand` is attached to a `NetworkBuilder`.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use bt_core::{RouteId, StopId, TerminalId};

use crate::{NetworkError, NetworkResult, Node, OdTable};

// ── CSV record ────────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct OdRecord {
    route:         u16,
    origin:        u32,
    destination:   String,
    rate_per_hour: f64,
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Load an [`OdTable`] (pax/s) from a CSV file.
pub fn load_od_csv(path: &Path) -> NetworkResult<OdTable> {
    let file = std::fs::File::open(path).map_err(NetworkError::Io)?;
    load_od_reader(file)
}

/// Like [`load_od_csv`] but accepts any `Read` source.
pub fn load_od_reader<R: Read>(reader: R) -> NetworkResult<OdTable> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut table = OdTable::new();

    for (line, result) in csv_reader.deserialize::<OdRecord>().enumerate() {
        let row = result.map_err(|e| NetworkError::Parse(e.to_string()))?;
        if !row.rate_per_hour.is_finite() || row.rate_per_hour < 0.0 {
            return Err(NetworkError::Parse(format!(
                "row {}: rate_per_hour must be non-negative, got {}",
                line + 1,
                row.rate_per_hour
            )));
        }
        table.insert(
            RouteId(row.route),
            StopId(row.origin),
            parse_destination(&row.destination)?,
            row.rate_per_hour / 3600.0,
        );
    }

    Ok(table)
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn parse_destination(s: &str) -> NetworkResult<Node> {
    let s = s.trim();
    let parsed = match s.strip_prefix('t') {
        Some(n) => n.parse::<u32>().map(|id| Node::Terminal(TerminalId(id))),
        None => s.parse::<u32>().map(|id| Node::Stop(StopId(id))),
    };
    parsed.map_err(|_| {
        NetworkError::Parse(format!(
            "invalid destination {s:?}: expected a StopId (u32) or \"t<TerminalId>\""
        ))
    })
}
