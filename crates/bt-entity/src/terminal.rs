//! Terminal entity: per-route dispatch lists and the virtual-bus reference.

use std::sync::Arc;

use bt_core::{RouteId, SimTime, TerminalId};
use bt_network::{Scheduled, VirtualSchedule};

use crate::{EntityError, EntityResult};

/// Dispatch plan of one route from this terminal.
pub struct RouteDispatch {
    pub route: RouteId,
    times:     Vec<SimTime>,
    cursor:    usize,
}

impl RouteDispatch {
    pub fn times(&self) -> &[SimTime] {
        &self.times
    }

    /// Number of buses already dispatched.
    pub fn dispatched(&self) -> usize {
        self.cursor
    }
}

/// A dispatched bus slot: its ordinal (from 1) and scheduled time.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct DispatchSlot {
    pub seq:       u32,
    pub scheduled: SimTime,
}

pub struct Terminal {
    pub id:   TerminalId,
    routes:   Vec<RouteDispatch>,
    schedule: Option<Arc<VirtualSchedule>>,
}

impl Terminal {
    pub fn new(id: TerminalId) -> Self {
        Self { id, routes: Vec::new(), schedule: None }
    }

    /// Attach the virtual bus used for schedule deviations.
    pub fn with_schedule(mut self, schedule: Arc<VirtualSchedule>) -> Self {
        self.schedule = Some(schedule);
        self
    }

    /// Register `route` with its dispatch times (ascending).
    pub fn add_route(&mut self, route: RouteId, times: Vec<SimTime>) -> EntityResult<()> {
        if self.routes.iter().any(|r| r.route == route) {
            return Err(EntityError::DuplicateRoute { terminal: self.id, route });
        }
        self.routes.push(RouteDispatch { route, times, cursor: 0 });
        Ok(())
    }

    pub fn routes(&self) -> &[RouteDispatch] {
        &self.routes
    }

    /// Next undispatched time of `route`.
    pub fn peek(&self, route: RouteId) -> Option<SimTime> {
        self.routes
            .iter()
            .find(|r| r.route == route)
            .and_then(|r| r.times.get(r.cursor).copied())
    }

    /// Consume the next dispatch slot of `route`.
    pub fn take(&mut self, route: RouteId) -> Option<DispatchSlot> {
        let r = self.routes.iter_mut().find(|r| r.route == route)?;
        let scheduled = *r.times.get(r.cursor)?;
        r.cursor += 1;
        Some(DispatchSlot { seq: r.cursor as u32, scheduled })
    }

    pub fn schedule(&self) -> Option<&VirtualSchedule> {
        self.schedule.as_deref()
    }

    /// Scheduled times at stop `stop_index` for a bus dispatched at
    /// `dispatch`, when a virtual schedule is attached.
    pub fn scheduled(&self, route: RouteId, stop_index: usize, dispatch: SimTime) -> Option<Scheduled> {
        self.schedule.as_ref()?.scheduled(route, stop_index, dispatch)
    }
}
