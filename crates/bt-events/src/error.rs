use thiserror::Error;

use bt_core::SimTime;

/// Scheduling errors.  Both indicate an engine bug, never bad input.
#[derive(Debug, Error)]
pub enum EventsError {
    #[error("event scheduled at {at} which is before the current time {now}")]
    InPast { at: SimTime, now: SimTime },

    #[error("event handle {0:?} is no longer queued")]
    StaleHandle(crate::EventHandle),
}

pub type EventsResult<T> = Result<T, EventsError>;
