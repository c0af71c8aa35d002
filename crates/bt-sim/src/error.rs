use bt_control::ControlError;
use bt_core::{CoreError, RouteId, SimTime};
use bt_entity::EntityError;
use bt_events::EventsError;
use bt_network::NetworkError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Config(#[from] CoreError),

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("scheduling error: {0}")]
    Events(#[from] EventsError),

    #[error("entity error: {0}")]
    Entity(#[from] EntityError),

    #[error("control error: {0}")]
    Control(#[from] ControlError),

    #[error("components factory `{factory}` built no {kind} {id}")]
    MissingComponent {
        factory: String,
        kind:    &'static str,
        id:      String,
    },

    #[error("route {route} dispatched twice at {at}")]
    DuplicateDispatch {
        route: RouteId,
        at:    SimTime,
    },

    #[error("event loop invariant broken: {0}")]
    Invariant(String),
}

impl SimError {
    /// Shorthand for a [`CoreError::Config`] wrapped as a sim error.
    pub fn config(msg: impl Into<String>) -> Self {
        SimError::Config(CoreError::Config(msg.into()))
    }
}

pub type SimResult<T> = Result<T, SimError>;
