use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControlError {
    #[error("unknown agent {0:?}")]
    UnknownAgent(String),

    #[error("agent configuration error: {0}")]
    Config(String),
}

pub type ControlResult<T> = Result<T, ControlError>;
