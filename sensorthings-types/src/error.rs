use thiserror::Error;

/// Errors raised while reading literal values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid instant: {0}")]
    InvalidInstant(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("invalid interval: {0}")]
    InvalidInterval(String),

    #[error("interval start {start} is after its end {end}")]
    InvertedInterval { start: String, end: String },

    #[error("unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("unknown property: {0}")]
    UnknownProperty(String),
}
