use sensorthings_types::{ParseError, ValueKind};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FilterError>;

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid subscription to '{topic}': {reason}")]
    InvalidSubscriptionTopic { topic: String, reason: String },

    #[error("cannot apply '{op}' to {left} and {right}: {detail}")]
    UnsupportedOperandCombination {
        op: String,
        left: ValueKind,
        right: ValueKind,
        detail: String,
    },

    #[error("unknown boolean operation: {0}")]
    UnknownOperator(String),

    #[error("cannot compute {left} {op} {right}")]
    InvalidArithmetic {
        op: String,
        left: ValueKind,
        right: ValueKind,
    },

    #[error("no column mapping for property path '{0}'")]
    UnknownProperty(String),

    #[error("property path '{0}' crosses a navigation link and needs the store")]
    RequiresStore(String),

    #[error("serialization failed: {0}")]
    SerializationFailure(String),

    #[error("store query failed: {0}")]
    Store(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

impl FilterError {
    pub(crate) fn unsupported(
        op: impl Into<String>,
        left: ValueKind,
        right: ValueKind,
        detail: impl Into<String>,
    ) -> Self {
        FilterError::UnsupportedOperandCombination {
            op: op.into(),
            left,
            right,
            detail: detail.into(),
        }
    }

    pub(crate) fn invalid_topic(topic: &str, reason: impl Into<String>) -> Self {
        FilterError::InvalidSubscriptionTopic {
            topic: topic.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<serde_json::Error> for FilterError {
    fn from(e: serde_json::Error) -> Self {
        FilterError::SerializationFailure(e.to_string())
    }
}
