use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected user operations on the dashboard engine.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum EngineError {
    #[error("selection, time-frame and date range are locked while live mode is on")]
    LiveModeLocked,

    #[error("invalid page size {0}: must be at least 1")]
    InvalidPageSize(usize),

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidDateRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("unknown time-frame unit: {0}")]
    UnknownTimeFrame(String),
}

/// Which remote query a [`FetchFailure`] originated from.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub enum FetchKind {
    Listing,
    Historical,
}

impl std::fmt::Display for FetchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchKind::Listing => write!(f, "listing"),
            FetchKind::Historical => write!(f, "historical"),
        }
    }
}

/// A listing or historical query was rejected.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Error)]
#[error("{kind} fetch failed: {message}")]
pub struct FetchFailure {
    pub kind: FetchKind,
    pub message: String,
}

impl FetchFailure {
    pub fn new(kind: FetchKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// The push subscription failed. Never surfaced to the user.
#[derive(Debug, Clone, Eq, PartialEq, Deserialize, Serialize, Error)]
#[error("push channel failed: {0}")]
pub struct ChannelFailure(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_failure_display() {
        let failure = FetchFailure::new(FetchKind::Historical, "connection reset");
        assert_eq!(
            failure.to_string(),
            "historical fetch failed: connection reset"
        );
    }
}
