use spread_engine::{ChannelFailure, FetchFailure, FetchKind};
use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// All errors generated in `spread-feed`.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum FeedError {
    #[error("invalid endpoint url {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("GraphQL errors: {}", .0.join("; "))]
    GraphQl(Vec<String>),

    #[error("GraphQL response missing data")]
    MissingData,

    #[error("failed to decode response: {0}")]
    Decode(String),

    #[error("SocketError: {0}")]
    Socket(String),

    #[error("push subscription rejected: {0}")]
    Subscription(String),
}

impl FeedError {
    /// Determine if retrying the same operation cannot succeed without a configuration change.
    #[allow(clippy::match_like_matches_macro)]
    pub fn is_terminal(&self) -> bool {
        match self {
            FeedError::InvalidUrl { .. } => true,
            _ => false,
        }
    }

    /// Convert into the engine level failure of a listing or historical fetch.
    pub fn into_fetch_failure(self, kind: FetchKind) -> FetchFailure {
        FetchFailure::new(kind, self.to_string())
    }

    /// Convert into the engine level push channel failure.
    pub fn into_channel_failure(self) -> ChannelFailure {
        ChannelFailure(self.to_string())
    }
}

impl From<reqwest::Error> for FeedError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            Self::Decode(error.to_string())
        } else if let Some(status) = error.status() {
            Self::Status(status.as_u16())
        } else {
            Self::Http(error.to_string())
        }
    }
}

impl From<tungstenite::Error> for FeedError {
    fn from(error: tungstenite::Error) -> Self {
        Self::Socket(error.to_string())
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(error: serde_json::Error) -> Self {
        Self::Decode(error.to_string())
    }
}
