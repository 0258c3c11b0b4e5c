#![forbid(unsafe_code)]

//! # Spread Feed
//! Transport & event loop for the [`spread_engine`] dashboard.
//!
//! Provides:
//! - GraphQL-over-HTTP listing & historical queries ([`GraphQlHttpClient`])
//! - GraphQL-over-WebSocket push subscription with auto-reconnect ([`WsPushChannel`])
//! - Idle timeout detection for silent WebSocket streams ([`TimeoutStream`])
//! - A single-threaded [`DashboardDriver`] executing engine commands and publishing
//!   [`DashboardSnapshot`]s to the presentation layer

/// Transport configuration.
pub mod config;

/// Event loop connecting the engine, the transport and the presentation layer.
pub mod driver;

/// All errors generated in `spread-feed`.
pub mod error;

/// GraphQL documents and wire envelopes.
pub mod graphql;

/// GraphQL-over-HTTP client.
pub mod http;

/// GraphQL-over-WebSocket push subscription.
pub mod subscription;

/// Idle timeout stream wrapper.
pub mod timeout;

pub use config::FeedConfig;
pub use driver::{Action, DashboardDriver, DashboardSnapshot};
pub use error::FeedError;
pub use http::{GraphQlHttpClient, SpreadApi};
pub use subscription::{PushChannel, PushUpdate, SubscriptionHandle, WsPushChannel};
pub use timeout::TimeoutStream;
